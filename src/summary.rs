//! Coverage report: how a schedule measures up against its request.

use serde::Serialize;
use std::fmt;

use crate::extract::Schedule;
use crate::types::ModelRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffLoad {
    pub staff_id: String,
    pub leader: bool,
    pub shifts: u32,
    pub under: u32,
    pub over: u32,
    /// Shifts falling on the staff member's unavailable date.
    pub unavailable_hits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCoverage {
    pub date: String,
    pub staffed: u32,
    pub leaders: u32,
    pub required_staff: u32,
    pub required_leaders: u32,
}

impl DayCoverage {
    pub fn is_met(&self) -> bool {
        self.staffed >= self.required_staff && self.leaders >= self.required_leaders
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    pub staff: Vec<StaffLoad>,
    pub days: Vec<DayCoverage>,
}

impl CoverageReport {
    /// Cells are looked up by id, so a schedule read back from disk with a
    /// different row order still lines up. Missing cells count as 0.
    pub fn new(request: &ModelRequest, schedule: &Schedule) -> Self {
        let works = |staff_id: &str, date: &str| schedule.get(staff_id, date).unwrap_or(0) as u32;

        let staff = request
            .staff
            .iter()
            .map(|s| {
                let shifts: u32 = request.days.iter().map(|d| works(&s.id, &d.date)).sum();
                StaffLoad {
                    staff_id: s.id.clone(),
                    leader: s.leader,
                    shifts,
                    under: s.min_days.saturating_sub(shifts),
                    over: shifts.saturating_sub(s.max_days),
                    unavailable_hits: s.unavailable.date().map_or(0, |date| works(&s.id, date)),
                }
            })
            .collect();

        let days = request
            .days
            .iter()
            .map(|d| DayCoverage {
                date: d.date.clone(),
                staffed: request.staff.iter().map(|s| works(&s.id, &d.date)).sum(),
                leaders: request
                    .staff
                    .iter()
                    .filter(|s| s.leader)
                    .map(|s| works(&s.id, &d.date))
                    .sum(),
                required_staff: d.required_staff,
                required_leaders: d.required_leaders,
            })
            .collect();

        Self { staff, days }
    }

    pub fn all_requirements_met(&self) -> bool {
        self.days.iter().all(DayCoverage::is_met)
    }

    /// Workload violations `under + over` summed over staff.
    pub fn total_violation(&self) -> u32 {
        self.staff.iter().map(|s| s.under + s.over).sum()
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<12} {:>6} {:>6} {:>6} {:>6}", "staff", "shifts", "under", "over", "off")?;
        for s in &self.staff {
            writeln!(
                f,
                "{:<12} {:>6} {:>6} {:>6} {:>6}",
                s.staff_id, s.shifts, s.under, s.over, s.unavailable_hits
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:<12} {:>9} {:>9}", "date", "staff", "leaders")?;
        for d in &self.days {
            let mark = if d.is_met() { "" } else { "  !" };
            writeln!(
                f,
                "{:<12} {:>4}/{:<4} {:>4}/{:<4}{mark}",
                d.date, d.staffed, d.required_staff, d.leaders, d.required_leaders
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DayDemand, StaffProfile, Unavailability};

    fn request() -> ModelRequest {
        let profile = |id: &str, leader, unavailable: Unavailability| StaffProfile {
            id: id.into(),
            leader,
            min_days: 2,
            max_days: 2,
            penalty: 50,
            unavailable,
        };
        ModelRequest {
            staff: vec![
                profile("lead", true, Unavailability::Anytime),
                profile("crew", false, Unavailability::On("d3".into())),
            ],
            days: ["d1", "d2", "d3"]
                .iter()
                .map(|date| DayDemand {
                    date: date.to_string(),
                    required_staff: 1,
                    required_leaders: 1,
                })
                .collect(),
        }
    }

    #[test]
    fn counts_loads_and_coverage() {
        let schedule = Schedule {
            staff: vec!["lead".into(), "crew".into()],
            dates: vec!["d1".into(), "d2".into(), "d3".into()],
            cells: vec![vec![1, 1, 0], vec![0, 1, 1]],
        };
        let report = CoverageReport::new(&request(), &schedule);

        assert_eq!(report.staff[0].shifts, 2);
        assert_eq!(report.staff[1].unavailable_hits, 1);
        assert_eq!(report.days[1].staffed, 2);
        assert_eq!(report.days[2].leaders, 0);
        assert!(!report.days[2].is_met());
        assert!(!report.all_requirements_met());
        assert_eq!(report.total_violation(), 0);
        assert!(report.to_string().contains("d3"));
    }

    #[test]
    fn lines_up_rows_by_id() {
        let schedule = Schedule {
            staff: vec!["crew".into(), "lead".into()],
            dates: vec!["d1".into(), "d2".into(), "d3".into()],
            cells: vec![vec![0, 0, 0], vec![1, 1, 1]],
        };
        let report = CoverageReport::new(&request(), &schedule);

        assert!(report.all_requirements_met());
        assert_eq!(report.staff[0].over, 1);
        assert_eq!(report.staff[1].under, 2);
        assert_eq!(report.total_violation(), 3);
    }
}
