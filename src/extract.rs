//! Result extraction: solver values back into a staff × date schedule.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Read, Write};
use tracing::{info, warn};

use crate::error::{PlanError, PlanResult};
use crate::model::VariableLayout;
use crate::solver::{SolveStatus, SolverReply};
use crate::types::ModelRequest;

const STAFF_HEADER: &str = "staff_id";

/// A 0/1 matrix: `cells[s][d]` is 1 iff `staff[s]` works `dates[d]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub staff: Vec<String>,
    pub dates: Vec<String>,
    pub cells: Vec<Vec<u8>>,
}

impl Schedule {
    pub fn row(&self, staff_id: &str) -> Option<&[u8]> {
        let s = self.staff.iter().position(|id| id == staff_id)?;
        Some(&self.cells[s])
    }

    pub fn get(&self, staff_id: &str, date: &str) -> Option<u8> {
        let d = self.dates.iter().position(|x| x == date)?;
        self.row(staff_id).map(|row| row[d])
    }

    /// Shifts worked by each staff member, in row order.
    pub fn staff_totals(&self) -> Vec<u32> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|&c| c as u32).sum())
            .collect()
    }

    /// Staff on shift for each date, in column order.
    pub fn date_totals(&self) -> Vec<u32> {
        (0..self.dates.len())
            .map(|d| self.cells.iter().map(|row| row[d] as u32).sum())
            .collect()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> PlanResult<()> {
        let mut writer = csv::Writer::from_writer(writer);
        let header = std::iter::once(STAFF_HEADER).chain(self.dates.iter().map(String::as_str));
        writer.write_record(header)?;
        for (id, row) in self.staff.iter().zip(&self.cells) {
            let record = std::iter::once(id.clone()).chain(row.iter().map(u8::to_string));
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> PlanResult<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| PlanError::MalformedSchedule(e.to_string()))
    }

    /// Read a table written by [`Schedule::write_csv`]. The first column holds
    /// staff ids whatever its header says.
    pub fn read_csv<R: Read>(reader: R) -> PlanResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(PlanError::MalformedSchedule("missing header row".into()));
        }
        let dates: Vec<String> = headers.iter().skip(1).map(str::to_owned).collect();

        let mut staff = Vec::new();
        let mut cells = Vec::new();
        let mut seen = HashSet::new();
        for record in reader.records() {
            let record = record?;
            let id = record.get(0).unwrap_or_default().to_owned();
            if !seen.insert(id.clone()) {
                return Err(PlanError::MalformedSchedule(format!("duplicate staff `{id}`")));
            }

            let row = record
                .iter()
                .skip(1)
                .map(|cell| match cell {
                    "0" => Ok(0),
                    "1" => Ok(1),
                    other => Err(PlanError::MalformedSchedule(format!(
                        "cell `{other}` for `{id}` is not 0 or 1"
                    ))),
                })
                .collect::<PlanResult<Vec<u8>>>()?;

            staff.push(id);
            cells.push(row);
        }

        Ok(Self {
            staff,
            dates,
            cells,
        })
    }
}

/// Solved slack values for one staff member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffSlack {
    pub staff_id: String,
    pub under: f64,
    pub over: f64,
    /// Always 0 unless unavailable dates are penalized.
    pub unavailable: f64,
}

/// Everything one run reports back to its caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub status: SolveStatus,
    pub objective: Option<f64>,
    pub schedule: Option<Schedule>,
    pub slack: Option<Vec<StaffSlack>>,
    pub message: Option<String>,
}

impl PlanOutcome {
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    fn without_values(status: SolveStatus, message: Option<String>) -> Self {
        Self {
            status,
            objective: None,
            schedule: None,
            slack: None,
            message,
        }
    }
}

/// Round a solved binary to 0 or 1.
///
/// Values such as `0.9999999` come back from relaxation corners; rounding
/// instead of truncating keeps them at 1.
pub fn to_cell(value: f64) -> u8 {
    if value.round() >= 1.0 { 1 } else { 0 }
}

/// Turn a solver reply into an outcome. Only an `Optimal` reply yields a
/// schedule.
pub fn extract(request: &ModelRequest, layout: &VariableLayout, reply: SolverReply) -> PlanOutcome {
    let SolverReply {
        status,
        objective,
        values,
        message,
    } = reply;

    let (Some(objective), Some(values)) = (objective, values) else {
        info!(%status, "no schedule produced");
        return PlanOutcome::without_values(status, message);
    };
    if status != SolveStatus::Optimal {
        return PlanOutcome::without_values(status, message);
    }

    let expected = layout.watched().len();
    if values.len() != expected {
        warn!(expected, got = values.len(), "solver returned the wrong number of values");
        return PlanOutcome::without_values(
            SolveStatus::Undefined,
            Some(format!("expected {expected} values, got {}", values.len())),
        );
    }

    let staff_count = layout.staff_count();
    let day_count = layout.day_count();
    let (assigned, slack) = values.split_at(staff_count * day_count);

    let cells: Vec<Vec<u8>> = (0..staff_count)
        .map(|s| {
            assigned[s * day_count..(s + 1) * day_count]
                .iter()
                .map(|&v| to_cell(v))
                .collect()
        })
        .collect();

    let under = &slack[..staff_count];
    let over = &slack[staff_count..2 * staff_count];
    let unavailable = layout
        .unavailable
        .as_ref()
        .map(|_| &slack[2 * staff_count..3 * staff_count]);

    let slack = request
        .staff
        .iter()
        .enumerate()
        .map(|(s, staff)| StaffSlack {
            staff_id: staff.id.clone(),
            under: under[s],
            over: over[s],
            unavailable: unavailable.map_or(0.0, |z| z[s]),
        })
        .collect();

    info!(objective, "extracted schedule");
    PlanOutcome {
        status,
        objective: Some(objective),
        schedule: Some(Schedule {
            staff: request.staff_ids(),
            dates: request.dates(),
            cells,
        }),
        slack: Some(slack),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnavailabilityMode;
    use crate::model::build_model;
    use crate::types::{DayDemand, StaffProfile, Unavailability};

    fn schedule() -> Schedule {
        Schedule {
            staff: vec!["alice".into(), "bob".into()],
            dates: vec!["4/1".into(), "4/2".into(), "4/3".into()],
            cells: vec![vec![1, 0, 1], vec![0, 1, 1]],
        }
    }

    fn request() -> ModelRequest {
        ModelRequest {
            staff: ["alice", "bob"]
                .iter()
                .map(|id| StaffProfile {
                    id: id.to_string(),
                    leader: false,
                    min_days: 0,
                    max_days: 2,
                    penalty: 50,
                    unavailable: Unavailability::Anytime,
                })
                .collect(),
            days: ["4/1", "4/2", "4/3"]
                .iter()
                .map(|date| DayDemand {
                    date: date.to_string(),
                    required_staff: 1,
                    required_leaders: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn rounds_to_nearest() {
        assert_eq!(to_cell(0.999_999_7), 1);
        assert_eq!(to_cell(1.000_000_2), 1);
        assert_eq!(to_cell(3e-7), 0);
        assert_eq!(to_cell(-2e-9), 0);
        assert_eq!(to_cell(0.5), 1);
        assert_eq!(to_cell(0.49), 0);
    }

    #[test]
    fn extracts_rounded_matrix_and_slack() {
        let request = request();
        let model = build_model(&request, UnavailabilityMode::Penalized);
        let layout = model.layout().clone();

        let mut values = vec![0.999_999_9, 1e-9, 1.0, 0.0, 1.0, 0.9999];
        values.extend([0.0, 0.0]); // under
        values.extend([0.0, 1.0]); // over
        values.extend([0.0, 0.0]); // unavailable
        let outcome = extract(&request, &layout, SolverReply::optimal(50.0, values));

        assert!(outcome.is_optimal());
        assert_eq!(outcome.objective, Some(50.0));
        let schedule = outcome.schedule.unwrap();
        assert_eq!(schedule.cells, vec![vec![1, 0, 1], vec![0, 1, 1]]);
        assert_eq!(schedule.staff_totals(), [2, 2]);
        assert_eq!(schedule.date_totals(), [1, 1, 2]);

        let slack = outcome.slack.unwrap();
        assert_eq!(slack[1].staff_id, "bob");
        assert_eq!(slack[1].over, 1.0);
    }

    #[test]
    fn non_optimal_reply_has_no_schedule() {
        let request = request();
        let layout = build_model(&request, UnavailabilityMode::Strict).layout().clone();

        let outcome = extract(
            &request,
            &layout,
            SolverReply::terminal(SolveStatus::Infeasible, None),
        );
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert_eq!(outcome.objective, None);
        assert!(outcome.schedule.is_none());
        assert!(outcome.slack.is_none());
    }

    #[test]
    fn short_value_list_is_undefined() {
        let request = request();
        let layout = build_model(&request, UnavailabilityMode::Strict).layout().clone();

        let outcome = extract(&request, &layout, SolverReply::optimal(0.0, vec![1.0; 3]));
        assert_eq!(outcome.status, SolveStatus::Undefined);
        assert!(outcome.schedule.is_none());
    }

    #[test]
    fn csv_round_trip_keeps_ids_and_cells() {
        let text = schedule().to_csv_string().unwrap();
        assert_eq!(text.lines().next(), Some("staff_id,4/1,4/2,4/3"));
        assert_eq!(Schedule::read_csv(text.as_bytes()).unwrap(), schedule());
    }

    #[test]
    fn csv_file_round_trip() {
        let file = tempfile::NamedTempFile::new().unwrap();
        schedule().write_csv(file.reopen().unwrap()).unwrap();

        let read = Schedule::read_csv(std::fs::File::open(file.path()).unwrap()).unwrap();
        assert_eq!(read, schedule());
        assert_eq!(read.get("bob", "4/2"), Some(1));
        assert_eq!(read.get("bob", "4/9"), None);
    }

    #[test]
    fn reading_rejects_non_binary_cells() {
        let err = Schedule::read_csv("staff_id,d1\nalice,2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PlanError::MalformedSchedule(_)));

        let err = Schedule::read_csv("staff_id,d1\nalice,1\nalice,0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, PlanError::MalformedSchedule(_)));
    }
}
