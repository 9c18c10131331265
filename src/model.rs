//! Model construction: decision variables and constraints for one run.
//!
//! Every (staff, date) pair gets one binary assignment variable. Coverage
//! requirements become hard constraints; workload preferences are linked to
//! non-negative slack variables that the objective later penalizes.

use good_lp::{Constraint, Expression, ProblemVariables, Variable, constraint, variable, variables};
use tracing::debug;

use crate::config::UnavailabilityMode;
use crate::types::ModelRequest;

/// Handles to every variable the extractor reads back.
#[derive(Debug, Clone)]
pub struct VariableLayout {
    /// `assignments[s][d]` is 1 iff staff `s` works day `d`.
    pub assignments: Vec<Vec<Variable>>,
    /// Shortfall below each staff member's minimum days.
    pub under: Vec<Variable>,
    /// Excess above each staff member's maximum days.
    pub over: Vec<Variable>,
    /// Assigned days falling on each staff member's unavailable date.
    /// Present only for [`UnavailabilityMode::Penalized`].
    pub unavailable: Option<Vec<Variable>>,
}

impl VariableLayout {
    /// All tracked variables in a fixed order: assignments row by row, then
    /// `under`, `over` and `unavailable`.
    pub fn watched(&self) -> Vec<Variable> {
        self.assignments
            .iter()
            .flatten()
            .chain(&self.under)
            .chain(&self.over)
            .chain(self.unavailable.iter().flatten())
            .copied()
            .collect()
    }

    pub fn staff_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn day_count(&self) -> usize {
        self.assignments.first().map_or(0, Vec::len)
    }
}

/// Variables and constraints of one run, before an objective is attached.
pub struct ShiftModel {
    variables: ProblemVariables,
    constraints: Vec<Constraint>,
    layout: VariableLayout,
}

impl ShiftModel {
    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Add a continuous variable bounded below by zero.
    pub fn add_nonnegative(&mut self) -> Variable {
        self.variables.add(variable().min(0))
    }

    pub fn into_parts(self) -> (ProblemVariables, Vec<Constraint>, VariableLayout) {
        (self.variables, self.constraints, self.layout)
    }
}

/// Build the constraint model for `request`.
pub fn build_model(request: &ModelRequest, mode: UnavailabilityMode) -> ShiftModel {
    let (variables, layout) = init_variables(request, mode);
    let model = ShiftModel {
        variables,
        constraints: Vec::new(),
        layout,
    };

    let model = constrain_daily_headcount(model, request);
    let model = constrain_daily_leaders(model, request);
    let model = match mode {
        UnavailabilityMode::Strict => forbid_unavailable_dates(model, request),
        UnavailabilityMode::Penalized => count_unavailable_assignments(model, request),
    };
    let model = link_workload_slack(model, request);

    debug!(
        staff = request.staff.len(),
        days = request.days.len(),
        constraints = model.constraint_count(),
        ?mode,
        "built shift model"
    );
    model
}

fn init_variables(
    request: &ModelRequest,
    mode: UnavailabilityMode,
) -> (ProblemVariables, VariableLayout) {
    let mut problem_vars = variables!();

    let assignments: Vec<Vec<Variable>> = request
        .staff
        .iter()
        .map(|_| {
            request
                .days
                .iter()
                .map(|_| problem_vars.add(variable().binary()))
                .collect()
        })
        .collect();

    let under: Vec<Variable> = request
        .staff
        .iter()
        .map(|_| problem_vars.add(variable().min(0)))
        .collect();
    let over: Vec<Variable> = request
        .staff
        .iter()
        .map(|_| problem_vars.add(variable().min(0)))
        .collect();

    // Staff with nothing to violate get a slack pinned at zero.
    let unavailable: Option<Vec<Variable>> = (mode == UnavailabilityMode::Penalized).then(|| {
        request
            .staff
            .iter()
            .map(|s| {
                let restricted = s
                    .unavailable
                    .date()
                    .is_some_and(|date| request.day_index(date).is_some());
                if restricted {
                    problem_vars.add(variable().min(0))
                } else {
                    problem_vars.add(variable().min(0).max(0))
                }
            })
            .collect()
    });

    let layout = VariableLayout {
        assignments,
        under,
        over,
        unavailable,
    };
    (problem_vars, layout)
}

/// Total days worked by staff `s`.
fn days_worked(layout: &VariableLayout, s: usize) -> Expression {
    layout.assignments[s].iter().copied().sum()
}

/// Each date is staffed by at least its required headcount.
///
/// Days requiring nobody are skipped since binaries are already non-negative.
fn constrain_daily_headcount(model: ShiftModel, request: &ModelRequest) -> ShiftModel {
    request
        .days
        .iter()
        .enumerate()
        .filter(|(_, day)| day.required_staff > 0)
        .fold(model, |m, (d, day)| {
            let staffed: Expression = m.layout.assignments.iter().map(|row| row[d]).sum();
            m.with(staffed.geq(day.required_staff as f64))
        })
}

/// Each date has at least its required number of leaders on shift.
fn constrain_daily_leaders(model: ShiftModel, request: &ModelRequest) -> ShiftModel {
    request
        .days
        .iter()
        .enumerate()
        .filter(|(_, day)| day.required_leaders > 0)
        .fold(model, |m, (d, day)| {
            let leaders: Expression = request
                .staff
                .iter()
                .zip(&m.layout.assignments)
                .filter(|(s, _)| s.leader)
                .map(|(_, row)| row[d])
                .sum();
            m.with(leaders.geq(day.required_leaders as f64))
        })
}

/// Fix assignments on requested days off to zero.
///
/// A request naming a date outside the calendar generates nothing.
fn forbid_unavailable_dates(model: ShiftModel, request: &ModelRequest) -> ShiftModel {
    request
        .staff
        .iter()
        .enumerate()
        .filter_map(|(s, staff)| {
            let date = staff.unavailable.date()?;
            request.day_index(date).map(|d| (s, d))
        })
        .fold(model, |m, (s, d)| {
            let x = m.layout.assignments[s][d];
            m.with(constraint!(x == 0.0))
        })
}

/// Tie `z_over[s]` to the number of assignments on the unavailable date.
///
/// Dates are unique, so the count is the single matching assignment.
fn count_unavailable_assignments(model: ShiftModel, request: &ModelRequest) -> ShiftModel {
    let Some(slack) = model.layout.unavailable.clone() else {
        return model;
    };

    request
        .staff
        .iter()
        .enumerate()
        .filter_map(|(s, staff)| {
            let date = staff.unavailable.date()?;
            request.day_index(date).map(|d| (s, d))
        })
        .fold(model, |m, (s, d)| {
            let x = m.layout.assignments[s][d];
            let z = slack[s];
            m.with(constraint!(x == z))
        })
}

/// Lower-bound the workload slacks:
/// `under[s] >= min[s] - worked[s]` and `over[s] >= worked[s] - max[s]`.
fn link_workload_slack(model: ShiftModel, request: &ModelRequest) -> ShiftModel {
    request.staff.iter().enumerate().fold(model, |m, (s, staff)| {
        let under = m.layout.under[s];
        let over = m.layout.over[s];
        let worked = days_worked(&m.layout, s);

        let m = m.with((worked.clone() + under).geq(staff.min_days as f64));
        m.with((worked - over).leq(staff.max_days as f64))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DayDemand, StaffProfile, Unavailability};

    fn request(unavailable: &[(&str, &str)]) -> ModelRequest {
        let staff = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, id)| StaffProfile {
                id: id.to_string(),
                leader: i == 0,
                min_days: 1,
                max_days: 2,
                penalty: 50,
                unavailable: unavailable
                    .iter()
                    .find(|(who, _)| who == id)
                    .map(|(_, date)| Unavailability::On(date.to_string()))
                    .unwrap_or_default(),
            })
            .collect();
        let days = ["d1", "d2"]
            .iter()
            .map(|date| DayDemand {
                date: date.to_string(),
                required_staff: 2,
                required_leaders: 1,
            })
            .collect();
        ModelRequest { staff, days }
    }

    #[test]
    fn one_assignment_variable_per_pair() {
        let model = build_model(&request(&[]), UnavailabilityMode::Strict);
        let layout = model.layout();

        assert_eq!(layout.staff_count(), 3);
        assert_eq!(layout.day_count(), 2);
        assert!(layout.unavailable.is_none());
        assert_eq!(layout.watched().len(), 3 * 2 + 3 + 3);
    }

    #[test]
    fn strict_mode_adds_one_constraint_per_matching_request() {
        // 2 headcount + 2 leader + 2 per staff for the workload band
        let base = build_model(&request(&[]), UnavailabilityMode::Strict).constraint_count();
        assert_eq!(base, 2 + 2 + 3 * 2);

        let model = build_model(
            &request(&[("a", "d1"), ("b", "d9")]),
            UnavailabilityMode::Strict,
        );
        assert_eq!(model.constraint_count(), base + 1);
    }

    #[test]
    fn penalized_mode_tracks_every_staff_member() {
        let model = build_model(
            &request(&[("a", "d2"), ("c", "d9")]),
            UnavailabilityMode::Penalized,
        );
        let layout = model.layout();

        assert_eq!(layout.unavailable.as_ref().map(Vec::len), Some(3));
        assert_eq!(layout.watched().len(), 3 * 2 + 3 * 3);
        assert_eq!(model.constraint_count(), 2 + 2 + 3 * 2 + 1);
    }

    #[test]
    fn requirements_of_zero_add_nothing() {
        let mut req = request(&[]);
        for day in req.days.iter_mut() {
            day.required_staff = 0;
            day.required_leaders = 0;
        }
        let model = build_model(&req, UnavailabilityMode::Strict);
        assert_eq!(model.constraint_count(), 3 * 2);
    }
}
