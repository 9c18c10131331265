//! Objective composition over the slack variables of a [`ShiftModel`].

use good_lp::{Constraint, Expression, Variable};
use tracing::debug;

use crate::config::ObjectiveForm;
use crate::model::{ShiftModel, VariableLayout};
use crate::solver::Submission;
use crate::types::{ModelRequest, StaffProfile};

/// A model with exactly one objective attached, ready for submission.
pub struct ComposedModel {
    model: ShiftModel,
    objective: Expression,
}

impl ComposedModel {
    pub fn model(&self) -> &ShiftModel {
        &self.model
    }

    pub fn into_submission(self) -> (Submission, VariableLayout) {
        let (variables, constraints, layout) = self.model.into_parts();
        let submission = Submission {
            variables,
            objective: self.objective,
            constraints,
            watched: layout.watched(),
        };
        (submission, layout)
    }
}

/// Attach the penalty objective.
///
/// Linear: `sum_s w[s] * (under[s] + over[s])`.
/// Quadratic: `sum_s (w[s] * (under[s] + over[s]))^2`, squared per staff member.
/// Either form adds `off_penalty * z_over[s]` when the model tracks
/// unavailable-date violations.
pub fn compose_objective(
    model: ShiftModel,
    request: &ModelRequest,
    form: ObjectiveForm,
    off_penalty: f64,
) -> ComposedModel {
    let (model, objective) = match form {
        ObjectiveForm::Linear => {
            let objective = workload_penalty(model.layout(), request);
            (model, objective)
        }
        ObjectiveForm::Quadratic => squared_workload_penalty(model, request),
    };
    let objective = add_unavailable_penalty(objective, model.layout(), off_penalty);

    debug!(?form, off_penalty, "composed objective");
    ComposedModel { model, objective }
}

fn workload_penalty(layout: &VariableLayout, request: &ModelRequest) -> Expression {
    let mut objective = Expression::with_capacity(request.staff.len() * 2);
    for ((staff, &under), &over) in request.staff.iter().zip(&layout.under).zip(&layout.over) {
        let weight = staff.penalty as f64;
        objective.add_mul(weight, under);
        objective.add_mul(weight, over);
    }
    objective
}

fn add_unavailable_penalty(
    mut objective: Expression,
    layout: &VariableLayout,
    off_penalty: f64,
) -> Expression {
    for &z in layout.unavailable.iter().flatten() {
        objective.add_mul(off_penalty, z);
    }
    objective
}

/// Largest workload violation `under + over` any assignment can produce.
///
/// The violation is convex in days worked, so it peaks at zero days or at
/// every day.
pub fn max_violation(staff: &StaffProfile, day_count: usize) -> u32 {
    let days = day_count as u32;
    let at_zero = staff.min_days;
    let at_all = staff.min_days.saturating_sub(days) + days.saturating_sub(staff.max_days);
    at_zero.max(at_all)
}

/// Chord of `(w v)^2` between `v = k` and `v = k + 1`, as `(slope, intercept)`.
fn square_cut(weight: f64, k: u32) -> (f64, f64) {
    let w2 = weight * weight;
    let k = k as f64;
    (w2 * (2.0 * k + 1.0), -w2 * k * (k + 1.0))
}

/// Express each squared term through an epigraph variable `q[s]`.
///
/// Violations are integral at any optimum, and the chords between
/// consecutive integer points of `(w v)^2` meet the parabola there, so the
/// minimum of `q[s]` is exactly the square. Neither bundled backend accepts a
/// quadratic objective.
fn squared_workload_penalty(
    mut model: ShiftModel,
    request: &ModelRequest,
) -> (ShiftModel, Expression) {
    let day_count = request.days.len();
    let mut objective = Expression::with_capacity(request.staff.len());

    for (s, staff) in request.staff.iter().enumerate() {
        if staff.penalty == 0 {
            continue;
        }
        let weight = staff.penalty as f64;
        let under = model.layout().under[s];
        let over = model.layout().over[s];
        let q = model.add_nonnegative();
        objective.add_mul(1.0, q);

        model = (0..max_violation(staff, day_count)).fold(model, |m, k| {
            m.with(square_cut_constraint(q, under, over, weight, k))
        });
    }

    (model, objective)
}

fn square_cut_constraint(
    q: Variable,
    under: Variable,
    over: Variable,
    weight: f64,
    k: u32,
) -> Constraint {
    let (slope, intercept) = square_cut(weight, k);
    let mut rhs = Expression::from(intercept);
    rhs.add_mul(slope, under);
    rhs.add_mul(slope, over);
    rhs.leq(q)
}
