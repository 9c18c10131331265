//! Staff shift planning as a mixed integer program.
//!
//! A run flows through five stateless stages:
//! [`normalize`] → [`build_model`] → [`compose_objective`] →
//! [`SolverBackend::submit`] → [`extract`].
//!
//! Coverage per date (headcount and leaders) is hard. Each staff member's
//! min/max day band is soft, penalized by their weight. A requested day off
//! is either forbidden outright or penalized, depending on
//! [`UnavailabilityMode`].

pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod normalize;
pub mod objective;
pub mod solver;
pub mod summary;
pub mod types;

use std::time::Instant;
use tracing::info;

pub use config::{BackendKind, ModelVariant, ObjectiveForm, PlanConfig, UnavailabilityMode};
pub use error::{PlanError, PlanResult};
pub use extract::{PlanOutcome, Schedule, StaffSlack, extract};
pub use model::{ShiftModel, VariableLayout, build_model};
pub use normalize::normalize;
pub use objective::{ComposedModel, compose_objective};
pub use solver::{SolveStatus, SolverBackend, SolverReply, Submission, configured_backend};
pub use summary::CoverageReport;
pub use types::{DayDemand, ModelRequest, Overrides, StaffProfile, Table, Unavailability};

/// Normalize the tables, then solve with the backend `config` names.
///
/// Input-shape problems are returned as errors. Infeasibility and solver
/// failures are reported through [`PlanOutcome::status`].
pub fn plan(
    staff: &Table,
    calendar: &Table,
    overrides: &Overrides,
    config: &PlanConfig,
) -> PlanResult<PlanOutcome> {
    let request = normalize(staff, calendar, overrides, config.default_penalty)?;
    let backend = configured_backend(config)?;
    Ok(solve_request(&request, config, backend.as_ref()))
}

/// Build, compose, submit once and extract.
pub fn solve_request(
    request: &ModelRequest,
    config: &PlanConfig,
    backend: &dyn SolverBackend,
) -> PlanOutcome {
    let variant = config.variant();
    let model = build_model(request, variant.unavailability);
    let composed = compose_objective(model, request, variant.objective, config.off_penalty);
    let (submission, layout) = composed.into_submission();

    info!(
        backend = backend.name(),
        staff = request.staff.len(),
        days = request.days.len(),
        constraints = submission.constraints.len(),
        "solving shift model"
    );
    let started = Instant::now();
    let reply = backend.submit(submission);
    info!(
        status = %reply.status,
        objective = ?reply.objective,
        elapsed = ?started.elapsed(),
        "solver finished"
    );

    extract(request, &layout, reply)
}
