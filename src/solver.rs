//! Solver adapter.
//!
//! The core only needs `submit(model) -> {status, objective, values}`; any
//! MILP backend good_lp can drive fits behind [`SolverBackend`].

use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{BackendKind, PlanConfig};
use crate::error::{PlanError, PlanResult};

/// Terminal classification of one solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    /// Solver error, cancellation or timeout.
    Undefined,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolveStatus::Optimal => "Optimal",
            SolveStatus::Infeasible => "Infeasible",
            SolveStatus::Unbounded => "Unbounded",
            SolveStatus::Undefined => "Undefined",
        };
        f.write_str(name)
    }
}

/// A fully assembled minimization problem.
pub struct Submission {
    pub variables: ProblemVariables,
    pub objective: Expression,
    pub constraints: Vec<Constraint>,
    /// Variables whose values are returned, in this order.
    pub watched: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverReply {
    pub status: SolveStatus,
    /// Set only when `status` is `Optimal`.
    pub objective: Option<f64>,
    /// Values of `Submission::watched`, set only when `status` is `Optimal`.
    pub values: Option<Vec<f64>>,
    pub message: Option<String>,
}

impl SolverReply {
    pub fn optimal(objective: f64, values: Vec<f64>) -> Self {
        Self {
            status: SolveStatus::Optimal,
            objective: Some(objective),
            values: Some(values),
            message: None,
        }
    }

    pub fn terminal(status: SolveStatus, message: Option<String>) -> Self {
        Self {
            status,
            objective: None,
            values: None,
            message,
        }
    }

    pub fn undefined(message: impl Into<String>) -> Self {
        Self::terminal(SolveStatus::Undefined, Some(message.into()))
    }
}

/// Anything that can solve a [`Submission`] exactly once.
pub trait SolverBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn submit(&self, submission: Submission) -> SolverReply;
}

/// Add constraints, solve, and read back the watched variables.
fn run<Model>(
    model: Model,
    constraints: Vec<Constraint>,
    objective: Expression,
    watched: &[Variable],
) -> SolverReply
where
    Model: SolverModel<Error = ResolutionError>,
{
    let model = constraints.into_iter().fold(model, |m, c| m.with(c));

    match model.solve() {
        Ok(solution) => {
            let values: Vec<f64> = watched.iter().map(|&v| solution.value(v)).collect();
            let objective = solution.eval(objective);
            if !objective.is_finite() || values.iter().any(|v| !v.is_finite()) {
                return SolverReply::undefined("solver returned non-finite values");
            }
            SolverReply::optimal(objective, values)
        }
        Err(ResolutionError::Infeasible) => SolverReply::terminal(SolveStatus::Infeasible, None),
        Err(ResolutionError::Unbounded) => SolverReply::terminal(SolveStatus::Unbounded, None),
        Err(other) => SolverReply::undefined(other.to_string()),
    }
}

/// Pure Rust branch-and-bound through `microlp`.
#[cfg(feature = "microlp")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroLp;

#[cfg(feature = "microlp")]
impl SolverBackend for MicroLp {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn submit(&self, submission: Submission) -> SolverReply {
        use good_lp::solvers::microlp::microlp;

        let Submission {
            variables,
            objective,
            constraints,
            watched,
        } = submission;
        let model = variables.minimise(objective.clone()).using(microlp);
        run(model, constraints, objective, &watched)
    }
}

/// COIN-OR CBC.
#[cfg(feature = "cbc")]
#[derive(Debug, Clone, Copy, Default)]
pub struct CoinCbc;

#[cfg(feature = "cbc")]
impl SolverBackend for CoinCbc {
    fn name(&self) -> &'static str {
        "cbc"
    }

    fn submit(&self, submission: Submission) -> SolverReply {
        use good_lp::solvers::coin_cbc::coin_cbc;

        let Submission {
            variables,
            objective,
            constraints,
            watched,
        } = submission;
        #[allow(unused_mut)]
        let mut model = variables.minimise(objective.clone()).using(coin_cbc);
        #[cfg(not(debug_assertions))]
        model.set_parameter("loglevel", "0");
        run(model, constraints, objective, &watched)
    }
}

/// Bounds the wall-clock time of another backend.
///
/// On expiry the reply is `Undefined` with no values; the abandoned solve
/// keeps running on its own thread until it finishes.
pub struct Deadline {
    inner: Arc<dyn SolverBackend>,
    limit: Duration,
}

impl Deadline {
    pub fn new(inner: Arc<dyn SolverBackend>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

impl SolverBackend for Deadline {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn submit(&self, submission: Submission) -> SolverReply {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            // The receiver is gone once the deadline passed.
            let _ = tx.send(inner.submit(submission));
        });

        match rx.recv_timeout(self.limit) {
            Ok(reply) => reply,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(backend = self.name(), limit = ?self.limit, "solver time limit exceeded");
                SolverReply::undefined(format!("time limit of {:?} exceeded", self.limit))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                SolverReply::undefined("solver stopped without a reply")
            }
        }
    }
}

/// Instantiate a compiled-in backend.
pub fn backend_for(kind: BackendKind) -> PlanResult<Arc<dyn SolverBackend>> {
    match kind {
        #[cfg(feature = "microlp")]
        BackendKind::Microlp => Ok(Arc::new(MicroLp)),
        #[cfg(feature = "cbc")]
        BackendKind::Cbc => Ok(Arc::new(CoinCbc)),
        #[allow(unreachable_patterns)]
        other => Err(PlanError::BackendUnavailable(other.to_string())),
    }
}

/// The backend named by `config`, wrapped in a [`Deadline`] when a time
/// limit is set.
pub fn configured_backend(config: &PlanConfig) -> PlanResult<Arc<dyn SolverBackend>> {
    let backend = backend_for(config.backend)?;
    let backend: Arc<dyn SolverBackend> = match config.time_limit() {
        Some(limit) => Arc::new(Deadline::new(backend, limit)),
        None => backend,
    };
    debug!(backend = backend.name(), "selected solver backend");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use good_lp::{constraint, variable, variables};

    fn submission(lower: f64) -> Submission {
        let mut vars = variables!();
        let x = vars.add(variable().binary());
        let y = vars.add(variable().min(0));
        let mut objective = Expression::from(x);
        objective.add_mul(2.0, y);
        Submission {
            variables: vars,
            objective,
            constraints: vec![constraint!(x + y >= lower)],
            watched: vec![x, y],
        }
    }

    struct Stalled(Duration);

    impl SolverBackend for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }

        fn submit(&self, _: Submission) -> SolverReply {
            thread::sleep(self.0);
            SolverReply::optimal(0.0, vec![0.0])
        }
    }

    struct Crashing;

    impl SolverBackend for Crashing {
        fn name(&self) -> &'static str {
            "crashing"
        }

        fn submit(&self, _: Submission) -> SolverReply {
            panic!("backend crashed")
        }
    }

    #[cfg(feature = "microlp")]
    #[test]
    fn microlp_reports_optimal_values() {
        let reply = MicroLp.submit(submission(1.0));
        assert_eq!(reply.status, SolveStatus::Optimal);
        assert!((reply.objective.unwrap() - 1.0).abs() < 1e-6);

        let values = reply.values.unwrap();
        assert!((values[0] - 1.0).abs() < 1e-6);
        assert!(values[1].abs() < 1e-6);
    }

    #[cfg(feature = "microlp")]
    #[test]
    fn microlp_reports_infeasible_without_values() {
        let mut sub = submission(1.0);
        let x = sub.watched[0];
        let y = sub.watched[1];
        sub.constraints.push(constraint!(x + y <= 0.5));
        sub.constraints.push(constraint!(y <= 0.0));

        let reply = MicroLp.submit(sub);
        assert_eq!(reply.status, SolveStatus::Infeasible);
        assert_eq!(reply.objective, None);
        assert_eq!(reply.values, None);
    }

    #[test]
    fn deadline_maps_timeout_to_undefined() {
        let backend = Deadline::new(
            Arc::new(Stalled(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        let reply = backend.submit(submission(1.0));

        assert_eq!(reply.status, SolveStatus::Undefined);
        assert_eq!(reply.values, None);
        assert!(reply.message.unwrap().contains("time limit"));
    }

    #[test]
    fn deadline_passes_through_fast_replies() {
        let backend = Deadline::new(Arc::new(Stalled(Duration::ZERO)), Duration::from_secs(5));
        let reply = backend.submit(submission(1.0));
        assert_eq!(reply.status, SolveStatus::Optimal);
    }

    #[test]
    fn crashed_backend_is_undefined() {
        let backend = Deadline::new(Arc::new(Crashing), Duration::from_secs(5));
        let reply = backend.submit(submission(1.0));
        assert_eq!(reply.status, SolveStatus::Undefined);
    }

    #[test]
    fn configured_backend_honours_time_limit() {
        let config = PlanConfig {
            time_limit_secs: Some(1),
            ..PlanConfig::default()
        };
        let backend = configured_backend(&config).unwrap();
        assert_eq!(backend.name(), config.backend.to_string());
    }
}
