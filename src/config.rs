//! Run configuration.
//!
//! A run picks one treatment of day-off requests and one objective form.
//! The builder, composer and solver adapter read everything else they need
//! from [`PlanConfig`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::error::PlanResult;

pub const DEFAULT_PENALTY: u32 = 50;
pub const DEFAULT_OFF_PENALTY: f64 = 50.0;

/// How a staff member's unavailable date is enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnavailabilityMode {
    /// The assignment on that date is fixed to zero.
    #[default]
    Strict,
    /// Working that date is allowed and costs `off_penalty` per occurrence.
    Penalized,
}

/// Shape of the penalty objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveForm {
    #[default]
    Linear,
    /// Each staff member's weighted violation is squared on its own.
    Quadratic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Microlp,
    Cbc,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(feature = "microlp") {
            BackendKind::Microlp
        } else {
            BackendKind::Cbc
        }
    }
}

/// The two axes the model builder is parameterized over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelVariant {
    pub unavailability: UnavailabilityMode,
    pub objective: ObjectiveForm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanConfig {
    pub unavailability: UnavailabilityMode,
    pub objective: ObjectiveForm,
    pub default_penalty: u32,
    pub off_penalty: f64,
    pub backend: BackendKind,
    pub time_limit_secs: Option<u64>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            unavailability: UnavailabilityMode::default(),
            objective: ObjectiveForm::default(),
            default_penalty: DEFAULT_PENALTY,
            off_penalty: DEFAULT_OFF_PENALTY,
            backend: BackendKind::default(),
            time_limit_secs: None,
        }
    }
}

impl PlanConfig {
    pub fn from_yaml_str(text: &str) -> PlanResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> PlanResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn variant(&self) -> ModelVariant {
        ModelVariant {
            unavailability: self.unavailability,
            objective: self.objective,
        }
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Error)]
#[error("unknown {kind} `{value}`, expected one of: {}", expected.join(", "))]
pub struct ParseOptionError {
    kind: &'static str,
    value: String,
    expected: &'static [&'static str],
}

macro_rules! option_names {
    ($ty:ty, $kind:literal, { $($name:literal => $variant:path),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = ParseOptionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    _ => Err(ParseOptionError {
                        kind: $kind,
                        value: s.to_owned(),
                        expected: &[$($name),+],
                    }),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $($variant => f.write_str($name),)+
                }
            }
        }
    };
}

option_names!(UnavailabilityMode, "unavailability mode", {
    "strict" => UnavailabilityMode::Strict,
    "penalized" => UnavailabilityMode::Penalized,
});

option_names!(ObjectiveForm, "objective form", {
    "linear" => ObjectiveForm::Linear,
    "quadratic" => ObjectiveForm::Quadratic,
});

option_names!(BackendKind, "solver backend", {
    "microlp" => BackendKind::Microlp,
    "cbc" => BackendKind::Cbc,
});
