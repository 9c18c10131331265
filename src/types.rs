use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use crate::error::PlanResult;

/// Cell value meaning "this staff member can work any date".
pub const NO_RESTRICTION: &str = "none";

/// A raw delimited table: a header row and string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Read a comma separated table with a header row.
    pub fn read_csv<R: Read>(reader: R) -> PlanResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = reader.headers()?.iter().map(str::to_owned).collect();
        let rows = reader
            .records()
            .map(|record| -> PlanResult<Vec<String>> {
                Ok(record?.iter().map(str::to_owned).collect())
            })
            .collect::<PlanResult<Vec<_>>>()?;

        Ok(Self { columns, rows })
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> PlanResult<Self> {
        let file = std::fs::File::open(path)?;
        Self::read_csv(file)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// A staff member's day-off request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Unavailability {
    #[default]
    Anytime,
    On(String),
}

impl Unavailability {
    pub fn parse(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() || cell.eq_ignore_ascii_case(NO_RESTRICTION) {
            Unavailability::Anytime
        } else {
            Unavailability::On(cell.to_owned())
        }
    }

    pub fn date(&self) -> Option<&str> {
        match self {
            Unavailability::Anytime => None,
            Unavailability::On(date) => Some(date),
        }
    }
}

impl From<String> for Unavailability {
    fn from(value: String) -> Self {
        Unavailability::parse(&value)
    }
}

impl From<Unavailability> for String {
    fn from(value: Unavailability) -> Self {
        match value {
            Unavailability::Anytime => NO_RESTRICTION.to_owned(),
            Unavailability::On(date) => date,
        }
    }
}

impl fmt::Display for Unavailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.date().unwrap_or(NO_RESTRICTION))
    }
}

/// Per-staff values supplied by an outer control surface.
///
/// Each map, when present, must cover every staff id in the staff table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default)]
    pub penalties: Option<BTreeMap<String, u32>>,
    #[serde(default)]
    pub unavailable: Option<BTreeMap<String, Unavailability>>,
}

impl Overrides {
    pub fn with_penalties(mut self, penalties: BTreeMap<String, u32>) -> Self {
        self.penalties = Some(penalties);
        self
    }

    pub fn with_unavailable(mut self, unavailable: BTreeMap<String, Unavailability>) -> Self {
        self.unavailable = Some(unavailable);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffProfile {
    pub id: String,
    pub leader: bool,
    pub min_days: u32,
    pub max_days: u32,
    pub penalty: u32,
    pub unavailable: Unavailability,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayDemand {
    pub date: String,
    pub required_staff: u32,
    pub required_leaders: u32,
}

/// Normalized, immutable input to the model builder.
///
/// Staff and days keep the order of their source tables; that order fixes
/// the row and column order of the resulting schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub staff: Vec<StaffProfile>,
    pub days: Vec<DayDemand>,
}

impl ModelRequest {
    pub fn staff_ids(&self) -> Vec<String> {
        self.staff.iter().map(|s| s.id.clone()).collect()
    }

    pub fn dates(&self) -> Vec<String> {
        self.days.iter().map(|d| d.date.clone()).collect()
    }

    pub fn day_index(&self, date: &str) -> Option<usize> {
        self.days.iter().position(|d| d.date == date)
    }

    pub fn leader_count(&self) -> usize {
        self.staff.iter().filter(|s| s.leader).count()
    }
}

impl fmt::Display for ModelRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "Staff: {}", self.staff_ids().join(", "))?;
        writeln!(f, "Dates: {}", self.dates().join(", "))?;
        writeln!(f, "Pairs: {}", self.staff.len() * self.days.len())?;
        for s in &self.staff {
            writeln!(
                f,
                "  {:<12} leader={} days={}..={} penalty={} unavailable={}",
                s.id, s.leader as u8, s.min_days, s.max_days, s.penalty, s.unavailable
            )?;
        }
        for d in &self.days {
            writeln!(
                f,
                "  {:<12} staff>={} leaders>={}",
                d.date, d.required_staff, d.required_leaders
            )?;
        }
        write!(f, "{}", "=".repeat(50))
    }
}
