//! Turns raw staff and calendar tables into a [`ModelRequest`].

use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::error::{PlanError, PlanResult};
use crate::types::{DayDemand, ModelRequest, Overrides, StaffProfile, Table, Unavailability};

pub const STAFF_TABLE: &str = "staff";
pub const CALENDAR_TABLE: &str = "calendar";

pub const STAFF_ID: &str = "staff_id";
pub const LEADER: &str = "leader";
pub const MIN_DAYS: &str = "min_days";
pub const MAX_DAYS: &str = "max_days";
pub const PENALTY: &str = "penalty";
pub const UNAVAILABLE: &str = "unavailable";

pub const DATE: &str = "date";
pub const REQUIRED_STAFF: &str = "required_staff";
pub const REQUIRED_LEADERS: &str = "required_leaders";

const PENALTY_OVERRIDE: &str = "penalty";
const UNAVAILABLE_OVERRIDE: &str = "unavailable";

/// Validate both tables and resolve per-staff weights and day-off requests.
///
/// Values in `overrides` win over the optional table columns, which win over
/// `default_penalty` and "no restriction".
pub fn normalize(
    staff: &Table,
    calendar: &Table,
    overrides: &Overrides,
    default_penalty: u32,
) -> PlanResult<ModelRequest> {
    let staff = read_staff(staff, default_penalty)?;
    let days = read_calendar(calendar)?;
    let staff = apply_overrides(staff, overrides)?;

    let request = ModelRequest { staff, days };
    log_inert_preferences(&request);
    debug!(
        staff = request.staff.len(),
        days = request.days.len(),
        leaders = request.leader_count(),
        "normalized request"
    );
    Ok(request)
}

fn require_column(table: &Table, table_name: &'static str, column: &str) -> PlanResult<usize> {
    table
        .column_index(column)
        .ok_or_else(|| PlanError::MissingColumn {
            table: table_name,
            column: column.to_owned(),
        })
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

fn invalid(table: &'static str, key: &str, column: &str, value: &str) -> PlanError {
    PlanError::InvalidValue {
        table,
        key: key.to_owned(),
        column: column.to_owned(),
        value: value.to_owned(),
    }
}

fn parse_count(table: &'static str, key: &str, column: &str, value: &str) -> PlanResult<u32> {
    value
        .parse::<u32>()
        .map_err(|_| invalid(table, key, column, value))
}

fn parse_flag(table: &'static str, key: &str, column: &str, value: &str) -> PlanResult<bool> {
    match value {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(invalid(table, key, column, value)),
    }
}

fn read_staff(table: &Table, default_penalty: u32) -> PlanResult<Vec<StaffProfile>> {
    let id_col = require_column(table, STAFF_TABLE, STAFF_ID)?;
    let leader_col = require_column(table, STAFF_TABLE, LEADER)?;
    let min_col = require_column(table, STAFF_TABLE, MIN_DAYS)?;
    let max_col = require_column(table, STAFF_TABLE, MAX_DAYS)?;
    let penalty_col = table.column_index(PENALTY);
    let unavailable_col = table.column_index(UNAVAILABLE);

    let mut seen = HashSet::new();
    table
        .rows
        .iter()
        .map(|row| {
            let id = cell(row, id_col);
            if !seen.insert(id.to_owned()) {
                return Err(PlanError::DuplicateKey {
                    table: STAFF_TABLE,
                    key: id.to_owned(),
                });
            }

            let leader = parse_flag(STAFF_TABLE, id, LEADER, cell(row, leader_col))?;
            let min_days = parse_count(STAFF_TABLE, id, MIN_DAYS, cell(row, min_col))?;
            let max_days = parse_count(STAFF_TABLE, id, MAX_DAYS, cell(row, max_col))?;
            if max_days < min_days {
                warn!(staff = id, min_days, max_days, "maximum days is below minimum days");
            }

            let penalty = match penalty_col.map(|c| cell(row, c)) {
                Some(value) if !value.is_empty() => parse_count(STAFF_TABLE, id, PENALTY, value)?,
                _ => default_penalty,
            };
            let unavailable = unavailable_col
                .map(|c| Unavailability::parse(cell(row, c)))
                .unwrap_or_default();

            Ok(StaffProfile {
                id: id.to_owned(),
                leader,
                min_days,
                max_days,
                penalty,
                unavailable,
            })
        })
        .collect()
}

fn read_calendar(table: &Table) -> PlanResult<Vec<DayDemand>> {
    let date_col = require_column(table, CALENDAR_TABLE, DATE)?;
    let staff_col = require_column(table, CALENDAR_TABLE, REQUIRED_STAFF)?;
    let leader_col = require_column(table, CALENDAR_TABLE, REQUIRED_LEADERS)?;

    let mut seen = HashSet::new();
    table
        .rows
        .iter()
        .map(|row| {
            let date = cell(row, date_col);
            if !seen.insert(date.to_owned()) {
                return Err(PlanError::DuplicateKey {
                    table: CALENDAR_TABLE,
                    key: date.to_owned(),
                });
            }

            Ok(DayDemand {
                date: date.to_owned(),
                required_staff: parse_count(CALENDAR_TABLE, date, REQUIRED_STAFF, cell(row, staff_col))?,
                required_leaders: parse_count(
                    CALENDAR_TABLE,
                    date,
                    REQUIRED_LEADERS,
                    cell(row, leader_col),
                )?,
            })
        })
        .collect()
}

/// Check that an override map covers exactly the known staff ids.
fn check_complete<V>(
    name: &'static str,
    staff: &[StaffProfile],
    values: &BTreeMap<String, V>,
) -> PlanResult<()> {
    let known: HashSet<&str> = staff.iter().map(|s| s.id.as_str()).collect();
    if let Some(key) = values.keys().find(|k| !known.contains(k.as_str())) {
        return Err(PlanError::UnknownOverrideKey {
            name,
            key: key.clone(),
        });
    }

    let missing: Vec<String> = staff
        .iter()
        .filter(|s| !values.contains_key(&s.id))
        .map(|s| s.id.clone())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PlanError::IncompleteOverride { name, missing })
    }
}

fn apply_overrides(
    mut staff: Vec<StaffProfile>,
    overrides: &Overrides,
) -> PlanResult<Vec<StaffProfile>> {
    if let Some(penalties) = &overrides.penalties {
        check_complete(PENALTY_OVERRIDE, &staff, penalties)?;
        for s in staff.iter_mut() {
            s.penalty = penalties[&s.id];
        }
    }

    if let Some(unavailable) = &overrides.unavailable {
        check_complete(UNAVAILABLE_OVERRIDE, &staff, unavailable)?;
        for s in staff.iter_mut() {
            s.unavailable = unavailable[&s.id].clone();
        }
    }

    Ok(staff)
}

fn log_inert_preferences(request: &ModelRequest) {
    for s in &request.staff {
        if let Some(date) = s.unavailable.date() {
            if request.day_index(date).is_none() {
                debug!(staff = %s.id, date, "unavailable date is not in the calendar");
            }
        }
    }
}
