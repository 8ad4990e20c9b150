// src/timesheet.rs
//! Typed timesheet records and the importer for raw timesheet exports.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cell::Grid;
use crate::numparse::cell_number;
use crate::purpose::extract_purpose;

pub const COL_SUB_PROJECT: &str = "Unterprojekt";
pub const COL_EMPLOYEE: &str = "Mitarbeiter";

/// Header names accepted (case-insensitively) for the hours column.
const HOURS_COLUMNS: [&str; 2] = ["stunden", "dauer"];

/// Billability tag of a purpose. Stored and displayed with the German
/// labels the mapping files have always used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Billability {
    Internal,
    External,
    #[default]
    Unknown,
}

impl Billability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Billability::Internal => "Intern",
            Billability::External => "Extern",
            Billability::Unknown => "Unbekannt",
        }
    }

    /// Lenient parse: anything that does not clearly read as internal or
    /// external is Unknown. Mapping files are hand-edited, so be forgiving.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        if lower.starts_with("intern") {
            Billability::Internal
        } else if lower.starts_with("extern") {
            Billability::External
        } else {
            Billability::Unknown
        }
    }

}

impl fmt::Display for Billability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Billability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Billability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Billability::parse(&raw))
    }
}

/// One timesheet booking. Created on import, billability filled in by the
/// mapping merge; only summaries ever get persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeEntry {
    #[serde(rename = "Mitarbeiter")]
    pub employee: String,
    #[serde(rename = "Unterprojekt")]
    pub sub_project: String,
    #[serde(rename = "Dauer")]
    pub hours: f64,
    #[serde(rename = "Zweck")]
    pub purpose: Option<String>,
    #[serde(rename = "Verrechenbarkeit")]
    pub billability: Option<Billability>,
}

#[derive(Debug, Error)]
pub enum TimesheetError {
    #[error("required column '{0}' is missing from the timesheet export")]
    MissingColumn(&'static str),
    #[error("the timesheet export contains no rows")]
    EmptySheet,
}

fn find_column(header: &[crate::cell::CellValue], name: &str) -> Option<usize> {
    header
        .iter()
        .position(|cell| cell.to_label() == name)
}

fn find_hours_column(header: &[crate::cell::CellValue]) -> Option<usize> {
    header.iter().position(|cell| {
        let lower = cell.to_label().to_lowercase();
        HOURS_COLUMNS.contains(&lower.as_str())
    })
}

/// Parses a timesheet grid into typed entries.
///
/// The first row is the header; "Unterprojekt" and "Mitarbeiter" are
/// required. Hours come from a "Stunden"/"Dauer" column when present
/// (unparseable cells coerce to 0), otherwise every row counts as 1.0.
/// Rows without an employee are skipped.
pub fn parse_timesheet(grid: &Grid) -> Result<Vec<TimeEntry>, TimesheetError> {
    let header = grid.first().ok_or(TimesheetError::EmptySheet)?;

    let sub_project_col =
        find_column(header, COL_SUB_PROJECT).ok_or(TimesheetError::MissingColumn(COL_SUB_PROJECT))?;
    let employee_col =
        find_column(header, COL_EMPLOYEE).ok_or(TimesheetError::MissingColumn(COL_EMPLOYEE))?;
    let hours_col = find_hours_column(header);
    if hours_col.is_none() {
        warn!("No 'Stunden'/'Dauer' column found; defaulting to 1.0 hours per row");
    }

    let mut entries = Vec::new();
    for row in &grid[1..] {
        let employee = row
            .get(employee_col)
            .map(|c| c.to_label())
            .unwrap_or_default();
        if employee.is_empty() {
            continue;
        }

        let sub_project = row
            .get(sub_project_col)
            .map(|c| c.to_label())
            .unwrap_or_default();

        let hours = match hours_col {
            Some(col) => row.get(col).and_then(cell_number).unwrap_or(0.0),
            None => 1.0,
        };

        entries.push(TimeEntry {
            purpose: extract_purpose(&sub_project),
            employee,
            sub_project,
            hours,
            billability: None,
        });
    }

    debug!("Parsed {} timesheet entries", entries.len());
    Ok(entries)
}

/// Left-outer merge of the purpose mapping onto the dataset. Entries whose
/// purpose is unmapped (or absent) end up with no billability instead of
/// erroring.
pub fn apply_purpose_mapping(entries: &mut [TimeEntry], mapping: &HashMap<String, Billability>) {
    for entry in entries.iter_mut() {
        entry.billability = entry
            .purpose
            .as_deref()
            .and_then(|p| mapping.get(p))
            .copied();
    }
}
