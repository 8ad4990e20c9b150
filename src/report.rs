// src/report.rs
//! Aggregation and reconciliation over the typed dataset.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::grid_extract::CodeTotal;
use crate::timesheet::{Billability, TimeEntry};

/// Rounds to `decimals` places for display. Plain IEEE arithmetic is fine
/// here; the sheets this feeds never carry more than two decimals.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Per-employee hours by billability with percentage shares.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeSummary {
    #[serde(rename = "Mitarbeiter")]
    pub employee: String,
    #[serde(rename = "Intern")]
    pub internal_hours: f64,
    #[serde(rename = "Extern")]
    pub external_hours: f64,
    #[serde(rename = "Gesamtstunden")]
    pub total_hours: f64,
    #[serde(rename = "% Intern")]
    pub pct_internal: f64,
    #[serde(rename = "% Extern")]
    pub pct_external: f64,
}

/// Groups classified entries by employee and sums hours per billability.
/// Entries that are neither Intern nor Extern do not count. Hours round to
/// two decimals, shares to one; a zero total guards the division to 0%.
pub fn summarize_by_employee(entries: &[TimeEntry]) -> Vec<EmployeeSummary> {
    // (internal, external) per employee, ordered by name.
    let mut buckets: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for entry in entries {
        match entry.billability {
            Some(Billability::Internal) => {
                buckets.entry(&entry.employee).or_default().0 += entry.hours;
            }
            Some(Billability::External) => {
                buckets.entry(&entry.employee).or_default().1 += entry.hours;
            }
            _ => {}
        }
    }

    buckets
        .into_iter()
        .map(|(employee, (internal, external))| {
            let total = internal + external;
            let (pct_internal, pct_external) = if total > 0.0 {
                (internal / total * 100.0, external / total * 100.0)
            } else {
                (0.0, 0.0)
            };
            EmployeeSummary {
                employee: employee.to_string(),
                internal_hours: round_to(internal, 2),
                external_hours: round_to(external, 2),
                total_hours: round_to(total, 2),
                pct_internal: round_to(pct_internal, 1),
                pct_external: round_to(pct_external, 1),
            }
        })
        .collect()
}

/// One row of the actual-vs-billed comparison. Employees without a code
/// surface with a blank code and a zero target instead of being dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationRow {
    #[serde(rename = "Mitarbeiter")]
    pub employee: String,
    #[serde(rename = "Kürzel")]
    pub code: Option<String>,
    #[serde(rename = "Extern [h]")]
    pub external_hours: f64,
    #[serde(rename = "Einsatztage_IST")]
    pub actual_days: f64,
    #[serde(rename = "Einsatztage_SOLL")]
    pub target_days: f64,
    #[serde(rename = "Differenz")]
    pub variance: f64,
}

/// Joins actual externally-billable hours against billing targets.
///
/// External hours are summed per employee, converted to days via
/// `hours_per_day`, bridged to billing codes through the employee-code
/// mapping and left-joined against the extracted billing totals. Missing
/// billing rows count as target 0; variance = actual − target.
pub fn reconcile(
    entries: &[TimeEntry],
    codes: &HashMap<String, String>,
    billing: &[CodeTotal],
    hours_per_day: f64,
) -> Vec<ReconciliationRow> {
    let hours_per_day = if hours_per_day > 0.0 { hours_per_day } else { 1.0 };
    let targets: HashMap<&str, f64> = billing
        .iter()
        .map(|t| (t.code.as_str(), t.total))
        .collect();

    let mut external: BTreeMap<&str, f64> = BTreeMap::new();
    for entry in entries {
        if entry.billability == Some(Billability::External) {
            *external.entry(&entry.employee).or_default() += entry.hours;
        }
    }
    debug!(
        "Reconciling {} employees against {} billing codes",
        external.len(),
        targets.len()
    );

    external
        .into_iter()
        .map(|(employee, hours)| {
            let code = codes.get(employee).cloned();
            let target_days = code
                .as_deref()
                .and_then(|c| targets.get(c))
                .copied()
                .unwrap_or(0.0);
            let actual_days = hours / hours_per_day;
            ReconciliationRow {
                employee: employee.to_string(),
                code,
                external_hours: round_to(hours, 2),
                actual_days: round_to(actual_days, 2),
                target_days: round_to(target_days, 2),
                variance: round_to(actual_days - target_days, 2),
            }
        })
        .collect()
}
