// src/export.rs
//! XLSX report workbook: a summary sheet plus the raw entries, written into
//! the export history with a timestamped filename.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, FormatBorder, Workbook};
use thiserror::Error;
use tracing::info;

use crate::report::EmployeeSummary;
use crate::state::timestamp_now;
use crate::timesheet::TimeEntry;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("export I/O error: {0}")]
    Io(#[from] std::io::Error),
}

const SUMMARY_HEADERS: [&str; 6] = [
    "Mitarbeiter",
    "Intern",
    "Extern",
    "Gesamtstunden",
    "% Intern",
    "% Extern",
];

const RAW_HEADERS: [&str; 5] = [
    "Mitarbeiter",
    "Unterprojekt",
    "Zweck",
    "Verrechenbarkeit",
    "Dauer",
];

/// Writes `bericht_<timestamp>.xlsx` with a "Zusammenfassung" and a
/// "Rohdaten" sheet and returns its path.
pub fn write_report_workbook(
    exports_dir: &Path,
    summary: &[EmployeeSummary],
    entries: &[TimeEntry],
) -> Result<PathBuf, ExportError> {
    let path = exports_dir.join(format!("bericht_{}.xlsx", timestamp_now()));

    let header_format = Format::new().set_bold().set_border(FormatBorder::Thin);

    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Zusammenfassung")?;
    for (col, header) in SUMMARY_HEADERS.iter().enumerate() {
        sheet.write_with_format(0, col as u16, *header, &header_format)?;
    }
    sheet.set_column_width(0, 24)?;
    for (i, row) in summary.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write(r, 0, row.employee.as_str())?;
        sheet.write(r, 1, row.internal_hours)?;
        sheet.write(r, 2, row.external_hours)?;
        sheet.write(r, 3, row.total_hours)?;
        sheet.write(r, 4, row.pct_internal)?;
        sheet.write(r, 5, row.pct_external)?;
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("Rohdaten")?;
    for (col, header) in RAW_HEADERS.iter().enumerate() {
        sheet.write_with_format(0, col as u16, *header, &header_format)?;
    }
    sheet.set_column_width(0, 24)?;
    sheet.set_column_width(1, 32)?;
    for (i, entry) in entries.iter().enumerate() {
        let r = (i + 1) as u32;
        sheet.write(r, 0, entry.employee.as_str())?;
        sheet.write(r, 1, entry.sub_project.as_str())?;
        sheet.write(r, 2, entry.purpose.as_deref().unwrap_or(""))?;
        sheet.write(
            r,
            3,
            entry.billability.map(|b| b.as_str()).unwrap_or(""),
        )?;
        sheet.write(r, 4, entry.hours)?;
    }

    workbook.save(&path)?;
    info!(
        "Wrote report workbook {:?} ({} summary rows, {} raw rows)",
        path,
        summary.len(),
        entries.len()
    );
    Ok(path)
}

/// Lists the export history, newest first.
pub fn list_exports(exports_dir: &Path) -> Result<Vec<String>, ExportError> {
    let mut names: Vec<String> = std::fs::read_dir(exports_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names.reverse();
    Ok(names)
}
