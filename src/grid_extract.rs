// src/grid_extract.rs
//! Billing-sheet code/value extractor.
//!
//! Invoicing exports arrive with no fixed layout: the table of employee
//! codes sits somewhere below cover rows, stray code-like tokens appear in
//! side notes, and the table ends at a section marker like "Team Gesamt".
//! This module recovers a (code → summed value) table from such a grid, or
//! reports a typed, user-visible failure when no plausible header exists.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::cell::{CellValue, Grid};
use crate::numparse::cell_number;

pub const DEFAULT_HEADER_SCAN_LIMIT: usize = 80;
pub const DEFAULT_MIN_CODE_TOKENS: usize = 5;
pub const DEFAULT_MAX_CODE_LEN: usize = 3;

/// Section-end markers that terminate the data range.
pub const DEFAULT_STOP_PHRASES: [&str; 2] = ["Team Gesamt", "Gesamtergebnis"];

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// How many leading rows to scan for a header.
    pub header_scan_limit: usize,
    /// Minimum count of code-like tokens for a row to qualify as header.
    pub min_code_tokens: usize,
    /// Maximum length of a code token.
    pub max_code_len: usize,
    /// Case-insensitive phrases that mark the end of the data range.
    pub stop_phrases: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            header_scan_limit: DEFAULT_HEADER_SCAN_LIMIT,
            min_code_tokens: DEFAULT_MIN_CODE_TOKENS,
            max_code_len: DEFAULT_MAX_CODE_LEN,
            stop_phrases: DEFAULT_STOP_PHRASES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    #[error(
        "no plausible header row found within the first {scanned} rows \
         (need a row with at least {min_tokens} code columns)"
    )]
    NoHeaderFound { scanned: usize, min_tokens: usize },
    #[error("header row index {header_row} is outside the sheet ({rows} rows)")]
    HeaderOutOfRange { header_row: usize, rows: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeTotal {
    pub code: String,
    pub total: f64,
}

/// Result of a successful extraction, including where the table was found
/// so the caller can show it to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingExtract {
    pub header_row: usize,
    pub data_start: usize,
    /// Exclusive end of the data range.
    pub data_end: usize,
    pub totals: Vec<CodeTotal>,
}

/// A cell qualifies as a code when, after trimming, it is all-uppercase,
/// alphabetic only and at most `max_len` characters long.
pub fn code_token(cell: &CellValue, max_len: usize) -> Option<&str> {
    let text = cell.as_text()?.trim();
    if text.is_empty() || text.chars().count() > max_len {
        return None;
    }
    if text.chars().all(|c| c.is_alphabetic() && c.is_uppercase()) {
        Some(text)
    } else {
        None
    }
}

fn code_columns(row: &[CellValue], max_len: usize) -> Vec<usize> {
    row.iter()
        .enumerate()
        .filter_map(|(i, cell)| code_token(cell, max_len).map(|_| i))
        .collect()
}

/// Selects the single longest run of consecutive column indices; ties break
/// towards the first-found run. Stray matches outside the real table lose.
pub fn longest_run(columns: &[usize]) -> Vec<usize> {
    let mut best: &[usize] = &[];
    let mut start = 0;
    for i in 1..=columns.len() {
        let run_ended = i == columns.len() || columns[i] != columns[i - 1] + 1;
        if run_ended {
            if i - start > best.len() {
                best = &columns[start..i];
            }
            start = i;
        }
    }
    best.to_vec()
}

fn row_has_stop_phrase(row: &[CellValue], phrases: &[String]) -> bool {
    row.iter().any(|cell| {
        cell.as_text().is_some_and(|text| {
            let lower = text.to_lowercase();
            phrases.iter().any(|p| lower.contains(&p.to_lowercase()))
        })
    })
}

fn find_header_row(grid: &Grid, cfg: &ExtractConfig) -> Option<usize> {
    grid.iter()
        .take(cfg.header_scan_limit)
        .position(|row| code_columns(row, cfg.max_code_len).len() >= cfg.min_code_tokens)
}

fn find_data_end(grid: &Grid, header_row: usize, cfg: &ExtractConfig) -> usize {
    for (offset, row) in grid[header_row + 1..].iter().enumerate() {
        if row_has_stop_phrase(row, &cfg.stop_phrases) {
            return header_row + 1 + offset;
        }
    }
    grid.len()
}

/// Sums the given columns over `data_start..data_end`, labeling each total
/// with the header cell of its column. Codes repeated across columns are
/// deduplicated by summation; unparseable cells count as zero.
pub fn sum_code_columns(
    grid: &Grid,
    header_row: usize,
    columns: &[usize],
    data_start: usize,
    data_end: usize,
) -> Vec<CodeTotal> {
    let header = &grid[header_row];
    let mut totals: Vec<CodeTotal> = Vec::new();

    for &col in columns {
        let label = header
            .get(col)
            .map(|c| c.to_label())
            .unwrap_or_default();
        if label.is_empty() {
            continue;
        }

        let sum: f64 = grid[data_start..data_end.min(grid.len())]
            .iter()
            .map(|row| {
                row.get(col)
                    .and_then(cell_number)
                    .unwrap_or(0.0)
            })
            .sum();

        match totals.iter_mut().find(|t| t.code == label) {
            Some(existing) => existing.total += sum,
            None => totals.push(CodeTotal { code: label, total: sum }),
        }
    }
    totals
}

/// Runs the full heuristic: header detection, column-block selection,
/// data-range detection and per-code summation.
pub fn extract_billing_codes(
    grid: &Grid,
    cfg: &ExtractConfig,
) -> Result<BillingExtract, ExtractError> {
    let header_row = find_header_row(grid, cfg).ok_or(ExtractError::NoHeaderFound {
        scanned: cfg.header_scan_limit.min(grid.len()),
        min_tokens: cfg.min_code_tokens,
    })?;

    let all_columns = code_columns(&grid[header_row], cfg.max_code_len);
    let columns = longest_run(&all_columns);
    debug!(
        "Header at row {}, {} code columns, selected block {:?}",
        header_row,
        all_columns.len(),
        columns
    );

    let data_start = header_row + 1;
    let data_end = find_data_end(grid, header_row, cfg);
    let totals = sum_code_columns(grid, header_row, &columns, data_start, data_end);

    info!(
        "Extracted {} code totals from rows {}..{}",
        totals.len(),
        data_start,
        data_end
    );

    Ok(BillingExtract {
        header_row,
        data_start,
        data_end,
        totals,
    })
}

/// Manual fallback for sheets the heuristic cannot crack: the user names the
/// header row and the columns, the data range still ends at a stop phrase.
pub fn extract_columns_manual(
    grid: &Grid,
    header_row: usize,
    columns: &[usize],
    cfg: &ExtractConfig,
) -> Result<BillingExtract, ExtractError> {
    if header_row >= grid.len() {
        return Err(ExtractError::HeaderOutOfRange {
            header_row,
            rows: grid.len(),
        });
    }
    let data_start = header_row + 1;
    let data_end = find_data_end(grid, header_row, cfg);
    let totals = sum_code_columns(grid, header_row, columns, data_start, data_end);
    Ok(BillingExtract {
        header_row,
        data_start,
        data_end,
        totals,
    })
}
