// src/mapping.rs
//! Persisted mapping tables: purpose → billability and employee → code.
//!
//! Both live as flat CSV files that are loaded at startup and rewritten
//! wholesale on every save. Keys are unique after normalization (trim,
//! drop empties, dedup); duplicate keys keep the first occurrence on load
//! while explicit upserts overwrite.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::timesheet::Billability;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("mapping file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("mapping file format error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurposeMapping {
    #[serde(rename = "Zweck", default)]
    pub purpose: String,
    #[serde(rename = "Verrechenbarkeit", default)]
    pub billability: Billability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeCode {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Kürzel", default)]
    pub code: String,
}

/// Trim keys and values, drop rows with an empty key, keep the first
/// occurrence of each key.
pub fn normalize_purpose_rows(rows: Vec<PurposeMapping>) -> Vec<PurposeMapping> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let purpose = row.purpose.trim().to_string();
        if purpose.is_empty() || !seen.insert(purpose.clone()) {
            continue;
        }
        out.push(PurposeMapping {
            purpose,
            billability: row.billability,
        });
    }
    out
}

pub fn normalize_code_rows(rows: Vec<EmployeeCode>) -> Vec<EmployeeCode> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let name = row.name.trim().to_string();
        if name.is_empty() || !seen.insert(name.clone()) {
            continue;
        }
        out.push(EmployeeCode {
            name,
            code: row.code.trim().to_string(),
        });
    }
    out
}

pub fn purpose_map(rows: &[PurposeMapping]) -> HashMap<String, Billability> {
    rows.iter()
        .map(|r| (r.purpose.clone(), r.billability))
        .collect()
}

pub fn code_map(rows: &[EmployeeCode]) -> HashMap<String, String> {
    rows.iter()
        .filter(|r| !r.code.is_empty())
        .map(|r| (r.name.clone(), r.code.clone()))
        .collect()
}

/// Overwrite-on-duplicate-key write into the purpose table.
pub fn upsert_purpose(rows: &mut Vec<PurposeMapping>, purpose: &str, billability: Billability) {
    let purpose = purpose.trim();
    if purpose.is_empty() {
        return;
    }
    match rows.iter_mut().find(|r| r.purpose == purpose) {
        Some(existing) => existing.billability = billability,
        None => rows.push(PurposeMapping {
            purpose: purpose.to_string(),
            billability,
        }),
    }
}

/// Adds every purpose from `candidates` that the table does not know yet,
/// tagged Unbekannt. Returns how many were added.
pub fn merge_new_purposes<'a, I>(rows: &mut Vec<PurposeMapping>, candidates: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    let known: HashSet<String> = rows.iter().map(|r| r.purpose.clone()).collect();
    let mut fresh: Vec<String> = candidates
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && !known.contains(c))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    fresh.sort();

    let added = fresh.len();
    for purpose in fresh {
        rows.push(PurposeMapping {
            purpose,
            billability: Billability::Unknown,
        });
    }
    added
}

/// Adds every employee name not yet present, with an empty code to be
/// filled in by hand. Returns how many were added.
pub fn merge_new_employees<'a, I>(rows: &mut Vec<EmployeeCode>, candidates: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    let known: HashSet<String> = rows.iter().map(|r| r.name.clone()).collect();
    let mut fresh: Vec<String> = candidates
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && !known.contains(c))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    fresh.sort();

    let added = fresh.len();
    for name in fresh {
        rows.push(EmployeeCode {
            name,
            code: String::new(),
        });
    }
    added
}

fn load_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, MappingError> {
    if !path.exists() {
        debug!("Mapping file {:?} does not exist yet; starting empty", path);
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}

fn save_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), MappingError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// CSV-backed purpose → billability store.
#[derive(Debug, Clone)]
pub struct PurposeMappingStore {
    path: PathBuf,
}

impl PurposeMappingStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<Vec<PurposeMapping>, MappingError> {
        let rows = normalize_purpose_rows(load_rows(&self.path)?);
        info!("Loaded {} purpose mappings from {:?}", rows.len(), self.path);
        Ok(rows)
    }

    /// Normalizes, rewrites the file wholesale and returns the rows as
    /// persisted, so saving then reloading is a no-op.
    pub fn save(&self, rows: Vec<PurposeMapping>) -> Result<Vec<PurposeMapping>, MappingError> {
        let rows = normalize_purpose_rows(rows);
        save_rows(&self.path, &rows)?;
        info!("Saved {} purpose mappings to {:?}", rows.len(), self.path);
        Ok(rows)
    }
}

/// CSV-backed employee → code store.
#[derive(Debug, Clone)]
pub struct EmployeeCodeStore {
    path: PathBuf,
}

impl EmployeeCodeStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<Vec<EmployeeCode>, MappingError> {
        let rows = normalize_code_rows(load_rows(&self.path)?);
        info!("Loaded {} employee codes from {:?}", rows.len(), self.path);
        Ok(rows)
    }

    pub fn save(&self, rows: Vec<EmployeeCode>) -> Result<Vec<EmployeeCode>, MappingError> {
        let rows = normalize_code_rows(rows);
        save_rows(&self.path, &rows)?;
        info!("Saved {} employee codes to {:?}", rows.len(), self.path);
        Ok(rows)
    }
}
