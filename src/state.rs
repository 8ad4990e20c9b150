// src/state.rs
//! Explicit application state.
//!
//! Everything the old implicit session used to hold lives here: the current
//! dataset slot, the in-memory mapping tables and a content-hash-keyed grid
//! cache. Handlers receive the state explicitly and every mutation happens
//! through it; nothing is framework-managed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cell::{grid_from_delimited, Grid};
use crate::mapping::{
    code_map, purpose_map, EmployeeCode, EmployeeCodeStore, PurposeMapping, PurposeMappingStore,
};
use crate::timesheet::{apply_purpose_mapping, TimeEntry};
use crate::{AppError, Config};

pub const PURPOSE_MAPPING_FILE: &str = "mapping.csv";
pub const EMPLOYEE_CODE_FILE: &str = "kuerzel.csv";
pub const UPLOAD_HISTORY_DIR: &str = "history/uploads";
pub const EXPORT_HISTORY_DIR: &str = "history/exports";

pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Mutable per-process session data, guarded by one lock since every user
/// action is a full synchronous recomputation anyway.
#[derive(Default)]
pub struct SessionState {
    pub entries: Option<Vec<TimeEntry>>,
    pub purpose_rows: Vec<PurposeMapping>,
    pub code_rows: Vec<EmployeeCode>,
    /// Parsed grids keyed by content hash. A new upload means a new hash
    /// means a recompute; identical re-uploads are free.
    grid_cache: HashMap<String, Arc<Grid>>,
}

impl SessionState {
    /// Loads a grid from disk with explicit content-hash memoization.
    pub fn load_grid_cached(&mut self, path: &Path) -> Result<(String, Arc<Grid>), AppError> {
        let bytes = std::fs::read(path)?;
        let digest = hex::encode(Sha256::digest(&bytes));

        if let Some(grid) = self.grid_cache.get(&digest) {
            debug!("Grid cache hit for {:?} ({})", path, &digest[..12]);
            return Ok((digest, grid.clone()));
        }

        let content = String::from_utf8_lossy(&bytes);
        let grid = Arc::new(grid_from_delimited(&content)?);
        debug!(
            "Grid cache miss for {:?} ({}), parsed {} rows",
            path,
            &digest[..12],
            grid.len()
        );
        self.grid_cache.insert(digest.clone(), grid.clone());
        Ok((digest, grid))
    }

    /// Re-applies the current purpose mapping onto the loaded dataset.
    /// Called after every mapping save or classification run.
    pub fn refresh_billability(&mut self) {
        let mapping = purpose_map(&self.purpose_rows);
        if let Some(entries) = self.entries.as_mut() {
            apply_purpose_mapping(entries, &mapping);
        }
    }

    pub fn code_lookup(&self) -> HashMap<String, String> {
        code_map(&self.code_rows)
    }
}

pub struct AppState {
    pub config: Config,
    pub session: Mutex<SessionState>,
    pub purpose_store: PurposeMappingStore,
    pub code_store: EmployeeCodeStore,
    pub uploads_dir: PathBuf,
    pub exports_dir: PathBuf,
}

impl AppState {
    /// Creates directories, opens the mapping stores and loads the
    /// persisted tables into the session.
    pub fn initialize(config: Config) -> Result<Self, AppError> {
        let uploads_dir = config.data_dir.join(UPLOAD_HISTORY_DIR);
        let exports_dir = config.data_dir.join(EXPORT_HISTORY_DIR);
        std::fs::create_dir_all(&uploads_dir)?;
        std::fs::create_dir_all(&exports_dir)?;

        let purpose_store = PurposeMappingStore::new(config.data_dir.join(PURPOSE_MAPPING_FILE));
        let code_store = EmployeeCodeStore::new(config.data_dir.join(EMPLOYEE_CODE_FILE));

        let session = SessionState {
            purpose_rows: purpose_store.load()?,
            code_rows: code_store.load()?,
            ..Default::default()
        };
        info!(
            "State initialized: {} purpose mappings, {} employee codes, data dir {:?}",
            session.purpose_rows.len(),
            session.code_rows.len(),
            config.data_dir
        );

        Ok(Self {
            config,
            session: Mutex::new(session),
            purpose_store,
            code_store,
            uploads_dir,
            exports_dir,
        })
    }

    /// Archives an ingested file into the upload history with a timestamped
    /// name. Failure to archive is not fatal to the ingest itself.
    pub fn record_upload(&self, source: &Path) -> Option<PathBuf> {
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("csv");
        let target = self
            .uploads_dir
            .join(format!("upload_{}.{}", timestamp_now(), extension));
        match std::fs::copy(source, &target) {
            Ok(_) => {
                debug!("Archived upload {:?} as {:?}", source, target);
                Some(target)
            }
            Err(e) => {
                warn!("Could not archive upload {:?}: {}", source, e);
                None
            }
        }
    }
}
