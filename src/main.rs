// src/main.rs
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cell;
mod classify;
mod export;
mod grid_extract;
mod grid_extract_tests;
mod mapping;
mod numparse;
mod purpose;
mod report;
mod report_tests;
mod state;
mod timesheet;

use classify::{ClassifierClient, ClassifyError, DEFAULT_API_BASE_URL, DEFAULT_MODEL};
use export::{list_exports, write_report_workbook, ExportError};
use grid_extract::{
    extract_billing_codes, extract_columns_manual, BillingExtract, ExtractConfig, ExtractError,
};
use mapping::{
    merge_new_employees, merge_new_purposes, purpose_map, upsert_purpose, EmployeeCode,
    MappingError, PurposeMapping,
};
use report::{reconcile, summarize_by_employee, EmployeeSummary, ReconciliationRow};
use state::AppState;
use timesheet::{apply_purpose_mapping, parse_timesheet, Billability, TimeEntry, TimesheetError};

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// --- Configuration ---

fn default_port() -> u16 {
    3000
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_hours_per_day() -> f64 {
    8.0
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

/// Environment-driven configuration (PORT, DATA_DIR, HOURS_PER_DAY,
/// OPENAI_API_KEY, OPENAI_MODEL, OPENAI_BASE_URL).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Conversion factor from externally-billable hours to billing days.
    #[serde(default = "default_hours_per_day")]
    pub hours_per_day: f64,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_model")]
    pub openai_model: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| AppError::Config(e.to_string()))
    }
}

// --- Error Handling ---

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Timesheet(#[from] TimesheetError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("no timesheet loaded; load a timesheet export first")]
    NoDataset,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        error!("Request failed: {}", self);

        // Every failure is scoped to the triggering request; the status code
        // tells the caller whether it is their input or our problem.
        let status = match &self {
            AppError::Timesheet(_) => StatusCode::BAD_REQUEST,
            AppError::Extract(ExtractError::NoHeaderFound { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Extract(ExtractError::HeaderOutOfRange { .. }) => StatusCode::BAD_REQUEST,
            AppError::NoDataset => StatusCode::CONFLICT,
            AppError::Classify(ClassifyError::MissingApiKey) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Classify(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

// --- Request/Response Types ---

#[derive(Debug, Deserialize)]
struct LoadFileRequest {
    path: String,
}

#[derive(Debug, Serialize)]
struct LoadTimesheetResponse {
    rows: usize,
    employees: usize,
    unmapped_purposes: usize,
    archived_as: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManualExtractRequest {
    path: String,
    header_row: usize,
    columns: Vec<usize>,
}

#[derive(Debug, Serialize)]
struct SyncResponse {
    added: usize,
    total: usize,
}

#[derive(Debug, Serialize)]
struct ClassifyResponse {
    classified: usize,
    internal: usize,
    external: usize,
    unknown: usize,
}

#[derive(Debug, Serialize)]
struct ExportResponse {
    path: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    version: &'static str,
    dataset_rows: Option<usize>,
    purpose_mappings: usize,
    employee_codes: usize,
    exports: usize,
}

// --- Handlers ---

async fn handle_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    let session = state.session.lock().await;
    let exports = list_exports(&state.exports_dir)?.len();
    Ok(Json(StatusResponse {
        version: APP_VERSION,
        dataset_rows: session.entries.as_ref().map(|e| e.len()),
        purpose_mappings: session.purpose_rows.len(),
        employee_codes: session.code_rows.len(),
        exports,
    }))
}

async fn handle_load_timesheet(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadFileRequest>,
) -> Result<Json<LoadTimesheetResponse>, AppError> {
    let path = PathBuf::from(&req.path);
    let archived = state.record_upload(&path);

    let mut session = state.session.lock().await;
    let (_digest, grid) = session.load_grid_cached(&path)?;
    let mut entries = parse_timesheet(&grid)?;

    let mapping = purpose_map(&session.purpose_rows);
    apply_purpose_mapping(&mut entries, &mapping);

    let employees: HashSet<&str> = entries.iter().map(|e| e.employee.as_str()).collect();
    let unmapped: HashSet<&str> = entries
        .iter()
        .filter(|e| e.billability.is_none())
        .filter_map(|e| e.purpose.as_deref())
        .collect();

    info!(
        "Loaded timesheet {:?}: {} rows, {} employees, {} unmapped purposes",
        path,
        entries.len(),
        employees.len(),
        unmapped.len()
    );

    let response = LoadTimesheetResponse {
        rows: entries.len(),
        employees: employees.len(),
        unmapped_purposes: unmapped.len(),
        archived_as: archived.map(|p| p.to_string_lossy().into_owned()),
    };
    session.entries = Some(entries);
    Ok(Json(response))
}

async fn handle_get_entries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TimeEntry>>, AppError> {
    let session = state.session.lock().await;
    let entries = session.entries.clone().ok_or(AppError::NoDataset)?;
    Ok(Json(entries))
}

async fn handle_get_purposes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PurposeMapping>>, AppError> {
    let session = state.session.lock().await;
    Ok(Json(session.purpose_rows.clone()))
}

async fn handle_put_purposes(
    State(state): State<Arc<AppState>>,
    Json(rows): Json<Vec<PurposeMapping>>,
) -> Result<Json<Vec<PurposeMapping>>, AppError> {
    let mut session = state.session.lock().await;
    session.purpose_rows = state.purpose_store.save(rows)?;
    session.refresh_billability();
    Ok(Json(session.purpose_rows.clone()))
}

async fn handle_sync_purposes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SyncResponse>, AppError> {
    let mut session = state.session.lock().await;
    let candidates: Vec<String> = session
        .entries
        .as_ref()
        .ok_or(AppError::NoDataset)?
        .iter()
        .filter_map(|e| e.purpose.clone())
        .collect();

    // Merge into a copy and persist first; a failed rewrite must leave the
    // session table untouched.
    let mut rows = session.purpose_rows.clone();
    let added = merge_new_purposes(&mut rows, candidates.iter().map(String::as_str));
    session.purpose_rows = state.purpose_store.save(rows)?;
    session.refresh_billability();

    info!("Added {} new purposes from the current dataset", added);
    Ok(Json(SyncResponse {
        added,
        total: session.purpose_rows.len(),
    }))
}

async fn handle_get_codes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EmployeeCode>>, AppError> {
    let session = state.session.lock().await;
    Ok(Json(session.code_rows.clone()))
}

async fn handle_put_codes(
    State(state): State<Arc<AppState>>,
    Json(rows): Json<Vec<EmployeeCode>>,
) -> Result<Json<Vec<EmployeeCode>>, AppError> {
    let mut session = state.session.lock().await;
    session.code_rows = state.code_store.save(rows)?;
    Ok(Json(session.code_rows.clone()))
}

async fn handle_sync_codes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SyncResponse>, AppError> {
    let mut session = state.session.lock().await;
    let candidates: Vec<String> = session
        .entries
        .as_ref()
        .ok_or(AppError::NoDataset)?
        .iter()
        .map(|e| e.employee.clone())
        .collect();

    let mut rows = session.code_rows.clone();
    let added = merge_new_employees(&mut rows, candidates.iter().map(String::as_str));
    session.code_rows = state.code_store.save(rows)?;

    info!("Added {} new employees from the current dataset", added);
    Ok(Json(SyncResponse {
        added,
        total: session.code_rows.len(),
    }))
}

/// Classifies every Unbekannt purpose in the mapping table. Only ever runs
/// on this explicit request, never as a side effect of an import.
async fn handle_classify(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let client = ClassifierClient::from_config(&state.config)?;

    let mut session = state.session.lock().await;
    let candidates: Vec<String> = session
        .purpose_rows
        .iter()
        .filter(|r| r.billability == Billability::Unknown)
        .map(|r| r.purpose.clone())
        .collect();

    if candidates.is_empty() {
        info!("Nothing to classify; no Unbekannt purposes in the mapping");
        return Ok(Json(ClassifyResponse {
            classified: 0,
            internal: 0,
            external: 0,
            unknown: 0,
        }));
    }

    let results = client.classify_batch(&candidates).await;

    let mut response = ClassifyResponse {
        classified: results.len(),
        internal: 0,
        external: 0,
        unknown: 0,
    };
    let mut rows = session.purpose_rows.clone();
    for (purpose, tag) in &results {
        match tag {
            Billability::Internal => response.internal += 1,
            Billability::External => response.external += 1,
            Billability::Unknown => response.unknown += 1,
        }
        upsert_purpose(&mut rows, purpose, *tag);
    }
    session.purpose_rows = state.purpose_store.save(rows)?;
    session.refresh_billability();

    Ok(Json(response))
}

async fn handle_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EmployeeSummary>>, AppError> {
    let session = state.session.lock().await;
    let entries = session.entries.as_ref().ok_or(AppError::NoDataset)?;
    Ok(Json(summarize_by_employee(entries)))
}

async fn handle_extract_billing(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadFileRequest>,
) -> Result<Json<BillingExtract>, AppError> {
    let path = PathBuf::from(&req.path);
    state.record_upload(&path);

    let mut session = state.session.lock().await;
    let (_digest, grid) = session.load_grid_cached(&path)?;
    let extract = extract_billing_codes(&grid, &ExtractConfig::default())?;
    Ok(Json(extract))
}

async fn handle_extract_manual(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ManualExtractRequest>,
) -> Result<Json<BillingExtract>, AppError> {
    let path = PathBuf::from(&req.path);
    state.record_upload(&path);

    let mut session = state.session.lock().await;
    let (_digest, grid) = session.load_grid_cached(&path)?;
    let extract =
        extract_columns_manual(&grid, req.header_row, &req.columns, &ExtractConfig::default())?;
    Ok(Json(extract))
}

async fn handle_reconcile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoadFileRequest>,
) -> Result<Json<Vec<ReconciliationRow>>, AppError> {
    let path = PathBuf::from(&req.path);
    state.record_upload(&path);

    let mut session = state.session.lock().await;
    let (_digest, grid) = session.load_grid_cached(&path)?;
    let extract = extract_billing_codes(&grid, &ExtractConfig::default())?;

    let entries = session.entries.as_ref().ok_or(AppError::NoDataset)?;
    let rows = reconcile(
        entries,
        &session.code_lookup(),
        &extract.totals,
        state.config.hours_per_day,
    );
    Ok(Json(rows))
}

async fn handle_export(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ExportResponse>, AppError> {
    let session = state.session.lock().await;
    let entries = session.entries.as_ref().ok_or(AppError::NoDataset)?;
    let summary = summarize_by_employee(entries);
    let path = write_report_workbook(&state.exports_dir, &summary, entries)?;
    Ok(Json(ExportResponse {
        path: path.to_string_lossy().into_owned(),
    }))
}

async fn handle_list_exports(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(list_exports(&state.exports_dir)?))
}

// --- Entry Point ---

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/timesheet", post(handle_load_timesheet))
        .route("/timesheet/entries", get(handle_get_entries))
        .route(
            "/mappings/purposes",
            get(handle_get_purposes).put(handle_put_purposes),
        )
        .route("/mappings/purposes/sync", post(handle_sync_purposes))
        .route(
            "/mappings/codes",
            get(handle_get_codes).put(handle_put_codes),
        )
        .route("/mappings/codes/sync", post(handle_sync_codes))
        .route("/classify", post(handle_classify))
        .route("/summary", get(handle_summary))
        .route("/billing/extract", post(handle_extract_billing))
        .route("/billing/extract/manual", post(handle_extract_manual))
        .route("/billing/reconcile", post(handle_reconcile))
        .route("/export", post(handle_export))
        .route("/exports", get(handle_list_exports))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: data dir {:?}, {} h/day",
        config.data_dir, config.hours_per_day
    );
    if config.openai_api_key.is_none() {
        info!("OPENAI_API_KEY not set; /classify will report the classifier as unavailable");
    }

    let port = config.port;
    let state = Arc::new(AppState::initialize(config)?);
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
