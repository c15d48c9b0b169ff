//! HTTP API used by the browser front end.
//!
//! Every endpoint answers with a `{success, message, ...}` JSON envelope;
//! failures are reported inside the envelope with status 200. Only CSV
//! exports return a file body.

pub mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::CsvExporter;
use crate::extract::{DataExtractor, PageAnalyzer};
use crate::mapping::PresetLibrary;
use crate::source::ChromeConnector;

/// Shared state handed to every handler.
///
/// There is one Chrome session per server; the mutex keeps DevTools
/// request/response pairs from interleaving.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub presets: Arc<PresetLibrary>,
    pub extractor: Arc<DataExtractor>,
    pub analyzer: Arc<PageAnalyzer>,
    pub exporter: Arc<CsvExporter>,
    pub chrome: Arc<Mutex<ChromeConnector>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let presets = config.presets()?;
        let exporter = CsvExporter::new(config.export.export_dir.clone())?;
        let chrome = config.chrome_connector()?;

        Ok(Self {
            presets: Arc::new(presets),
            extractor: Arc::new(DataExtractor::new()?),
            analyzer: Arc::new(PageAnalyzer::new()?),
            exporter: Arc::new(exporter),
            chrome: Arc::new(Mutex::new(chrome)),
            config: Arc::new(config),
        })
    }
}

/// Request bodies may be as large as the biggest page the extractor accepts.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.extraction.max_page_bytes;

    Router::new()
        .route("/api/field_mappings", get(handlers::field_mappings))
        .route("/api/exports", get(handlers::export_history))
        .route("/api/extract_from_html", post(handlers::extract_from_html))
        .route("/api/export_from_html", post(handlers::export_from_html))
        .route("/api/analyze_html", post(handlers::analyze_html))
        .route("/api/connect", post(handlers::connect))
        .route("/api/select_tab", post(handlers::select_tab))
        .route("/api/extract_data", post(handlers::extract_data))
        .route("/api/export_csv", post(handlers::export_csv))
        .route("/api/analyze_page", post(handlers::analyze_page))
        .route("/api/scrub", post(handlers::scrub))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind `host:port` and serve the API until Ctrl-C.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// `{"success": true, ...fields}`.
pub(crate) fn success(fields: Value) -> Response {
    let mut body = json!({ "success": true });
    if let (Some(body), Value::Object(fields)) = (body.as_object_mut(), fields) {
        body.extend(fields);
    }
    Json(body).into_response()
}

/// `{"success": false, "message": ...}`.
pub(crate) fn failure(message: impl Into<String>) -> Response {
    let message = message.into();
    error!("{}", message);
    Json(json!({ "success": false, "message": message })).into_response()
}

/// Failure envelope for an internal error, tagged with its error code.
pub(crate) fn error_failure(message: &str, err: &Error) -> Response {
    let code = err.error_code();
    if err.is_user_error() {
        warn!(code, "{}", message);
    } else {
        error!(code, "{}", message);
    }
    Json(json!({ "success": false, "message": message, "error": code })).into_response()
}
