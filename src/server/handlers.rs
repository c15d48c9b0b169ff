use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{error_failure, failure, success, AppState};
use crate::error::{Error, Result};
use crate::export::{ColumnSelection, ExportConfig};
use crate::extract::Lead;
use crate::mapping::{
    parse_max_leads, ExportOptions, ExtractionRequest, FieldSelector, InputSource, SelectorMap, DEFAULT_MAX_LEADS,
};
use crate::scrub::{scrub as scrub_leads, ScrubConfig};
use crate::source::{HtmlSource, LiveTab};
use crate::view::{PreviewTable, PREVIEW_LIMIT};

#[derive(Debug, Default, Deserialize)]
pub struct ExtractionSettings {
    #[serde(default)]
    pub container_selector: String,
    /// Whatever the client typed: a number, a numeric string, or nothing.
    #[serde(default)]
    pub max_leads: Option<Value>,
}

impl ExtractionSettings {
    /// The bound read with `parse_max_leads`, so no value is ever rejected.
    pub fn max_leads(&self) -> usize {
        match &self.max_leads {
            Some(Value::Number(n)) => parse_max_leads(&n.to_string()),
            Some(Value::String(s)) => parse_max_leads(s),
            _ => DEFAULT_MAX_LEADS,
        }
    }
}

/// Export flags as sent by the client; unset flags take the defaults of the
/// flow the request came through.
#[derive(Debug, Default, Deserialize)]
pub struct ExportConfigBody {
    pub use_display_names: Option<bool>,
    pub include_metadata: Option<bool>,
    #[serde(default)]
    pub columns: ColumnSelection,
    pub filename: Option<String>,
}

impl ExportConfigBody {
    pub fn resolve(self, source: InputSource) -> ExportConfig {
        let defaults = ExportOptions::for_source(source);
        ExportConfig {
            options: ExportOptions {
                use_display_names: self.use_display_names.unwrap_or(defaults.use_display_names),
                include_metadata: self.include_metadata.unwrap_or(defaults.include_metadata),
            },
            columns: self.columns,
            filename: self.filename,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractionBody {
    /// Ignored for live-tab requests.
    #[serde(default)]
    pub html_content: String,
    #[serde(default)]
    pub field_mappings: SelectorMap<FieldSelector>,
    #[serde(default)]
    pub extraction_config: ExtractionSettings,
    #[serde(default)]
    pub export_config: ExportConfigBody,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeBody {
    #[serde(default)]
    pub html_content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConnectBody {
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectTabBody {
    pub tab_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScrubBody {
    #[serde(default)]
    pub leads: Vec<Lead>,
    #[serde(default)]
    pub scrub_config: ScrubConfig,
}

/// A request-level problem reported to the client as is, or an internal
/// error reported with a context prefix.
enum FlowError {
    Rejected(String),
    Failed(Error),
}

impl From<Error> for FlowError {
    fn from(err: Error) -> Self {
        FlowError::Failed(err)
    }
}

impl FlowError {
    fn respond(self, context: &str) -> Response {
        match self {
            FlowError::Rejected(message) => failure(message),
            FlowError::Failed(Error::NotConnected(_)) => failure("Not connected to Chrome. Please connect first."),
            FlowError::Failed(err) => error_failure(&format!("{}: {}", context, err), &err),
        }
    }
}

/// HTML for a request: the pasted document, or the selected tab's page.
async fn page_html(state: &AppState, source: InputSource, pasted: String) -> std::result::Result<String, FlowError> {
    match source {
        InputSource::PastedHtml => {
            if pasted.trim().is_empty() {
                return Err(FlowError::Rejected("Please provide HTML content to extract from".to_string()));
            }
            Ok(pasted)
        }
        InputSource::LiveTab => {
            let tab = LiveTab {
                connector: state.chrome.clone(),
            };
            debug!("Reading HTML from {}", tab.describe());
            let html = tab.fetch_html().await?;
            if html.trim().is_empty() {
                return Err(FlowError::Rejected("Failed to retrieve page content".to_string()));
            }
            Ok(html)
        }
    }
}

/// The shared extraction flow behind both the pasted-HTML and the live-tab
/// endpoints.
async fn run_extraction(
    state: &AppState,
    source: InputSource,
    body: ExtractionBody,
) -> std::result::Result<(Vec<Lead>, ExportConfig), FlowError> {
    if source == InputSource::LiveTab && !state.chrome.lock().await.is_connected() {
        return Err(FlowError::Failed(Error::NotConnected("no tab selected".to_string())));
    }

    let ExtractionBody {
        html_content,
        field_mappings,
        extraction_config,
        export_config,
    } = body;

    let html = page_html(state, source, html_content).await?;
    let export_config = export_config.resolve(source);
    let request = ExtractionRequest::new(
        field_mappings,
        &extraction_config.container_selector,
        Some(extraction_config.max_leads()),
        export_config.options,
    );
    if request.field_mappings.is_empty() {
        return Err(FlowError::Rejected("Please configure at least one field mapping".to_string()));
    }

    let extractor = state.extractor.clone();
    let leads = tokio::task::spawn_blocking(move || extractor.extract_leads(&html, &request))
        .await
        .map_err(Error::from)??;
    Ok((leads, export_config))
}

async fn preview(state: AppState, source: InputSource, body: ExtractionBody) -> Response {
    match run_extraction(&state, source, body).await {
        Ok((leads, _)) => {
            let total = leads.len();
            let shown = &leads[..total.min(PREVIEW_LIMIT)];
            success(json!({
                "message": format!("Extracted {} leads", total),
                "data": shown,
                "total_count": total,
                "table": PreviewTable::new(shown, total),
            }))
        }
        Err(e) => e.respond("Data extraction error"),
    }
}

async fn export(state: AppState, source: InputSource, body: ExtractionBody) -> Response {
    let (leads, export_config) = match run_extraction(&state, source, body).await {
        Ok(extracted) => extracted,
        Err(e) => return e.respond("CSV export error"),
    };

    if leads.is_empty() {
        return failure(match source {
            InputSource::PastedHtml => "No data extracted from the provided HTML",
            InputSource::LiveTab => "No data extracted from the page",
        });
    }

    let count = leads.len();
    let exporter = state.exporter.clone();
    let written: Result<Vec<u8>> = async {
        let exported = tokio::task::spawn_blocking(move || exporter.export(&leads, &export_config)).await??;
        let bytes = tokio::fs::read(&exported.path).await?;
        Ok::<_, Error>(bytes)
    }
    .await;

    match written {
        Ok(bytes) => {
            info!("Sending CSV with {} records", count);
            (
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"crm_leads_{}_records.csv\"", count),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => failure(format!("CSV export error: {}", e)),
    }
}

async fn analyze(state: AppState, html: String) -> Response {
    let analyzer = state.analyzer.clone();
    match tokio::task::spawn_blocking(move || analyzer.analyze(&html)).await {
        Ok(suggestions) => success(json!({ "suggestions": suggestions })),
        Err(e) => failure(format!("Page analysis error: {}", Error::from(e))),
    }
}

pub async fn field_mappings(State(state): State<AppState>) -> Response {
    success(json!({ "mappings": state.presets.as_ref() }))
}

pub async fn export_history(State(state): State<AppState>) -> Response {
    match state.exporter.export_history() {
        Ok(exports) => success(json!({ "exports": exports })),
        Err(e) => failure(format!("Failed to list exports: {}", e)),
    }
}

pub async fn extract_from_html(State(state): State<AppState>, Json(body): Json<ExtractionBody>) -> Response {
    preview(state, InputSource::PastedHtml, body).await
}

pub async fn export_from_html(State(state): State<AppState>, Json(body): Json<ExtractionBody>) -> Response {
    export(state, InputSource::PastedHtml, body).await
}

pub async fn analyze_html(State(state): State<AppState>, Json(body): Json<AnalyzeBody>) -> Response {
    if body.html_content.trim().is_empty() {
        return failure("Please provide HTML content to analyze");
    }
    analyze(state, body.html_content).await
}

pub async fn connect(State(state): State<AppState>, Json(body): Json<ConnectBody>) -> Response {
    let port = body.port.unwrap_or(state.config.chrome.debug_port);
    let mut chrome = state.chrome.lock().await;

    let result = async {
        chrome.connect(port).await?;
        chrome.tabs().await
    }
    .await;

    match result {
        Ok(tabs) => success(json!({
            "message": format!("Connected to Chrome on port {}", port),
            "tabs": tabs,
        })),
        Err(e) => failure(format!("Connection error: {}", e)),
    }
}

pub async fn select_tab(State(state): State<AppState>, Json(body): Json<SelectTabBody>) -> Response {
    let Some(tab_id) = body.tab_id.filter(|id| !id.is_empty()) else {
        return failure("Tab ID is required");
    };

    let mut chrome = state.chrome.lock().await;
    match chrome.select_tab(&tab_id).await {
        Ok(page_info) => success(json!({
            "message": "Tab selected successfully",
            "page_info": page_info,
        })),
        Err(e) => failure(format!("Tab selection error: {}", e)),
    }
}

pub async fn extract_data(State(state): State<AppState>, Json(body): Json<ExtractionBody>) -> Response {
    preview(state, InputSource::LiveTab, body).await
}

pub async fn export_csv(State(state): State<AppState>, Json(body): Json<ExtractionBody>) -> Response {
    export(state, InputSource::LiveTab, body).await
}

pub async fn analyze_page(State(state): State<AppState>) -> Response {
    if !state.chrome.lock().await.is_connected() {
        return failure("Not connected to Chrome. Please connect first.");
    }

    match page_html(&state, InputSource::LiveTab, String::new()).await {
        Ok(html) => analyze(state, html).await,
        Err(e) => e.respond("Page analysis error"),
    }
}

pub async fn scrub(Json(body): Json<ScrubBody>) -> Response {
    let report = scrub_leads(body.leads, &body.scrub_config);
    success(json!({
        "message": report.stats.summary(),
        "clean_leads": report.clean_leads,
        "stats": report.stats,
    }))
}
