use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use meter_client::query::{Selection, SelectionError};
use serde::Deserialize;

use crate::{
    config::WorkbookConfig,
    pipeline::PipelineError,
    render,
    sinks::ConsumptionReport,
};

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    BadSelection(#[from] SelectionError),
    #[error(transparent)]
    Load(#[from] PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadSelection(_) => StatusCode::BAD_REQUEST,
            ApiError::Load(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "report request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Selection parameters as the dashboard sends them.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub year: Option<String>,
    pub month: Option<String>,
    pub compare_a: Option<String>,
    pub compare_b: Option<String>,
}

impl ReportQuery {
    fn selection(&self) -> Result<Selection, SelectionError> {
        Selection::parse(
            self.year.as_deref(),
            self.month.as_deref(),
            self.compare_a.as_deref(),
            self.compare_b.as_deref(),
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    workbook: Arc<WorkbookConfig>,
}

pub fn router(workbook: WorkbookConfig) -> Router {
    let state = AppState {
        workbook: Arc::new(workbook),
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/periods", get(periods))
        .route("/api/report", get(report))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn periods(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let periods = render::period_collection(&state.workbook)?;
    Ok(Json(periods.iter().map(|p| p.label()).collect()))
}

async fn report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ConsumptionReport>, ApiError> {
    metrics::counter!("http_report_requests_total").increment(1);

    let selection = query.selection()?;
    let report = render::build_report(&state.workbook, selection, render::current_year()).await?;
    Ok(Json(report))
}
