use axum::{
    Router,
    extract::{Json, State, rejection::JsonRejection},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::core::{
    FinancialMetrics, ForecastLedger, LedgerRow, MetricsDisplay, RowSummary, YearOrdering,
    compute_metrics,
};
use crate::llm::{self, ChatProvider, ProviderError};

const SAVED_MESSAGE: &str = "Revenue forecast data received successfully";

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn ChatProvider>,
    pub year_ordering: YearOrdering,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
        };
        error_response(status, &self.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CellEditPayload {
    #[serde(default)]
    ledger: ForecastLedger,
    row: String,
    year: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatPayload {
    message: String,
    #[serde(default)]
    context: ForecastLedger,
}

#[derive(Debug, Serialize)]
struct LedgerResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    data: ForecastLedger,
    summary: Vec<RowSummary>,
}

impl LedgerResponse {
    fn success(ledger: ForecastLedger, message: Option<&'static str>) -> Self {
        let summary = ledger.summary();
        Self {
            status: "success",
            message,
            data: ledger,
            summary,
        }
    }
}

#[derive(Debug, Serialize)]
struct MetricsResponse {
    status: &'static str,
    metrics: FinancialMetrics,
    display: MetricsDisplay,
}

/// Reply of `POST /api/chat`, discriminated by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChatResponse {
    Success {
        message: String,
        metrics: MetricsDisplay,
    },
    Error {
        message: String,
    },
}

pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/revenue-forecast",
            get(seed_forecast_handler).post(save_forecast_handler),
        )
        .route("/api/revenue-forecast/cell", post(edit_cell_handler))
        .route("/api/metrics", post(metrics_handler))
        .route("/api/chat", post(chat_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub fn router(state: AppState, allowed_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    app_routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_http_server(
    config: ServerConfig,
    provider: Arc<dyn ChatProvider>,
) -> std::io::Result<()> {
    let addr = SocketAddr::new(config.bind, config.port);
    let state = AppState {
        provider,
        year_ordering: config.year_ordering,
    };
    let app = router(state, config.allowed_origin);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, year_ordering = ?config.year_ordering, "revenue forecast API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn seed_forecast_handler() -> Response {
    json_response(
        StatusCode::OK,
        LedgerResponse::success(ForecastLedger::seed(), None),
    )
}

async fn save_forecast_handler(
    payload: Result<Json<ForecastLedger>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(ledger) = payload?;
    tracing::info!(years = ledger.year_labels().len(), "revenue forecast received");
    Ok(json_response(
        StatusCode::OK,
        LedgerResponse::success(ledger, Some(SAVED_MESSAGE)),
    ))
}

async fn edit_cell_handler(
    payload: Result<Json<CellEditPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let row = payload
        .row
        .parse::<LedgerRow>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if payload.year.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "year label must not be empty".to_string(),
        ));
    }

    let raw = payload.value.as_deref().unwrap_or("");
    let ledger = payload.ledger.set_cell(row, &payload.year, raw);
    tracing::debug!(%row, year = %payload.year, "cell updated");

    Ok(json_response(StatusCode::OK, LedgerResponse::success(ledger, None)))
}

async fn metrics_handler(
    State(state): State<AppState>,
    payload: Result<Json<ForecastLedger>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(ledger) = payload?;
    let metrics = compute_metrics(&ledger.total_gross_revenue, state.year_ordering);
    let display = metrics.display();

    Ok(json_response(
        StatusCode::OK,
        MetricsResponse {
            status: "success",
            metrics,
            display,
        },
    ))
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let metrics = compute_metrics(&payload.context.total_gross_revenue, state.year_ordering);

    tracing::info!(question_len = payload.message.len(), "relaying chat question");
    let answer = llm::ask(
        state.provider.as_ref(),
        &payload.message,
        &payload.context,
        Some(&metrics),
    )
    .await
    .inspect_err(|e| tracing::error!(error = %e, "chat provider failed"))?;

    Ok(json_response(
        StatusCode::OK,
        ChatResponse::Success {
            message: answer,
            metrics: metrics.display(),
        },
    ))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ChatResponse::Error {
            message: msg.to_string(),
        },
    )
}
