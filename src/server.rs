// WMTB - REST API with Axum
// Parse, store and query free-text transactions per user

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::{self, Transaction, DEFAULT_HISTORY_LIMIT};
use crate::parser::{ParsedTransaction, TransactionParser};
use crate::summary::confirmation_message;

pub const SERVICE_NAME: &str = "WMTB Backend";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    parser: Arc<TransactionParser>,
}

impl AppState {
    pub fn new(conn: Connection, parser: TransactionParser) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            parser: Arc::new(parser),
        }
    }

    /// Run `f` against the connection; storage errors become 500s
    fn with_db<T>(&self, f: impl FnOnce(&Connection) -> anyhow::Result<T>) -> Result<T, ApiError> {
        let conn = self
            .db
            .lock()
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("database lock poisoned")))?;

        f(&*conn).map_err(ApiError::Internal)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("internal server error")]
    Internal(anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(cause) => {
                tracing::error!("request failed: {cause:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddTransactionRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<String>,
}

impl HistoryParams {
    /// Anything that is not a positive integer falls back to the default
    fn limit(&self) -> u32 {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionCreated {
    pub success: bool,
    pub transaction: Transaction,
    pub balance: f64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: f64,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET / - Liveness text
async fn home() -> &'static str {
    "WMTB Backend is running!"
}

/// GET /api/health - Health check
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

/// POST /api/parse - Parse without storing
async fn parse_text(
    State(state): State<AppState>,
    payload: Result<Json<ParseRequest>, JsonRejection>,
) -> Result<Json<ParsedTransaction>, ApiError> {
    let Json(request) = payload?;
    let text = non_blank(request.text)
        .ok_or_else(|| ApiError::BadRequest("No text provided".to_string()))?;

    Ok(Json(state.parser.parse(&text)))
}

/// POST /api/transaction - Parse, store, and report the new balance
async fn add_transaction(
    State(state): State<AppState>,
    payload: Result<Json<AddTransactionRequest>, JsonRejection>,
) -> Result<Json<TransactionCreated>, ApiError> {
    let Json(request) = payload?;
    let (Some(user_id), Some(text)) = (non_blank(request.user_id), non_blank(request.text)) else {
        return Err(ApiError::BadRequest("Missing user_id or text".to_string()));
    };

    let parsed = state.parser.parse(&text);
    let (transaction, balance) = state.with_db(|conn| {
        let transaction = db::add_transaction(conn, &user_id, &parsed)?;
        let balance = db::get_user_balance(conn, &user_id)?;
        Ok((transaction, balance))
    })?;

    Ok(Json(TransactionCreated {
        success: true,
        transaction,
        balance,
        message: confirmation_message(&parsed),
    }))
}

/// GET /api/balance/:user_id - Running balance
async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.with_db(|conn| db::get_user_balance(conn, &user_id))?;
    Ok(Json(BalanceResponse { balance }))
}

/// GET /api/transactions/:user_id?limit=N - Newest first
async fn get_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = params.limit();
    let transactions =
        state.with_db(|conn| db::get_recent_transactions(conn, &user_id, limit))?;

    Ok(Json(HistoryResponse { transactions }))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/parse", post(parse_text))
        .route("/transaction", post(add_transaction))
        .route("/balance/:user_id", get(get_balance))
        .route("/transactions/:user_id", get(get_transactions));

    Router::new()
        .route("/", get(home))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("listening on http://{addr}");
    }

    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
