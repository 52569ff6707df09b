//! HTTP API for health checks, quotes and swap status

use crate::chain::{ClientFactory, ProviderCache};
use crate::config::ApiConfig;
use crate::error::{SwapError, SwapResult};
use crate::models::{
    AssetRegistry, FeeTier, FilterStatus, Network, Quote, QuoteRequest, Swap, SwapStatus, TxType,
    TIMELINE_STEPS, TOTAL_STEPS,
};
use crate::swap::SwapStateMachine;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub network: Network,
    pub machine: Arc<SwapStateMachine>,
    pub registry: Arc<AssetRegistry>,
    pub clients: Arc<dyn ClientFactory>,
    pub providers: Arc<ProviderCache>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/quote", get(get_quote))
        .route("/swaps", get(list_swaps).post(create_swap))
        .route("/swaps/:id", get(get_swap))
        .route("/swaps/:id/fees", get(get_swap_fees))
        .route("/wallets/:wallet_id/addresses", get(get_addresses))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> SwapResult<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SwapError::Internal(format!("API bind failed: {}", e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| SwapError::Internal(format!("API server failed: {}", e)))?;

    Ok(())
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn error_response(e: SwapError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &e {
        SwapError::SwapNotFound { .. } => (StatusCode::NOT_FOUND, "SWAP_NOT_FOUND"),
        SwapError::UnsupportedRoute { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "UNSUPPORTED_ROUTE"),
        SwapError::Config(_) | SwapError::Wallet(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
        SwapError::InvalidStateTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message: e.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }),
    )
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - every provider created so far answers
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let chain_health = state.providers.health_check().await;
    let ready = chain_health.iter().all(|(_, healthy)| *healthy);
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(ReadinessResponse {
            ready,
            details: chain_health
                .into_iter()
                .map(|(id, h)| ChainHealth {
                    chain_id: id,
                    healthy: h,
                })
                .collect(),
        }),
    )
}

async fn get_quote(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
) -> ApiResult<Quote> {
    quote_for(&state, &params.from, &params.to, &params.amount)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn quote_for(state: &AppState, from: &str, to: &str, amount: &BigDecimal) -> SwapResult<Quote> {
    let request = QuoteRequest {
        network: state.network,
        from: from.to_string(),
        to: to.to_string(),
        amount: amount.clone(),
    };
    state
        .machine
        .provider()
        .get_quote(&request)
        .await?
        .ok_or_else(|| SwapError::UnsupportedRoute {
            from: from.to_string(),
            to: to.to_string(),
        })
}

async fn create_swap(
    State(state): State<AppState>,
    Json(body): Json<CreateSwapRequest>,
) -> Result<(StatusCode, Json<SwapView>), (StatusCode, Json<ErrorResponse>)> {
    let quote = quote_for(&state, &body.from, &body.to, &body.amount)
        .await
        .map_err(error_response)?;
    let swap = state
        .machine
        .create_swap(state.network, &body.wallet_id, &body.from_account_id, &quote)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(SwapView::new(swap, &state.registry))))
}

async fn list_swaps(State(state): State<AppState>) -> ApiResult<Vec<SwapView>> {
    let swaps = state.machine.store().list().await.map_err(error_response)?;
    Ok(Json(
        swaps
            .into_iter()
            .map(|swap| SwapView::new(swap, &state.registry))
            .collect(),
    ))
}

async fn get_swap(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<SwapView> {
    let swap = state.machine.store().get(id).await.map_err(error_response)?;
    Ok(Json(SwapView::new(swap, &state.registry)))
}

async fn get_swap_fees(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<BTreeMap<FeeTier, BigDecimal>> {
    let swap = state.machine.store().get(id).await.map_err(error_response)?;
    let fees = state
        .machine
        .provider()
        .estimate_fees(TxType::Swap, &swap.quote(), &FeeTier::ALL)
        .await
        .map_err(error_response)?
        .unwrap_or_default();
    Ok(Json(fees))
}

async fn get_addresses(
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    Query(params): Query<AddressParams>,
) -> ApiResult<Vec<String>> {
    debug!(
        "Deriving {} addresses of wallet {} from {}",
        params.count, wallet_id, params.start
    );
    let client = state
        .clients
        .client(state.network, &wallet_id, &params.asset, &params.account_id)
        .map_err(error_response)?;
    let addresses = client
        .get_addresses(params.start, params.count.min(MAX_ADDRESSES))
        .await
        .map_err(error_response)?;
    Ok(Json(addresses.iter().map(|a| format!("{:?}", a)).collect()))
}

const MAX_ADDRESSES: u32 = 100;

// Request types

#[derive(Deserialize)]
struct QuoteParams {
    from: String,
    to: String,
    amount: BigDecimal,
}

#[derive(Deserialize)]
struct CreateSwapRequest {
    wallet_id: String,
    from_account_id: String,
    from: String,
    to: String,
    amount: BigDecimal,
}

#[derive(Deserialize)]
struct AddressParams {
    asset: String,
    account_id: String,
    #[serde(default)]
    start: u32,
    #[serde(default = "default_address_count")]
    count: u32,
}

fn default_address_count() -> u32 {
    5
}

// Response types

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: i64,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    details: Vec<ChainHealth>,
}

#[derive(Serialize)]
struct ChainHealth {
    chain_id: u64,
    healthy: bool,
}

/// Swap record with its display metadata
#[derive(Debug, Serialize)]
struct SwapView {
    #[serde(flatten)]
    swap: Swap,
    step: u8,
    total_steps: u8,
    timeline: [&'static str; 3],
    label: String,
    filter_status: FilterStatus,
    notification: Option<String>,
}

impl SwapView {
    fn new(swap: Swap, registry: &AssetRegistry) -> Self {
        let status: SwapStatus = swap.status;
        Self {
            step: status.step(),
            total_steps: TOTAL_STEPS,
            timeline: TIMELINE_STEPS,
            label: swap.render_label(),
            filter_status: status.filter_status(),
            notification: swap.notification(registry),
            swap,
        }
    }
}
