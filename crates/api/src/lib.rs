mod auth;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{MarketData, TradingMode};
use engine::EngineHandle;
use ledger::CsvLedger;
use strategy::{OpenPolicy, TradingParams};

/// Operator choices that outlive a single request.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// `None` until the operator picks pairs; the pair view then proposes a default.
    pub selected_pairs: Option<Vec<String>>,
    /// Parameters of the most recent start; `/api/bot/start` reuses its amount
    /// and target on the current selection.
    pub last_params: Option<TradingParams>,
    pub open_policy: OpenPolicy,
}

impl Session {
    /// Seed the session from a trading preset.
    pub fn from_preset(params: TradingParams) -> Self {
        Self {
            selected_pairs: Some(params.pairs.clone()),
            open_policy: params.open_policy,
            last_params: Some(params),
        }
    }
}

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub market: Arc<dyn MarketData>,
    pub ledger: CsvLedger,
    pub trading_mode: TradingMode,
    pub dashboard_token: String,
    pub session: Arc<RwLock<Session>>,
}

/// Assemble every route with its state.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::ws_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
}

/// Build and run the Axum API server.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = app(state);

    info!(%addr, "Operator API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
