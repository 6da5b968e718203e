use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use common::{EngineState, TradingMode};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    engine: EngineState,
    mode: TradingMode,
    /// Pairs the next start would trade, if the operator has chosen any.
    selected_pairs: Option<Vec<String>>,
}

/// Liveness probe; open to unauthenticated callers.
async fn healthz(State(state): State<AppState>) -> Json<Health> {
    let selected_pairs = state.session.read().await.selected_pairs.clone();
    Json(Health {
        status: "ok",
        engine: state.engine.state().await,
        mode: state.trading_mode,
        selected_pairs,
    })
}
