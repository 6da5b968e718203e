use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use common::Error;
use engine::CommandRejected;
use ledger::TIMESTAMP_FORMAT;
use strategy::TradingParams;

use super::{error_response, ApiResponse};
use crate::{auth::require_auth, AppState};

/// Pairs proposed for automated trading before the operator chooses.
const DEFAULT_SELECTION: usize = 3;

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/market", get(get_market))
        .route("/api/pairs", get(get_pairs).put(put_pairs))
        .route("/api/trading", post(post_trading))
        .route("/api/history", get(get_history))
        .route("/api/bot/start", post(post_bot_start))
        .route("/api/bot/stop", post(post_bot_stop))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

// ─── Market data ──────────────────────────────────────────────────────────────

async fn get_market(State(state): State<AppState>) -> ApiResponse {
    match state.market.fetch_snapshot().await {
        Ok(tickers) => (StatusCode::OK, Json(json!({ "tickers": tickers }))),
        Err(e) => {
            warn!(error = %e, "Market view unavailable");
            error_response(StatusCode::BAD_GATEWAY, "Failed to fetch market data", e)
        }
    }
}

// ─── Pair selection ───────────────────────────────────────────────────────────

async fn get_pairs(State(state): State<AppState>) -> ApiResponse {
    let available: Vec<String> = match state.market.fetch_snapshot().await {
        Ok(tickers) => tickers.into_iter().map(|t| t.pair).collect(),
        Err(e) => {
            return error_response(StatusCode::BAD_GATEWAY, "Failed to fetch market data", e)
        }
    };

    let selected = state
        .session
        .read()
        .await
        .selected_pairs
        .clone()
        .unwrap_or_else(|| available.iter().take(DEFAULT_SELECTION).cloned().collect());

    (
        StatusCode::OK,
        Json(json!({ "available": available, "selected": selected })),
    )
}

#[derive(Deserialize)]
struct PairsBody {
    pairs: Vec<String>,
}

async fn put_pairs(State(state): State<AppState>, Json(body): Json<PairsBody>) -> ApiResponse {
    let mut pairs: Vec<String> = Vec::with_capacity(body.pairs.len());
    for pair in body.pairs.into_iter().map(|p| p.trim().to_string()) {
        if !pair.is_empty() && !pairs.contains(&pair) {
            pairs.push(pair);
        }
    }

    info!(pairs = ?pairs, "Managed pair selection updated");
    state.session.write().await.selected_pairs = Some(pairs.clone());
    (StatusCode::OK, Json(json!({ "selected": pairs })))
}

// ─── Trade execution ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TradingBody {
    trade_amount: f64,
    profit_target_pct: f64,
}

async fn post_trading(State(state): State<AppState>, Json(body): Json<TradingBody>) -> ApiResponse {
    let params = {
        let session = state.session.read().await;
        let Some(pairs) = session.selected_pairs.clone() else {
            return error_response(
                StatusCode::BAD_REQUEST,
                "No pairs selected",
                "choose pairs via PUT /api/pairs first",
            );
        };
        TradingParams::new(pairs, body.trade_amount, body.profit_target_pct)
            .with_open_policy(session.open_policy)
    };

    if let Err(e) = params.validate() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid trading parameters", e);
    }

    state.session.write().await.last_params = Some(params.clone());
    start(&state, params).await
}

async fn post_bot_start(State(state): State<AppState>) -> ApiResponse {
    // Restart on the current pair selection with the last amount and target.
    let params = {
        let session = state.session.read().await;
        match (&session.last_params, &session.selected_pairs) {
            (Some(last), Some(pairs)) => {
                TradingParams::new(pairs.clone(), last.trade_amount, last.profit_target_pct)
                    .with_open_policy(session.open_policy)
            }
            (Some(last), None) => last.clone(),
            (None, _) => {
                return error_response(
                    StatusCode::CONFLICT,
                    "No trading parameters configured",
                    "submit POST /api/trading first",
                )
            }
        }
    };

    if let Err(e) = params.validate() {
        return error_response(StatusCode::BAD_REQUEST, "Invalid trading parameters", e);
    }
    state.session.write().await.last_params = Some(params.clone());
    start(&state, params).await
}

async fn post_bot_stop(State(state): State<AppState>) -> ApiResponse {
    match state.engine.stop().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "stopped", "message": "Trading Bot Stopped" })),
        ),
        Err(e) => rejected(e),
    }
}

async fn start(state: &AppState, params: TradingParams) -> ApiResponse {
    let pairs = params.pairs.clone();
    match state.engine.start(params).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "running",
                "message": "Automated Trading Started",
                "pairs": pairs,
            })),
        ),
        Err(e) => rejected(e),
    }
}

fn rejected(e: CommandRejected) -> ApiResponse {
    match e {
        CommandRejected::AlreadyRunning => error_response(
            StatusCode::CONFLICT,
            "Automated trading already running",
            "stop the bot before starting again",
        ),
        CommandRejected::InvalidParams(detail) => {
            error_response(StatusCode::BAD_REQUEST, "Invalid trading parameters", detail)
        }
        CommandRejected::EngineGone => {
            error!("Trading engine unavailable");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Trading engine unavailable",
                CommandRejected::EngineGone,
            )
        }
    }
}

// ─── History ──────────────────────────────────────────────────────────────────

async fn get_history(State(state): State<AppState>) -> ApiResponse {
    let ledger = state.ledger.clone();
    let history = match tokio::task::spawn_blocking(move || ledger.history()).await {
        Ok(result) => result,
        Err(e) => Err(Error::Storage(format!("history reader task failed: {e}"))),
    };

    match history {
        Ok(records) if records.is_empty() => (
            StatusCode::OK,
            Json(json!({ "trades": [], "message": "No trade history available." })),
        ),
        Ok(records) => {
            let trades: Vec<Value> = records
                .iter()
                .map(|r| {
                    json!({
                        "timestamp": r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                        "pair": r.pair,
                        "order_type": r.order_type,
                        "amount": r.amount,
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "trades": trades })))
        }
        Err(e) => {
            error!(error = %e, "Trade history unreadable");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Trade history unreadable", e)
        }
    }
}
