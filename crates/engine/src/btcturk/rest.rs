use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{Ack, Credentials, Error, ExchangeClient, MarketData, Order, Result, Ticker};

use super::signer::sign;

const TICKER_PATH: &str = "/api/v2/ticker";
const ORDER_PATH: &str = "/api/v1/order";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client for BTCTurk. The public ticker needs no credentials; order
/// placement is signed per request.
pub struct BtcTurkClient {
    base_url: String,
    credentials: Option<Credentials>,
    http: Client,
}

impl BtcTurkClient {
    pub fn new(base_url: impl Into<String>, credentials: Option<Credentials>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            http,
        })
    }
}

#[async_trait]
impl MarketData for BtcTurkClient {
    async fn fetch_snapshot(&self) -> Result<Vec<Ticker>> {
        let url = format!("{}{TICKER_PATH}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Network(format!("HTTP {status}: {body}")));
        }

        let ticker: TickerResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Network(format!("invalid ticker payload: {e}")))?;
        debug!(pairs = ticker.data.len(), "Fetched ticker snapshot");
        Ok(ticker.data)
    }
}

#[async_trait]
impl ExchangeClient for BtcTurkClient {
    async fn submit_order(&self, order: &Order) -> Result<Ack> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| Error::Execution("no API credentials configured".into()))?;

        // Fresh stamp for every request, taken now rather than at decision time.
        let stamp = sign(&creds.api_key, &creds.api_secret, Utc::now())?;
        let payload = OrderRequest {
            pair_symbol: &order.pair,
            order_type: order.order_type.to_string(),
            amount: order.amount,
        };

        debug!(pair = %order.pair, order_type = %order.order_type, "Submitting order to BTCTurk");
        let resp = self
            .http
            .post(format!("{}{ORDER_PATH}", self.base_url))
            .header("X-PCK", &creds.api_key)
            .header("X-Stamp", &stamp.timestamp)
            .header("X-Signature", &stamp.signature)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Execution(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Execution(format!("HTTP {status}: {text}")));
        }

        Ok(Ack::for_order(order))
    }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TickerResponse {
    data: Vec<Ticker>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderRequest<'a> {
    pair_symbol: &'a str,
    order_type: String,
    amount: f64,
}
