use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use common::{Ack, Error, ExchangeClient, Order, Result};

/// Simulated order endpoint for paper trading.
///
/// Every well-formed order is acknowledged immediately. Nothing is sent to
/// BTCTurk and no credentials are needed.
#[derive(Debug, Default)]
pub struct PaperClient {
    orders: AtomicU64,
}

impl PaperClient {
    pub fn new() -> Self {
        info!("PaperClient initialized");
        Self::default()
    }
}

#[async_trait]
impl ExchangeClient for PaperClient {
    async fn submit_order(&self, order: &Order) -> Result<Ack> {
        if order.pair.trim().is_empty() {
            return Err(Error::Execution("pairSymbol is required".into()));
        }
        if !order.amount.is_finite() || order.amount <= 0.0 {
            return Err(Error::Execution(format!(
                "amount must be positive, got {}",
                order.amount
            )));
        }

        let n = self.orders.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            pair = %order.pair,
            order_type = %order.order_type,
            amount = order.amount,
            simulated = n,
            "Paper order acknowledged"
        );
        Ok(Ack::for_order(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderType;

    #[tokio::test]
    async fn paper_order_is_acknowledged_as_submitted() {
        let client = PaperClient::new();
        let order = Order::market("BTCUSDT", OrderType::Buy, 0.01);
        let ack = client.submit_order(&order).await.unwrap();

        assert_eq!(ack.pair, "BTCUSDT");
        assert_eq!(ack.order_type, OrderType::Buy);
        assert_eq!(ack.amount, 0.01);
        assert_eq!(client.orders.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn paper_orders_are_counted() {
        let client = PaperClient::new();
        client
            .submit_order(&Order::market("ETHUSDT", OrderType::Buy, 1.0))
            .await
            .unwrap();
        client
            .submit_order(&Order::market("ETHUSDT", OrderType::Sell, 1.0))
            .await
            .unwrap();
        assert_eq!(client.orders.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn paper_rejects_malformed_orders() {
        let client = PaperClient::new();
        let zero = client
            .submit_order(&Order::market("ETHUSDT", OrderType::Buy, 0.0))
            .await;
        assert!(matches!(zero, Err(Error::Execution(_))));

        let unnamed = client
            .submit_order(&Order::market(" ", OrderType::Buy, 1.0))
            .await;
        assert!(matches!(unnamed, Err(Error::Execution(_))));
        assert_eq!(client.orders.load(Ordering::Relaxed), 0);
    }
}
