use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use common::{BotEvent, EngineState, MarketData};
use strategy::{PositionBook, TradingParams};

use crate::executor::OrderExecutor;
use crate::scheduler::IntervalTicks;
use crate::trade_loop::TradeLoop;

/// Commands sent to the engine via the command channel. Each carries the
/// channel the engine answers on once the command has taken effect.
#[derive(Debug)]
pub enum EngineCommand {
    /// Start automated trading with these parameters.
    Start(TradingParams, oneshot::Sender<Result<(), CommandRejected>>),
    /// Stop after the tick in progress, if any.
    Stop(oneshot::Sender<Result<(), CommandRejected>>),
}

/// Why the engine refused a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandRejected {
    #[error("Automated trading already running")]
    AlreadyRunning,
    #[error("Invalid trading parameters: {0}")]
    InvalidParams(String),
    #[error("Trading engine is not accepting commands")]
    EngineGone,
}

/// Cloneable handle passed to the operator surface.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
    event_tx: broadcast::Sender<BotEvent>,
}

impl EngineHandle {
    /// Start trading. Resolves once the engine is `Running` or has refused.
    pub async fn start(&self, params: TradingParams) -> Result<(), CommandRejected> {
        self.request(|reply| EngineCommand::Start(params, reply)).await
    }

    /// Stop trading. Resolves once the engine is `Stopped`; stopping an
    /// idle engine succeeds.
    pub async fn stop(&self) -> Result<(), CommandRejected> {
        self.request(EngineCommand::Stop).await
    }

    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<(), CommandRejected>>) -> EngineCommand,
    ) -> Result<(), CommandRejected> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| CommandRejected::EngineGone)?;
        reply_rx.await.unwrap_or(Err(CommandRejected::EngineGone))
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// Subscribe to operator notifications.
    pub fn subscribe_events(&self) -> broadcast::Receiver<BotEvent> {
        self.event_tx.subscribe()
    }
}

struct RunningLoop {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<PositionBook>,
}

/// The main engine: owns the trade loop task and processes commands.
pub struct Engine {
    market: Arc<dyn MarketData>,
    executor: OrderExecutor,
    poll_interval: Duration,
    state: Arc<RwLock<EngineState>>,
    event_tx: broadcast::Sender<BotEvent>,
    command_rx: mpsc::Receiver<EngineCommand>,
}

impl Engine {
    /// `event_tx` must be the same channel the executor reports on, so the
    /// operator sees order and lifecycle notifications on one stream.
    pub fn new(
        market: Arc<dyn MarketData>,
        executor: OrderExecutor,
        event_tx: broadcast::Sender<BotEvent>,
        poll_interval: Duration,
    ) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let state = Arc::new(RwLock::new(EngineState::Stopped));

        let handle = EngineHandle {
            command_tx,
            state: state.clone(),
            event_tx: event_tx.clone(),
        };

        let engine = Engine {
            market,
            executor,
            poll_interval,
            state,
            event_tx,
            command_rx,
        };

        (engine, handle)
    }

    /// Run the engine until every handle is dropped. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!("Engine initialized in Stopped state. Waiting for Start command.");

        let mut running: Option<RunningLoop> = None;

        loop {
            match self.command_rx.recv().await {
                Some(EngineCommand::Start(params, reply)) => {
                    let outcome = self.start(params, &mut running).await;
                    let _ = reply.send(outcome);
                }

                Some(EngineCommand::Stop(reply)) => {
                    self.stop(&running).await;
                    let _ = reply.send(Ok(()));
                }

                None => {
                    warn!("Engine command channel closed, shutting down");
                    if let Some(r) = running.take() {
                        let _ = r.stop_tx.send(true);
                        let _ = r.task.await;
                    }
                    *self.state.write().await = EngineState::Stopped;
                    break;
                }
            }
        }
    }

    async fn start(
        &self,
        params: TradingParams,
        running: &mut Option<RunningLoop>,
    ) -> Result<(), CommandRejected> {
        if *self.state.read().await == EngineState::Running {
            info!("Engine already running");
            return Err(CommandRejected::AlreadyRunning);
        }
        if let Err(e) = params.validate() {
            warn!(error = %e, "Refusing to start with invalid parameters");
            return Err(CommandRejected::InvalidParams(e.to_string()));
        }

        // The previous loop may still be finishing its last tick.
        if let Some(prev) = running.take() {
            let _ = prev.task.await;
        }

        info!(pairs = ?params.pairs, "Starting automated trading");
        let pairs = params.pairs.clone();
        let (stop_tx, stop_rx) = watch::channel(false);
        let trade_loop = TradeLoop::new(
            params,
            self.market.clone(),
            self.executor.clone(),
            self.event_tx.clone(),
        );
        let task = tokio::spawn(trade_loop.run(IntervalTicks::new(self.poll_interval), stop_rx));
        *running = Some(RunningLoop { stop_tx, task });

        *self.state.write().await = EngineState::Running;
        let _ = self.event_tx.send(BotEvent::Started { pairs });
        Ok(())
    }

    async fn stop(&self, running: &Option<RunningLoop>) {
        if *self.state.read().await == EngineState::Stopped {
            info!("Engine already stopped");
            return;
        }
        info!("Engine stopping after current tick");
        if let Some(r) = running {
            let _ = r.stop_tx.send(true);
        }
        *self.state.write().await = EngineState::Stopped;
        let _ = self.event_tx.send(BotEvent::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use common::{Ack, ExchangeClient, Order, OrderType, Result, Ticker};
    use ledger::CsvLedger;

    use super::*;

    struct FixedMarket;

    #[async_trait]
    impl MarketData for FixedMarket {
        async fn fetch_snapshot(&self) -> Result<Vec<Ticker>> {
            Ok(vec![Ticker {
                pair: "BTCUSDT".into(),
                last: 96.0,
                high: 101.0,
                low: 90.0,
                volume: 1.0,
                average: 100.0,
            }])
        }
    }

    struct AcceptAll;

    #[async_trait]
    impl ExchangeClient for AcceptAll {
        async fn submit_order(&self, order: &Order) -> Result<Ack> {
            Ok(Ack::for_order(order))
        }
    }

    #[tokio::test]
    async fn start_trades_and_stop_halts() {
        let ledger =
            CsvLedger::new(std::env::temp_dir().join(format!("engine-{}.csv", uuid::Uuid::new_v4())));
        let (event_tx, _) = broadcast::channel(64);
        let executor = OrderExecutor::new(Arc::new(AcceptAll), ledger.clone(), event_tx.clone());
        let (engine, handle) = Engine::new(
            Arc::new(FixedMarket),
            executor,
            event_tx,
            Duration::from_millis(20),
        );
        let mut events = handle.subscribe_events();
        tokio::spawn(engine.run());

        handle
            .start(TradingParams::new(vec!["BTCUSDT".into()], 0.5, 5.0))
            .await
            .unwrap();
        assert_eq!(handle.state().await, EngineState::Running);

        let mut saw_buy = false;
        while let Ok(event) = tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
            if let Ok(BotEvent::OrderPlaced { order_type, .. }) = event {
                assert_eq!(order_type, OrderType::Buy);
                saw_buy = true;
                break;
            }
        }
        assert!(saw_buy, "expected a BUY after start");
        assert_eq!(handle.state().await, EngineState::Running);

        handle.stop().await.unwrap();
        assert_eq!(handle.state().await, EngineState::Stopped);
        tokio::time::sleep(Duration::from_millis(100)).await;

        // last=96 never reaches the 99.75 target, so only the opening BUY exists.
        let history = ledger.read_all().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].order_type, OrderType::Buy);
        std::fs::remove_file(ledger.path()).unwrap();
    }

    #[tokio::test]
    async fn invalid_params_do_not_start() {
        let (event_tx, _) = broadcast::channel(8);
        let ledger = CsvLedger::new(std::env::temp_dir().join("never-written.csv"));
        let executor = OrderExecutor::new(Arc::new(AcceptAll), ledger, event_tx.clone());
        let (engine, handle) =
            Engine::new(Arc::new(FixedMarket), executor, event_tx, Duration::from_secs(10));
        tokio::spawn(engine.run());

        let refused = handle.start(TradingParams::new(vec![], 1.0, 5.0)).await;
        assert!(matches!(refused, Err(CommandRejected::InvalidParams(_))));
        assert_eq!(handle.state().await, EngineState::Stopped);
    }

    #[tokio::test]
    async fn restart_right_after_stop_is_accepted() {
        let (event_tx, _) = broadcast::channel(64);
        let ledger =
            CsvLedger::new(std::env::temp_dir().join(format!("engine-{}.csv", uuid::Uuid::new_v4())));
        let executor = OrderExecutor::new(Arc::new(AcceptAll), ledger.clone(), event_tx.clone());
        let (engine, handle) =
            Engine::new(Arc::new(FixedMarket), executor, event_tx, Duration::from_secs(60));
        tokio::spawn(engine.run());

        let params = TradingParams::new(vec!["BTCUSDT".into()], 0.5, 5.0);
        handle.start(params.clone()).await.unwrap();
        assert_eq!(
            handle.start(params.clone()).await,
            Err(CommandRejected::AlreadyRunning)
        );

        handle.stop().await.unwrap();
        handle.start(params).await.unwrap();
        assert_eq!(handle.state().await, EngineState::Running);

        handle.stop().await.unwrap();
        handle.stop().await.unwrap();
        assert_eq!(handle.state().await, EngineState::Stopped);
        let _ = std::fs::remove_file(ledger.path());
    }

    #[tokio::test]
    async fn commands_fail_once_engine_is_gone() {
        let (event_tx, _) = broadcast::channel(8);
        let ledger = CsvLedger::new(std::env::temp_dir().join("never-written.csv"));
        let executor = OrderExecutor::new(Arc::new(AcceptAll), ledger, event_tx.clone());
        let (engine, handle) =
            Engine::new(Arc::new(FixedMarket), executor, event_tx, Duration::from_secs(10));
        drop(engine);

        assert_eq!(handle.stop().await, Err(CommandRejected::EngineGone));
    }
}
