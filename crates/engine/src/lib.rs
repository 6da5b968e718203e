pub mod btcturk;
pub mod executor;
pub mod lifecycle;
pub mod scheduler;
pub mod trade_loop;

pub use btcturk::BtcTurkClient;
pub use executor::OrderExecutor;
pub use lifecycle::{CommandRejected, Engine, EngineCommand, EngineHandle};
pub use scheduler::{ChannelTicks, IntervalTicks, TickSource};
pub use trade_loop::{TickReport, TradeLoop};
