pub mod config;
pub mod tracker;

pub use config::{OpenPolicy, TradingParams};
pub use tracker::{plan, Decision, Position, PositionBook, ENTRY_DISCOUNT};
