pub mod engine;
pub mod latency;
pub mod outcome;
pub mod stats_client;

pub use engine::SettlementEngine;
pub use stats_client::NbaStatsClient;
