pub mod arbitrage;
pub mod client;
pub mod config;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod math;
pub mod metrics;
pub mod policy;
pub mod pool;
pub mod sandbox;
pub mod session;
pub mod sink;

pub use errors::SimError;

pub use engine::{EngineSettings, SimulationEngine, SimulationReport, StopHandle};
pub use metrics::MetricsBundle;
pub use pool::{ConstantProductPool, Token};
