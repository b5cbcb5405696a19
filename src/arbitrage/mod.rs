pub mod cycle;
pub mod optimizer;
pub mod scenario;
pub mod types;

pub use cycle::{CycleOrder, RoundTrip, TwoPoolCycle};
pub use scenario::ArbitrageScenarioRunner;
pub use types::{ArbitrageScenario, ArbitrageSnapshot, ArbitrageTrial, PoolQuote};
