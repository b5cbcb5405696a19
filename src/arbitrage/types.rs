use crate::arbitrage::RoundTrip;
use crate::client::ArbitrageExecution;
use crate::errors::ArithmeticError;
use crate::metrics::bundle::wei;
use crate::pool::ConstantProductPool;
use alloy_primitives::{Address, U256};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArbitrageScenario {
    /// Expect execution whenever the predicted profit clears the contract threshold.
    Profitable,
    /// Threshold raised beyond any reachable profit; execution must not happen.
    ThresholdGate,
}

/// Reserves and price of one pool at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolQuote {
    pub pool: Address,
    #[serde(serialize_with = "wei::serialize")]
    pub reserve_a: U256,
    #[serde(serialize_with = "wei::serialize")]
    pub reserve_b: U256,
    /// B per A, scaled by 1e18.
    #[serde(serialize_with = "wei::option")]
    pub spot_price: Option<U256>,
}

impl PoolQuote {
    pub fn new(pool: Address, view: &ConstantProductPool) -> Result<Self, ArithmeticError> {
        Ok(Self {
            pool,
            reserve_a: view.reserve_a,
            reserve_b: view.reserve_b,
            spot_price: view.spot_price()?,
        })
    }
}

/// Both pool prices and the arbitrage contract's balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageSnapshot {
    pub pools: [PoolQuote; 2],
    #[serde(serialize_with = "wei::serialize")]
    pub balance_a: U256,
    #[serde(serialize_with = "wei::serialize")]
    pub balance_b: U256,
}

/// Record of one scenario invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageTrial {
    pub scenario: ArbitrageScenario,
    pub before: ArbitrageSnapshot,
    pub after: Option<ArbitrageSnapshot>,
    #[serde(serialize_with = "wei::serialize")]
    pub amount_a_tried: U256,
    #[serde(serialize_with = "wei::serialize")]
    pub amount_b_tried: U256,
    #[serde(serialize_with = "wei::serialize")]
    pub min_profit_threshold: U256,
    pub predicted: Option<RoundTrip>,
    pub expected_execution: bool,
    pub executed: bool,
    pub execution: Option<ArbitrageExecution>,
    #[serde(serialize_with = "wei::option")]
    pub profit: Option<U256>,
    pub expectation_met: bool,
    pub error: Option<String>,
}
