//! Capabilities the simulation core consumes from the outside world: an execution
//! environment that applies operations atomically, point-in-time state reads, the
//! arbitrage contract, and a sink for the finished metrics bundle.

use crate::errors::{ExecutionError, QueryError, SimError};
use crate::metrics::MetricsBundle;
use crate::metrics::bundle::wei;
use crate::policy::Action;
use crate::pool::Token;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::Serialize;

/// An action bound to the participant who submits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub account: Address,
    pub action: Action,
}

impl Operation {
    pub fn new(account: Address, action: Action) -> Self {
        Self { account, action }
    }
}

/// Authoritative state returned by the execution environment after a confirmed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostState {
    pub reserve_a: U256,
    pub reserve_b: U256,
    /// Output reported by the swap event, `None` for non-swap operations or a missing event.
    pub amount_out: Option<U256>,
    pub timestamp: u64,
}

#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Applies `operation` atomically and returns the confirmed post-state.
    async fn submit(&self, operation: &Operation) -> Result<PostState, ExecutionError>;
}

/// Point-in-time reads. Values must be read immediately before use and never cached across steps.
#[async_trait]
pub trait StateReader: Send + Sync {
    async fn get_reserves(&self, pool: Address) -> Result<(U256, U256), QueryError>;

    async fn get_balance(&self, account: Address, token: Token) -> Result<U256, QueryError>;

    async fn get_lp_balance(&self, account: Address) -> Result<U256, QueryError>;

    async fn get_lp_total_supply(&self) -> Result<U256, QueryError>;

    async fn get_block_timestamp(&self) -> Result<u64, QueryError>;
}

/// Details of an executed two-pool round trip, as reported by the arbitrage contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrageExecution {
    pub start_token: Token,
    #[serde(serialize_with = "wei::serialize")]
    pub start_amount: U256,
    #[serde(serialize_with = "wei::serialize")]
    pub intermediate_amount: U256,
    #[serde(serialize_with = "wei::serialize")]
    pub end_amount: U256,
    #[serde(serialize_with = "wei::serialize")]
    pub profit: U256,
    pub first_pool: Address,
    pub second_pool: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbitrageOutcome {
    Executed(ArbitrageExecution),
    NotExecuted,
}

impl ArbitrageOutcome {
    pub fn executed(&self) -> bool {
        matches!(self, ArbitrageOutcome::Executed(_))
    }

    pub fn profit(&self) -> Option<U256> {
        match self {
            ArbitrageOutcome::Executed(execution) => Some(execution.profit),
            ArbitrageOutcome::NotExecuted => None,
        }
    }
}

#[async_trait]
pub trait ArbitrageClient: Send + Sync {
    /// Address holding the arbitrage contract's working balances.
    fn address(&self) -> Address;

    async fn try_execute(&self, amount_a: U256, amount_b: U256) -> Result<ArbitrageOutcome, ExecutionError>;

    async fn set_min_profit_threshold(&self, value: U256) -> Result<(), ExecutionError>;

    async fn min_profit_threshold(&self) -> Result<U256, QueryError>;
}

#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn store(&self, bundle: &MetricsBundle) -> Result<(), SimError>;
}
