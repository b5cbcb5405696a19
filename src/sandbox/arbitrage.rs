use crate::arbitrage::{CycleOrder, RoundTrip, TwoPoolCycle};
use crate::client::{ArbitrageClient, ArbitrageExecution, ArbitrageOutcome};
use crate::errors::{ExecutionError, QueryError};
use crate::pool::Token;
use crate::sandbox::SandboxChain;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Arbitrage contract holding its own balances and trading between two sandbox pools.
///
/// On each call it evaluates both start tokens in both pool orders, and executes the most
/// profitable round trip only when its profit exceeds the minimum threshold.
#[derive(Debug)]
pub struct SandboxArbitrage {
    chain: SandboxChain,
    address: Address,
    pools: [Address; 2],
    min_profit_threshold: RwLock<U256>,
}

impl SandboxArbitrage {
    pub fn new(chain: SandboxChain, address: Address, pools: [Address; 2], min_profit_threshold: U256) -> Self {
        Self {
            chain,
            address,
            pools,
            min_profit_threshold: RwLock::new(min_profit_threshold),
        }
    }

    pub fn pools(&self) -> [Address; 2] {
        self.pools
    }

    fn pool_pair(&self, order: CycleOrder) -> (Address, Address) {
        match order {
            CycleOrder::FirstThenSecond => (self.pools[0], self.pools[1]),
            CycleOrder::SecondThenFirst => (self.pools[1], self.pools[0]),
        }
    }
}

#[async_trait]
impl ArbitrageClient for SandboxArbitrage {
    fn address(&self) -> Address {
        self.address
    }

    async fn try_execute(&self, amount_a: U256, amount_b: U256) -> Result<ArbitrageOutcome, ExecutionError> {
        let threshold = *self.min_profit_threshold.read().await;
        let mut state = self.chain.lock().await;
        state.begin_submission()?;

        for (token, amount) in [(Token::A, amount_a), (Token::B, amount_b)] {
            if state.balance(self.address, token) < amount {
                return Err(ExecutionError::InsufficientBalance);
            }
        }

        let cycle = TwoPoolCycle::new(state.pool(self.pools[0])?.model, state.pool(self.pools[1])?.model);
        let best: Option<RoundTrip> = [(Token::A, amount_a), (Token::B, amount_b)]
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .filter_map(|(token, amount)| cycle.best_round_trip(token, amount).ok())
            .max_by_key(|trip| trip.profit());

        let trip = match best {
            Some(trip) if trip.is_profitable() && trip.profit() > threshold => trip,
            _ => {
                state.advance_block();
                return Ok(ArbitrageOutcome::NotExecuted);
            }
        };

        let (first_pool, second_pool) = self.pool_pair(trip.order);
        let intermediate_amount = state.swap(first_pool, self.address, trip.start_token, trip.start_amount)?;
        let end_amount = state.swap(second_pool, self.address, trip.start_token.other(), intermediate_amount)?;
        state.advance_block();

        Ok(ArbitrageOutcome::Executed(ArbitrageExecution {
            start_token: trip.start_token,
            start_amount: trip.start_amount,
            intermediate_amount,
            end_amount,
            profit: end_amount.saturating_sub(trip.start_amount),
            first_pool,
            second_pool,
        }))
    }

    async fn set_min_profit_threshold(&self, value: U256) -> Result<(), ExecutionError> {
        *self.min_profit_threshold.write().await = value;
        Ok(())
    }

    async fn min_profit_threshold(&self) -> Result<U256, QueryError> {
        Ok(*self.min_profit_threshold.read().await)
    }
}
