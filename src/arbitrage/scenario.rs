use crate::arbitrage::cycle::{RoundTrip, TwoPoolCycle};
use crate::arbitrage::optimizer;
use crate::arbitrage::types::{ArbitrageScenario, ArbitrageSnapshot, ArbitrageTrial, PoolQuote};
use crate::client::{ArbitrageClient, ArbitrageOutcome, StateReader};
use crate::errors::{ArithmeticError, SimError};
use crate::ledger;
use crate::math::utils::from_wei;
use crate::pool::{ConstantProductPool, Token};
use alloy_primitives::{Address, U256};
use std::fmt::{self, Debug};
use std::sync::Arc;

/// Trials are capped at `reserve / MAX_TRIAL_RESERVE_DIVISOR` of the shallower pool.
const MAX_TRIAL_RESERVE_DIVISOR: u64 = 10;
const OPTIMIZER_TOLERANCE: U256 = U256::from_limbs([1_000_000_000_000_000, 0, 0, 0]);

/// Exercises the arbitrage contract against two pools: once expecting execution, once with a
/// threshold no trade can clear.
pub struct ArbitrageScenarioRunner<A: ?Sized, R: ?Sized> {
    client: Arc<A>,
    reader: Arc<R>,
    pools: [Address; 2],
    template: ConstantProductPool,
}

impl<A, R> ArbitrageScenarioRunner<A, R>
where
    A: ArbitrageClient + ?Sized,
    R: StateReader + ?Sized,
{
    pub fn new(client: Arc<A>, reader: Arc<R>, pools: [Address; 2], fee_numerator: u64, fee_denominator: u64) -> Self {
        Self {
            client,
            reader,
            pools,
            template: ConstantProductPool::new(U256::ZERO, U256::ZERO, fee_numerator, fee_denominator),
        }
    }

    /// Runs the profitable scenario, then the threshold gate with `high_threshold`.
    ///
    /// Both scenarios submit the same amounts, bounded once against the pools as they stand before
    /// the first scenario. A failing threshold gate is logged and the profitable trial is kept.
    pub async fn run_all(
        &self,
        amount_a: U256,
        amount_b: U256,
        high_threshold: U256,
    ) -> Result<Vec<ArbitrageTrial>, SimError> {
        let (amount_a, amount_b) = self.bounded_trial(amount_a, amount_b).await?;
        let mut trials = vec![self.profitable(amount_a, amount_b).await?];
        match self.threshold_gate(high_threshold, amount_a, amount_b).await {
            Ok(trial) => trials.push(trial),
            Err(e) => tracing::error!("Threshold-gate scenario failed: {}", e),
        }
        Ok(trials)
    }

    /// Attempts arbitrage with the amounts bounded against the current pools.
    pub async fn run_profitable(&self, amount_a: U256, amount_b: U256) -> Result<ArbitrageTrial, SimError> {
        let (amount_a, amount_b) = self.bounded_trial(amount_a, amount_b).await?;
        self.profitable(amount_a, amount_b).await
    }

    /// Raises the contract's minimum profit to `high_threshold`, then attempts arbitrage with the
    /// amounts bounded against the current pools.
    pub async fn run_threshold_gate(
        &self,
        high_threshold: U256,
        amount_a: U256,
        amount_b: U256,
    ) -> Result<ArbitrageTrial, SimError> {
        let (amount_a, amount_b) = self.bounded_trial(amount_a, amount_b).await?;
        self.threshold_gate(high_threshold, amount_a, amount_b).await
    }

    async fn profitable(&self, amount_a: U256, amount_b: U256) -> Result<ArbitrageTrial, SimError> {
        tracing::info!(">>> Scenario: attempting profitable arbitrage <<<");
        self.attempt(ArbitrageScenario::Profitable, amount_a, amount_b).await
    }

    async fn threshold_gate(&self, high_threshold: U256, amount_a: U256, amount_b: U256) -> Result<ArbitrageTrial, SimError> {
        tracing::info!(">>> Scenario: arbitrage with high threshold, expecting no execution <<<");
        match self.client.set_min_profit_threshold(high_threshold).await {
            Ok(()) => tracing::info!(threshold = from_wei(high_threshold), "minProfitThreshold updated."),
            Err(e) => tracing::error!("Failed to set minProfitThreshold: {}", e),
        }
        self.attempt(ArbitrageScenario::ThresholdGate, amount_a, amount_b).await
    }

    async fn bounded_trial(&self, amount_a: U256, amount_b: U256) -> Result<(U256, U256), SimError> {
        let first = ledger::read_pool(self.reader.as_ref(), self.pools[0], &self.template).await?;
        let second = ledger::read_pool(self.reader.as_ref(), self.pools[1], &self.template).await?;
        let cycle = TwoPoolCycle::new(first, second);
        if !cycle.is_tradable() {
            return Err(SimError::Arithmetic(ArithmeticError::EmptyPool));
        }
        let bounded = bound_trial(&cycle, amount_a, amount_b);
        if bounded != (amount_a, amount_b) {
            tracing::info!(a = from_wei(bounded.0), b = from_wei(bounded.1), "Trial amounts capped by pool depth.");
        }
        Ok(bounded)
    }

    pub async fn snapshot(&self, label: &str) -> Result<ArbitrageSnapshot, SimError> {
        let first = ledger::read_pool(self.reader.as_ref(), self.pools[0], &self.template).await?;
        let second = ledger::read_pool(self.reader.as_ref(), self.pools[1], &self.template).await?;
        let owner = self.client.address();
        let balance_a = self.reader.get_balance(owner, Token::A).await?;
        let balance_b = self.reader.get_balance(owner, Token::B).await?;

        let snapshot = ArbitrageSnapshot {
            pools: [PoolQuote::new(self.pools[0], &first)?, PoolQuote::new(self.pools[1], &second)?],
            balance_a,
            balance_b,
        };
        let [one, two] = snapshot.pools;
        tracing::info!(
            label,
            pool_one_price = ?one.spot_price.map(from_wei),
            pool_two_price = ?two.spot_price.map(from_wei),
            balance_a = from_wei(balance_a),
            balance_b = from_wei(balance_b),
            "Arbitrage state."
        );
        Ok(snapshot)
    }

    async fn attempt(&self, scenario: ArbitrageScenario, amount_a: U256, amount_b: U256) -> Result<ArbitrageTrial, SimError> {
        let before = self.snapshot("before").await?;
        let cycle = cycle_from(&before, &self.template);
        if !cycle.is_tradable() {
            return Err(SimError::Arithmetic(ArithmeticError::EmptyPool));
        }

        let threshold = self.client.min_profit_threshold().await?;
        let predicted = predict(&cycle, amount_a, amount_b);
        let expected_execution = match scenario {
            ArbitrageScenario::Profitable => predicted.is_some_and(|trip| trip.profit() > threshold),
            ArbitrageScenario::ThresholdGate => false,
        };
        if let Some(trip) = predicted {
            log_optimum(&cycle, &trip);
        }
        tracing::debug!(
            gap_pct = ?cycle.price_gap_pct().map(|gap| gap.map(from_wei)),
            predicted_profit = ?predicted.map(|t| from_wei(t.profit())),
            threshold = from_wei(threshold),
            expected_execution,
            "Trial prepared."
        );

        tracing::info!(a = from_wei(amount_a), b = from_wei(amount_b), "Calling executeArbitrage...");
        let (outcome, error) = match self.client.try_execute(amount_a, amount_b).await {
            Ok(outcome) => (outcome, None),
            Err(e) => {
                tracing::error!("executeArbitrage call failed: {}", e);
                (ArbitrageOutcome::NotExecuted, Some(e.to_string()))
            }
        };

        let executed = outcome.executed();
        let execution = match outcome {
            ArbitrageOutcome::Executed(execution) => {
                tracing::info!(
                    start_token = %execution.start_token,
                    start = from_wei(execution.start_amount),
                    intermediate = from_wei(execution.intermediate_amount),
                    end = from_wei(execution.end_amount),
                    profit = from_wei(execution.profit),
                    "Arbitrage executed."
                );
                Some(execution)
            }
            ArbitrageOutcome::NotExecuted => {
                tracing::info!("No arbitrage executed.");
                None
            }
        };

        let expectation_met = executed == expected_execution;
        if !expectation_met {
            tracing::error!(?scenario, executed, expected_execution, "Arbitrage outcome contradicts the threshold gate.");
        }

        let after = match self.snapshot("after").await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!("Failed to read state after trial: {}", e);
                None
            }
        };

        Ok(ArbitrageTrial {
            scenario,
            before,
            after,
            amount_a_tried: amount_a,
            amount_b_tried: amount_b,
            min_profit_threshold: threshold,
            predicted,
            expected_execution,
            executed,
            execution,
            profit: outcome.profit(),
            expectation_met,
            error,
        })
    }
}

fn cycle_from(snapshot: &ArbitrageSnapshot, template: &ConstantProductPool) -> TwoPoolCycle {
    let [first, second] = snapshot.pools;
    TwoPoolCycle::new(
        template.with_reserves(first.reserve_a, first.reserve_b),
        template.with_reserves(second.reserve_a, second.reserve_b),
    )
}

/// Caps each trial amount at a tenth of the shallower pool's reserve of that token.
pub fn bound_trial(cycle: &TwoPoolCycle, amount_a: U256, amount_b: U256) -> (U256, U256) {
    let cap = |token: Token| {
        cycle.first.reserve_of(token).min(cycle.second.reserve_of(token)) / U256::from(MAX_TRIAL_RESERVE_DIVISOR)
    };
    (amount_a.min(cap(Token::A)), amount_b.min(cap(Token::B)))
}

/// Best predicted round trip over both start tokens, `None` if neither can be quoted.
pub fn predict(cycle: &TwoPoolCycle, amount_a: U256, amount_b: U256) -> Option<RoundTrip> {
    [(Token::A, amount_a), (Token::B, amount_b)]
        .into_iter()
        .filter(|(_, amount)| !amount.is_zero())
        .filter_map(|(token, amount)| cycle.best_round_trip(token, amount).ok())
        .max_by_key(|trip| trip.profit())
}

fn log_optimum(cycle: &TwoPoolCycle, trip: &RoundTrip) {
    let upper = cycle.first.reserve_of(trip.start_token).min(cycle.second.reserve_of(trip.start_token))
        / U256::from(MAX_TRIAL_RESERVE_DIVISOR);
    match optimizer::find_optimal_input(cycle, trip.start_token, trip.order, U256::from(1), upper, OPTIMIZER_TOLERANCE) {
        Ok((input, profit)) => tracing::debug!(
            start_token = %trip.start_token,
            optimal_input = from_wei(input),
            optimal_profit = from_wei(profit),
            "Theoretical optimum within trial bound."
        ),
        Err(e) => tracing::trace!("Optimizer failed: {}", e),
    }
}

impl<A: ?Sized, R: ?Sized> Debug for ArbitrageScenarioRunner<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArbitrageScenarioRunner")
            .field("pools", &self.pools)
            .finish_non_exhaustive()
    }
}
