//! One end-to-end run on the in-memory chain: random trading on the primary pool, then both
//! arbitrage scenarios against a second pool, then persistence of the metrics bundle.

use crate::arbitrage::{ArbitrageScenarioRunner, ArbitrageTrial};
use crate::client::{ExecutionClient, Operation, ResultSink};
use crate::config::AppConfig;
use crate::engine::{SimulationEngine, StopHandle};
use crate::errors::SimError;
use crate::math::fixed_point::to_wei;
use crate::metrics::MetricsBundle;
use crate::policy::Action;
use crate::pool::Token;
use crate::sandbox::{SandboxArbitrage, SandboxChain, SandboxDex};
use alloy_primitives::{Address, address};
use std::sync::Arc;

pub const PRIMARY_POOL: Address = address!("9d83e140330758a8fFD07F8Bd73e86ebcA8a5692");
pub const SECONDARY_POOL: Address = address!("D4Fc541236927E2EAf8F27606bD7309C1Fc2cbee");
pub const ARBITRAGE_ADDRESS: Address = address!("93f8dddd876c7dBE3323723500e83E202A7C96CC");
pub const SECONDARY_LIQUIDITY_PROVIDER: Address = address!("00000000000000000000000000000000000000ff");

#[derive(Debug)]
pub struct Session {
    config: AppConfig,
    chain: SandboxChain,
    stop: StopHandle,
}

impl Session {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            chain: SandboxChain::new(),
            stop: StopHandle::default(),
        }
    }

    pub fn chain(&self) -> &SandboxChain {
        &self.chain
    }

    /// Stops the random-trading phase after the step in progress.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs both phases and stores the bundle in `sink`.
    ///
    /// Only setup failures abort. A failed arbitrage phase is logged and the step metrics are
    /// still stored, without trials.
    pub async fn run<S: ResultSink + ?Sized>(&self, sink: &S) -> Result<MetricsBundle, SimError> {
        let sim = &self.config.simulation;
        let dex = Arc::new(self.chain.dex(PRIMARY_POOL, sim.fee_numerator, sim.fee_denominator).await);

        let (funding_a, funding_b) = sim.funding();
        for participant in sim.participant_addresses() {
            self.chain.mint(participant, Token::A, funding_a).await;
            self.chain.mint(participant, Token::B, funding_b).await;
        }
        tracing::info!(a = sim.funding_a, b = sim.funding_b, "Participants funded.");

        let settings = sim.engine_settings(PRIMARY_POOL)?;
        let report = SimulationEngine::new(settings, dex.clone(), dex.clone())
            .with_stop_handle(self.stop.clone())
            .run()
            .await?;
        tracing::info!(
            rows = report.records.len(),
            failed = report.failed_steps(),
            cancelled = report.cancelled,
            "Random trading finished."
        );

        let mut bundle = report.to_bundle();
        if self.config.arbitrage.enabled && !report.cancelled {
            match self.run_arbitrage(dex).await {
                Ok(trials) => bundle = bundle.with_arbitrage_trials(trials),
                Err(e) => tracing::error!("Arbitrage phase failed, keeping step metrics: {}", e),
            }
        }

        sink.store(&bundle).await?;
        Ok(bundle)
    }

    async fn run_arbitrage(&self, reader: Arc<SandboxDex>) -> Result<Vec<ArbitrageTrial>, SimError> {
        let sim = &self.config.simulation;
        let arb = &self.config.arbitrage;

        let secondary = self.chain.dex(SECONDARY_POOL, sim.fee_numerator, sim.fee_denominator).await;
        let (seed_a, seed_b) = (to_wei(arb.second_pool_seed_a), to_wei(arb.second_pool_seed_b));
        self.chain.mint(SECONDARY_LIQUIDITY_PROVIDER, Token::A, seed_a).await;
        self.chain.mint(SECONDARY_LIQUIDITY_PROVIDER, Token::B, seed_b).await;
        let seed = Action::AddLiquidity { amount_a: seed_a, amount_b: seed_b };
        secondary.submit(&Operation::new(SECONDARY_LIQUIDITY_PROVIDER, seed)).await?;

        self.chain.mint(ARBITRAGE_ADDRESS, Token::A, to_wei(arb.funding_a)).await;
        self.chain.mint(ARBITRAGE_ADDRESS, Token::B, to_wei(arb.funding_b)).await;
        let contract = Arc::new(SandboxArbitrage::new(
            self.chain.clone(),
            ARBITRAGE_ADDRESS,
            [PRIMARY_POOL, SECONDARY_POOL],
            to_wei(arb.initial_threshold),
        ));

        let runner = ArbitrageScenarioRunner::new(
            contract,
            reader,
            [PRIMARY_POOL, SECONDARY_POOL],
            sim.fee_numerator,
            sim.fee_denominator,
        );
        let trials = runner
            .run_all(
                to_wei(arb.trial_amount_a),
                to_wei(arb.trial_amount_b),
                to_wei(arb.high_threshold),
            )
            .await?;
        for trial in &trials {
            tracing::info!(
                scenario = ?trial.scenario,
                executed = trial.executed,
                expectation_met = trial.expectation_met,
                "Arbitrage trial finished."
            );
        }
        Ok(trials)
    }
}
