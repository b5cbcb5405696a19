use crate::client::{ExecutionClient, Operation, StateReader};
use crate::errors::{ArithmeticError, ExecutionError, SetupPhase, SimError, StepFailure};
use crate::ledger::{self, AccountView};
use crate::math::utils::from_wei;
use crate::metrics::{AccountSummary, CumulativeCounters, FinalState, MetricsBundle, MetricsRecorder, StepRecord};
use crate::policy::{Action, ActionPolicy, PolicyDraw};
use crate::pool::ConstantProductPool;
use alloy_primitives::{Address, U256};
use futures::future::try_join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Resolved parameters of one simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub pool: Address,
    pub steps: usize,
    pub rng_seed: u64,
    pub fee_numerator: u64,
    pub fee_denominator: u64,
    /// Participants eligible for selection. The first one seeds the pool.
    pub participants: Vec<Address>,
    /// Participants whose LP balances are snapshotted after every step.
    pub tracked: Vec<Address>,
    pub seed_amount_a: U256,
    pub seed_amount_b: U256,
}

impl EngineSettings {
    pub fn seeder(&self) -> Option<Address> {
        self.participants.first().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Setup,
    Running { step: usize },
    Completed,
}

/// Requests a stop after the step in progress. Cloned handles share the flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a finished (or stopped) run produced.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub steps_requested: usize,
    pub cancelled: bool,
    pub tracked: Vec<Address>,
    pub records: Vec<StepRecord>,
    pub counters: CumulativeCounters,
    pub final_state: Option<FinalState>,
}

impl SimulationReport {
    pub fn failed_steps(&self) -> usize {
        self.records.iter().filter(|r| !r.success).count()
    }

    pub fn to_bundle(&self) -> MetricsBundle {
        MetricsBundle::new(
            self.steps_requested,
            self.cancelled,
            self.tracked.clone(),
            &self.records,
            self.final_state.clone(),
        )
    }
}

/// Drives the pool through a seeded random sequence of operations, one at a time.
///
/// Each step reads fresh state, asks the [`ActionPolicy`] for an action, submits it and
/// records the outcome. Setup failures abort the run; step failures are recorded and the
/// loop moves on.
pub struct SimulationEngine<C: ?Sized, R: ?Sized> {
    settings: EngineSettings,
    executor: Arc<C>,
    reader: Arc<R>,
    policy: ActionPolicy,
    rng: StdRng,
    stop: StopHandle,
    phase: EnginePhase,
    template: ConstantProductPool,
}

impl<C, R> SimulationEngine<C, R>
where
    C: ExecutionClient + ?Sized,
    R: StateReader + ?Sized,
{
    pub fn new(settings: EngineSettings, executor: Arc<C>, reader: Arc<R>) -> Self {
        let template = ConstantProductPool::new(
            U256::ZERO,
            U256::ZERO,
            settings.fee_numerator,
            settings.fee_denominator,
        );
        Self {
            rng: StdRng::seed_from_u64(settings.rng_seed),
            settings,
            executor,
            reader,
            policy: ActionPolicy::default(),
            stop: StopHandle::default(),
            phase: EnginePhase::Setup,
            template,
        }
    }

    pub fn with_policy(mut self, policy: ActionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shares an externally owned stop flag.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Runs setup, all steps, and the final aggregate queries.
    pub async fn run(mut self) -> Result<SimulationReport, SimError> {
        if self.settings.participants.is_empty() {
            return Err(SimError::Config("no participants configured".to_string()));
        }

        let initial_pool = self.setup().await?;
        let mut recorder = MetricsRecorder::new(self.settings.tracked.clone(), initial_pool);

        tracing::info!(steps = self.settings.steps, "Starting random transactions...");
        let mut cancelled = false;
        for step in 0..self.settings.steps {
            if self.stop.is_stopped() {
                tracing::warn!(step, "Stop requested, ending run early.");
                cancelled = true;
                break;
            }
            self.run_step(step, &mut recorder).await;
        }

        Ok(self.complete(recorder, cancelled).await)
    }

    /// Runs the final aggregate queries and closes the run. A failed query leaves the final
    /// state empty.
    async fn complete(&mut self, recorder: MetricsRecorder, cancelled: bool) -> SimulationReport {
        self.phase = EnginePhase::Completed;
        let final_state = match self.final_state().await {
            Ok(state) => {
                tracing::info!(
                    reserve_a = from_wei(state.reserve_a),
                    reserve_b = from_wei(state.reserve_b),
                    lp_total_supply = from_wei(state.lp_total_supply),
                    "Simulation complete."
                );
                Some(state)
            }
            Err(e) => {
                tracing::warn!("Failed to query final state: {}", e);
                None
            }
        };

        let (tracked, records, counters) = recorder.into_parts();
        SimulationReport {
            steps_requested: self.settings.steps,
            cancelled,
            tracked,
            records,
            counters,
            final_state,
        }
    }

    /// Seeds the pool from the designated participant. Any failure here is fatal.
    async fn setup(&mut self) -> Result<ConstantProductPool, SimError> {
        self.phase = EnginePhase::Setup;
        let seeder = self
            .settings
            .seeder()
            .ok_or_else(|| SimError::Config("no seeder participant".to_string()))?;

        let account = ledger::read_account(self.reader.as_ref(), seeder)
            .await
            .map_err(|e| SimError::setup(SetupPhase::Funding, e))?;
        let pool = self.read_pool().await.map_err(|e| SimError::setup(SetupPhase::Funding, e))?;

        let amount_a = self.settings.seed_amount_a;
        let amount_b = if pool.is_empty() {
            self.settings.seed_amount_b
        } else {
            pool.quote_co_deposit(amount_a)
                .map_err(|e| SimError::setup(SetupPhase::SeedLiquidity, e))?
        };

        if account.balance_a < amount_a || account.balance_b < amount_b {
            tracing::error!(
                ?seeder,
                needed_a = from_wei(amount_a),
                needed_b = from_wei(amount_b),
                "Seeder cannot fund initial liquidity."
            );
            return Err(SimError::setup(SetupPhase::Funding, ExecutionError::InsufficientBalance));
        }

        let operation = Operation::new(seeder, Action::AddLiquidity { amount_a, amount_b });
        self.executor
            .submit(&operation)
            .await
            .map_err(|e| SimError::setup(SetupPhase::SeedLiquidity, e))?;
        tracing::info!(?seeder, a = from_wei(amount_a), b = from_wei(amount_b), "Initial liquidity added.");

        let pool = self.read_pool().await.map_err(|e| SimError::setup(SetupPhase::Snapshot, e))?;
        if pool.is_empty() {
            return Err(SimError::setup(SetupPhase::Snapshot, ArithmeticError::EmptyPool));
        }
        Ok(pool)
    }

    async fn run_step(&mut self, step: usize, recorder: &mut MetricsRecorder) {
        self.phase = EnginePhase::Running { step };
        let participants = &self.settings.participants;
        let account_id = participants[self.rng.random_range(0..participants.len())];
        let draw = PolicyDraw::sample(&mut self.rng);

        let (pool, account) = match self.read_pre_state(account_id).await {
            Ok(state) => state,
            Err(failure) => {
                tracing::warn!(step, account = ?account_id, "Pre-state query failed: {}", failure);
                recorder.record_failed(step, Some(account_id), Action::NoOp, failure);
                return;
            }
        };

        let action = self.policy.decide(&pool, &account, &draw);
        tracing::debug!(step, account = ?account_id, ?action, "Action chosen.");

        if action.is_noop() {
            let timestamp = match self.reader.get_block_timestamp().await {
                Ok(timestamp) => timestamp,
                Err(e) => {
                    recorder.record_failed(step, Some(account_id), action, e.into());
                    return;
                }
            };
            let lp_snapshot = self.lp_snapshot(step).await;
            recorder.record_noop(step, timestamp, account_id, &pool, lp_snapshot);
            return;
        }

        let operation = Operation::new(account_id, action);
        let post = match self.executor.submit(&operation).await {
            Ok(post) => post,
            Err(e) => {
                tracing::error!(step, account = ?account_id, action = action.label(), "Transaction failed: {}", e);
                recorder.record_failed(step, Some(account_id), action, e.into());
                return;
            }
        };

        let post_pool = pool.with_reserves(post.reserve_a, post.reserve_b);
        if let Action::Swap { token_in, amount_in } = action {
            self.check_model(step, &pool, &post_pool, token_in, amount_in, post.amount_out);
        }

        let lp_snapshot = self.lp_snapshot(step).await;
        let record = recorder.record_executed(
            step,
            post.timestamp,
            account_id,
            action,
            &pool,
            &post_pool,
            post.amount_out,
            lp_snapshot,
        );
        if let Some(slippage) = record.slippage_pct() {
            tracing::info!(step, slippage_pct = from_wei(slippage), "Swap successful.");
        } else {
            tracing::info!(step, action = action.label(), "Transaction successful.");
        }
    }

    async fn read_pre_state(&self, account: Address) -> Result<(ConstantProductPool, AccountView), StepFailure> {
        let pool = self.read_pool().await?;
        let account = ledger::read_account(self.reader.as_ref(), account).await?;
        Ok((pool, account))
    }

    async fn read_pool(&self) -> Result<ConstantProductPool, crate::errors::QueryError> {
        ledger::read_pool(self.reader.as_ref(), self.settings.pool, &self.template).await
    }

    async fn lp_snapshot(&self, step: usize) -> Option<Vec<U256>> {
        match ledger::snapshot_lp_balances(self.reader.as_ref(), &self.settings.tracked).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(step, "LP snapshot failed: {}", e);
                None
            }
        }
    }

    /// Compares the confirmed swap against the pool model's prediction.
    fn check_model(
        &self,
        step: usize,
        pre: &ConstantProductPool,
        post: &ConstantProductPool,
        token_in: crate::pool::Token,
        amount_in: U256,
        amount_out: Option<U256>,
    ) {
        let simulation = match pre.simulate_swap(token_in, amount_in) {
            Ok(simulation) => simulation,
            Err(e) => {
                tracing::warn!(step, "Pool model could not quote confirmed swap: {}", e);
                return;
            }
        };
        if amount_out.is_some_and(|out| out != simulation.amount_out) {
            tracing::warn!(
                step,
                quoted = %simulation.amount_out,
                realized = ?amount_out,
                "Realized output diverges from the pool model."
            );
        }
        if !simulation.matches(post) {
            tracing::warn!(step, drift = %simulation.reserve_drift(post), "Post-swap reserves diverge from the pool model.");
        }
    }

    async fn final_state(&self) -> Result<FinalState, StepFailure> {
        let pool = self.read_pool().await?;
        let lp_total_supply = self.reader.get_lp_total_supply().await?;
        let reader = self.reader.as_ref();
        let accounts = try_join_all(
            self.settings
                .participants
                .iter()
                .map(|id| ledger::read_account(reader, *id)),
        )
        .await?;

        Ok(FinalState {
            reserve_a: pool.reserve_a,
            reserve_b: pool.reserve_b,
            lp_total_supply,
            accounts: accounts.into_iter().map(AccountSummary::from).collect(),
        })
    }
}

impl<C: ?Sized, R: ?Sized> Debug for SimulationEngine<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("settings", &self.settings)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::pool::Token;
    use crate::sandbox::SandboxChain;

    const POOL: Address = Address::repeat_byte(0x22);

    #[tokio::test]
    async fn test_phase_moves_from_setup_through_steps_to_completed() {
        let config = SimulationConfig { steps: 2, participants: 3, ..Default::default() };
        let chain = SandboxChain::new();
        let (funding_a, funding_b) = config.funding();
        for participant in config.participant_addresses() {
            chain.mint(participant, Token::A, funding_a).await;
            chain.mint(participant, Token::B, funding_b).await;
        }
        let dex = Arc::new(chain.dex(POOL, config.fee_numerator, config.fee_denominator).await);
        let mut engine = SimulationEngine::new(config.engine_settings(POOL).unwrap(), dex.clone(), dex);
        assert_eq!(engine.phase(), EnginePhase::Setup);

        let pool = engine.setup().await.unwrap();
        assert_eq!(engine.phase(), EnginePhase::Setup);

        let mut recorder = MetricsRecorder::new(engine.settings.tracked.clone(), pool);
        engine.run_step(0, &mut recorder).await;
        assert_eq!(engine.phase(), EnginePhase::Running { step: 0 });
        engine.run_step(1, &mut recorder).await;
        assert_eq!(engine.phase(), EnginePhase::Running { step: 1 });

        let report = engine.complete(recorder, false).await;
        assert_eq!(engine.phase(), EnginePhase::Completed);
        assert_eq!(report.records.len(), 2);
        assert!(report.final_state.is_some());
    }
}
