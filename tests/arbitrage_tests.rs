use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use dexsim::{
    Token,
    arbitrage::{ArbitrageScenario, ArbitrageScenarioRunner},
    client::{ArbitrageClient, ArbitrageOutcome, ExecutionClient, Operation},
    errors::{ExecutionError, QueryError},
    math::fixed_point::to_wei,
    policy::Action,
    sandbox::{SandboxArbitrage, SandboxChain, SandboxDex},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const POOL_ONE: Address = Address::repeat_byte(0x11);
const POOL_TWO: Address = Address::repeat_byte(0x12);
const PROVIDER: Address = Address::repeat_byte(0xa1);
const CONTRACT: Address = Address::repeat_byte(0xab);

async fn seeded_pool(chain: &SandboxChain, pool: Address, amount_a: u64, amount_b: u64) -> SandboxDex {
    let dex = chain.dex(pool, 3, 1000).await;
    chain.mint(PROVIDER, Token::A, to_wei(amount_a)).await;
    chain.mint(PROVIDER, Token::B, to_wei(amount_b)).await;
    let seed = Action::AddLiquidity { amount_a: to_wei(amount_a), amount_b: to_wei(amount_b) };
    dex.submit(&Operation::new(PROVIDER, seed)).await.unwrap();
    dex
}

async fn funded_chain(second_b: u64, funding: u64) -> (SandboxChain, Arc<SandboxDex>, Arc<SandboxArbitrage>) {
    let chain = SandboxChain::new();
    let reader = Arc::new(seeded_pool(&chain, POOL_ONE, 100, 200).await);
    seeded_pool(&chain, POOL_TWO, 100, second_b).await;
    chain.mint(CONTRACT, Token::A, to_wei(funding)).await;
    chain.mint(CONTRACT, Token::B, to_wei(funding)).await;

    let contract = Arc::new(SandboxArbitrage::new(chain.clone(), CONTRACT, [POOL_ONE, POOL_TWO], U256::ZERO));
    assert_eq!(contract.pools(), [POOL_ONE, POOL_TWO]);
    (chain, reader, contract)
}

async fn setup(
    second_b: u64,
) -> (SandboxChain, Arc<SandboxArbitrage>, ArbitrageScenarioRunner<SandboxArbitrage, SandboxDex>) {
    let (chain, reader, contract) = funded_chain(second_b, 10).await;
    let runner = ArbitrageScenarioRunner::new(contract.clone(), reader, [POOL_ONE, POOL_TWO], 3, 1000);
    (chain, contract, runner)
}

/// Arbitrage client whose threshold can no longer be read once someone tries to raise it.
struct LockedThreshold {
    inner: Arc<SandboxArbitrage>,
    raised: AtomicBool,
}

#[async_trait]
impl ArbitrageClient for LockedThreshold {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn try_execute(&self, amount_a: U256, amount_b: U256) -> Result<ArbitrageOutcome, ExecutionError> {
        self.inner.try_execute(amount_a, amount_b).await
    }

    async fn set_min_profit_threshold(&self, _value: U256) -> Result<(), ExecutionError> {
        self.raised.store(true, Ordering::SeqCst);
        Err(ExecutionError::Rejected("owner only".to_string()))
    }

    async fn min_profit_threshold(&self) -> Result<U256, QueryError> {
        if self.raised.load(Ordering::SeqCst) {
            return Err(QueryError::Unavailable("threshold slot".to_string()));
        }
        self.inner.min_profit_threshold().await
    }
}

#[tokio::test]
async fn test_price_gap_is_arbitraged() {
    let (chain, _, runner) = setup(300).await;
    let trial = runner.run_profitable(to_wei(1), to_wei(1)).await.unwrap();

    assert_eq!(trial.scenario, ArbitrageScenario::Profitable);
    assert!(trial.expected_execution);
    assert!(trial.executed);
    assert!(trial.expectation_met);

    let execution = trial.execution.expect("execution details");
    let predicted = trial.predicted.expect("prediction");
    assert_eq!(execution.end_amount, predicted.end_amount);
    assert_eq!(trial.profit, Some(execution.profit));

    let after = trial.after.expect("post-trial snapshot");
    let gap_before = trial.before.pools[1].spot_price.unwrap() - trial.before.pools[0].spot_price.unwrap();
    let gap_after = after.pools[1].spot_price.unwrap() - after.pools[0].spot_price.unwrap();
    assert!(gap_after < gap_before);
    assert_eq!(
        chain.balance(CONTRACT, execution.start_token).await,
        to_wei(10) + execution.profit
    );
}

#[tokio::test]
async fn test_high_threshold_blocks_execution() {
    let (chain, contract, runner) = setup(300).await;
    let trial = runner.run_threshold_gate(to_wei(1000), to_wei(1), to_wei(1)).await.unwrap();

    assert_eq!(contract.min_profit_threshold().await.unwrap(), to_wei(1000));
    assert_eq!(trial.min_profit_threshold, to_wei(1000));
    assert!(!trial.expected_execution);
    assert!(!trial.executed);
    assert!(trial.expectation_met);
    assert!(trial.profit.is_none());
    assert_eq!(chain.balance(CONTRACT, Token::A).await, to_wei(10));
    assert_eq!(chain.balance(CONTRACT, Token::B).await, to_wei(10));
}

#[tokio::test]
async fn test_aligned_pools_do_not_execute() {
    let (_, _, runner) = setup(200).await;
    let trial = runner.run_profitable(to_wei(1), to_wei(1)).await.unwrap();
    assert!(!trial.expected_execution);
    assert!(!trial.executed);
    assert!(trial.expectation_met);
}

#[tokio::test]
async fn test_run_all_records_both_scenarios() {
    let (_, _, runner) = setup(300).await;
    let trials = runner.run_all(to_wei(1), to_wei(1), to_wei(1000)).await.unwrap();
    assert_eq!(trials.len(), 2);
    assert_eq!(trials[0].scenario, ArbitrageScenario::Profitable);
    assert!(trials[0].executed);
    assert_eq!(trials[1].scenario, ArbitrageScenario::ThresholdGate);
    assert!(!trials[1].executed);

    let json = serde_json::to_value(&trials).unwrap();
    assert!(json[1]["minProfitThreshold"].is_string());
}

#[tokio::test]
async fn test_trial_is_bounded_by_shallow_pool() {
    let (_, _, runner) = setup(300).await;
    let trial = runner.run_profitable(to_wei(50), to_wei(50)).await.unwrap();
    assert_eq!(trial.amount_a_tried, to_wei(10));
    assert_eq!(trial.amount_b_tried, to_wei(20));
}

#[tokio::test]
async fn test_unfunded_contract_records_error() {
    let (_, _, runner) = setup(300).await;
    let trial = runner.run_profitable(to_wei(5), to_wei(15)).await.unwrap();
    assert!(!trial.executed);
    assert!(trial.error.is_some());
    assert!(!trial.expectation_met);
}

#[tokio::test]
async fn test_run_all_resubmits_identical_capped_trial() {
    let (_, reader, contract) = funded_chain(300, 100).await;
    let runner = ArbitrageScenarioRunner::new(contract, reader, [POOL_ONE, POOL_TWO], 3, 1000);
    let trials = runner.run_all(to_wei(50), to_wei(50), to_wei(1000)).await.unwrap();

    assert_eq!(trials.len(), 2);
    assert!(trials[0].executed);
    assert_ne!(trials[1].before.pools, trials[0].before.pools);
    assert_eq!(trials[0].amount_a_tried, to_wei(10));
    assert_eq!(trials[0].amount_b_tried, to_wei(20));
    assert_eq!(trials[1].amount_a_tried, trials[0].amount_a_tried);
    assert_eq!(trials[1].amount_b_tried, trials[0].amount_b_tried);
    assert!(!trials[1].executed);
}

#[tokio::test]
async fn test_run_all_keeps_first_trial_when_gate_fails() {
    let (_, reader, contract) = funded_chain(300, 10).await;
    let client = Arc::new(LockedThreshold { inner: contract, raised: AtomicBool::new(false) });
    let runner = ArbitrageScenarioRunner::new(client, reader, [POOL_ONE, POOL_TWO], 3, 1000);
    let trials = runner.run_all(to_wei(1), to_wei(1), to_wei(1000)).await.unwrap();

    assert_eq!(trials.len(), 1);
    assert_eq!(trials[0].scenario, ArbitrageScenario::Profitable);
    assert!(trials[0].executed);
}
