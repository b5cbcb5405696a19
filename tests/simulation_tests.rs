use alloy_primitives::{Address, U256};
use dexsim::{
    EngineSettings, SimError, SimulationEngine, SimulationReport, Token,
    client::{ExecutionClient, Operation, ResultSink, StateReader},
    config::SimulationConfig,
    errors::{SetupPhase, StepFailure},
    math::fixed_point::to_wei,
    policy::{Action, ActionPolicy},
    sandbox::{SandboxChain, SandboxDex},
    sink::MemorySink,
};
use std::sync::Arc;

const POOL: Address = Address::repeat_byte(0x11);

async fn sandbox(config: &SimulationConfig) -> (SandboxChain, Arc<SandboxDex>, EngineSettings) {
    let chain = SandboxChain::new();
    let (funding_a, funding_b) = config.funding();
    for participant in config.participant_addresses() {
        chain.mint(participant, Token::A, funding_a).await;
        chain.mint(participant, Token::B, funding_b).await;
    }
    let dex = Arc::new(chain.dex(POOL, config.fee_numerator, config.fee_denominator).await);
    let settings = config.engine_settings(POOL).unwrap();
    (chain, dex, settings)
}

async fn run(config: &SimulationConfig) -> SimulationReport {
    let (_, dex, settings) = sandbox(config).await;
    SimulationEngine::new(settings, dex.clone(), dex).run().await.unwrap()
}

fn config(steps: usize, participants: usize) -> SimulationConfig {
    SimulationConfig { steps, participants, ..Default::default() }
}

#[tokio::test]
async fn test_reference_run_records_every_step() {
    let report = run(&SimulationConfig::default()).await;
    assert_eq!(report.records.len(), 75);
    assert!(!report.cancelled);

    let bundle = report.to_bundle();
    assert_eq!(bundle.len(), 75);
    assert_eq!(bundle.reserves_a.len(), 75);
    assert_eq!(bundle.lp_distribution_snapshots.len(), 75);
    assert_eq!(bundle.lp_accounts.len(), 13);

    let final_state = report.final_state.expect("final state");
    assert_eq!(final_state.accounts.len(), 13);
    let last = report.records.last().unwrap();
    assert_eq!((final_state.reserve_a, final_state.reserve_b), (last.reserve_a, last.reserve_b));
}

#[tokio::test]
async fn test_same_seed_same_run() {
    let first = run(&config(30, 4)).await;
    let second = run(&config(30, 4)).await;
    assert_eq!(first.records, second.records);

    let other = run(&SimulationConfig { rng_seed: 7, ..config(30, 4) }).await;
    assert_ne!(first.records, other.records);
}

#[tokio::test]
async fn test_counters_track_confirmed_swaps() {
    let report = run(&config(50, 5)).await;
    let mut volume_a = U256::ZERO;
    let mut volume_b = U256::ZERO;
    for record in report.records.iter().filter(|r| r.success) {
        if let Action::Swap { token_in, amount_in } = record.action {
            match token_in {
                Token::A => volume_a += amount_in,
                Token::B => volume_b += amount_in,
            }
            let swap = record.swap.expect("swap metrics");
            assert_eq!(swap.execution_deviation_pct, U256::ZERO);
            assert!(record.fee.is_some());
        } else {
            assert!(record.slippage_pct().is_none());
            assert!(record.fee.is_none());
        }
        assert_eq!(record.cumulative.volume_in_a, volume_a);
        assert_eq!(record.cumulative.volume_in_b, volume_b);
    }
    assert_eq!(report.counters.volume_in_a, volume_a);
}

#[tokio::test]
async fn test_rejected_submissions_still_yield_rows() {
    let config = config(20, 3);
    let (chain, dex, settings) = sandbox(&config).await;
    // submission 0 seeds the pool
    for index in 1..=3 {
        chain.reject_submission(index).await;
    }
    let report = SimulationEngine::new(settings, dex.clone(), dex).run().await.unwrap();

    assert_eq!(report.records.len(), 20);
    assert!(report.failed_steps() >= 3);
    for (i, record) in report.records.iter().enumerate().filter(|(_, r)| !r.success) {
        assert!(matches!(record.failure, Some(StepFailure::Execution(_))));
        assert!(record.lp_snapshot.is_none());
        assert!(record.fee.is_none());
        if i > 0 {
            let previous = &report.records[i - 1];
            assert_eq!(record.timestamp, previous.timestamp + 1);
            assert_eq!(record.reserve_a, previous.reserve_a);
            assert_eq!(record.cumulative, previous.cumulative);
        } else {
            assert_eq!(record.timestamp, 0);
        }
    }
}

#[tokio::test]
async fn test_unreadable_participant_fails_its_steps_only() {
    let config = config(25, 2);
    let (chain, dex, settings) = sandbox(&config).await;
    let unreadable = settings.participants[1];
    chain.fail_reads_for(unreadable).await;

    let report = SimulationEngine::new(settings, dex.clone(), dex).run().await.unwrap();
    assert_eq!(report.records.len(), 25);
    for record in &report.records {
        if record.account == Some(unreadable) {
            assert!(!record.success);
            assert!(matches!(record.failure, Some(StepFailure::Query(_))));
            assert_eq!(record.action, Action::NoOp);
        }
    }
    // final balances include the unreadable participant, so the summary is dropped
    assert!(report.final_state.is_none());
}

#[tokio::test]
async fn test_unfunded_seeder_aborts_setup() {
    let config = config(10, 2);
    let chain = SandboxChain::new();
    let dex = Arc::new(chain.dex(POOL, 3, 1000).await);
    let settings = config.engine_settings(POOL).unwrap();

    let err = SimulationEngine::new(settings, dex.clone(), dex).run().await.unwrap_err();
    assert!(matches!(err, SimError::Setup { phase: SetupPhase::Funding, .. }));
}

#[tokio::test]
async fn test_rejected_seed_aborts_setup() {
    let config = config(10, 2);
    let (chain, dex, settings) = sandbox(&config).await;
    chain.reject_submission(0).await;

    let err = SimulationEngine::new(settings, dex.clone(), dex).run().await.unwrap_err();
    assert!(matches!(err, SimError::Setup { phase: SetupPhase::SeedLiquidity, .. }));
}

#[tokio::test]
async fn test_existing_pool_is_topped_up_at_ratio() {
    let config = config(5, 2);
    let (chain, dex, settings) = sandbox(&config).await;
    let outsider = Address::repeat_byte(0xee);
    chain.mint(outsider, Token::A, to_wei(100)).await;
    chain.mint(outsider, Token::B, to_wei(150)).await;
    let seed = Action::AddLiquidity { amount_a: to_wei(100), amount_b: to_wei(150) };
    dex.submit(&Operation::new(outsider, seed)).await.unwrap();

    let seeder = settings.seeder().unwrap();
    let report = SimulationEngine::new(settings, dex.clone(), dex.clone()).run().await.unwrap();
    assert_eq!(report.records.len(), 5);
    assert!(dex.get_lp_balance(seeder).await.unwrap() > U256::ZERO);
}

#[tokio::test]
async fn test_stop_handle_ends_run_early() {
    let config = config(10, 2);
    let (_, dex, settings) = sandbox(&config).await;
    let engine = SimulationEngine::new(settings, dex.clone(), dex);
    engine.stop_handle().stop();

    let report = engine.run().await.unwrap();
    assert!(report.cancelled);
    assert!(report.records.is_empty());
    assert_eq!(report.to_bundle().steps_requested, 10);
}

#[tokio::test]
async fn test_bundle_reaches_sink() {
    let report = run(&config(8, 3)).await;
    let sink = MemorySink::new();
    sink.store(&report.to_bundle()).await.unwrap();

    assert_eq!(sink.bundles().await.len(), 1);
    let stored = sink.last().await.expect("stored bundle");
    assert_eq!(stored.len(), 8);
    let json = serde_json::to_value(&stored).unwrap();
    assert!(json["reservesA"][0].is_string());
    assert_eq!(json["timestamps"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn test_swap_only_policy_never_touches_liquidity() {
    let config = config(20, 3);
    let (_, dex, settings) = sandbox(&config).await;
    let policy = ActionPolicy { add_threshold: 0.0, remove_threshold: 0.0, ..Default::default() };

    let report = SimulationEngine::new(settings, dex.clone(), dex)
        .with_policy(policy)
        .run()
        .await
        .unwrap();
    assert_eq!(report.records.len(), 20);
    assert!(report.records.iter().all(|r| matches!(r.action, Action::Swap { .. } | Action::NoOp)));
    assert!(report.records.iter().any(|r| r.success && matches!(r.action, Action::Swap { .. })));
}
