use crate::engine::EngineSettings;
use crate::errors::SimError;
use crate::math::fixed_point::to_wei;
use alloy_primitives::{Address, U256};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "dexsim.yaml";
const ENV_PREFIX: &str = "DEXSIM_";

/// Random-trading run parameters. Token amounts are whole tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub steps: usize,
    pub rng_seed: u64,
    /// Number of participants. Participant 0 seeds the pool.
    pub participants: usize,
    /// Participant indices whose LP balances are snapshotted each step. `None` tracks everyone.
    pub tracked: Option<Vec<usize>>,
    pub fee_numerator: u64,
    pub fee_denominator: u64,
    pub seed_amount_a: u64,
    pub seed_amount_b: u64,
    /// Tokens minted to every participant before the run.
    pub funding_a: u64,
    pub funding_b: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps: 75,
            rng_seed: 42,
            participants: 13,
            tracked: None,
            fee_numerator: 3,
            fee_denominator: 1000,
            seed_amount_a: 100,
            seed_amount_b: 200,
            funding_a: 100,
            funding_b: 200,
        }
    }
}

/// Two-pool arbitrage trial parameters. Token amounts are whole tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrageConfig {
    pub enabled: bool,
    /// Reserves the second pool is seeded with; the first pool is the simulated one.
    pub second_pool_seed_a: u64,
    pub second_pool_seed_b: u64,
    pub funding_a: u64,
    pub funding_b: u64,
    pub trial_amount_a: u64,
    pub trial_amount_b: u64,
    pub initial_threshold: u64,
    pub high_threshold: u64,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            second_pool_seed_a: 100,
            second_pool_seed_b: 300,
            funding_a: 10,
            funding_b: 10,
            trial_amount_a: 1,
            trial_amount_b: 1,
            initial_threshold: 0,
            high_threshold: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    pub arbitrage: ArbitrageConfig,
    pub output_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            arbitrage: ArbitrageConfig::default(),
            output_path: PathBuf::from("simulation_metrics.json"),
        }
    }
}

impl AppConfig {
    /// Defaults, then `path` if it exists, then `DEXSIM_` environment variables
    /// (`__` separates nested keys, e.g. `DEXSIM_SIMULATION__STEPS`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        self.simulation.validate()?;
        self.arbitrage.validate()
    }
}

impl ArbitrageConfig {
    /// Checks only apply when the phase is enabled.
    pub fn validate(&self) -> Result<(), SimError> {
        if !self.enabled {
            return Ok(());
        }
        if self.second_pool_seed_a == 0 || self.second_pool_seed_b == 0 {
            return Err(SimError::Config("second pool must be seeded with both tokens".to_string()));
        }
        if self.trial_amount_a == 0 || self.trial_amount_b == 0 {
            return Err(SimError::Config("arbitrage trial amounts must be greater than zero".to_string()));
        }
        Ok(())
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.steps == 0 {
            return Err(SimError::Config("steps must be greater than zero".to_string()));
        }
        if self.fee_denominator == 0 {
            return Err(SimError::Config("fee denominator cannot be zero".to_string()));
        }
        if self.fee_numerator >= self.fee_denominator {
            return Err(SimError::Config("fee numerator must be below the denominator".to_string()));
        }
        if self.participants == 0 {
            return Err(SimError::Config("at least one participant is required".to_string()));
        }
        if let Some(index) = self.tracked.iter().flatten().find(|i| **i >= self.participants) {
            return Err(SimError::Config(format!("tracked participant {index} does not exist")));
        }
        Ok(())
    }

    pub fn participant_addresses(&self) -> Vec<Address> {
        (0..self.participants).map(participant_address).collect()
    }

    /// Resolves the config into engine settings for `pool`.
    pub fn engine_settings(&self, pool: Address) -> Result<EngineSettings, SimError> {
        self.validate()?;
        let participants = self.participant_addresses();
        let tracked = match &self.tracked {
            Some(indices) => indices.iter().map(|i| participants[*i]).collect(),
            None => participants.clone(),
        };
        Ok(EngineSettings {
            pool,
            steps: self.steps,
            rng_seed: self.rng_seed,
            fee_numerator: self.fee_numerator,
            fee_denominator: self.fee_denominator,
            participants,
            tracked,
            seed_amount_a: to_wei(self.seed_amount_a),
            seed_amount_b: to_wei(self.seed_amount_b),
        })
    }

    pub fn funding(&self) -> (U256, U256) {
        (to_wei(self.funding_a), to_wei(self.funding_b))
    }
}

/// Deterministic address of the `index`-th participant.
pub fn participant_address(index: usize) -> Address {
    Address::left_padding_from(&(index as u64 + 1).to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_match_reference_experiment() {
        let config = AppConfig::default();
        assert_eq!(config.simulation.steps, 75);
        assert_eq!(config.simulation.participants, 13);
        assert_eq!(config.arbitrage.high_threshold, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_fee() {
        let config = SimulationConfig { fee_numerator: 1000, ..Default::default() };
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
        let config = SimulationConfig { fee_denominator: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_tracked_participant() {
        let config = SimulationConfig { participants: 3, tracked: Some(vec![0, 3]), ..Default::default() };
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_arbitrage_setup() {
        let config = AppConfig {
            arbitrage: ArbitrageConfig { second_pool_seed_a: 0, ..Default::default() },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SimError::Config(_))));

        let config = AppConfig {
            arbitrage: ArbitrageConfig { trial_amount_b: 0, ..Default::default() },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SimError::Config(_))));

        let config = AppConfig {
            arbitrage: ArbitrageConfig { enabled: false, second_pool_seed_a: 0, trial_amount_a: 0, ..Default::default() },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_zero_trial_amount_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("DEXSIM_ARBITRAGE__TRIAL_AMOUNT_A", "0");
            assert!(matches!(AppConfig::load("dexsim.yaml"), Err(SimError::Config(_))));
            Ok(())
        });
    }

    #[test]
    fn test_engine_settings_resolve_tracked_subset() {
        let config = SimulationConfig { participants: 4, tracked: Some(vec![1, 3]), ..Default::default() };
        let settings = config.engine_settings(Address::ZERO).unwrap();
        assert_eq!(settings.participants.len(), 4);
        assert_eq!(settings.tracked, vec![participant_address(1), participant_address(3)]);
        assert_eq!(settings.seeder(), Some(participant_address(0)));
        assert_eq!(settings.seed_amount_b, to_wei(200));
    }

    #[test]
    fn test_load_merges_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file("dexsim.yaml", "simulation:\n  steps: 10\n  participants: 5\n")?;
            jail.set_env("DEXSIM_SIMULATION__RNG_SEED", "7");
            let config = AppConfig::load("dexsim.yaml").map_err(|e| e.to_string())?;
            assert_eq!(config.simulation.steps, 10);
            assert_eq!(config.simulation.participants, 5);
            assert_eq!(config.simulation.rng_seed, 7);
            assert_eq!(config.simulation.fee_denominator, 1000);
            Ok(())
        });
    }
}
