use crate::arbitrage::ArbitrageTrial;
use crate::ledger::AccountView;
use crate::metrics::StepRecord;
use alloy_primitives::{Address, U256};
use serde::{Serialize, Serializer};

/// A 1e18-scaled amount, serialized as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Wei(pub U256);

impl Serialize for Wei {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// `serialize_with` helpers for plain `U256` fields.
pub mod wei {
    use super::Wei;
    use alloy_primitives::U256;
    use serde::{Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn option<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
        value.map(Wei).serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub account: Address,
    #[serde(serialize_with = "wei::serialize")]
    pub balance_a: U256,
    #[serde(serialize_with = "wei::serialize")]
    pub balance_b: U256,
    #[serde(serialize_with = "wei::serialize")]
    pub lp_balance: U256,
}

impl From<AccountView> for AccountSummary {
    fn from(view: AccountView) -> Self {
        Self {
            account: view.id,
            balance_a: view.balance_a,
            balance_b: view.balance_b,
            lp_balance: view.lp_shares,
        }
    }
}

/// Aggregates queried once the run completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalState {
    #[serde(serialize_with = "wei::serialize")]
    pub reserve_a: U256,
    #[serde(serialize_with = "wei::serialize")]
    pub reserve_b: U256,
    #[serde(serialize_with = "wei::serialize")]
    pub lp_total_supply: U256,
    pub accounts: Vec<AccountSummary>,
}

/// The persisted result: named sequences with one entry per completed step, plus
/// final aggregates and arbitrage trial records. `null` entries mean "not applicable".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsBundle {
    pub steps_requested: usize,
    pub cancelled: bool,
    pub timestamps: Vec<u64>,
    pub actions: Vec<&'static str>,
    pub success: Vec<bool>,
    pub failures: Vec<Option<String>>,
    pub reserves_a: Vec<Wei>,
    pub reserves_b: Vec<Wei>,
    /// B per A, scaled by 1e18.
    pub spot_prices: Vec<Option<Wei>>,
    pub cumulative_swap_volume_a: Vec<Wei>,
    pub cumulative_swap_volume_b: Vec<Wei>,
    pub cumulative_fees_a: Vec<Wei>,
    pub cumulative_fees_b: Vec<Wei>,
    pub fees: Vec<Option<Wei>>,
    /// Percent scaled by 1e18.
    pub slippages: Vec<Option<Wei>>,
    pub execution_deviations: Vec<Option<Wei>>,
    pub lp_accounts: Vec<Address>,
    pub lp_distribution_snapshots: Vec<Option<Vec<Wei>>>,
    pub final_state: Option<FinalState>,
    pub arbitrage_trials: Vec<ArbitrageTrial>,
}

impl MetricsBundle {
    pub fn new(
        steps_requested: usize,
        cancelled: bool,
        lp_accounts: Vec<Address>,
        records: &[StepRecord],
        final_state: Option<FinalState>,
    ) -> Self {
        let wei_column = |f: fn(&StepRecord) -> U256| records.iter().map(|r| Wei(f(r))).collect::<Vec<_>>();

        Self {
            steps_requested,
            cancelled,
            timestamps: records.iter().map(|r| r.timestamp).collect(),
            actions: records.iter().map(|r| r.action.label()).collect(),
            success: records.iter().map(|r| r.success).collect(),
            failures: records.iter().map(|r| r.failure.as_ref().map(|f| f.to_string())).collect(),
            reserves_a: wei_column(|r| r.reserve_a),
            reserves_b: wei_column(|r| r.reserve_b),
            spot_prices: records.iter().map(|r| r.spot_price.map(Wei)).collect(),
            cumulative_swap_volume_a: wei_column(|r| r.cumulative.volume_in_a),
            cumulative_swap_volume_b: wei_column(|r| r.cumulative.volume_in_b),
            cumulative_fees_a: wei_column(|r| r.cumulative.fees_a),
            cumulative_fees_b: wei_column(|r| r.cumulative.fees_b),
            fees: records.iter().map(|r| r.fee.map(Wei)).collect(),
            slippages: records.iter().map(|r| r.slippage_pct().map(Wei)).collect(),
            execution_deviations: records
                .iter()
                .map(|r| r.swap.map(|s| Wei(s.execution_deviation_pct)))
                .collect(),
            lp_accounts,
            lp_distribution_snapshots: records
                .iter()
                .map(|r| r.lp_snapshot.as_ref().map(|s| s.iter().copied().map(Wei).collect()))
                .collect(),
            final_state,
            arbitrage_trials: Vec::new(),
        }
    }

    pub fn with_arbitrage_trials(mut self, trials: Vec<ArbitrageTrial>) -> Self {
        self.arbitrage_trials = trials;
        self
    }

    /// Number of step rows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
