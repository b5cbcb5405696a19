use crate::errors::StepFailure;
use crate::metrics::{CumulativeCounters, StepRecord, SwapMetrics};
use crate::policy::Action;
use crate::pool::ConstantProductPool;
use alloy_primitives::{Address, U256};

/// Append-only store of step records plus the running totals they are derived from.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    tracked: Vec<Address>,
    records: Vec<StepRecord>,
    counters: CumulativeCounters,
    last_pool: ConstantProductPool,
    last_timestamp: Option<u64>,
}

impl MetricsRecorder {
    pub fn new(tracked: Vec<Address>, initial_pool: ConstantProductPool) -> Self {
        Self {
            tracked,
            records: Vec::new(),
            counters: CumulativeCounters::default(),
            last_pool: initial_pool,
            last_timestamp: None,
        }
    }

    pub fn tracked(&self) -> &[Address] {
        &self.tracked
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn counters(&self) -> CumulativeCounters {
        self.counters
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records a step whose operation the execution environment confirmed.
    #[allow(clippy::too_many_arguments)]
    pub fn record_executed(
        &mut self,
        step: usize,
        timestamp: u64,
        account: Address,
        action: Action,
        pre_trade: &ConstantProductPool,
        post_trade: &ConstantProductPool,
        amount_out: Option<U256>,
        lp_snapshot: Option<Vec<U256>>,
    ) -> &StepRecord {
        let mut fee = None;
        let mut swap = None;

        if let Action::Swap { token_in, amount_in } = action {
            match pre_trade.implied_fee(amount_in) {
                Ok(fee_amount) => match self.counters.with_swap(token_in, amount_in, fee_amount) {
                    Ok(next) => {
                        self.counters = next;
                        fee = Some(fee_amount);
                    }
                    Err(e) => tracing::warn!(step, "Cumulative counters overflowed: {}", e),
                },
                Err(e) => tracing::warn!(step, "Could not derive swap fee: {}", e),
            }

            match amount_out {
                Some(amount_out) => match SwapMetrics::compute(pre_trade, token_in, amount_in, amount_out) {
                    Ok(metrics) => swap = Some(metrics),
                    Err(e) => tracing::warn!(step, "Could not derive swap metrics: {}", e),
                },
                None => tracing::warn!(step, "Swap confirmed without a reported output amount."),
            }
        }

        self.last_pool = *post_trade;
        self.last_timestamp = Some(timestamp);
        self.push(StepRecord {
            step,
            timestamp,
            account: Some(account),
            action,
            success: true,
            failure: None,
            reserve_a: post_trade.reserve_a,
            reserve_b: post_trade.reserve_b,
            spot_price: recorded_price(step, post_trade),
            fee,
            swap,
            cumulative: self.counters,
            lp_snapshot,
        })
    }

    /// Records a step where the policy chose not to act.
    pub fn record_noop(
        &mut self,
        step: usize,
        timestamp: u64,
        account: Address,
        pool: &ConstantProductPool,
        lp_snapshot: Option<Vec<U256>>,
    ) -> &StepRecord {
        self.last_pool = *pool;
        self.last_timestamp = Some(timestamp);
        self.push(StepRecord {
            step,
            timestamp,
            account: Some(account),
            action: Action::NoOp,
            success: true,
            failure: None,
            reserve_a: pool.reserve_a,
            reserve_b: pool.reserve_b,
            spot_price: recorded_price(step, pool),
            fee: None,
            swap: None,
            cumulative: self.counters,
            lp_snapshot,
        })
    }

    /// Records a step that contributed nothing. Reserves and counters carry forward.
    pub fn record_failed(
        &mut self,
        step: usize,
        account: Option<Address>,
        action: Action,
        failure: StepFailure,
    ) -> &StepRecord {
        let timestamp = self.last_timestamp.map_or(0, |t| t + 1);
        self.last_timestamp = Some(timestamp);
        let pool = self.last_pool;
        self.push(StepRecord {
            step,
            timestamp,
            account,
            action,
            success: false,
            failure: Some(failure),
            reserve_a: pool.reserve_a,
            reserve_b: pool.reserve_b,
            spot_price: recorded_price(step, &pool),
            fee: None,
            swap: None,
            cumulative: self.counters,
            lp_snapshot: None,
        })
    }

    pub fn into_parts(self) -> (Vec<Address>, Vec<StepRecord>, CumulativeCounters) {
        (self.tracked, self.records, self.counters)
    }

    fn push(&mut self, record: StepRecord) -> &StepRecord {
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }
}

/// Spot price for a row. A price that does not fit 256 bits is logged and left out of the row.
fn recorded_price(step: usize, pool: &ConstantProductPool) -> Option<U256> {
    match pool.spot_price() {
        Ok(price) => price,
        Err(e) => {
            tracing::warn!(step, "Spot price not representable: {}", e);
            None
        }
    }
}
