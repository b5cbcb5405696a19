pub mod bundle;
pub mod recorder;

pub use bundle::{AccountSummary, FinalState, MetricsBundle, Wei};
pub use recorder::MetricsRecorder;

use crate::errors::{ArithmeticError, StepFailure};
use crate::math::fixed_point::{self, PERCENT_SCALE, SCALE};
use crate::policy::Action;
use crate::pool::{ConstantProductPool, Token};
use alloy_primitives::{Address, U256};

/// Running totals, threaded through the step loop by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CumulativeCounters {
    pub volume_in_a: U256,
    pub volume_in_b: U256,
    pub fees_a: U256,
    pub fees_b: U256,
}

impl CumulativeCounters {
    pub fn volume_in(&self, token: Token) -> U256 {
        match token {
            Token::A => self.volume_in_a,
            Token::B => self.volume_in_b,
        }
    }

    pub fn fees(&self, token: Token) -> U256 {
        match token {
            Token::A => self.fees_a,
            Token::B => self.fees_b,
        }
    }

    /// Counters after a confirmed swap of `amount_in` of `token_in` that paid `fee`.
    pub fn with_swap(self, token_in: Token, amount_in: U256, fee: U256) -> Result<Self, ArithmeticError> {
        let mut next = self;
        match token_in {
            Token::A => {
                next.volume_in_a = fixed_point::checked_add(self.volume_in_a, amount_in)?;
                next.fees_a = fixed_point::checked_add(self.fees_a, fee)?;
            }
            Token::B => {
                next.volume_in_b = fixed_point::checked_add(self.volume_in_b, amount_in)?;
                next.fees_b = fixed_point::checked_add(self.fees_b, fee)?;
            }
        }
        Ok(next)
    }
}

/// `|expected - actual| * 100 * 1e18 / expected`; an `expected` of zero yields zero.
pub fn deviation_pct(expected: U256, actual: U256) -> Result<U256, ArithmeticError> {
    if expected.is_zero() {
        return Ok(U256::ZERO);
    }
    fixed_point::mul_div(fixed_point::abs_diff(expected, actual), PERCENT_SCALE, expected)
}

/// Derived metrics of one confirmed swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapMetrics {
    pub token_in: Token,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee: U256,
    /// Spot price of `token_in` in the other token, read before submission.
    pub expected_price: U256,
    /// `amount_out * 1e18 / amount_in`, in the same direction as `expected_price`.
    pub realized_price: U256,
    /// Percent scaled by 1e18.
    pub slippage_pct: U256,
    /// Output the pool model predicted from the pre-trade snapshot.
    pub quoted_amount_out: U256,
    /// Relative gap between realized and quoted output, percent scaled by 1e18.
    pub execution_deviation_pct: U256,
}

impl SwapMetrics {
    pub fn compute(
        pre_trade: &ConstantProductPool,
        token_in: Token,
        amount_in: U256,
        amount_out: U256,
    ) -> Result<Self, ArithmeticError> {
        if amount_in.is_zero() {
            return Err(ArithmeticError::ZeroAmount);
        }
        let expected_price = pre_trade.price_of(token_in)?.unwrap_or(U256::ZERO);
        let realized_price = fixed_point::mul_div(amount_out, SCALE, amount_in)?;
        let quoted_amount_out = pre_trade.quote_swap_output(token_in, amount_in)?;

        Ok(Self {
            token_in,
            amount_in,
            amount_out,
            fee: pre_trade.implied_fee(amount_in)?,
            expected_price,
            realized_price,
            slippage_pct: deviation_pct(expected_price, realized_price)?,
            quoted_amount_out,
            execution_deviation_pct: deviation_pct(quoted_amount_out, amount_out)?,
        })
    }
}

/// One row of the simulation's time series. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: usize,
    pub timestamp: u64,
    pub account: Option<Address>,
    pub action: Action,
    pub success: bool,
    pub failure: Option<StepFailure>,
    pub reserve_a: U256,
    pub reserve_b: U256,
    /// B per A, scaled by 1e18; `None` when the pool is empty.
    pub spot_price: Option<U256>,
    /// Fee retained by the pool, only for confirmed swaps.
    pub fee: Option<U256>,
    pub swap: Option<SwapMetrics>,
    pub cumulative: CumulativeCounters,
    /// LP balances of the tracked accounts, `None` when the step failed or the read failed.
    pub lp_snapshot: Option<Vec<U256>>,
}

impl StepRecord {
    /// `None` means "not applicable", distinct from a measured zero.
    pub fn slippage_pct(&self) -> Option<U256> {
        self.swap.map(|s| s.slippage_pct)
    }
}
