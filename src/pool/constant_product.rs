use crate::errors::ArithmeticError;
use crate::math::fixed_point::{self, SCALE};
use crate::math::full_math;
use crate::pool::{SwapSimulation, Token};
use alloy_primitives::{U256, U512};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FEE_NUMERATOR: u64 = 3;
pub const DEFAULT_FEE_DENOMINATOR: u64 = 1000;

/// Off-chain mirror of a constant-product pair (`reserve_a * reserve_b = k`) with a
/// proportional input fee.
///
/// The pool is a view: it is rebuilt from collaborator reads and never mutated to
/// track on-chain state. Every quote here must match the on-chain formula exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantProductPool {
    pub reserve_a: U256,
    pub reserve_b: U256,
    pub fee_numerator: U256,
    pub fee_denominator: U256,
}

impl Default for ConstantProductPool {
    fn default() -> Self {
        Self::new(U256::ZERO, U256::ZERO, DEFAULT_FEE_NUMERATOR, DEFAULT_FEE_DENOMINATOR)
    }
}

impl ConstantProductPool {
    pub fn new(reserve_a: U256, reserve_b: U256, fee_numerator: u64, fee_denominator: u64) -> Self {
        Self {
            reserve_a,
            reserve_b,
            fee_numerator: U256::from(fee_numerator),
            fee_denominator: U256::from(fee_denominator),
        }
    }

    /// Same fee parameters, fresh reserves.
    pub fn with_reserves(&self, reserve_a: U256, reserve_b: U256) -> Self {
        Self { reserve_a, reserve_b, ..*self }
    }

    /// A pool with a zero reserve on either side is empty, not "priced at zero".
    pub fn is_empty(&self) -> bool {
        self.reserve_a.is_zero() || self.reserve_b.is_zero()
    }

    pub fn reserve_of(&self, token: Token) -> U256 {
        match token {
            Token::A => self.reserve_a,
            Token::B => self.reserve_b,
        }
    }

    /// Returns `(reserve_in, reserve_out)` for a swap paying `token_in`.
    pub fn reserves_for(&self, token_in: Token) -> (U256, U256) {
        (self.reserve_of(token_in), self.reserve_of(token_in.other()))
    }

    /// `reserve_a * reserve_b`.
    pub fn invariant(&self) -> U512 {
        self.reserve_a.widening_mul(self.reserve_b)
    }

    /// Price of A in B (`reserve_b * 1e18 / reserve_a`), `None` when the pool is empty.
    pub fn spot_price(&self) -> Result<Option<U256>, ArithmeticError> {
        self.price_of(Token::A)
    }

    /// Price of `token` quoted in the other token, scaled by 1e18. Fails if it does not fit 256 bits.
    pub fn price_of(&self, token: Token) -> Result<Option<U256>, ArithmeticError> {
        if self.is_empty() {
            return Ok(None);
        }
        let (base, quote) = self.reserves_for(token);
        fixed_point::mul_div(quote, SCALE, base).map(Some)
    }

    /// `amount_in * (den - num) / den`, the part of the input that moves the curve.
    pub fn amount_after_fee(&self, amount_in: U256) -> Result<U256, ArithmeticError> {
        let kept = fixed_point::checked_sub(self.fee_denominator, self.fee_numerator)?;
        fixed_point::mul_div(amount_in, kept, self.fee_denominator)
    }

    /// Fee retained by the pool for an input of `amount_in`.
    pub fn implied_fee(&self, amount_in: U256) -> Result<U256, ArithmeticError> {
        implied_fee(amount_in, self.fee_numerator, self.fee_denominator)
    }

    /// Exact-input quote: `reserve_out * after_fee / (reserve_in + after_fee)`.
    pub fn quote_swap_output(&self, token_in: Token, amount_in: U256) -> Result<U256, ArithmeticError> {
        if self.is_empty() {
            return Err(ArithmeticError::EmptyPool);
        }
        if amount_in.is_zero() {
            return Err(ArithmeticError::ZeroAmount);
        }
        let (reserve_in, reserve_out) = self.reserves_for(token_in);

        let amount_in_after_fee = self.amount_after_fee(amount_in)?;
        let denominator = fixed_point::checked_add(reserve_in, amount_in_after_fee)?;
        fixed_point::mul_div(reserve_out, amount_in_after_fee, denominator)
    }

    /// Exact-output quote: the smallest input whose fee-adjusted curve move yields at least
    /// `amount_out` of the other token.
    pub fn quote_swap_input(&self, token_out: Token, amount_out: U256) -> Result<U256, ArithmeticError> {
        if self.is_empty() {
            return Err(ArithmeticError::EmptyPool);
        }
        if amount_out.is_zero() {
            return Err(ArithmeticError::ZeroAmount);
        }
        let reserve_out = self.reserve_of(token_out);
        let reserve_in = self.reserve_of(token_out.other());
        if amount_out >= reserve_out {
            return Err(ArithmeticError::InsufficientLiquidity);
        }

        let kept = fixed_point::checked_sub(self.fee_denominator, self.fee_numerator)?;
        let after_fee = full_math::mul_div_rounding_up(reserve_in, amount_out, reserve_out - amount_out)?;
        full_math::mul_div_rounding_up(after_fee, self.fee_denominator, kept)
    }

    /// Token B required alongside `amount_a_desired` of A: `amount_a * reserve_b / reserve_a + 1`.
    ///
    /// The extra unit rounds up so the deposit never falls short of the pool ratio.
    pub fn quote_co_deposit(&self, amount_a_desired: U256) -> Result<U256, ArithmeticError> {
        self.co_deposit(Token::A, amount_a_desired)
    }

    /// Token A required alongside `amount_b_desired` of B, same rounding as [`Self::quote_co_deposit`].
    pub fn quote_co_deposit_for_b(&self, amount_b_desired: U256) -> Result<U256, ArithmeticError> {
        self.co_deposit(Token::B, amount_b_desired)
    }

    fn co_deposit(&self, token: Token, amount: U256) -> Result<U256, ArithmeticError> {
        if self.is_empty() {
            return Err(ArithmeticError::EmptyPool);
        }
        let (reserve_given, reserve_paired) = self.reserves_for(token);
        let required = fixed_point::mul_div(amount, reserve_paired, reserve_given)?;
        fixed_point::checked_add(required, U256::from(1))
    }

    /// Predicts the post-swap pool: the input (fee included) joins `reserve_in`, the quoted
    /// output leaves `reserve_out`.
    pub fn simulate_swap(&self, token_in: Token, amount_in: U256) -> Result<SwapSimulation, ArithmeticError> {
        let amount_out = self.quote_swap_output(token_in, amount_in)?;
        let (reserve_in, reserve_out) = self.reserves_for(token_in);
        let new_in = fixed_point::checked_add(reserve_in, amount_in)?;
        let new_out = fixed_point::checked_sub(reserve_out, amount_out)?;
        let final_state = match token_in {
            Token::A => self.with_reserves(new_in, new_out),
            Token::B => self.with_reserves(new_out, new_in),
        };

        Ok(SwapSimulation {
            token_in,
            amount_in,
            amount_out,
            fee: self.implied_fee(amount_in)?,
            initial_state: *self,
            final_state,
        })
    }
}

/// `amount_in - amount_in * (den - num) / den`.
pub fn implied_fee(amount_in: U256, fee_numerator: U256, fee_denominator: U256) -> Result<U256, ArithmeticError> {
    let kept = fixed_point::checked_sub(fee_denominator, fee_numerator)?;
    let after_fee = fixed_point::mul_div(amount_in, kept, fee_denominator)?;
    fixed_point::checked_sub(amount_in, after_fee)
}
