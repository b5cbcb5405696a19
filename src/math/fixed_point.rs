//! Token amounts are unsigned integers scaled by 10^18. All division truncates.

use crate::errors::ArithmeticError;
use crate::math::full_math;
use alloy_primitives::U256;

/// 10^18, the fixed-point unit.
pub const SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// 100 * 10^18, used to express percentages in fixed point.
pub const PERCENT_SCALE: U256 = U256::from_limbs([7_766_279_631_452_241_920, 5, 0, 0]);

pub fn checked_add(a: U256, b: U256) -> Result<U256, ArithmeticError> {
    a.checked_add(b).ok_or(ArithmeticError::Overflow("addition"))
}

pub fn checked_sub(a: U256, b: U256) -> Result<U256, ArithmeticError> {
    a.checked_sub(b).ok_or(ArithmeticError::Underflow("subtraction"))
}

pub fn checked_mul(a: U256, b: U256) -> Result<U256, ArithmeticError> {
    a.checked_mul(b).ok_or(ArithmeticError::Overflow("multiplication"))
}

pub fn checked_div(a: U256, b: U256) -> Result<U256, ArithmeticError> {
    if b.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }
    Ok(a / b)
}

/// `floor(a * b / c)` with 512-bit intermediate precision.
pub fn mul_div(a: U256, b: U256, c: U256) -> Result<U256, ArithmeticError> {
    full_math::mul_div(a, b, c)
}

/// `floor(amount * numerator / denominator)`, e.g. `percent_of(x, 15, 100)` is 15% of `x`.
pub fn percent_of(amount: U256, numerator: u64, denominator: u64) -> Result<U256, ArithmeticError> {
    full_math::mul_div(amount, U256::from(numerator), U256::from(denominator))
}

/// `a * 10^18 / b`, a ratio expressed in fixed point.
pub fn ratio(a: U256, b: U256) -> Result<U256, ArithmeticError> {
    full_math::mul_div(a, SCALE, b)
}

/// Converts whole tokens into 18-decimal base units.
pub fn to_wei(tokens: u64) -> U256 {
    U256::from(tokens) * SCALE
}

pub fn abs_diff(a: U256, b: U256) -> U256 {
    if a >= b { a - b } else { b - a }
}
