use crate::errors::ArithmeticError;
use alloy_primitives::{U256, U512};

/// Performs a multiplication and division in 512-bit precision.
/// Equivalent to floor((a * b) / denominator).
/// Fails on division by zero or when the quotient does not fit 256 bits.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, ArithmeticError> {
    if denominator.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }

    let product = a.widening_mul(b);
    let result = product / U512::from(denominator);

    if result > U512::from(U256::MAX) {
        Err(ArithmeticError::Overflow("mul_div result exceeds 256 bits"))
    } else {
        Ok(result.to())
    }
}

/// Performs a multiplication and division, rounding up.
/// Equivalent to ceil((a * b) / denominator).
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, ArithmeticError> {
    if denominator.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }

    let product = a.widening_mul(b);
    let denominator = U512::from(denominator);
    let mut result = product / denominator;
    if product % denominator > U512::ZERO {
        result += U512::from(1);
    }

    if result > U512::from(U256::MAX) {
        Err(ArithmeticError::Overflow("mul_div_rounding_up result exceeds 256 bits"))
    } else {
        Ok(result.to())
    }
}

/// Integer square root (floor), Newton iteration.
pub fn isqrt(value: U256) -> U256 {
    if value < U256::from(2) {
        return value;
    }
    let mut x = value;
    let mut y = (x >> 1) + (x & U256::from(1));
    while y < x {
        x = y;
        y = (x + value / x) >> 1;
    }
    x
}
