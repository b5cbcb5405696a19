use alloy_primitives::U256;

/// Converts a U256 into a f64 by combining its limbs.
/// Loses precision for large values; only used for log output, never for accounting.
pub fn u256_to_f64(value: U256) -> f64 {
    let limbs = value.as_limbs();
    const TWO_POW_64: f64 = (1u64 << 63) as f64 * 2.0;

    let mut result = limbs[3] as f64;
    result = result * TWO_POW_64 + (limbs[2] as f64);
    result = result * TWO_POW_64 + (limbs[1] as f64);
    result * TWO_POW_64 + (limbs[0] as f64)
}

/// Human-readable token units (`value / 1e18`) for logs.
pub fn from_wei(value: U256) -> f64 {
    u256_to_f64(value) / 1e18
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wei() {
        assert_eq!(from_wei(U256::from(1_500_000_000_000_000_000u64)), 1.5);
        assert_eq!(u256_to_f64(U256::from_limbs([0, 1, 0, 0])), 18446744073709551616.0);
    }
}
