use crate::arbitrage::cycle::{CycleOrder, TwoPoolCycle};
use crate::errors::ArithmeticError;
use crate::pool::Token;
use alloy_primitives::U256;

const INV_PHI_SCALED: U256 = U256::from_limbs([618_034, 0, 0, 0]);
const SCALE: U256 = U256::from_limbs([1_000_000, 0, 0, 0]);
const MAX_ITERATIONS: usize = 256;

/// Finds the start amount maximizing round-trip profit on `[a, b]` with a golden-section search.
///
/// Returns `(optimal_input, profit_at_optimum)`.
pub fn find_optimal_input(
    cycle: &TwoPoolCycle,
    start_token: Token,
    order: CycleOrder,
    mut a: U256,
    mut b: U256,
    tolerance: U256,
) -> Result<(U256, U256), ArithmeticError> {
    if a.is_zero() {
        a = U256::from(1);
    }
    if b <= a {
        let profit = cycle.round_trip(start_token, a, order)?.profit();
        return Ok((a, profit));
    }

    let end_at = |x: U256| cycle.round_trip(start_token, x, order).map(|trip| trip.end_amount);

    let mut c = b - (b - a) * INV_PHI_SCALED / SCALE;
    let mut d = a + (b - a) * INV_PHI_SCALED / SCALE;

    for _ in 0..MAX_ITERATIONS {
        if (b - a) <= tolerance {
            break;
        }
        // end(c) - c > end(d) - d, kept unsigned so losing trips still order correctly
        if end_at(c)? + d > end_at(d)? + c {
            b = d;
        } else {
            a = c;
        }
        c = b - (b - a) * INV_PHI_SCALED / SCALE;
        d = a + (b - a) * INV_PHI_SCALED / SCALE;
    }

    let optimal_input = (a + b) / U256::from(2);
    Ok((optimal_input, end_at(optimal_input)?.saturating_sub(optimal_input)))
}
