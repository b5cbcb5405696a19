use crate::math::fixed_point::abs_diff;
use crate::pool::{ConstantProductPool, Token};
use alloy_primitives::U256;

/// Predicted effect of a single swap on a pool, computed from a pre-trade snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapSimulation {
    pub token_in: Token,
    pub amount_in: U256,
    pub amount_out: U256,
    pub fee: U256,
    pub initial_state: ConstantProductPool,
    pub final_state: ConstantProductPool,
}

impl SwapSimulation {
    /// Largest per-side reserve difference between the prediction and an observed post-state.
    pub fn reserve_drift(&self, observed: &ConstantProductPool) -> U256 {
        abs_diff(self.final_state.reserve_a, observed.reserve_a)
            .max(abs_diff(self.final_state.reserve_b, observed.reserve_b))
    }

    pub fn matches(&self, observed: &ConstantProductPool) -> bool {
        self.reserve_drift(observed).is_zero()
    }
}
