use crate::ledger::AccountView;
use crate::math::fixed_point;
use crate::pool::{ConstantProductPool, Token};
use alloy_primitives::U256;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One operation chosen for a simulation step. Immutable once chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Action {
    AddLiquidity { amount_a: U256, amount_b: U256 },
    RemoveLiquidity { lp_amount: U256 },
    Swap { token_in: Token, amount_in: U256 },
    NoOp,
}

impl Action {
    pub fn is_noop(&self) -> bool {
        matches!(self, Action::NoOp)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::AddLiquidity { .. } => "add_liquidity",
            Action::RemoveLiquidity { .. } => "remove_liquidity",
            Action::Swap { .. } => "swap",
            Action::NoOp => "noop",
        }
    }
}

/// Every random input a single decision consumes, sampled up front so that
/// [`ActionPolicy::decide`] stays a pure function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyDraw {
    /// Branch selector in `[0, 1)`.
    pub u: f64,
    /// Percent of token A to deposit, `1..=20`.
    pub add_percent: u64,
    /// Percent of LP shares to redeem, `1..=30`.
    pub remove_percent: u64,
    pub swap_a_for_b: bool,
    /// Percent of the bounded swap size to trade, `1..=90`.
    pub swap_percent: u64,
}

impl PolicyDraw {
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            u: rng.random::<f64>(),
            add_percent: rng.random_range(1..=20),
            remove_percent: rng.random_range(1..=30),
            swap_a_for_b: rng.random_bool(0.5),
            swap_percent: rng.random_range(1..=90),
        }
    }
}

/// Chooses the next action. The branch order (add, remove, swap, no-op) and the
/// 0.35 / 0.55 thresholds produce the 35/20/45 action mix and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionPolicy {
    pub add_threshold: f64,
    pub remove_threshold: f64,
    /// Swaps are bounded by `reserve_in / max_swap_reserve_divisor`.
    pub max_swap_reserve_divisor: u64,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            add_threshold: 0.35,
            remove_threshold: 0.55,
            max_swap_reserve_divisor: 10,
        }
    }
}

impl ActionPolicy {
    pub fn decide(&self, pool: &ConstantProductPool, account: &AccountView, draw: &PolicyDraw) -> Action {
        if pool.is_empty() {
            tracing::trace!("Pool is empty, nothing to decide.");
            return Action::NoOp;
        }

        if draw.u < self.add_threshold {
            return self.add_liquidity(pool, account, draw).unwrap_or(Action::NoOp);
        }

        if draw.u < self.remove_threshold && !account.lp_shares.is_zero() {
            return self.remove_liquidity(account, draw).unwrap_or(Action::NoOp);
        }

        self.swap(pool, account, draw).unwrap_or(Action::NoOp)
    }

    fn add_liquidity(&self, pool: &ConstantProductPool, account: &AccountView, draw: &PolicyDraw) -> Option<Action> {
        if !account.holds(Token::A) {
            tracing::trace!(account = ?account.id, "No token A to deposit.");
            return None;
        }
        let amount_a = fixed_point::percent_of(account.balance_a, draw.add_percent, 100).ok()?;
        if amount_a.is_zero() {
            tracing::trace!(account = ?account.id, "Deposit amount rounds to zero.");
            return None;
        }
        let amount_b = pool.quote_co_deposit(amount_a).ok()?;
        if account.balance_b < amount_b {
            tracing::trace!(account = ?account.id, "Insufficient token B for the pool ratio.");
            return None;
        }
        Some(Action::AddLiquidity { amount_a, amount_b })
    }

    fn remove_liquidity(&self, account: &AccountView, draw: &PolicyDraw) -> Option<Action> {
        let lp_amount = fixed_point::percent_of(account.lp_shares, draw.remove_percent, 100).ok()?;
        if lp_amount.is_zero() {
            tracing::trace!(account = ?account.id, "LP amount rounds to zero.");
            return None;
        }
        Some(Action::RemoveLiquidity { lp_amount })
    }

    fn swap(&self, pool: &ConstantProductPool, account: &AccountView, draw: &PolicyDraw) -> Option<Action> {
        let token_in = if draw.swap_a_for_b { Token::A } else { Token::B };
        let balance = account.balance_of(token_in);
        if balance.is_zero() {
            tracing::trace!(account = ?account.id, %token_in, "Nothing to swap.");
            return None;
        }

        let max_swap = pool.reserve_of(token_in) / U256::from(self.max_swap_reserve_divisor);
        let bound = balance.min(max_swap);
        let mut amount_in = fixed_point::percent_of(bound, draw.swap_percent, 100).ok()?;
        if amount_in.is_zero() {
            amount_in = U256::from(1);
        }
        amount_in = amount_in.min(balance);

        if amount_in.is_zero() {
            return None;
        }
        Some(Action::Swap { token_in, amount_in })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fixed_point::to_wei;
    use alloy_primitives::Address;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pool() -> ConstantProductPool {
        ConstantProductPool::new(to_wei(100), to_wei(200), 3, 1000)
    }

    fn account(a: u64, b: u64, lp: u64) -> AccountView {
        AccountView {
            id: Address::with_last_byte(1),
            balance_a: to_wei(a),
            balance_b: to_wei(b),
            lp_shares: to_wei(lp),
        }
    }

    fn draw(u: f64) -> PolicyDraw {
        PolicyDraw { u, add_percent: 10, remove_percent: 20, swap_a_for_b: true, swap_percent: 50 }
    }

    #[test]
    fn test_low_draw_proposes_add_liquidity() {
        let action = ActionPolicy::default().decide(&pool(), &account(100, 200, 0), &draw(0.20));
        assert_eq!(
            action,
            Action::AddLiquidity { amount_a: to_wei(10), amount_b: to_wei(20) + U256::from(1) }
        );
    }

    #[test]
    fn test_add_branch_never_falls_through_to_swap() {
        // not enough B for the ratio
        let action = ActionPolicy::default().decide(&pool(), &account(100, 1, 0), &draw(0.20));
        assert_eq!(action, Action::NoOp);
        // no A at all
        let action = ActionPolicy::default().decide(&pool(), &account(0, 200, 0), &draw(0.20));
        assert_eq!(action, Action::NoOp);
    }

    #[test]
    fn test_remove_branch_requires_lp_shares() {
        let policy = ActionPolicy::default();
        let action = policy.decide(&pool(), &account(100, 200, 50), &draw(0.40));
        assert_eq!(action, Action::RemoveLiquidity { lp_amount: to_wei(10) });

        // without shares the draw falls through to a swap
        let action = policy.decide(&pool(), &account(100, 200, 0), &draw(0.40));
        assert!(matches!(action, Action::Swap { token_in: Token::A, .. }));
    }

    #[test]
    fn test_swap_is_bounded_by_reserve() {
        let action = ActionPolicy::default().decide(&pool(), &account(100, 200, 0), &draw(0.90));
        // min(100, 100/10) = 10, 50% of that
        assert_eq!(action, Action::Swap { token_in: Token::A, amount_in: to_wei(5) });

        let mut d = draw(0.90);
        d.swap_a_for_b = false;
        let action = ActionPolicy::default().decide(&pool(), &account(100, 3, 0), &d);
        // min(3, 200/10) = 3, 50% of that
        assert_eq!(action, Action::Swap { token_in: Token::B, amount_in: U256::from(1_500_000_000_000_000_000u64) });
    }

    #[test]
    fn test_tiny_swap_uses_smallest_unit() {
        let tiny = AccountView { id: Address::ZERO, balance_a: U256::from(1), balance_b: U256::ZERO, lp_shares: U256::ZERO };
        let action = ActionPolicy::default().decide(&pool(), &tiny, &draw(0.90));
        assert_eq!(action, Action::Swap { token_in: Token::A, amount_in: U256::from(1) });

        let mut d = draw(0.90);
        d.swap_a_for_b = false;
        assert_eq!(ActionPolicy::default().decide(&pool(), &tiny, &d), Action::NoOp);
    }

    #[test]
    fn test_empty_pool_always_noop() {
        let empty = ConstantProductPool::default();
        let policy = ActionPolicy::default();
        for u in [0.0, 0.2, 0.4, 0.6, 0.99] {
            assert_eq!(policy.decide(&empty, &account(100, 200, 10), &draw(u)), Action::NoOp);
        }
    }

    #[test]
    fn test_draw_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let d = PolicyDraw::sample(&mut rng);
            assert!((0.0..1.0).contains(&d.u));
            assert!((1..=20).contains(&d.add_percent));
            assert!((1..=30).contains(&d.remove_percent));
            assert!((1..=90).contains(&d.swap_percent));
        }
    }

    #[test]
    fn test_same_seed_same_draws() {
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        for _ in 0..10 {
            assert_eq!(PolicyDraw::sample(&mut a), PolicyDraw::sample(&mut b));
        }
    }
}
