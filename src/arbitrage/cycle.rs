use crate::errors::ArithmeticError;
use crate::math::fixed_point::abs_diff;
use crate::metrics::deviation_pct;
use crate::pool::{ConstantProductPool, Token};
use alloy_primitives::U256;
use serde::Serialize;

/// Which pool is traded first in a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleOrder {
    FirstThenSecond,
    SecondThenFirst,
}

/// Predicted result of selling `start_token` on one pool and buying it back on the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundTrip {
    pub order: CycleOrder,
    pub start_token: Token,
    #[serde(serialize_with = "crate::metrics::bundle::wei::serialize")]
    pub start_amount: U256,
    #[serde(serialize_with = "crate::metrics::bundle::wei::serialize")]
    pub intermediate_amount: U256,
    #[serde(serialize_with = "crate::metrics::bundle::wei::serialize")]
    pub end_amount: U256,
}

impl RoundTrip {
    /// Gross profit in `start_token`, zero when the trip loses.
    pub fn profit(&self) -> U256 {
        self.end_amount.saturating_sub(self.start_amount)
    }

    pub fn is_profitable(&self) -> bool {
        self.end_amount > self.start_amount
    }
}

/// Two independent pools quoting the same pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoPoolCycle {
    pub first: ConstantProductPool,
    pub second: ConstantProductPool,
}

impl TwoPoolCycle {
    pub fn new(first: ConstantProductPool, second: ConstantProductPool) -> Self {
        Self { first, second }
    }

    pub fn is_tradable(&self) -> bool {
        !self.first.is_empty() && !self.second.is_empty()
    }

    fn spot_prices(&self) -> Result<Option<(U256, U256)>, ArithmeticError> {
        match (self.first.spot_price()?, self.second.spot_price()?) {
            (Some(first), Some(second)) => Ok(Some((first, second))),
            _ => Ok(None),
        }
    }

    /// Absolute difference of the two B-per-A spot prices, `None` if either pool is empty.
    pub fn price_gap(&self) -> Result<Option<U256>, ArithmeticError> {
        Ok(self.spot_prices()?.map(|(first, second)| abs_diff(first, second)))
    }

    /// Price gap relative to the first pool, percent scaled by 1e18.
    pub fn price_gap_pct(&self) -> Result<Option<U256>, ArithmeticError> {
        self.spot_prices()?
            .map(|(first, second)| deviation_pct(first, second))
            .transpose()
    }

    pub fn round_trip(&self, start_token: Token, amount: U256, order: CycleOrder) -> Result<RoundTrip, ArithmeticError> {
        let (sell, buy) = match order {
            CycleOrder::FirstThenSecond => (&self.first, &self.second),
            CycleOrder::SecondThenFirst => (&self.second, &self.first),
        };
        let intermediate_amount = sell.quote_swap_output(start_token, amount)?;
        let end_amount = if intermediate_amount.is_zero() {
            U256::ZERO
        } else {
            buy.quote_swap_output(start_token.other(), intermediate_amount)?
        };

        Ok(RoundTrip {
            order,
            start_token,
            start_amount: amount,
            intermediate_amount,
            end_amount,
        })
    }

    /// The better of the two trading orders for `amount` of `start_token`.
    pub fn best_round_trip(&self, start_token: Token, amount: U256) -> Result<RoundTrip, ArithmeticError> {
        let forward = self.round_trip(start_token, amount, CycleOrder::FirstThenSecond)?;
        let backward = self.round_trip(start_token, amount, CycleOrder::SecondThenFirst)?;
        Ok(if backward.end_amount > forward.end_amount { backward } else { forward })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fixed_point::to_wei;

    fn cycle() -> TwoPoolCycle {
        TwoPoolCycle::new(
            ConstantProductPool::new(to_wei(100), to_wei(200), 3, 1000),
            ConstantProductPool::new(to_wei(100), to_wei(150), 3, 1000),
        )
    }

    #[test]
    fn test_price_gap() {
        assert_eq!(cycle().price_gap(), Ok(Some(to_wei(1) / U256::from(2))));
        assert_eq!(cycle().price_gap_pct(), Ok(Some(to_wei(25))));

        let empty = TwoPoolCycle::new(ConstantProductPool::default(), cycle().second);
        assert_eq!(empty.price_gap(), Ok(None));
    }

    #[test]
    fn test_best_round_trip_sells_where_token_is_dear() {
        // A is worth more B on the first pool, so sell A there and buy it back on the second.
        let trip = cycle().best_round_trip(Token::A, to_wei(1)).unwrap();
        assert_eq!(trip.order, CycleOrder::FirstThenSecond);
        assert!(trip.is_profitable());

        let trip = cycle().best_round_trip(Token::B, to_wei(1)).unwrap();
        assert_eq!(trip.order, CycleOrder::SecondThenFirst);
        assert!(trip.is_profitable());
    }

    #[test]
    fn test_identical_pools_never_profit() {
        let pool = ConstantProductPool::new(to_wei(100), to_wei(200), 3, 1000);
        let trip = TwoPoolCycle::new(pool, pool).best_round_trip(Token::A, to_wei(1)).unwrap();
        assert!(!trip.is_profitable());
        assert_eq!(trip.profit(), U256::ZERO);
    }
}
