use crate::client::StateReader;
use crate::errors::QueryError;
use crate::pool::{ConstantProductPool, Token};
use alloy_primitives::{Address, U256};
use serde::Serialize;

/// Read-only mirror of one participant's holdings, rebuilt before every decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AccountView {
    pub id: Address,
    pub balance_a: U256,
    pub balance_b: U256,
    pub lp_shares: U256,
}

impl AccountView {
    pub fn balance_of(&self, token: Token) -> U256 {
        match token {
            Token::A => self.balance_a,
            Token::B => self.balance_b,
        }
    }

    pub fn holds(&self, token: Token) -> bool {
        !self.balance_of(token).is_zero()
    }
}

/// Reads a participant's token and LP balances.
pub async fn read_account<R: StateReader + ?Sized>(reader: &R, id: Address) -> Result<AccountView, QueryError> {
    Ok(AccountView {
        id,
        balance_a: reader.get_balance(id, Token::A).await?,
        balance_b: reader.get_balance(id, Token::B).await?,
        lp_shares: reader.get_lp_balance(id).await?,
    })
}

/// Rebuilds the pool view from current reserves, keeping the fee parameters of `template`.
pub async fn read_pool<R: StateReader + ?Sized>(
    reader: &R,
    pool: Address,
    template: &ConstantProductPool,
) -> Result<ConstantProductPool, QueryError> {
    let (reserve_a, reserve_b) = reader.get_reserves(pool).await?;
    Ok(template.with_reserves(reserve_a, reserve_b))
}

/// LP balances of `accounts`, in the given order.
pub async fn snapshot_lp_balances<R: StateReader + ?Sized>(
    reader: &R,
    accounts: &[Address],
) -> Result<Vec<U256>, QueryError> {
    let mut balances = Vec::with_capacity(accounts.len());
    for account in accounts {
        balances.push(reader.get_lp_balance(*account).await?);
    }
    Ok(balances)
}
