use crate::client::{ExecutionClient, Operation, PostState, StateReader};
use crate::errors::{ExecutionError, QueryError};
use crate::policy::Action;
use crate::pool::Token;
use crate::sandbox::SandboxChain;
use alloy_primitives::{Address, U256};
use async_trait::async_trait;

/// One pool on a [`SandboxChain`], exposed through the execution and query capabilities.
#[derive(Debug, Clone)]
pub struct SandboxDex {
    chain: SandboxChain,
    pool: Address,
}

impl SandboxDex {
    pub(crate) fn new(chain: SandboxChain, pool: Address) -> Self {
        Self { chain, pool }
    }

    pub fn address(&self) -> Address {
        self.pool
    }

    pub fn chain(&self) -> &SandboxChain {
        &self.chain
    }
}

#[async_trait]
impl ExecutionClient for SandboxDex {
    async fn submit(&self, operation: &Operation) -> Result<PostState, ExecutionError> {
        let mut state = self.chain.lock().await;
        state.begin_submission()?;

        let account = operation.account;
        let amount_out = match operation.action {
            Action::AddLiquidity { amount_a, amount_b } => {
                state.add_liquidity(self.pool, account, amount_a, amount_b)?;
                None
            }
            Action::RemoveLiquidity { lp_amount } => {
                state.remove_liquidity(self.pool, account, lp_amount)?;
                None
            }
            Action::Swap { token_in, amount_in } => Some(state.swap(self.pool, account, token_in, amount_in)?),
            Action::NoOp => return Err(ExecutionError::Rejected("no-op is not submittable".to_string())),
        };

        let timestamp = state.advance_block();
        let model = state.pool(self.pool)?.model;
        tracing::trace!(pool = ?self.pool, ?account, action = operation.action.label(), timestamp, "Sandbox operation applied.");
        Ok(PostState {
            reserve_a: model.reserve_a,
            reserve_b: model.reserve_b,
            amount_out,
            timestamp,
        })
    }
}

#[async_trait]
impl StateReader for SandboxDex {
    async fn get_reserves(&self, pool: Address) -> Result<(U256, U256), QueryError> {
        let state = self.chain.lock().await;
        let ledger = state.pools.get(&pool).ok_or(QueryError::UnknownPool(pool))?;
        Ok((ledger.model.reserve_a, ledger.model.reserve_b))
    }

    async fn get_balance(&self, account: Address, token: Token) -> Result<U256, QueryError> {
        let state = self.chain.lock().await;
        if state.unreadable.contains(&account) {
            return Err(QueryError::UnknownAccount(account));
        }
        Ok(state.balance(account, token))
    }

    async fn get_lp_balance(&self, account: Address) -> Result<U256, QueryError> {
        let state = self.chain.lock().await;
        let ledger = state.pools.get(&self.pool).ok_or(QueryError::UnknownPool(self.pool))?;
        Ok(ledger.lp_balance(account))
    }

    async fn get_lp_total_supply(&self) -> Result<U256, QueryError> {
        let state = self.chain.lock().await;
        let ledger = state.pools.get(&self.pool).ok_or(QueryError::UnknownPool(self.pool))?;
        Ok(ledger.lp_total_supply)
    }

    async fn get_block_timestamp(&self) -> Result<u64, QueryError> {
        Ok(self.chain.lock().await.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fixed_point::to_wei;

    const POOL: Address = Address::repeat_byte(0x11);
    const ALICE: Address = Address::repeat_byte(0xa1);

    async fn dex() -> SandboxDex {
        let chain = SandboxChain::new();
        chain.mint(ALICE, Token::A, to_wei(100)).await;
        chain.mint(ALICE, Token::B, to_wei(200)).await;
        chain.dex(POOL, 3, 1000).await
    }

    #[tokio::test]
    async fn test_submit_advances_timestamp() {
        let dex = dex().await;
        let before = dex.get_block_timestamp().await.unwrap();
        let add = Operation::new(ALICE, Action::AddLiquidity { amount_a: to_wei(50), amount_b: to_wei(100) });
        let post = dex.submit(&add).await.unwrap();
        assert_eq!(post.timestamp, before + 12);
        assert_eq!(dex.chain().timestamp().await, post.timestamp);
        assert_eq!((post.reserve_a, post.reserve_b), (to_wei(50), to_wei(100)));
        assert_eq!(post.amount_out, None);
        assert_eq!(dex.get_lp_total_supply().await.unwrap(), dex.get_lp_balance(ALICE).await.unwrap());
    }

    #[tokio::test]
    async fn test_swap_reports_amount_out() {
        let dex = dex().await;
        let add = Operation::new(ALICE, Action::AddLiquidity { amount_a: to_wei(50), amount_b: to_wei(100) });
        dex.submit(&add).await.unwrap();
        let swap = Operation::new(ALICE, Action::Swap { token_in: Token::A, amount_in: to_wei(5) });
        let post = dex.submit(&swap).await.unwrap();
        let out = post.amount_out.unwrap();
        assert_eq!(dex.get_balance(ALICE, Token::B).await.unwrap(), to_wei(100) + out);
        assert_eq!(post.reserve_a, to_wei(55));
    }

    #[tokio::test]
    async fn test_noop_and_failed_submissions_do_not_mine() {
        let dex = dex().await;
        let before = dex.get_block_timestamp().await.unwrap();
        assert!(dex.submit(&Operation::new(ALICE, Action::NoOp)).await.is_err());
        let swap = Operation::new(ALICE, Action::Swap { token_in: Token::A, amount_in: to_wei(1) });
        assert!(dex.submit(&swap).await.is_err());
        assert_eq!(dex.get_block_timestamp().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_unknown_pool_and_unreadable_account() {
        let dex = dex().await;
        let other = Address::repeat_byte(0x22);
        assert_eq!(dex.get_reserves(other).await, Err(QueryError::UnknownPool(other)));
        dex.chain().fail_reads_for(ALICE).await;
        assert_eq!(dex.get_balance(ALICE, Token::A).await, Err(QueryError::UnknownAccount(ALICE)));
    }
}
