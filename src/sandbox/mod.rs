//! In-memory stand-ins for the on-chain collaborators.
//!
//! A [`SandboxChain`] holds token balances and any number of constant-product pools behind a
//! single lock, so every submitted operation applies atomically. [`SandboxDex`] and
//! [`SandboxArbitrage`] are views onto a shared chain.

pub mod arbitrage;
pub mod dex;

pub use arbitrage::SandboxArbitrage;
pub use dex::SandboxDex;

use crate::errors::{ArithmeticError, ExecutionError};
use crate::math::{fixed_point, full_math};
use crate::pool::{ConstantProductPool, Token};
use alloy_primitives::{Address, U256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
const BLOCK_TIME: u64 = 12;

/// Shared handle to the in-memory chain. Clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct SandboxChain {
    state: Arc<Mutex<ChainState>>,
}

impl SandboxChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pool` with the given fee, returning a DEX view onto it. Existing pools are kept.
    pub async fn dex(&self, pool: Address, fee_numerator: u64, fee_denominator: u64) -> SandboxDex {
        self.state
            .lock()
            .await
            .pools
            .entry(pool)
            .or_insert_with(|| PoolLedger::new(fee_numerator, fee_denominator));
        SandboxDex::new(self.clone(), pool)
    }

    /// Credits `amount` of `token` to `account`.
    pub async fn mint(&self, account: Address, token: Token, amount: U256) {
        let mut state = self.state.lock().await;
        let balance = state.balances.entry((account, token)).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub async fn balance(&self, account: Address, token: Token) -> U256 {
        self.state.lock().await.balance(account, token)
    }

    pub async fn timestamp(&self) -> u64 {
        self.state.lock().await.timestamp
    }

    /// Makes the `index`-th submission (zero-based, counted across all DEX views) fail.
    pub async fn reject_submission(&self, index: u64) {
        self.state.lock().await.rejected.insert(index);
    }

    /// Makes every balance read for `account` fail.
    pub async fn fail_reads_for(&self, account: Address) {
        self.state.lock().await.unreadable.insert(account);
    }

    pub(crate) async fn lock(&self) -> tokio::sync::MutexGuard<'_, ChainState> {
        self.state.lock().await
    }
}

/// Reserves and LP ledger of one pool.
#[derive(Debug, Clone)]
pub(crate) struct PoolLedger {
    pub(crate) model: ConstantProductPool,
    pub(crate) lp_total_supply: U256,
    pub(crate) lp_balances: HashMap<Address, U256>,
}

impl PoolLedger {
    fn new(fee_numerator: u64, fee_denominator: u64) -> Self {
        Self {
            model: ConstantProductPool::new(U256::ZERO, U256::ZERO, fee_numerator, fee_denominator),
            lp_total_supply: U256::ZERO,
            lp_balances: HashMap::new(),
        }
    }

    pub(crate) fn lp_balance(&self, account: Address) -> U256 {
        self.lp_balances.get(&account).copied().unwrap_or_default()
    }
}

#[derive(Debug)]
pub(crate) struct ChainState {
    balances: HashMap<(Address, Token), U256>,
    pub(crate) pools: HashMap<Address, PoolLedger>,
    pub(crate) timestamp: u64,
    submissions: u64,
    rejected: HashSet<u64>,
    pub(crate) unreadable: HashSet<Address>,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            balances: HashMap::new(),
            pools: HashMap::new(),
            timestamp: GENESIS_TIMESTAMP,
            submissions: 0,
            rejected: HashSet::new(),
            unreadable: HashSet::new(),
        }
    }
}

fn rejected(e: ArithmeticError) -> ExecutionError {
    ExecutionError::Rejected(e.to_string())
}

impl ChainState {
    pub(crate) fn balance(&self, account: Address, token: Token) -> U256 {
        self.balances.get(&(account, token)).copied().unwrap_or_default()
    }

    /// Counts a submission and fails it if it was marked for rejection.
    pub(crate) fn begin_submission(&mut self) -> Result<(), ExecutionError> {
        let index = self.submissions;
        self.submissions += 1;
        if self.rejected.contains(&index) {
            return Err(ExecutionError::Rejected(format!("submission {index} rejected")));
        }
        Ok(())
    }

    pub(crate) fn advance_block(&mut self) -> u64 {
        self.timestamp += BLOCK_TIME;
        self.timestamp
    }

    pub(crate) fn pool(&self, pool: Address) -> Result<&PoolLedger, ExecutionError> {
        self.pools
            .get(&pool)
            .ok_or_else(|| ExecutionError::Rejected(format!("unknown pool {pool}")))
    }

    fn debit(&mut self, account: Address, token: Token, amount: U256) -> Result<(), ExecutionError> {
        let balance = self.balance(account, token);
        if balance < amount {
            return Err(ExecutionError::InsufficientBalance);
        }
        self.balances.insert((account, token), balance - amount);
        Ok(())
    }

    fn credit(&mut self, account: Address, token: Token, amount: U256) -> Result<(), ExecutionError> {
        let balance = self.balance(account, token);
        let next = fixed_point::checked_add(balance, amount).map_err(rejected)?;
        self.balances.insert((account, token), next);
        Ok(())
    }

    /// Deposits both tokens and mints LP shares: `isqrt(a * b)` for the first deposit, otherwise
    /// proportional to the smaller side. Later deposits must carry at least the pool ratio of B.
    pub(crate) fn add_liquidity(
        &mut self,
        pool: Address,
        account: Address,
        amount_a: U256,
        amount_b: U256,
    ) -> Result<U256, ExecutionError> {
        if amount_a.is_zero() || amount_b.is_zero() {
            return Err(rejected(ArithmeticError::ZeroAmount));
        }
        let ledger = self.pool(pool)?.clone();
        let model = ledger.model;

        let shares = if ledger.lp_total_supply.is_zero() {
            full_math::isqrt(fixed_point::checked_mul(amount_a, amount_b).map_err(rejected)?)
        } else {
            let required_b = fixed_point::mul_div(amount_a, model.reserve_b, model.reserve_a).map_err(rejected)?;
            if amount_b < required_b {
                return Err(ExecutionError::Rejected("deposit does not match pool ratio".to_string()));
            }
            let by_a = fixed_point::mul_div(amount_a, ledger.lp_total_supply, model.reserve_a).map_err(rejected)?;
            let by_b = fixed_point::mul_div(amount_b, ledger.lp_total_supply, model.reserve_b).map_err(rejected)?;
            by_a.min(by_b)
        };
        if shares.is_zero() {
            return Err(ExecutionError::Rejected("insufficient liquidity minted".to_string()));
        }

        self.debit(account, Token::A, amount_a)?;
        if let Err(e) = self.debit(account, Token::B, amount_b) {
            self.credit(account, Token::A, amount_a)?;
            return Err(e);
        }

        let reserve_a = fixed_point::checked_add(model.reserve_a, amount_a).map_err(rejected)?;
        let reserve_b = fixed_point::checked_add(model.reserve_b, amount_b).map_err(rejected)?;
        let lp_total_supply = fixed_point::checked_add(ledger.lp_total_supply, shares).map_err(rejected)?;
        let entry = self
            .pools
            .get_mut(&pool)
            .ok_or_else(|| ExecutionError::Rejected(format!("unknown pool {pool}")))?;
        entry.model = model.with_reserves(reserve_a, reserve_b);
        entry.lp_total_supply = lp_total_supply;
        *entry.lp_balances.entry(account).or_default() += shares;
        Ok(shares)
    }

    /// Burns `lp_amount` shares and pays out both reserves pro rata.
    pub(crate) fn remove_liquidity(
        &mut self,
        pool: Address,
        account: Address,
        lp_amount: U256,
    ) -> Result<(U256, U256), ExecutionError> {
        if lp_amount.is_zero() {
            return Err(rejected(ArithmeticError::ZeroAmount));
        }
        let ledger = self.pool(pool)?;
        if ledger.lp_balance(account) < lp_amount {
            return Err(ExecutionError::InsufficientBalance);
        }
        let model = ledger.model;
        let supply = ledger.lp_total_supply;
        let amount_a = fixed_point::mul_div(lp_amount, model.reserve_a, supply).map_err(rejected)?;
        let amount_b = fixed_point::mul_div(lp_amount, model.reserve_b, supply).map_err(rejected)?;
        if amount_a.is_zero() || amount_b.is_zero() {
            return Err(ExecutionError::Rejected("insufficient liquidity burned".to_string()));
        }

        let entry = self
            .pools
            .get_mut(&pool)
            .ok_or_else(|| ExecutionError::Rejected(format!("unknown pool {pool}")))?;
        entry.model = model.with_reserves(model.reserve_a - amount_a, model.reserve_b - amount_b);
        entry.lp_total_supply = supply - lp_amount;
        if let Some(balance) = entry.lp_balances.get_mut(&account) {
            *balance -= lp_amount;
        }
        self.credit(account, Token::A, amount_a)?;
        self.credit(account, Token::B, amount_b)?;
        Ok((amount_a, amount_b))
    }

    /// Swaps through the pool's constant-product curve. The fee stays in the pool.
    pub(crate) fn swap(
        &mut self,
        pool: Address,
        account: Address,
        token_in: Token,
        amount_in: U256,
    ) -> Result<U256, ExecutionError> {
        let model = self.pool(pool)?.model;
        let amount_out = model.quote_swap_output(token_in, amount_in).map_err(rejected)?;
        if amount_out.is_zero() {
            return Err(ExecutionError::Rejected("insufficient output amount".to_string()));
        }
        self.debit(account, token_in, amount_in)?;

        let (reserve_in, reserve_out) = model.reserves_for(token_in);
        let reserve_in = fixed_point::checked_add(reserve_in, amount_in).map_err(rejected)?;
        let reserve_out = reserve_out - amount_out;
        let next = match token_in {
            Token::A => model.with_reserves(reserve_in, reserve_out),
            Token::B => model.with_reserves(reserve_out, reserve_in),
        };
        if let Some(entry) = self.pools.get_mut(&pool) {
            entry.model = next;
        }
        self.credit(account, token_in.other(), amount_out)?;
        Ok(amount_out)
    }
}
