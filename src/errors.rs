use alloy_primitives::Address;
use thiserror::Error;

/// Exact-integer arithmetic failures raised by the fixed-point helpers and the pool model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Arithmetic overflow: {0}")]
    Overflow(&'static str),

    #[error("Arithmetic underflow: {0}")]
    Underflow(&'static str),

    #[error("Pool is empty on at least one side")]
    EmptyPool,

    #[error("Amount cannot be zero")]
    ZeroAmount,

    #[error("Insufficient liquidity for desired output amount")]
    InsufficientLiquidity,
}

/// Failures reported by the external execution collaborators.
///
/// The simulation core treats every variant the same way: the step contributed nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Insufficient allowance")]
    InsufficientAllowance,

    #[error("Operation rejected: {0}")]
    Rejected(String),

    #[error("Out of gas")]
    OutOfGas,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// A point-in-time state read failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("State unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown account {0}")]
    UnknownAccount(Address),

    #[error("Unknown pool {0}")]
    UnknownPool(Address),
}

/// Which part of the setup phase failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPhase {
    Funding,
    SeedLiquidity,
    Snapshot,
}

impl std::fmt::Display for SetupPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupPhase::Funding => write!(f, "funding"),
            SetupPhase::SeedLiquidity => write!(f, "seed liquidity"),
            SetupPhase::Snapshot => write!(f, "initial snapshot"),
        }
    }
}

/// Why a single step contributed nothing. Recorded on the step, never propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepFailure {
    #[error("execution rejected: {0}")]
    Execution(#[from] ExecutionError),

    #[error("state query failed: {0}")]
    Query(#[from] QueryError),

    #[error("arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Setup failed during {phase}: {source}")]
    Setup {
        phase: SetupPhase,
        #[source]
        source: StepFailure,
    },

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Result sink error: {0}")]
    Sink(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SimError {
    pub fn setup(phase: SetupPhase, source: impl Into<StepFailure>) -> Self {
        SimError::Setup { phase, source: source.into() }
    }
}
