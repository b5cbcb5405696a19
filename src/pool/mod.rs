use serde::{Deserialize, Serialize};
use std::fmt;

pub mod constant_product;
pub mod simulation;

pub use constant_product::ConstantProductPool;
pub use simulation::SwapSimulation;

/// One side of the traded pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    A,
    B,
}

impl Token {
    /// The opposite side of the pair.
    pub fn other(self) -> Self {
        match self {
            Token::A => Token::B,
            Token::B => Token::A,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::A => write!(f, "A"),
            Token::B => write!(f, "B"),
        }
    }
}
