// xCrack Position Transition Engine

pub mod config;
pub mod engine;
pub mod flashloan;
pub mod logic;
pub mod portfolio;
pub mod protocols;
pub mod swapers;

// Core types
pub mod constants;
pub mod types;

#[cfg(test)]
pub(crate) mod mocks;

// Re-exports for convenience
pub use config::Config;
pub use engine::{EngineError, ErrorCode, TransitionEngine, TransitionError, TransitionOutput, TransitionRequest};
pub use logic::{Action, Logic, LogicAmount};
pub use portfolio::Portfolio;
pub use types::{Token, TokenAmount};
