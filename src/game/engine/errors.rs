//! Engine-local error taxonomy. Invariant violations are logged and swallowed by the
//! caller, keeping the actor alive; damage asks the worker to destroy the
//! room.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("illegal move: {0}")]
    Invariant(String),
    #[error("engine damage: {0}")]
    Damage(String),
}

impl EngineError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn damage(msg: impl Into<String>) -> Self {
        Self::Damage(msg.into())
    }

    pub fn is_damage(&self) -> bool {
        matches!(self, Self::Damage(_))
    }
}
