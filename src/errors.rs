//! Semantic error taxonomy shared across the three binaries.
//!
//! Each variant maps to one of the kinds named in the error-handling design:
//! the propagation policy lives with the callers (gateway never turns an
//! internal error into a connection drop unless the frame itself is bad),
//! this type only carries enough context to log and react.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FabricError {
    #[error("client protocol violation: {0}")]
    ClientProtocol(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("admission refused: {0}")]
    Admission(String),

    #[error("routing failure: {0}")]
    Routing(String),

    #[error("bus call to {destination} timed out after {elapsed_ms}ms")]
    BusTimeout { destination: String, elapsed_ms: u64 },

    #[error("transient store error: {0}")]
    StoreTransient(String),

    #[error("engine invariant violated: {0}")]
    EngineInvariantViolation(String),

    #[error("engine damage detected: {0}")]
    EngineDamage(String),
}

impl FabricError {
    pub fn routing(msg: impl Into<String>) -> Self {
        Self::Routing(msg.into())
    }

    pub fn store_transient(msg: impl Into<String>) -> Self {
        Self::StoreTransient(msg.into())
    }

    /// Whether this error indicates the caller should back off and retry,
    /// as opposed to surfacing immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreTransient(_) | Self::BusTimeout { .. })
    }
}

pub type FabricResult<T> = Result<T, FabricError>;
