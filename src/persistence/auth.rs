//! `verify(token) -> userID | error`. The Gateway calls this on websocket upgrade; the
//! concrete token issuance and validation mechanism lives outside this
//! core, so only the boundary is modeled here.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::FabricError;

#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, FabricError>;
}

/// Reference implementation: a fixed token->userID map, good enough for
/// local multi-node simulation and tests. A real deployment points the
/// Gateway at the actual session-token service instead.
pub struct InMemoryAuthVerifier {
    tokens: DashMap<String, String>,
}

impl InMemoryAuthVerifier {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
        }
    }

    pub fn issue(&self, token: impl Into<String>, user_id: impl Into<String>) {
        self.tokens.insert(token.into(), user_id.into());
    }
}

impl Default for InMemoryAuthVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthVerifier for InMemoryAuthVerifier {
    async fn verify(&self, token: &str) -> Result<String, FabricError> {
        self.tokens
            .get(token)
            .map(|e| e.value().clone())
            .ok_or_else(|| FabricError::AuthFailure(format!("unknown token {token}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn verify_resolves_issued_token() {
        let auth = InMemoryAuthVerifier::new();
        auth.issue("tok-1", "u1");
        assert_eq!(auth.verify("tok-1").await.unwrap(), "u1");
    }

    #[tokio::test]
    async fn verify_rejects_unknown_token() {
        let auth = InMemoryAuthVerifier::new();
        assert!(auth.verify("nope").await.is_err());
    }
}
