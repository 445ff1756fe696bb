//! The shared key-value store this core treats as an external capability:
//! lease-bound keys back Discovery registration, plain-TTL keys back route
//! entries. Everything that touches it goes through this trait so the
//! in-memory reference implementation can be swapped for a real
//! etcd/redis-backed one without touching callers.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::errors::FabricError;

pub type LeaseId = u64;

#[derive(Debug, Clone, Copy)]
pub enum Expiry {
    /// Tied to a lease acquired via [`KvStore::lease_grant`]; the key
    /// disappears when the lease expires or is revoked.
    Lease(LeaseId),
    /// Expires independently of any lease after the given duration
    /// (route entries default to a 2h TTL).
    Ttl(Duration),
    /// Never expires on its own; only an explicit delete removes it.
    Never,
}

#[derive(Debug, Clone)]
pub enum WatchEvent {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn lease_grant(&self, ttl: Duration) -> Result<LeaseId, FabricError>;
    async fn lease_keepalive(&self, lease: LeaseId) -> Result<(), FabricError>;
    async fn lease_revoke(&self, lease: LeaseId) -> Result<(), FabricError>;

    async fn put(&self, key: &str, value: Vec<u8>, expiry: Expiry) -> Result<(), FabricError>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, FabricError>;
    async fn delete(&self, key: &str) -> Result<(), FabricError>;

    /// Full scan, used for the "initial sync" pass of a prefix watch and
    /// the once-a-minute resync.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, FabricError>;

    /// Incremental change feed for keys under `prefix`. A key `K` only
    /// matches `{prefix}` when `K` starts with the literal prefix string.
    fn watch_prefix(&self, prefix: &str) -> broadcast::Receiver<WatchEvent>;
}
