//! Lease-bound registration with keepalive + re-register. A dead keepalive
//! stream and the `TTL/2` safety-net ticker can both observe a reason to
//! re-register at the same time, so the actual re-registration is
//! serialized behind `doRegister`'s mutex and an atomic "is the keepalive
//! stream alive" flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::types::{Role, ServerInfo};
use crate::errors::FabricError;
use crate::store::kv::{Expiry, KvStore, LeaseId};

const LOG_TARGET: &str = "discovery::registrar";

pub struct RegistrarConfig {
    pub role: Role,
    pub node_id: String,
    pub address: String,
    pub weight: u32,
    pub ttl: Duration,
}

struct RegistrationState {
    lease: LeaseId,
}

/// Owns one node's discovery registration for its process lifetime.
pub struct Registrar {
    kv: Arc<dyn KvStore>,
    cfg: RegistrarConfig,
    key: String,
    state: Mutex<Option<RegistrationState>>,
    keepalive_alive: AtomicBool,
    current_load: std::sync::atomic::AtomicU32,
    stop: CancellationToken,
}

impl Registrar {
    pub fn new(kv: Arc<dyn KvStore>, cfg: RegistrarConfig) -> Arc<Self> {
        let key = ServerInfo::key(cfg.role, &cfg.node_id);
        Arc::new(Self {
            kv,
            cfg,
            key,
            state: Mutex::new(None),
            keepalive_alive: AtomicBool::new(false),
            current_load: std::sync::atomic::AtomicU32::new(0),
            stop: CancellationToken::new(),
        })
    }

    /// Performs the initial registration and spawns the keepalive stream
    /// and the `TTL/2` safety-net ticker.
    #[instrument(skip(self), target = LOG_TARGET, fields(node_id = %self.cfg.node_id, role = %self.cfg.role))]
    pub async fn register(self: &Arc<Self>) -> Result<(), FabricError> {
        self.do_register().await?;

        let keepalive_self = Arc::clone(self);
        tokio::spawn(async move { keepalive_self.run_keepalive().await });

        let ticker_self = Arc::clone(self);
        tokio::spawn(async move { ticker_self.run_safety_ticker().await });

        Ok(())
    }

    /// Acquires a fresh lease and writes the `ServerInfo` value under it.
    /// Serialized by `state`'s mutex so a concurrent keepalive-loss
    /// re-register and ticker-triggered re-register never race each other.
    async fn do_register(self: &Arc<Self>) -> Result<(), FabricError> {
        let mut guard = self.state.lock().await;

        let lease = self.kv.lease_grant(self.cfg.ttl).await?;
        let info = ServerInfo {
            node_id: self.cfg.node_id.clone(),
            address: self.cfg.address.clone(),
            weight: self.cfg.weight,
            load: self.current_load.load(Ordering::Relaxed),
            ttl: self.cfg.ttl.as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let value = serde_json::to_vec(&info)
            .map_err(|e| FabricError::store_transient(format!("encode ServerInfo: {e}")))?;
        self.kv.put(&self.key, value, Expiry::Lease(lease)).await?;

        *guard = Some(RegistrationState { lease });
        self.keepalive_alive.store(true, Ordering::SeqCst);
        info!(target: LOG_TARGET, key = %self.key, "registered");
        Ok(())
    }

    async fn run_keepalive(self: Arc<Self>) {
        let half_ttl = self.cfg.ttl / 2;
        loop {
            if self.stop.is_cancelled() {
                return;
            }
            tokio::select! {
                _ = self.stop.cancelled() => return,
                _ = tokio::time::sleep(half_ttl) => {}
            }

            let lease = {
                let guard = self.state.lock().await;
                guard.as_ref().map(|s| s.lease)
            };

            let result = match lease {
                Some(lease) => self.kv.lease_keepalive(lease).await,
                None => Err(FabricError::store_transient("no active lease")),
            };

            if result.is_err() {
                self.keepalive_alive.store(false, Ordering::SeqCst);
                warn!(target: LOG_TARGET, key = %self.key, "keepalive lost, re-registering");
                if let Err(err) = self.do_register().await {
                    warn!(target: LOG_TARGET, key = %self.key, error = %err, "re-register failed, backing off one TTL");
                    tokio::time::sleep(self.cfg.ttl).await;
                }
            }
        }
    }

    /// Belt-and-braces path at `TTL/2`: re-registers only if the keepalive
    /// stream was observed dead; otherwise a no-op.
    async fn run_safety_ticker(self: Arc<Self>) {
        let mut ticker = interval(self.cfg.ttl / 2);
        loop {
            tokio::select! {
                _ = self.stop.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if !self.keepalive_alive.load(Ordering::SeqCst) {
                warn!(target: LOG_TARGET, key = %self.key, "safety ticker observed dead keepalive, re-registering");
                if let Err(err) = self.do_register().await {
                    warn!(target: LOG_TARGET, key = %self.key, error = %err, "safety-ticker re-register failed");
                }
            }
        }
    }

    /// Rewrites the value under the existing lease without reallocating one.
    pub async fn update_load(&self, load: u32) -> Result<(), FabricError> {
        self.current_load.store(load, Ordering::Relaxed);
        let lease = {
            let guard = self.state.lock().await;
            guard.as_ref().map(|s| s.lease)
        };
        let Some(lease) = lease else {
            return Err(FabricError::store_transient("not registered"));
        };

        let info = ServerInfo {
            node_id: self.cfg.node_id.clone(),
            address: self.cfg.address.clone(),
            weight: self.cfg.weight,
            load,
            ttl: self.cfg.ttl.as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let value = serde_json::to_vec(&info)
            .map_err(|e| FabricError::store_transient(format!("encode ServerInfo: {e}")))?;
        self.kv.put(&self.key, value, Expiry::Lease(lease)).await
    }

    /// Deletes the key and revokes the lease. Idempotent:
    /// calling `close` twice is harmless because the second call simply
    /// finds no active lease to revoke.
    #[instrument(skip(self), target = LOG_TARGET)]
    pub async fn close(&self) -> Result<(), FabricError> {
        self.stop.cancel();
        let lease = {
            let mut guard = self.state.lock().await;
            guard.take().map(|s| s.lease)
        };
        self.kv.delete(&self.key).await?;
        if let Some(lease) = lease {
            self.kv.lease_revoke(lease).await?;
        }
        info!(target: LOG_TARGET, key = %self.key, "closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn register_then_close_is_idempotent() {
        let kv = MemoryStore::new();
        let registrar = Registrar::new(
            kv.clone(),
            RegistrarConfig {
                role: Role::Game,
                node_id: "g1".into(),
                address: "127.0.0.1:9000".into(),
                weight: 1,
                ttl: Duration::from_secs(30),
            },
        );
        registrar.register().await.unwrap();
        assert!(kv.get("game/g1").await.unwrap().is_some());

        registrar.close().await.unwrap();
        assert!(kv.get("game/g1").await.unwrap().is_none());

        // second close: no active lease, still succeeds
        registrar.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_load_rewrites_without_new_lease() {
        let kv = MemoryStore::new();
        let registrar = Registrar::new(
            kv.clone(),
            RegistrarConfig {
                role: Role::Game,
                node_id: "g1".into(),
                address: "127.0.0.1:9000".into(),
                weight: 1,
                ttl: Duration::from_secs(30),
            },
        );
        registrar.register().await.unwrap();
        registrar.update_load(42).await.unwrap();

        let raw = kv.get("game/g1").await.unwrap().unwrap();
        let info: ServerInfo = serde_json::from_slice(&raw).unwrap();
        assert_eq!(info.load, 42);
    }
}
