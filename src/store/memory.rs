//! In-memory [`KvStore`] reference implementation. No external crate in the
//! teacher's or pack's dependency set provides an etcd/redis client, so
//! every binary in this repo runs against this implementation rather than
//! fabricating a vendored client (per the standing "never fabricate
//! dependencies" rule). The trait boundary is what matters: a real backend
//! slots in without touching `discovery::*`, `matchmaker::*`, or
//! `RouteStore`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::interval;

use super::kv::{Expiry, KvStore, LeaseId, WatchEvent};
use crate::errors::FabricError;

const REAP_INTERVAL: Duration = Duration::from_millis(200);
const WATCH_CHANNEL_CAPACITY: usize = 4096;

enum EntryExpiry {
    Lease(LeaseId),
    At(Instant),
    Never,
}

struct Entry {
    value: Vec<u8>,
    expiry: EntryExpiry,
}

struct Lease {
    ttl: Duration,
    deadline: Instant,
    keys: HashSet<String>,
}

struct Inner {
    entries: HashMap<String, Entry>,
    leases: HashMap<LeaseId, Lease>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    next_lease: AtomicU64,
    watch_tx: broadcast::Sender<WatchEvent>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        let (watch_tx, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        let store = Arc::new(Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                leases: HashMap::new(),
            }),
            next_lease: AtomicU64::new(1),
            watch_tx,
        });
        store.clone().spawn_reaper();
        store
    }

    fn spawn_reaper(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = interval(REAP_INTERVAL);
            loop {
                ticker.tick().await;
                self.reap_expired();
            }
        });
    }

    fn reap_expired(&self) {
        let now = Instant::now();
        let mut expired_keys = Vec::new();

        let mut inner = self.inner.lock();
        let expired_leases: Vec<LeaseId> = inner
            .leases
            .iter()
            .filter(|(_, lease)| lease.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for lease_id in expired_leases {
            if let Some(lease) = inner.leases.remove(&lease_id) {
                for key in lease.keys {
                    if inner.entries.remove(&key).is_some() {
                        expired_keys.push(key);
                    }
                }
            }
        }

        let ttl_expired: Vec<String> = inner
            .entries
            .iter()
            .filter_map(|(key, entry)| match entry.expiry {
                EntryExpiry::At(deadline) if deadline <= now => Some(key.clone()),
                _ => None,
            })
            .collect();

        for key in ttl_expired {
            inner.entries.remove(&key);
            expired_keys.push(key);
        }
        drop(inner);

        for key in expired_keys {
            let _ = self.watch_tx.send(WatchEvent::Delete { key });
        }
    }
}

impl Default for Arc<MemoryStore> {
    fn default() -> Self {
        MemoryStore::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn lease_grant(&self, ttl: Duration) -> Result<LeaseId, FabricError> {
        let id = self.next_lease.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        inner.leases.insert(
            id,
            Lease {
                ttl,
                deadline: Instant::now() + ttl,
                keys: HashSet::new(),
            },
        );
        Ok(id)
    }

    async fn lease_keepalive(&self, lease: LeaseId) -> Result<(), FabricError> {
        let mut inner = self.inner.lock();
        match inner.leases.get_mut(&lease) {
            Some(entry) => {
                entry.deadline = Instant::now() + entry.ttl;
                Ok(())
            }
            None => Err(FabricError::store_transient(format!(
                "lease {lease} not found (expired or revoked)"
            ))),
        }
    }

    async fn lease_revoke(&self, lease: LeaseId) -> Result<(), FabricError> {
        let mut removed_keys = Vec::new();
        {
            let mut inner = self.inner.lock();
            if let Some(entry) = inner.leases.remove(&lease) {
                for key in entry.keys {
                    if inner.entries.remove(&key).is_some() {
                        removed_keys.push(key);
                    }
                }
            }
        }
        for key in removed_keys {
            let _ = self.watch_tx.send(WatchEvent::Delete { key });
        }
        Ok(())
    }

    async fn put(&self, key: &str, value: Vec<u8>, expiry: Expiry) -> Result<(), FabricError> {
        {
            let mut inner = self.inner.lock();
            let entry_expiry = match expiry {
                Expiry::Lease(lease_id) => {
                    let lease = inner.leases.get_mut(&lease_id).ok_or_else(|| {
                        FabricError::store_transient(format!("lease {lease_id} not found"))
                    })?;
                    lease.keys.insert(key.to_string());
                    EntryExpiry::Lease(lease_id)
                }
                Expiry::Ttl(ttl) => EntryExpiry::At(Instant::now() + ttl),
                Expiry::Never => EntryExpiry::Never,
            };
            inner.entries.insert(
                key.to_string(),
                Entry {
                    value: value.clone(),
                    expiry: entry_expiry,
                },
            );
        }
        let _ = self.watch_tx.send(WatchEvent::Put {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, FabricError> {
        let inner = self.inner.lock();
        Ok(inner.entries.get(key).map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), FabricError> {
        let existed = {
            let mut inner = self.inner.lock();
            inner.entries.remove(key).is_some()
        };
        if existed {
            let _ = self.watch_tx.send(WatchEvent::Delete {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, FabricError> {
        let inner = self.inner.lock();
        Ok(inner
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect())
    }

    fn watch_prefix(&self, prefix: &str) -> broadcast::Receiver<WatchEvent> {
        let mut upstream = self.watch_tx.subscribe();
        let (tx, rx) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        let prefix = prefix.to_string();
        tokio::spawn(async move {
            loop {
                match upstream.recv().await {
                    Ok(event) => {
                        let matches = match &event {
                            WatchEvent::Put { key, .. } | WatchEvent::Delete { key } => {
                                key.starts_with(&prefix)
                            }
                        };
                        if matches && tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn lease_revoke_removes_all_keys_under_it() {
        let store = MemoryStore::new();
        let lease = store.lease_grant(Duration::from_secs(30)).await.unwrap();
        store
            .put("game/n1", b"a".to_vec(), Expiry::Lease(lease))
            .await
            .unwrap();
        store
            .put("game/n2", b"b".to_vec(), Expiry::Lease(lease))
            .await
            .unwrap();

        store.lease_revoke(lease).await.unwrap();

        assert!(store.get("game/n1").await.unwrap().is_none());
        assert!(store.get("game/n2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prefix_match_is_exact_not_fuzzy() {
        let store = MemoryStore::new();
        store
            .put("game/v1", b"x".to_vec(), Expiry::Never)
            .await
            .unwrap();
        store
            .put("game/v10", b"y".to_vec(), Expiry::Never)
            .await
            .unwrap();

        let matches = store.scan_prefix("game/v1").await.unwrap();
        assert_eq!(matches.len(), 2);

        let exact = store.scan_prefix("game/v1\0").await.unwrap();
        assert_eq!(exact.len(), 0);
    }

    #[tokio::test]
    async fn ttl_entries_expire_on_their_own() {
        let store = MemoryStore::new();
        store
            .put("route/u1", b"node-a".to_vec(), Expiry::Ttl(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(store.get("route/u1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(store.get("route/u1").await.unwrap().is_none());
    }
}
