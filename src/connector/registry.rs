//! Sharded client registry. FNV is already in the dependency stack for
//! exactly this — a fast, non-crypto hash over short user-id strings to
//! pick a shard, the same tradeoff other axum/websocket gateways make for
//! connection-table sharding.

use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Arc;

use fnv::FnvHasher;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::session::OutboundFrame;

pub type UserId = String;

/// One live connection's outbound half: a channel the dispatch/push paths
/// write encoded frames to; the connection's writer task drains it.
#[derive(Clone)]
pub struct ClientHandle {
    pub outbound: mpsc::Sender<OutboundFrame>,
}

struct Shard {
    clients: RwLock<HashMap<UserId, ClientHandle>>,
}

/// `registry_shards` buckets, each independently
/// lockable so one busy user never blocks lookups for the rest.
pub struct ClientRegistry {
    shards: Vec<Shard>,
}

impl ClientRegistry {
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let shards = (0..shard_count)
            .map(|_| Shard { clients: RwLock::new(HashMap::new()) })
            .collect();
        Self { shards }
    }

    fn shard_index(&self, user_id: &str) -> usize {
        let mut hasher = FnvHasher::default();
        hasher.write(user_id.as_bytes());
        (hasher.finish() as usize) % self.shards.len()
    }

    pub fn register(&self, user_id: UserId, handle: ClientHandle) {
        let shard = &self.shards[self.shard_index(&user_id)];
        shard.clients.write().insert(user_id, handle);
    }

    pub fn unregister(&self, user_id: &str) {
        let shard = &self.shards[self.shard_index(user_id)];
        shard.clients.write().remove(user_id);
    }

    pub fn get(&self, user_id: &str) -> Option<ClientHandle> {
        let shard = &self.shards[self.shard_index(user_id)];
        shard.clients.read().get(user_id).cloned()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        let shard = &self.shards[self.shard_index(user_id)];
        shard.clients.read().contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.clients.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type SharedRegistry = Arc<ClientRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> ClientHandle {
        let (tx, _rx) = mpsc::channel(8);
        ClientHandle { outbound: tx }
    }

    #[test]
    fn register_and_lookup_round_trip() {
        let registry = ClientRegistry::new(4);
        registry.register("u1".into(), handle());
        assert!(registry.contains("u1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_removes_the_client() {
        let registry = ClientRegistry::new(4);
        registry.register("u1".into(), handle());
        registry.unregister("u1");
        assert!(!registry.contains("u1"));
    }

    #[test]
    fn the_same_user_always_hashes_to_the_same_shard() {
        let registry = ClientRegistry::new(32);
        let a = registry.shard_index("same-user");
        let b = registry.shard_index("same-user");
        assert_eq!(a, b);
    }
}
