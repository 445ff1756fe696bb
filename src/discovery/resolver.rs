//! Prefix-watch push path: keeps an in-memory view of every live node for
//! a role, fed by an initial scan plus incremental watch events.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::types::{Role, ServerInfo};
use crate::errors::FabricError;
use crate::store::kv::{KvStore, WatchEvent};

const LOG_TARGET: &str = "discovery::resolver";

/// Live view of every node registered under one role, updated as watch
/// events arrive. Reads never touch the store; they read the cached view.
pub struct Resolver {
    role: Role,
    view: Arc<RwLock<HashMap<String, ServerInfo>>>,
}

impl Resolver {
    /// Performs the initial full scan under the role's prefix, then spawns
    /// a task applying subsequent watch events to the cached view.
    pub async fn start(kv: Arc<dyn KvStore>, role: Role) -> Result<Self, FabricError> {
        let prefix = ServerInfo::role_prefix(role);
        let initial = kv.scan_prefix(&prefix).await?;

        let mut view = HashMap::new();
        for (key, value) in initial {
            match decode(&key, &value) {
                Some(info) => {
                    view.insert(info.node_id.clone(), info);
                }
                None => continue,
            }
        }

        let view = Arc::new(RwLock::new(view));
        let mut rx = kv.watch_prefix(&prefix);

        let task_view = Arc::clone(&view);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(WatchEvent::Put { key, value }) => {
                        if let Some(info) = decode(&key, &value) {
                            task_view.write().insert(info.node_id.clone(), info);
                        }
                    }
                    Ok(WatchEvent::Delete { key }) => {
                        if let Some(node_id) = node_id_from_key(&key) {
                            task_view.write().remove(&node_id);
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: LOG_TARGET, skipped, "resolver watch lagged, view may be stale until next put/delete");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!(target: LOG_TARGET, "watch channel closed, resolver stopping");
                        return;
                    }
                }
            }
        });

        Ok(Self { role, view })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Snapshot of every currently-known server for this role.
    pub fn servers(&self) -> Vec<ServerInfo> {
        self.view.read().values().cloned().collect()
    }

    pub fn get(&self, node_id: &str) -> Option<ServerInfo> {
        self.view.read().get(node_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.view.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.read().is_empty()
    }
}

fn node_id_from_key(key: &str) -> Option<String> {
    key.split_once('/').map(|(_, node_id)| node_id.to_string())
}

fn decode(key: &str, value: &[u8]) -> Option<ServerInfo> {
    match serde_json::from_slice::<ServerInfo>(value) {
        Ok(info) => Some(info),
        Err(err) => {
            warn!(target: LOG_TARGET, key, error = %err, "dropping undecodable registry entry");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kv::Expiry;
    use crate::store::memory::MemoryStore;
    use std::time::Duration;

    fn info(node_id: &str) -> ServerInfo {
        ServerInfo {
            node_id: node_id.to_string(),
            address: "127.0.0.1:1".to_string(),
            weight: 1,
            load: 0,
            ttl: 30,
            version: "1".to_string(),
        }
    }

    #[tokio::test]
    async fn initial_scan_picks_up_existing_entries() {
        let kv = MemoryStore::new();
        kv.put(
            "game/g1",
            serde_json::to_vec(&info("g1")).unwrap(),
            Expiry::Never,
        )
        .await
        .unwrap();

        let resolver = Resolver::start(kv, Role::Game).await.unwrap();
        assert_eq!(resolver.len(), 1);
        assert!(resolver.get("g1").is_some());
    }

    #[tokio::test]
    async fn watch_applies_put_and_delete_incrementally() {
        let kv = MemoryStore::new();
        let resolver = Resolver::start(kv.clone(), Role::Game).await.unwrap();
        assert!(resolver.is_empty());

        kv.put(
            "game/g2",
            serde_json::to_vec(&info("g2")).unwrap(),
            Expiry::Never,
        )
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(resolver.len(), 1);

        kv.delete("game/g2").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(resolver.is_empty());
    }

    #[tokio::test]
    async fn prefix_is_role_scoped_not_fuzzy() {
        let kv = MemoryStore::new();
        kv.put(
            "game/g1",
            serde_json::to_vec(&info("g1")).unwrap(),
            Expiry::Never,
        )
        .await
        .unwrap();
        kv.put(
            "connector/c1",
            serde_json::to_vec(&info("c1")).unwrap(),
            Expiry::Never,
        )
        .await
        .unwrap();

        let resolver = Resolver::start(kv, Role::Game).await.unwrap();
        assert_eq!(resolver.len(), 1);
        assert!(resolver.get("c1").is_none());
    }
}
