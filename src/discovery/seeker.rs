//! Pull-path API built on top of a running [`Resolver`]: "give me a server
//! for this role" with a selection strategy applied.

use std::sync::Arc;

use super::resolver::Resolver;
use super::selector::{select, SelectError, SelectionStrategy};
use super::types::{Role, ServerInfo};

pub struct Seeker {
    resolver: Arc<Resolver>,
    strategy: SelectionStrategy,
}

impl Seeker {
    pub fn new(resolver: Arc<Resolver>, strategy: SelectionStrategy) -> Self {
        Self { resolver, strategy }
    }

    pub fn role(&self) -> Role {
        self.resolver.role()
    }

    pub fn get_servers(&self) -> Vec<ServerInfo> {
        self.resolver.servers()
    }

    /// One node for this role, chosen per `strategy`.
    pub fn pick(&self) -> Result<ServerInfo, SelectError> {
        let servers = self.resolver.servers();
        select(self.strategy, &servers).cloned()
    }

    pub fn pick_excluding(&self, exclude_node_id: &str) -> Result<ServerInfo, SelectError> {
        let servers: Vec<ServerInfo> = self
            .resolver
            .servers()
            .into_iter()
            .filter(|s| s.node_id != exclude_node_id)
            .collect();
        select(self.strategy, &servers).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kv::Expiry;
    use crate::store::memory::MemoryStore;

    fn info(node_id: &str, load: u32) -> ServerInfo {
        ServerInfo {
            node_id: node_id.to_string(),
            address: "127.0.0.1:1".to_string(),
            weight: 1,
            load,
            ttl: 30,
            version: "1".to_string(),
        }
    }

    #[tokio::test]
    async fn pick_returns_least_loaded_server() {
        let kv = MemoryStore::new();
        kv.put("game/a", serde_json::to_vec(&info("a", 10)).unwrap(), Expiry::Never)
            .await
            .unwrap();
        kv.put("game/b", serde_json::to_vec(&info("b", 1)).unwrap(), Expiry::Never)
            .await
            .unwrap();

        let resolver = Arc::new(Resolver::start(kv, Role::Game).await.unwrap());
        let seeker = Seeker::new(resolver, SelectionStrategy::LeastLoad);
        assert_eq!(seeker.pick().unwrap().node_id, "b");
    }

    #[tokio::test]
    async fn pick_excluding_drops_named_node() {
        let kv = MemoryStore::new();
        kv.put("game/a", serde_json::to_vec(&info("a", 0)).unwrap(), Expiry::Never)
            .await
            .unwrap();

        let resolver = Arc::new(Resolver::start(kv, Role::Game).await.unwrap());
        let seeker = Seeker::new(resolver, SelectionStrategy::LeastLoad);
        let err = seeker.pick_excluding("a").unwrap_err();
        assert!(matches!(err, SelectError::NoServer));
    }
}
