//! `game:router:{userID}` / `connector:router:{userID}` route entries.
//! Both TTL 2h, written on match-success / connect, read for push
//! routing, deleted on game end / disconnect.

use std::sync::Arc;
use std::time::Duration;

use crate::errors::FabricError;
use crate::store::kv::{Expiry, KvStore};

fn game_router_key(user_id: &str) -> String {
    format!("game:router:{user_id}")
}

fn connector_router_key(user_id: &str) -> String {
    format!("connector:router:{user_id}")
}

#[derive(Clone)]
pub struct RouteStore {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl RouteStore {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    pub async fn set_game_node(&self, user_id: &str, game_node_id: &str) -> Result<(), FabricError> {
        self.kv
            .put(
                &game_router_key(user_id),
                game_node_id.as_bytes().to_vec(),
                Expiry::Ttl(self.ttl),
            )
            .await
    }

    pub async fn game_node(&self, user_id: &str) -> Result<Option<String>, FabricError> {
        self.decode(self.kv.get(&game_router_key(user_id)).await?)
    }

    pub async fn clear_game_node(&self, user_id: &str) -> Result<(), FabricError> {
        self.kv.delete(&game_router_key(user_id)).await
    }

    pub async fn set_connector_node(
        &self,
        user_id: &str,
        connector_node_id: &str,
    ) -> Result<(), FabricError> {
        self.kv
            .put(
                &connector_router_key(user_id),
                connector_node_id.as_bytes().to_vec(),
                Expiry::Ttl(self.ttl),
            )
            .await
    }

    pub async fn connector_node(&self, user_id: &str) -> Result<Option<String>, FabricError> {
        self.decode(self.kv.get(&connector_router_key(user_id)).await?)
    }

    pub async fn clear_connector_node(&self, user_id: &str) -> Result<(), FabricError> {
        self.kv.delete(&connector_router_key(user_id)).await
    }

    fn decode(&self, raw: Option<Vec<u8>>) -> Result<Option<String>, FabricError> {
        Ok(match raw {
            Some(bytes) => Some(String::from_utf8(bytes).map_err(|e| {
                FabricError::store_transient(format!("route entry was not utf-8: {e}"))
            })?),
            None => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn round_trips_both_route_kinds() {
        let routes = RouteStore::new(MemoryStore::new(), Duration::from_secs(7200));
        routes.set_game_node("u1", "game-7").await.unwrap();
        routes.set_connector_node("u1", "conn-2").await.unwrap();

        assert_eq!(routes.game_node("u1").await.unwrap().as_deref(), Some("game-7"));
        assert_eq!(
            routes.connector_node("u1").await.unwrap().as_deref(),
            Some("conn-2")
        );

        routes.clear_game_node("u1").await.unwrap();
        assert_eq!(routes.game_node("u1").await.unwrap(), None);
    }
}
