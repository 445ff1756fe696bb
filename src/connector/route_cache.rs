//! TTL-bounded cache in front of [`RouteStore`] lookups: every outbound game message would otherwise cost a
//! store round trip, so the gateway remembers the answer for a short
//! window and only re-reads the store on a miss or after expiry.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::errors::FabricError;
use crate::store::RouteStore;

const CACHE_TTL: Duration = Duration::from_secs(30);

pub struct RouteCache {
    store: RouteStore,
    game_routes: DashMap<String, (String, Instant)>,
}

impl RouteCache {
    pub fn new(store: RouteStore) -> Self {
        Self {
            store,
            game_routes: DashMap::new(),
        }
    }

    /// Resolves the game node currently hosting `user_id`'s room, serving
    /// a cached hit when it's younger than `CACHE_TTL` and falling back to
    /// the shared route store otherwise.
    pub async fn game_node(&self, user_id: &str) -> Result<Option<String>, FabricError> {
        if let Some(entry) = self.game_routes.get(user_id) {
            let (node_id, stamped_at) = entry.value().clone();
            if stamped_at.elapsed() < CACHE_TTL {
                return Ok(Some(node_id));
            }
        }
        let fetched = self.store.game_node(user_id).await?;
        if let Some(node_id) = &fetched {
            self.game_routes.insert(user_id.to_string(), (node_id.clone(), Instant::now()));
        } else {
            self.game_routes.remove(user_id);
        }
        Ok(fetched)
    }

    pub fn invalidate(&self, user_id: &str) {
        self.game_routes.remove(user_id);
    }

    /// Seeds the cache directly, bypassing the store round trip. Used when
    /// a `matchSuccess` push already tells us the answer.
    pub fn set(&self, user_id: &str, game_node_id: &str) {
        self.game_routes
            .insert(user_id.to_string(), (game_node_id.to_string(), Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn caches_a_hit_without_rereading_the_store() {
        let route_store = RouteStore::new(MemoryStore::new(), StdDuration::from_secs(7200));
        route_store.set_game_node("u1", "game-1").await.unwrap();
        let cache = RouteCache::new(route_store.clone());

        assert_eq!(cache.game_node("u1").await.unwrap().as_deref(), Some("game-1"));
        route_store.clear_game_node("u1").await.unwrap();
        // Still cached, so the clear above isn't observed yet.
        assert_eq!(cache.game_node("u1").await.unwrap().as_deref(), Some("game-1"));
    }

    #[tokio::test]
    async fn invalidate_forces_a_fresh_read() {
        let route_store = RouteStore::new(MemoryStore::new(), StdDuration::from_secs(7200));
        route_store.set_game_node("u1", "game-1").await.unwrap();
        let cache = RouteCache::new(route_store.clone());
        cache.game_node("u1").await.unwrap();

        route_store.clear_game_node("u1").await.unwrap();
        cache.invalidate("u1");
        assert_eq!(cache.game_node("u1").await.unwrap(), None);
    }
}
