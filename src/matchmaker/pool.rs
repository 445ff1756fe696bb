//! Atomic match-pool primitives.
//!
//! A production deployment would run these as server-side scripts against
//! a shared store (Lua against Redis, or a Lock-free CAS against etcd).
//! The in-process reference here gets the same atomicity by guarding each
//! pool's ordered set behind its own `tokio::sync::Mutex`. A pool could in
//! principle process multiple batches concurrently if its driver were
//! replicated; this reference runs exactly one driver per pool to avoid
//! racing.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

pub type UserId = String;
pub type PoolId = String;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinQueueError {
    #[error("user is already queued in pool {0}")]
    AlreadyInQueue(PoolId),
    #[error("user is queued in a different pool: {0}")]
    InOtherPool(PoolId),
}

/// One pool's ordered set (score = enqueue timestamp, ties broken by
/// insertion order since `BTreeMap` keys must be unique) plus the shared
/// `userID -> poolID` map.
struct PoolState {
    /// Keyed by `(score, sequence)` so FIFO ordering holds even when two
    /// joins land on the same millisecond timestamp.
    queue: BTreeMap<(i64, u64), UserId>,
    members: std::collections::HashMap<UserId, (i64, u64)>,
}

impl PoolState {
    fn new() -> Self {
        Self {
            queue: BTreeMap::new(),
            members: std::collections::HashMap::new(),
        }
    }
}

/// Shared across every pool; `user_pool` is a single map, global across all
/// pools, so `JoinQueue` can detect cross-pool membership in one lookup.
pub struct MatchPools {
    pools: DashMap<PoolId, Arc<Mutex<PoolState>>>,
    user_pool: DashMap<UserId, PoolId>,
    sequence: std::sync::atomic::AtomicU64,
}

impl MatchPools {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pools: DashMap::new(),
            user_pool: DashMap::new(),
            sequence: std::sync::atomic::AtomicU64::new(0),
        })
    }

    fn pool_lock(&self, pool_id: &str) -> Arc<Mutex<PoolState>> {
        self.pools
            .entry(pool_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(PoolState::new())))
            .clone()
    }

    /// `JoinQueue`. Refuses if the user is queued
    /// elsewhere; `AlreadyInQueue` if already in this same pool; otherwise
    /// inserts atomically into both structures.
    pub async fn join_queue(
        &self,
        pool_id: &str,
        user_id: &str,
        score: i64,
    ) -> Result<(), JoinQueueError> {
        if let Some(existing) = self.user_pool.get(user_id).map(|e| e.value().clone()) {
            if existing == pool_id {
                return Err(JoinQueueError::AlreadyInQueue(existing));
            }
            return Err(JoinQueueError::InOtherPool(existing));
        }

        let lock = self.pool_lock(pool_id);
        let mut state = lock.lock().await;
        let seq = self.sequence.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        state.queue.insert((score, seq), user_id.to_string());
        state.members.insert(user_id.to_string(), (score, seq));
        drop(state);

        self.user_pool.insert(user_id.to_string(), pool_id.to_string());
        Ok(())
    }

    /// `RemoveFromQueue`. Idempotent: removing an absent user is a no-op
    /// success.
    pub async fn remove_from_queue(&self, user_id: &str) {
        let Some((_, pool_id)) = self.user_pool.remove(user_id) else {
            return;
        };
        let lock = self.pool_lock(&pool_id);
        let mut state = lock.lock().await;
        if let Some(key) = state.members.remove(user_id) {
            state.queue.remove(&key);
        }
    }

    /// `PopPlayers(pool, N)`: all-or-nothing, FIFO by enqueue order.
    /// Returns an empty vec if fewer than `n` are queued — no partial pop.
    pub async fn pop_players(&self, pool_id: &str, n: usize) -> Vec<UserId> {
        if n == 0 {
            return Vec::new();
        }
        let lock = self.pool_lock(pool_id);
        let mut state = lock.lock().await;
        if state.queue.len() < n {
            return Vec::new();
        }

        let keys: Vec<(i64, u64)> = state.queue.keys().take(n).cloned().collect();
        let mut popped = Vec::with_capacity(n);
        for key in keys {
            let user_id = state.queue.remove(&key).expect("key just read from queue");
            state.members.remove(&user_id);
            popped.push(user_id);
        }
        drop(state);

        for user_id in &popped {
            self.user_pool.remove(user_id);
        }
        popped
    }

    /// Re-enqueues a batch at its original scores. A user who raced a concurrent
    /// `JoinQueue` elsewhere in the meantime is skipped and logged by the
    /// caller, not retried here.
    pub async fn requeue_preserving_scores(&self, pool_id: &str, users: Vec<(UserId, i64)>) {
        let lock = self.pool_lock(pool_id);
        let mut state = lock.lock().await;
        for (user_id, score) in users {
            if self.user_pool.contains_key(&user_id) {
                continue;
            }
            let seq = self.sequence.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            state.queue.insert((score, seq), user_id.clone());
            state.members.insert(user_id.clone(), (score, seq));
            self.user_pool.insert(user_id, pool_id.to_string());
        }
    }

    pub fn queue_len(&self, pool_id: &str) -> usize {
        self.pools
            .get(pool_id)
            .map(|lock| lock.try_lock().map(|s| s.queue.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn pool_of(&self, user_id: &str) -> Option<PoolId> {
        self.user_pool.get(user_id).map(|e| e.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_then_join_same_pool_is_already_in_queue() {
        let pools = MatchPools::new();
        pools.join_queue("classic:casual4", "u1", 1).await.unwrap();
        let err = pools.join_queue("classic:casual4", "u1", 2).await.unwrap_err();
        assert_eq!(err, JoinQueueError::AlreadyInQueue("classic:casual4".into()));
    }

    #[tokio::test]
    async fn join_different_pool_while_queued_is_refused() {
        let pools = MatchPools::new();
        pools.join_queue("classic:casual4", "u1", 1).await.unwrap();
        let err = pools.join_queue("classic:rank4", "u1", 2).await.unwrap_err();
        assert_eq!(err, JoinQueueError::InOtherPool("classic:casual4".into()));
    }

    #[tokio::test]
    async fn pop_below_batch_size_returns_empty_and_changes_nothing() {
        let pools = MatchPools::new();
        pools.join_queue("p", "u1", 1).await.unwrap();
        pools.join_queue("p", "u2", 2).await.unwrap();

        let popped = pools.pop_players("p", 4).await;
        assert!(popped.is_empty());
        assert_eq!(pools.queue_len("p"), 2);
        assert!(pools.pool_of("u1").is_some());
    }

    #[tokio::test]
    async fn pop_is_all_or_nothing_and_fifo() {
        let pools = MatchPools::new();
        pools.join_queue("p", "u1", 100).await.unwrap();
        pools.join_queue("p", "u2", 50).await.unwrap();
        pools.join_queue("p", "u3", 75).await.unwrap();
        pools.join_queue("p", "u4", 10).await.unwrap();

        let popped = pools.pop_players("p", 4).await;
        assert_eq!(popped, vec!["u4", "u2", "u3", "u1"]);
        assert_eq!(pools.queue_len("p"), 0);
        for u in ["u1", "u2", "u3", "u4"] {
            assert!(pools.pool_of(u).is_none());
        }
    }

    #[tokio::test]
    async fn remove_from_queue_is_idempotent() {
        let pools = MatchPools::new();
        pools.join_queue("p", "u1", 1).await.unwrap();
        pools.remove_from_queue("u1").await;
        pools.remove_from_queue("u1").await;
        assert_eq!(pools.queue_len("p"), 0);
    }

    #[tokio::test]
    async fn requeue_preserves_original_score_order() {
        let pools = MatchPools::new();
        pools.join_queue("p", "u1", 5).await.unwrap();
        pools.join_queue("p", "u2", 10).await.unwrap();
        let popped = pools.pop_players("p", 2).await;
        assert_eq!(popped, vec!["u1", "u2"]);

        pools
            .requeue_preserving_scores("p", vec![("u2".into(), 10), ("u1".into(), 5)])
            .await;
        let popped_again = pools.pop_players("p", 2).await;
        assert_eq!(popped_again, vec!["u1", "u2"]);
    }
}
