//! Bus-facing entry point for `march.joinqueue` / `march.leavequeue`
//!. Wraps [`MatchPools`] with the
//! enqueue-timestamp bookkeeping the driver needs for rollback.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use super::driver::PoolTrigger;
use super::pool::{JoinQueueError, MatchPools, UserId};

const LOG_TARGET: &str = "matchmaker::service";

pub struct MatchmakerService {
    pools: Arc<MatchPools>,
    triggers: HashMap<String, PoolTrigger>,
    /// Last enqueue score seen per user, consulted by the result consumer
    /// on rollback. Cleared once the user leaves every pool.
    original_scores: Arc<DashMap<UserId, i64>>,
}

impl MatchmakerService {
    pub fn new(pools: Arc<MatchPools>, triggers: HashMap<String, PoolTrigger>) -> Self {
        Self {
            pools,
            triggers,
            original_scores: Arc::new(DashMap::new()),
        }
    }

    pub fn original_scores(&self) -> Arc<DashMap<UserId, i64>> {
        Arc::clone(&self.original_scores)
    }

    pub async fn join_queue(
        &self,
        pool_id: &str,
        user_id: &str,
        score: i64,
    ) -> Result<(), JoinQueueError> {
        self.pools.join_queue(pool_id, user_id, score).await?;
        self.original_scores.insert(user_id.to_string(), score);
        info!(target: LOG_TARGET, pool_id, user_id, "joined queue");
        if let Some(trigger) = self.triggers.get(pool_id) {
            trigger.wake();
        }
        Ok(())
    }

    pub async fn leave_queue(&self, user_id: &str) {
        self.pools.remove_from_queue(user_id).await;
        self.original_scores.remove(user_id);
        info!(target: LOG_TARGET, user_id, "left queue");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_queue_wakes_the_pools_trigger() {
        let pools = MatchPools::new();
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        let mut triggers = HashMap::new();
        triggers.insert("p".to_string(), PoolTrigger { tx });
        let svc = MatchmakerService::new(pools, triggers);

        svc.join_queue("p", "u1", 1).await.unwrap();
        rx.try_recv().expect("trigger should have fired");
    }
}
