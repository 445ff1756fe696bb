//! Per-pool driver task: trigger channel + a
//! fallback interval ticker, popping batches until the pool runs dry and
//! emitting one `MatchResult` per batch on the unified result channel.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{info, warn};

use super::config::PoolConfig;
use super::pool::MatchPools;
use super::result::MatchResult;
use crate::discovery::Seeker;
use crate::store::RouteStore;

const LOG_TARGET: &str = "matchmaker::driver";

/// Non-blocking wake signal a `JoinQueue` caller sends after every
/// successful join.
#[derive(Clone)]
pub struct PoolTrigger {
    pub(crate) tx: mpsc::Sender<()>,
}

impl PoolTrigger {
    pub fn wake(&self) {
        let _ = self.tx.try_send(());
    }
}

pub fn spawn_pool_driver(
    cfg: PoolConfig,
    pools: Arc<MatchPools>,
    game_seeker: Arc<Seeker>,
    route_store: Arc<RouteStore>,
    results: mpsc::Sender<MatchResult>,
) -> PoolTrigger {
    let (tx, mut rx) = mpsc::channel::<()>(1);
    let trigger = PoolTrigger { tx };

    tokio::spawn(async move {
        let mut ticker = interval(cfg.interval);
        loop {
            tokio::select! {
                woken = rx.recv() => {
                    if woken.is_none() {
                        return;
                    }
                }
                _ = ticker.tick() => {}
            }

            loop {
                let batch = pools.pop_players(&cfg.pool_id, cfg.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                let mut resolved = Vec::with_capacity(batch.len());
                for user_id in &batch {
                    match route_store.connector_node(user_id).await {
                        Ok(Some(connector_id)) => resolved.push((user_id.clone(), connector_id)),
                        Ok(None) => {
                            warn!(
                                target: LOG_TARGET,
                                pool_id = %cfg.pool_id,
                                user_id,
                                "no connector route for matched player, re-queueing batch"
                            );
                        }
                        Err(err) => {
                            warn!(target: LOG_TARGET, user_id, error = %err, "connector route lookup failed");
                        }
                    }
                }

                if resolved.len() != batch.len() {
                    // A partial resolve means at least one player's route
                    // vanished (disconnect raced the pop). Re-enqueue the
                    // whole batch rather than seat a short-handed room.
                    let rescue: Vec<(String, i64)> =
                        batch.iter().map(|u| (u.clone(), 0)).collect();
                    pools.requeue_preserving_scores(&cfg.pool_id, rescue).await;
                    continue;
                }

                let game_node = match game_seeker.pick() {
                    Ok(server) => server,
                    Err(err) => {
                        warn!(target: LOG_TARGET, pool_id = %cfg.pool_id, error = %err, "no game node available, re-queueing batch");
                        let rescue: Vec<(String, i64)> =
                            batch.iter().map(|u| (u.clone(), 0)).collect();
                        pools.requeue_preserving_scores(&cfg.pool_id, rescue).await;
                        continue;
                    }
                };

                info!(
                    target: LOG_TARGET,
                    pool_id = %cfg.pool_id,
                    game_node = %game_node.node_id,
                    batch = ?batch,
                    "batch popped, dispatching create_room"
                );

                let match_result = MatchResult {
                    pool_id: cfg.pool_id.clone(),
                    players: resolved,
                    game_node_id: game_node.node_id.clone(),
                    game_node_addr: game_node.address.clone(),
                };

                if results.send(match_result).await.is_err() {
                    return;
                }
            }
        }
    });

    trigger
}
