//! `MatchResult` and the single result consumer.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::pool::{MatchPools, UserId};
use crate::bus::{MemoryBus, ServicePacket};
use crate::store::RouteStore;

const LOG_TARGET: &str = "matchmaker::result";
const CREATE_ROOM_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub pool_id: String,
    /// `userID -> connectorNodeID`, resolved before the game node is picked
    /// so the create-room request carries everything the room needs to
    /// seed `userMap`.
    pub players: Vec<(UserId, String)>,
    pub game_node_id: String,
    pub game_node_addr: String,
}

/// Consumes every [`MatchResult`] off the unified channel, calls
/// `GameNode.CreateRoom` over the bus with a 5s deadline, and on failure
/// re-enqueues the batch.
pub async fn run_result_consumer(
    mut results: mpsc::Receiver<MatchResult>,
    bus: Arc<MemoryBus>,
    route_store: Arc<RouteStore>,
    pools: Arc<MatchPools>,
    from_subject: String,
    original_scores: Arc<dashmap::DashMap<UserId, i64>>,
) {
    while let Some(result) = results.recv().await {
        let user_ids: Vec<String> = result.players.iter().map(|(u, _)| u.clone()).collect();
        let destination = result.game_node_id.clone();

        let request = ServicePacket::request(
            from_subject.clone(),
            destination.clone(),
            0,
            "createRoom",
            json!({
                "players": result.players,
                "poolId": result.pool_id,
            }),
        );

        match bus.request(request, Some(CREATE_ROOM_TIMEOUT)).await {
            Ok(response) if response.error.is_none() => {
                for (user_id, connector_node_id) in &result.players {
                    if let Err(err) = route_store.set_game_node(user_id, &result.game_node_id).await {
                        warn!(target: LOG_TARGET, user_id, error = %err, "failed to persist game route");
                    }
                    if let Err(err) = route_store.set_connector_node(user_id, connector_node_id).await {
                        warn!(target: LOG_TARGET, user_id, error = %err, "failed to refresh connector route");
                    }
                }
                info!(
                    target: LOG_TARGET,
                    pool_id = %result.pool_id,
                    game_node = %result.game_node_id,
                    players = ?user_ids,
                    "room created"
                );
            }
            Ok(response) => {
                warn!(
                    target: LOG_TARGET,
                    pool_id = %result.pool_id,
                    error = ?response.error,
                    "create_room rejected, rolling back batch"
                );
                rollback(&pools, &original_scores, &result).await;
            }
            Err(err) => {
                warn!(
                    target: LOG_TARGET,
                    pool_id = %result.pool_id,
                    error = %err,
                    "create_room request failed, rolling back batch"
                );
                rollback(&pools, &original_scores, &result).await;
            }
        }
    }
}

async fn rollback(
    pools: &Arc<MatchPools>,
    original_scores: &Arc<dashmap::DashMap<UserId, i64>>,
    result: &MatchResult,
) {
    let batch: Vec<(UserId, i64)> = result
        .players
        .iter()
        .filter_map(|(user_id, _)| {
            original_scores
                .get(user_id)
                .map(|score| (user_id.clone(), *score))
        })
        .collect();
    pools.requeue_preserving_scores(&result.pool_id, batch).await;
}
