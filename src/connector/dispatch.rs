//! Client `Message` routing: the first
//! dot-segment of the route picks the destination service; everything
//! past that is translated into whatever internal shape that service
//! expects and sent over the bus.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::bus::{MemoryBus, ServicePacket};
use crate::discovery::Seeker;
use crate::errors::FabricError;
use crate::game::engine::events::GameEvent;
use crate::game::engine::types::Tile;
use crate::protocol::message::Message;

use super::route_cache::RouteCache;

const LOG_TARGET: &str = "connector::dispatch";
const GAME_EVENT_ROUTE: &str = "game.event";
const MATCHMAKER_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

pub struct Dispatcher {
    pub bus: Arc<MemoryBus>,
    pub from_subject: String,
    pub route_cache: Arc<RouteCache>,
    pub march_seeker: Arc<Seeker>,
}

#[derive(Debug, Deserialize)]
struct JoinQueueBody {
    pool_id: String,
    score: i64,
}

impl Dispatcher {
    /// Handles one already-authenticated client `Message`. Requests get a
    /// reply `Message` back to the caller; notifies return `None`.
    pub async fn handle(&self, user_id: &str, message: Message) -> Result<Option<Message>, FabricError> {
        match message.route_prefix() {
            "connector" => self.handle_connector_route(user_id, message).await,
            "game" => self.handle_game_route(user_id, message).await,
            other => Err(FabricError::ClientProtocol(format!("unknown route prefix {other}"))),
        }
    }

    async fn handle_connector_route(&self, user_id: &str, message: Message) -> Result<Option<Message>, FabricError> {
        let march = self
            .march_seeker
            .pick()
            .map_err(|e| FabricError::routing(format!("no matchmaker available: {e}")))?;

        match message.route.as_str() {
            "connector.joinqueue" => {
                let body: JoinQueueBody = serde_json::from_value(message.data.clone())
                    .map_err(|e| FabricError::ClientProtocol(format!("bad joinqueue body: {e}")))?;
                let request = ServicePacket::request(
                    self.from_subject.clone(),
                    march.node_id.clone(),
                    0,
                    "joinQueue",
                    json!({ "poolId": body.pool_id, "userId": user_id, "score": body.score }),
                );
                let response = self.bus.request(request, Some(MATCHMAKER_TIMEOUT)).await?;
                Ok(Some(reply_for(&message, response)))
            }
            "connector.leavequeue" => {
                let notify = ServicePacket::notify(
                    self.from_subject.clone(),
                    march.node_id.clone(),
                    "leaveQueue",
                    json!({ "userId": user_id }),
                );
                self.bus.publish(notify).await?;
                Ok(None)
            }
            other => Err(FabricError::ClientProtocol(format!("unknown connector route {other}"))),
        }
    }

    async fn handle_game_route(&self, user_id: &str, message: Message) -> Result<Option<Message>, FabricError> {
        let event = decode_game_event(user_id, &message)?;
        let Some(game_node_id) = self.route_cache.game_node(user_id).await? else {
            return Err(FabricError::routing(format!("no active room for user {user_id}")));
        };

        let notify = ServicePacket::notify(
            self.from_subject.clone(),
            game_node_id,
            GAME_EVENT_ROUTE,
            json!({ "user_id": user_id, "event": event }),
        );
        if let Err(err) = self.bus.publish(notify).await {
            warn!(target: LOG_TARGET, user_id, error = %err, "failed to forward game event");
            return Err(err);
        }
        Ok(None)
    }
}

fn reply_for(request: &Message, response: ServicePacket) -> Message {
    let id = request.id.unwrap_or(0);
    match response.error {
        Some(err) => Message::error_response(id, request.route.clone(), err),
        None => Message::response(id, request.route.clone(), response.data),
    }
}

#[derive(Debug, Deserialize)]
struct TileBody {
    tile: Tile,
}

#[derive(Debug, Deserialize)]
struct ChiBody {
    tiles: [Tile; 3],
}

#[derive(Debug, Deserialize)]
struct AnkanBody {
    kind: u8,
}

/// Client action routes under `"game.play.*"` plus `"game.reconnect"`
/// translated into the engine's own
/// tagged `GameEvent`.
fn decode_game_event(user_id: &str, message: &Message) -> Result<GameEvent, FabricError> {
    let user_id = user_id.to_string();
    let bad = |e: serde_json::Error| FabricError::ClientProtocol(format!("bad {0} body: {e}", message.route));

    Ok(match message.route.as_str() {
        "game.play.droptile" => {
            let body: TileBody = serde_json::from_value(message.data.clone()).map_err(bad)?;
            GameEvent::DropTile { user_id, tile: body.tile }
        }
        "game.play.chi" => {
            let body: ChiBody = serde_json::from_value(message.data.clone()).map_err(bad)?;
            GameEvent::Chi { user_id, tiles: body.tiles }
        }
        "game.play.peng" => {
            let body: TileBody = serde_json::from_value(message.data.clone()).map_err(bad)?;
            GameEvent::Peng { user_id, tile: body.tile }
        }
        "game.play.gang" => {
            let body: TileBody = serde_json::from_value(message.data.clone()).map_err(bad)?;
            GameEvent::Gang { user_id, tile: body.tile }
        }
        "game.play.ankan" => {
            let body: AnkanBody = serde_json::from_value(message.data.clone()).map_err(bad)?;
            GameEvent::Ankan { user_id, kind: body.kind }
        }
        "game.play.kakan" => {
            let body: TileBody = serde_json::from_value(message.data.clone()).map_err(bad)?;
            GameEvent::Kakan { user_id, tile: body.tile }
        }
        "game.play.ronghu" => GameEvent::RongHu { user_id },
        "game.play.touchhu" => GameEvent::TouchHu { user_id },
        "game.play.riichi" => GameEvent::Riichi { user_id },
        "game.reconnect" => GameEvent::Reconnect { user_id },
        other => return Err(FabricError::ClientProtocol(format!("unknown game route {other}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn droptile_decodes_into_a_drop_tile_event() {
        let message = Message::notify("game.play.droptile", json!({ "tile": { "kind": 5, "id": 1 } }));
        let event = decode_game_event("u1", &message).unwrap();
        assert!(matches!(event, GameEvent::DropTile { user_id, .. } if user_id == "u1"));
    }

    #[test]
    fn reconnect_decodes_with_no_body() {
        let message = Message::notify("game.reconnect", json!(null));
        let event = decode_game_event("u1", &message).unwrap();
        assert!(matches!(event, GameEvent::Reconnect { .. }));
    }

    #[test]
    fn unknown_route_is_a_client_protocol_error() {
        let message = Message::notify("game.play.nonsense", json!({}));
        assert!(decode_game_event("u1", &message).is_err());
    }
}
