//! Drains this connector's own bus subject for `"gamePush"` packets
//! and hands each one to every locally
//! connected client named in `push_user`.

use std::sync::Arc;

use tracing::warn;

use crate::bus::MemoryBus;
use crate::protocol::message::Message;

use super::registry::SharedRegistry;
use super::route_cache::RouteCache;
use super::session::OutboundFrame;

const LOG_TARGET: &str = "connector::push";
const PUSH_ROUTE: &str = "game.push";

pub async fn run_push_consumer(
    bus: Arc<MemoryBus>,
    from_subject: String,
    registry: SharedRegistry,
    route_cache: Arc<RouteCache>,
) {
    let mut inbox = bus.subscribe(from_subject);
    while let Some(packet) = inbox.recv().await {
        if packet.route != "gamePush" {
            continue;
        }
        if packet.data.get("event").and_then(|v| v.as_str()) == Some("match_success") {
            if let Some(game_node_id) = packet.data.get("game_node_id").and_then(|v| v.as_str()) {
                for user_id in &packet.push_user {
                    route_cache.set(user_id, game_node_id);
                }
            }
        }
        let message = Message::push(PUSH_ROUTE, packet.data);
        for user_id in &packet.push_user {
            let Some(handle) = registry.get(user_id) else {
                continue;
            };
            if handle.outbound.send(OutboundFrame::Data(message.clone())).await.is_err() {
                warn!(target: LOG_TARGET, user_id, "push dropped, client writer gone");
            }
        }
    }
}
