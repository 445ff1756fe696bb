//! Typed push DTOs and connector fan-out.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::bus::{MemoryBus, ServicePacket};
use crate::errors::FabricError;

use super::types::{Seat, Tile};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PushEvent {
    MatchSuccess {
        room_id: String,
        game_node_id: String,
        seats: Vec<(String, Seat)>,
    },
    RoundStart {
        room_id: String,
        seat: Seat,
        hand: Vec<Tile>,
        dealer_seat: Seat,
        round_wind: String,
        round_number: u32,
        honba: u32,
    },
    Draw {
        seat: Seat,
        tile: Tile,
    },
    Discard {
        seat: Seat,
        tile: Tile,
    },
    Riichi {
        seat: Seat,
    },
    MeldAction {
        seat: Seat,
        kind: String,
        tiles: Vec<Tile>,
        called_from: Seat,
    },
    Ankan {
        seat: Seat,
        kind: u8,
    },
    Kakan {
        seat: Seat,
        tile: Tile,
    },
    Ron {
        winners: Vec<String>,
        loser: String,
        tile: Tile,
        deltas: Vec<(String, i64)>,
    },
    Tsumo {
        winner: String,
        tile: Tile,
        deltas: Vec<(String, i64)>,
    },
    RoundEnd {
        kind: String,
        deltas: Vec<(String, i64)>,
        honba: u32,
        dealer_seat: Seat,
    },
    GameEnd {
        final_points: Vec<(String, i64)>,
    },
    StateUpdate {
        current_turn: Seat,
        state: String,
    },
    OperationOptions {
        seat: Seat,
        options: Vec<String>,
    },
}

/// Groups `targets` by their connector node and publishes one
/// `ServicePacket` per connector, each carrying the subset of users
/// batched onto it.
pub async fn dispatch_push(
    bus: &MemoryBus,
    from: &str,
    targets: &HashMap<String, String>, // userID -> connectorNodeID
    event: &PushEvent,
) -> Result<(), FabricError> {
    let data: Value = serde_json::to_value(event)
        .map_err(|e| FabricError::EngineDamage(format!("failed to encode push event: {e}")))?;

    let mut by_connector: HashMap<String, Vec<String>> = HashMap::new();
    for (user_id, connector_node_id) in targets {
        by_connector
            .entry(connector_node_id.clone())
            .or_default()
            .push(user_id.clone());
    }

    for (connector_node_id, users) in by_connector {
        let packet = ServicePacket::push(
            from.to_string(),
            connector_node_id,
            "gamePush",
            users,
            data.clone(),
        );
        bus.publish(packet).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_groups_by_connector_and_sends_one_packet_each() {
        let bus = MemoryBus::new();
        let mut rx_a = bus.subscribe("connector/a");
        let mut rx_b = bus.subscribe("connector/b");

        let mut targets = HashMap::new();
        targets.insert("u1".to_string(), "connector/a".to_string());
        targets.insert("u2".to_string(), "connector/a".to_string());
        targets.insert("u3".to_string(), "connector/b".to_string());

        dispatch_push(
            &bus,
            "game/g1",
            &targets,
            &PushEvent::StateUpdate {
                current_turn: 0,
                state: "wait_main".into(),
            },
        )
        .await
        .unwrap();

        let packet_a = rx_a.try_recv().unwrap();
        assert_eq!(packet_a.push_user.len(), 2);
        let packet_b = rx_b.try_recv().unwrap();
        assert_eq!(packet_b.push_user, vec!["u3".to_string()]);
    }
}
