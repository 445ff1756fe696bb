//! Tagged game event variants.

use serde::{Deserialize, Serialize};

use super::types::{Seat, Tile};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    DropTile { user_id: String, tile: Tile },
    Chi { user_id: String, tiles: [Tile; 3] },
    Peng { user_id: String, tile: Tile },
    Gang { user_id: String, tile: Tile },
    Ankan { user_id: String, kind: u8 },
    Kakan { user_id: String, tile: Tile },
    RongHu { user_id: String },
    TouchHu { user_id: String },
    Riichi { user_id: String },
    Reconnect { user_id: String },
    Timeout { seat: Seat },
    StartRound,
}

impl GameEvent {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            GameEvent::DropTile { user_id, .. }
            | GameEvent::Chi { user_id, .. }
            | GameEvent::Peng { user_id, .. }
            | GameEvent::Gang { user_id, .. }
            | GameEvent::Ankan { user_id, .. }
            | GameEvent::Kakan { user_id, .. }
            | GameEvent::RongHu { user_id }
            | GameEvent::TouchHu { user_id }
            | GameEvent::Riichi { user_id }
            | GameEvent::Reconnect { user_id } => Some(user_id),
            GameEvent::Timeout { .. } | GameEvent::StartRound => None,
        }
    }
}
