//! The room handle external callers see. The actual
//! state lives on the actor task; this is the cheap, cloneable front door
//! to its mailbox.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::game::engine::events::GameEvent;
use crate::game::engine::types::{Meld, Seat, Situation, Tile};

const LOG_TARGET: &str = "game::room";
const MAILBOX_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSeat {
    pub user_id: String,
    pub seat_index: Seat,
    pub connector_node_id: String,
}

/// `{roomID, gameNodeID, engineType, userMap, createdAt}`. `created_at` is stamped by the caller at construction time
/// rather than read from the clock in here, keeping this type itself
/// side-effect free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: String,
    pub game_node_id: String,
    pub engine_type: String,
    pub user_map: HashMap<String, UserSeat>,
    pub created_at_unix_ms: i64,
}

/// Per-player snapshot returned on reconnect:
/// "own hand, melds, discards, situation".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSnapshot {
    pub seat: Seat,
    pub hand_tiles: Vec<Tile>,
    pub melds: Vec<Meld>,
    pub discard_pile: Vec<Tile>,
    pub situation: Situation,
    pub current_seat: Seat,
    pub points: i64,
}

/// Cheap, `Clone`-able handle to a running room actor. `notify_event` is
/// the only way external code reaches into the room: non-blocking, a no-op once closed, drop-newest with a
/// warning when the mailbox is full.
#[derive(Clone)]
pub struct Room {
    pub info: Arc<RoomInfo>,
    mailbox: mpsc::Sender<GameEvent>,
    closed: Arc<AtomicBool>,
}

impl Room {
    /// Builds the room's single mailbox channel. The returned `Sender` is a
    /// clone of what `Room` keeps internally for `notify_event` — callers
    /// need it to wire up the actor's `self_tx` and the `TurnManager`'s
    /// ticker mailbox, which must all feed the same channel.
    pub fn new(info: RoomInfo) -> (Self, mpsc::Sender<GameEvent>, mpsc::Receiver<GameEvent>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));
        let room = Self {
            info: Arc::new(info),
            mailbox: tx.clone(),
            closed: Arc::clone(&closed),
        };
        (room, tx, rx, closed)
    }

    pub fn room_id(&self) -> &str {
        &self.info.room_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// `NotifyEvent(evt)`: a no-op if the actor has been
    /// closed; drops (with a warning) if the mailbox is full rather than
    /// ever blocking the caller.
    pub fn notify_event(&self, event: GameEvent) {
        if self.is_closed() {
            return;
        }
        if let Err(mpsc::error::TrySendError::Full(_)) = self.mailbox.try_send(event) {
            warn!(target: LOG_TARGET, room_id = %self.info.room_id, "mailbox full, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> RoomInfo {
        RoomInfo {
            room_id: "r1".into(),
            game_node_id: "game/g1".into(),
            engine_type: "riichi4p".into(),
            user_map: HashMap::new(),
            created_at_unix_ms: 0,
        }
    }

    #[tokio::test]
    async fn notify_event_is_a_no_op_once_closed() {
        let (room, _tx, mut rx, closed) = Room::new(sample_info());
        closed.store(true, Ordering::SeqCst);
        room.notify_event(GameEvent::StartRound);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn notify_event_delivers_while_open() {
        let (room, _tx, mut rx, _closed) = Room::new(sample_info());
        room.notify_event(GameEvent::StartRound);
        assert!(matches!(rx.recv().await.unwrap(), GameEvent::StartRound));
    }
}
