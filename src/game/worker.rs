//! The single-consumer destroy-room channel: room
//! teardown never races the registry directly. A room actor that decides
//! the game is over sends its own id down this channel; one task drains it
//! serially and is the only writer ever allowed to remove an entry from the
//! [`RoomManager`](super::node::RoomManager).

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::node::RoomManager;
use crate::tokio_tools::spawn_named_task;

const LOG_TARGET: &str = "game::worker";
const DESTROY_QUEUE_CAPACITY: usize = 256;

/// Cheap, cloneable handle to the destroy-room mailbox. Every room gets a
/// clone of the sender half at creation time; only `GameWorker::spawn`'s
/// background task ever reads from it.
#[derive(Clone)]
pub struct GameWorker {
    tx: mpsc::Sender<String>,
}

impl GameWorker {
    /// Spawns the single consumer task bound to `manager` and returns the
    /// handle rooms use to request their own destruction.
    pub fn spawn(manager: std::sync::Arc<RoomManager>) -> Self {
        let (tx, mut rx) = mpsc::channel(DESTROY_QUEUE_CAPACITY);

        spawn_named_task("game-worker", async move {
            while let Some(room_id) = rx.recv().await {
                manager.remove_room(&room_id);
                info!(target: LOG_TARGET, room_id, "room removed from registry");
            }
            info!(target: LOG_TARGET, "destroy-room channel closed, worker exiting");
        });

        Self { tx }
    }

    /// The sender half handed to each room at creation time.
    pub fn sender(&self) -> mpsc::Sender<String> {
        self.tx.clone()
    }

    /// Non-blocking, best-effort: a full or closed channel just logs and
    /// drops, same policy as `Room::notify_event`.
    pub fn request_destroy(&self, room_id: String) {
        if let Err(mpsc::error::TrySendError::Full(id)) = self.tx.try_send(room_id) {
            warn!(target: LOG_TARGET, room_id = %id, "destroy-room queue full, dropping request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::EngineTemplate;

    fn empty_manager() -> std::sync::Arc<RoomManager> {
        RoomManager::new(
            EngineTemplate::new(25_000, false),
            std::sync::Arc::new(crate::bus::MemoryBus::new()),
            "game/g1".into(),
            std::sync::Arc::new(crate::persistence::InMemoryGameRecordStore::new()),
        )
    }

    #[tokio::test]
    async fn destroy_request_removes_the_room_from_the_manager() {
        let manager = empty_manager();
        let worker = GameWorker::spawn(std::sync::Arc::clone(&manager));
        manager.insert_room_for_test("r1");
        assert!(manager.room("r1").is_some());

        worker.request_destroy("r1".into());
        // Give the single consumer a turn to run.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(manager.room("r1").is_none());
    }
}
