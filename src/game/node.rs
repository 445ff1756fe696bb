//! The Game Node role: `RoomManager` is the per-process registry of live
//! rooms, `Monitor` samples load for the discovery registrar. Keeps the
//! usual coordinator split between "own the in-memory table" and "run the
//! background sampler" as two independent pieces.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::bus::{MemoryBus, ServicePacket};
use crate::discovery::Registrar;
use crate::errors::FabricError;
use crate::persistence::GameRecordStore;

use super::actor::RoomActor;
use super::engine::events::GameEvent;
use super::engine::EngineTemplate;
use super::room::{Room, RoomInfo, UserSeat};
use super::worker::GameWorker;

pub type RoomId = String;
pub type UserId = String;

const LOAD_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);
/// Load is a weighted blend of room count and player count.
const ROOM_WEIGHT: f64 = 0.7;
const PLAYER_WEIGHT: f64 = 0.3;

/// Per-process registry of live rooms plus the inverse user -> room index
/// used by reconnect and push routing.
pub struct RoomManager {
    rooms: DashMap<RoomId, Room>,
    user_room: DashMap<UserId, RoomId>,
    template: EngineTemplate,
    bus: Arc<MemoryBus>,
    from_subject: String,
    worker: std::sync::OnceLock<GameWorker>,
    record_store: Arc<dyn GameRecordStore>,
}

impl RoomManager {
    pub fn new(
        template: EngineTemplate,
        bus: Arc<MemoryBus>,
        from_subject: String,
        record_store: Arc<dyn GameRecordStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            rooms: DashMap::new(),
            user_room: DashMap::new(),
            template,
            bus,
            from_subject,
            worker: std::sync::OnceLock::new(),
            record_store,
        })
    }

    /// `GameWorker` needs an `Arc<RoomManager>` to construct, and rooms need
    /// the worker's sender to be created — this breaks the cycle without an
    /// `Arc<Mutex<Option<_>>>`. Call once, right after `RoomManager::new`.
    pub fn attach_worker(self: &Arc<Self>) -> GameWorker {
        let worker = GameWorker::spawn(Arc::clone(self));
        let _ = self.worker.set(worker.clone());
        worker
    }

    fn worker(&self) -> &GameWorker {
        self.worker.get().expect("attach_worker must run before create_room")
    }

    pub fn room(&self, room_id: &str) -> Option<Room> {
        self.rooms.get(room_id).map(|r| r.value().clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn player_count(&self) -> usize {
        self.user_room.len()
    }

    /// `CreateRoom(roomID, users)`: builds a fresh engine
    /// from the prototype template, spawns the room's single actor task,
    /// and registers both the room and every seated user in the reverse
    /// index. Seat assignment is the deterministic iteration order of
    /// `users`.
    pub fn create_room(
        self: &Arc<Self>,
        room_id: RoomId,
        users: [(UserId, String); 4],
        created_at_unix_ms: i64,
    ) -> RoomInfo {
        let mut user_map = HashMap::new();
        for (seat, (user_id, connector_node_id)) in users.iter().enumerate() {
            user_map.insert(
                user_id.clone(),
                UserSeat {
                    user_id: user_id.clone(),
                    seat_index: seat as u8,
                    connector_node_id: connector_node_id.clone(),
                },
            );
        }

        let info = RoomInfo {
            room_id: room_id.clone(),
            game_node_id: self.from_subject.clone(),
            engine_type: "riichi4p".into(),
            user_map,
            created_at_unix_ms,
        };

        let (room, room_tx, mailbox, closed) = Room::new(info.clone());
        let user_ids: [String; 4] = std::array::from_fn(|i| users[i].0.clone());
        let connector_of: HashMap<String, String> =
            users.iter().map(|(u, c)| (u.clone(), c.clone())).collect();

        let (state, turn) = self.template.clone_for_room(room_id.clone(), user_ids, room_tx.clone());
        let match_success_targets = connector_of.clone();

        let actor = RoomActor::new(
            room_id.clone(),
            state,
            turn,
            mailbox,
            room_tx,
            closed,
            Arc::clone(&self.bus),
            self.from_subject.clone(),
            connector_of,
            self.template.checkers(),
            self.worker().sender(),
            Arc::clone(&self.record_store),
        );
        crate::tokio_tools::spawn_named_task(format!("room-{room_id}"), actor.run());

        let match_success_bus = Arc::clone(&self.bus);
        let match_success_event = super::engine::push::PushEvent::MatchSuccess {
            room_id: room_id.clone(),
            game_node_id: self.from_subject.clone(),
            seats: users
                .iter()
                .enumerate()
                .map(|(seat, (user_id, _))| (user_id.clone(), seat as u8))
                .collect(),
        };
        let from_subject = self.from_subject.clone();
        tokio::spawn(async move {
            if let Err(err) = super::engine::push::dispatch_push(
                &match_success_bus,
                &from_subject,
                &match_success_targets,
                &match_success_event,
            )
            .await
            {
                warn!(target: "game::node", error = %err, "failed to push matchSuccess");
            }
        });

        for (user_id, _) in users.iter() {
            self.user_room.insert(user_id.clone(), room_id.clone());
        }
        self.rooms.insert(room_id.clone(), room);
        info!(target: "game::node", room_id, "room created");
        info
    }

    /// Removes a room and every user entry pointing at it. Only ever
    /// called by the `GameWorker`'s single consumer task.
    pub(super) fn remove_room(&self, room_id: &str) {
        self.rooms.remove(room_id);
        self.user_room.retain(|_, r| r != room_id);
    }

    /// `Reconnect(userID)`: looks the user's
    /// room up in the reverse index and forwards a `Reconnect` event into
    /// its mailbox; a no-op if the user isn't seated anywhere on this node.
    pub fn handle_reconnect(&self, user_id: &str) -> bool {
        let Some(room_id) = self.user_room.get(user_id).map(|r| r.value().clone()) else {
            return false;
        };
        let Some(room) = self.rooms.get(&room_id) else {
            return false;
        };
        room.notify_event(GameEvent::Reconnect {
            user_id: user_id.to_string(),
        });
        true
    }

    /// Dispatches an inbound `GameEvent` already bound to a user to that
    /// user's current room. Used by the node's bus handler for
    /// `"game.event"` packets forwarded from a connector.
    pub fn dispatch_event(&self, user_id: &str, event: GameEvent) -> Result<(), FabricError> {
        let room_id = self
            .user_room
            .get(user_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| FabricError::routing(format!("no room for user {user_id}")))?;
        let room = self
            .rooms
            .get(&room_id)
            .ok_or_else(|| FabricError::routing(format!("room {room_id} not found")))?;
        room.notify_event(event);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn insert_room_for_test(&self, room_id: &str) {
        let info = RoomInfo {
            room_id: room_id.to_string(),
            game_node_id: self.from_subject.clone(),
            engine_type: "riichi4p".into(),
            user_map: HashMap::new(),
            created_at_unix_ms: 0,
        };
        let (room, _tx, _rx, _closed) = Room::new(info);
        self.rooms.insert(room_id.to_string(), room);
    }
}

/// Samples room/player counts every five seconds and reports them as the
/// node's `load` to discovery. Purely in-process:
/// no OS CPU/memory probe appears anywhere in the dependency stack.
pub async fn run_load_monitor(manager: Arc<RoomManager>, registrar: Arc<Registrar>) {
    let mut ticker = tokio::time::interval(LOAD_SAMPLE_INTERVAL);
    loop {
        ticker.tick().await;
        let rooms = manager.room_count() as f64;
        let players = manager.player_count() as f64;
        let load = (rooms * ROOM_WEIGHT + players * PLAYER_WEIGHT).round() as u32;
        if let Err(err) = registrar.update_load(load).await {
            warn!(target: "game::node", error = %err, "failed to report load");
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateRoomRequest {
    players: Vec<(UserId, String)>,
}

#[derive(Debug, Deserialize)]
struct GameEventRequest {
    user_id: UserId,
    event: GameEvent,
}

/// Subscribes to this node's own bus subject and dispatches the two bus
/// routes a game node answers: `"createRoom"` (from the
/// matchmaker, a request expecting a reply) and `"game.event"` (from a
/// connector, fire-and-forget notify carrying one already-decoded
/// `GameEvent`).
pub async fn run_node_dispatch_loop(manager: Arc<RoomManager>, bus: Arc<MemoryBus>, from_subject: String) {
    let mut inbox = bus.subscribe(from_subject.clone());
    while let Some(packet) = inbox.recv().await {
        match packet.route.as_str() {
            "createRoom" => {
                let inbox_subject = MemoryBus::inbox_subject(&packet.from, packet.call_id);
                let reply = match serde_json::from_value::<CreateRoomRequest>(packet.data.clone()) {
                    Ok(req) if req.players.len() == 4 => {
                        let users: [(UserId, String); 4] = std::array::from_fn(|i| req.players[i].clone());
                        let room_id = uuid::Uuid::new_v4().to_string();
                        let info = manager.create_room(room_id.clone(), users, now_unix_ms());
                        packet.response(json!({ "roomId": info.room_id }))
                    }
                    Ok(_) => packet.error_response("createRoom requires exactly 4 players"),
                    Err(err) => packet.error_response(format!("malformed createRoom request: {err}")),
                };
                if let Err(err) = bus.reply(&inbox_subject, reply) {
                    warn!(target: "game::node", error = %err, "failed to reply to createRoom");
                }
            }
            "game.event" => match serde_json::from_value::<GameEventRequest>(packet.data) {
                Ok(req) => {
                    if let Err(err) = manager.dispatch_event(&req.user_id, req.event) {
                        warn!(target: "game::node", error = %err, "failed to dispatch game event");
                    }
                }
                Err(err) => warn!(target: "game::node", error = %err, "malformed game.event packet"),
            },
            other => warn!(target: "game::node", route = other, "unknown route on game node subject"),
        }
    }
}

fn now_unix_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_manager() -> Arc<RoomManager> {
        let manager = RoomManager::new(
            EngineTemplate::new(25_000, false),
            Arc::new(MemoryBus::new()),
            "game/g1".into(),
            Arc::new(crate::persistence::InMemoryGameRecordStore::new()),
        );
        manager.attach_worker();
        manager
    }

    fn users() -> [(UserId, String); 4] {
        [
            ("u1".into(), "connector/c1".into()),
            ("u2".into(), "connector/c1".into()),
            ("u3".into(), "connector/c2".into()),
            ("u4".into(), "connector/c2".into()),
        ]
    }

    #[tokio::test]
    async fn create_room_registers_every_seated_user() {
        let manager = fresh_manager();
        let info = manager.create_room("r1".into(), users(), 0);
        assert_eq!(info.user_map.len(), 4);
        assert_eq!(manager.room_count(), 1);
        assert_eq!(manager.player_count(), 4);
        assert!(manager.room("r1").is_some());
    }

    #[tokio::test]
    async fn handle_reconnect_finds_the_users_room() {
        let manager = fresh_manager();
        manager.create_room("r1".into(), users(), 0);
        assert!(manager.handle_reconnect("u2"));
        assert!(!manager.handle_reconnect("nobody"));
    }

    #[tokio::test]
    async fn dispatch_event_routes_to_the_right_room() {
        let manager = fresh_manager();
        manager.create_room("r1".into(), users(), 0);
        assert!(manager
            .dispatch_event("u1", GameEvent::Riichi { user_id: "u1".into() })
            .is_ok());
        assert!(manager
            .dispatch_event("nobody", GameEvent::Riichi { user_id: "nobody".into() })
            .is_err());
    }

    #[tokio::test]
    async fn create_room_route_replies_with_the_new_room_id() {
        let bus = Arc::new(MemoryBus::new());
        let manager = RoomManager::new(
            EngineTemplate::new(25_000, false),
            Arc::clone(&bus),
            "game/g1".into(),
            Arc::new(crate::persistence::InMemoryGameRecordStore::new()),
        );
        manager.attach_worker();
        tokio::spawn(run_node_dispatch_loop(Arc::clone(&manager), Arc::clone(&bus), "game/g1".into()));

        let request = ServicePacket::request(
            "march/m1".into(),
            "game/g1".into(),
            0,
            "createRoom",
            json!({ "players": users() }),
        );
        let response = bus.request(request, None).await.unwrap();
        assert!(response.error.is_none());
        assert!(response.data["roomId"].is_string());
        assert_eq!(manager.room_count(), 1);
    }
}
