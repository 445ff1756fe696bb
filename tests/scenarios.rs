//! End-to-end scenarios driving the in-memory bus and in-memory store
//! across a gateway/matchmaker/game-node triple running in-process.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use mahjong_fabric::bus::{MemoryBus, ServicePacket};
use mahjong_fabric::connector::{Dispatcher, RouteCache};
use mahjong_fabric::discovery::{Registrar, RegistrarConfig, Resolver, Role, SelectionStrategy, Seeker};
use mahjong_fabric::game::actor::RoomActor;
use mahjong_fabric::game::engine::events::GameEvent;
use mahjong_fabric::game::engine::state::EngineState;
use mahjong_fabric::game::engine::turn::TurnManager;
use mahjong_fabric::game::engine::types::Tile;
use mahjong_fabric::game::engine::EngineTemplate;
use mahjong_fabric::game::node::{run_node_dispatch_loop, RoomManager};
use mahjong_fabric::matchmaker::{default_pools, run_matchmaker_dispatch_loop, spawn_matchmaker};
use mahjong_fabric::persistence::InMemoryGameRecordStore;
use mahjong_fabric::protocol::Message;
use mahjong_fabric::store::{MemoryStore, RouteStore};

const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds a 13-tile hand proven to decompose cleanly (4 groups + a pair):
/// three runs, a triplet of East, and a pair of 8s. Giving the same kind
/// list to three seats (scenario 4) relies on each seat owning its own
/// independent `Tile` ids, which this assigns sequentially per kind.
fn kinds_to_tiles(kinds: &[u8]) -> Vec<Tile> {
    let mut seen: HashMap<u8, u8> = HashMap::new();
    kinds
        .iter()
        .map(|&kind| {
            let id = seen.entry(kind).or_insert(0);
            *id += 1;
            Tile::new(kind, *id)
        })
        .collect()
}

async fn next_push(rx: &mut mpsc::Receiver<ServicePacket>) -> serde_json::Value {
    let packet = tokio::time::timeout(PUSH_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a push")
        .expect("bus subject closed");
    assert_eq!(packet.route, "gamePush");
    packet.data
}

/// Spawns a bare `RoomActor` directly against the engine prototype,
/// bypassing `RoomManager`/matchmaking entirely, for tests that only care
/// about a single room's turn/reaction state machine.
async fn spin_up_room(
    users: [String; 4],
    customize: impl FnOnce(&mut EngineState, &mut TurnManager),
) -> (mpsc::Sender<GameEvent>, mpsc::Receiver<ServicePacket>) {
    let bus = Arc::new(MemoryBus::new());
    let pushes = bus.subscribe("connector-test".to_string());

    let mut connector_of = HashMap::new();
    for user in &users {
        connector_of.insert(user.clone(), "connector-test".to_string());
    }

    let (tx, mailbox) = mpsc::channel::<GameEvent>(64);
    let template = EngineTemplate::new(25_000, false);
    let (mut state, mut turn) = template.clone_for_room("room-test".into(), users, tx.clone());
    customize(&mut state, &mut turn);

    let (destroy_tx, _destroy_rx) = mpsc::channel::<String>(4);
    let actor = RoomActor::new(
        "room-test".into(),
        state,
        turn,
        mailbox,
        tx.clone(),
        Arc::new(AtomicBool::new(false)),
        bus,
        "g0".into(),
        connector_of,
        template.checkers(),
        destroy_tx,
        Arc::new(InMemoryGameRecordStore::new()),
    );
    tokio::spawn(actor.run());

    (tx, pushes)
}

/// Scenario 1 + scenario 6: four players queue through the connector,
/// the matchmaker seats them on a game node, the room deals the opening
/// hand, and a reconnect notify gets back the engine's own snapshot.
#[tokio::test]
async fn match_to_room_to_turn_and_reconnect() {
    let kv = MemoryStore::new();
    let bus = Arc::new(MemoryBus::new());

    let march_registrar = Registrar::new(
        kv.clone(),
        RegistrarConfig {
            role: Role::March,
            node_id: "m1".into(),
            address: "127.0.0.1:9000".into(),
            weight: 1,
            ttl: Duration::from_secs(30),
        },
    );
    march_registrar.register().await.unwrap();

    let game_registrar = Registrar::new(
        kv.clone(),
        RegistrarConfig {
            role: Role::Game,
            node_id: "g1".into(),
            address: "127.0.0.1:9100".into(),
            weight: 1,
            ttl: Duration::from_secs(30),
        },
    );
    game_registrar.register().await.unwrap();

    let route_store = Arc::new(RouteStore::new(kv.clone(), Duration::from_secs(7200)));
    let users = ["alice", "bob", "carol", "dave"];
    for user in users {
        route_store.set_connector_node(user, "c1").await.unwrap();
    }

    let game_resolver = Arc::new(Resolver::start(kv.clone(), Role::Game).await.unwrap());
    let game_seeker = Arc::new(Seeker::new(game_resolver, SelectionStrategy::LeastLoad));
    let march_resolver = Arc::new(Resolver::start(kv.clone(), Role::March).await.unwrap());
    let march_seeker = Arc::new(Seeker::new(march_resolver, SelectionStrategy::LeastLoad));

    let service = Arc::new(spawn_matchmaker(
        default_pools(),
        Arc::clone(&game_seeker),
        Arc::clone(&route_store),
        Arc::clone(&bus),
        "m1".into(),
    ));
    tokio::spawn(run_matchmaker_dispatch_loop(Arc::clone(&service), Arc::clone(&bus), "m1".into()));

    let manager = RoomManager::new(
        EngineTemplate::new(25_000, false),
        Arc::clone(&bus),
        "g1".into(),
        Arc::new(InMemoryGameRecordStore::new()),
    );
    manager.attach_worker();
    tokio::spawn(run_node_dispatch_loop(Arc::clone(&manager), Arc::clone(&bus), "g1".into()));

    let route_cache = Arc::new(RouteCache::new(route_store.as_ref().clone()));
    let dispatcher = Dispatcher {
        bus: Arc::clone(&bus),
        from_subject: "c1".into(),
        route_cache: Arc::clone(&route_cache),
        march_seeker,
    };

    let mut connector_inbox = bus.subscribe("c1".to_string());

    for (i, user) in users.iter().enumerate() {
        let request = Message::request(
            i as u64 + 1,
            "connector.joinqueue",
            json!({ "pool_id": "classic:casual4", "score": 1500 }),
        );
        let reply = dispatcher.handle(*user, request).await.unwrap().unwrap();
        assert!(reply.error.is_none(), "join queue should be accepted: {:?}", reply.error);
    }

    let match_success = tokio::time::timeout(PUSH_TIMEOUT, connector_inbox.recv())
        .await
        .expect("timed out waiting for match_success")
        .unwrap();
    assert_eq!(match_success.route, "gamePush");
    assert_eq!(match_success.data["event"], "match_success");
    assert_eq!(match_success.data["game_node_id"], "g1");
    let seats: Vec<(String, u8)> = serde_json::from_value(match_success.data["seats"].clone()).unwrap();
    assert_eq!(seats.len(), 4);
    let room_id = match_success.data["room_id"].as_str().unwrap().to_string();
    assert!(manager.room(&room_id).is_some());

    // Force the deal instead of waiting out the real post-match grace timer.
    manager.dispatch_event("alice", GameEvent::StartRound).unwrap();

    let mut round_starts = Vec::new();
    for _ in 0..4 {
        let data = tokio::time::timeout(PUSH_TIMEOUT, connector_inbox.recv())
            .await
            .expect("timed out waiting for round_start")
            .unwrap()
            .data;
        assert_eq!(data["event"], "round_start");
        round_starts.push(data);
    }
    let state_update = tokio::time::timeout(PUSH_TIMEOUT, connector_inbox.recv())
        .await
        .expect("timed out waiting for state_update")
        .unwrap()
        .data;
    assert_eq!(state_update["event"], "state_update");
    assert_eq!(state_update["current_turn"], 0);
    assert_eq!(state_update["state"], "wait_main");

    for round_start in &round_starts {
        assert_eq!(round_start["dealer_seat"], 0);
        let seat = round_start["seat"].as_u64().unwrap();
        let hand_len = round_start["hand"].as_array().unwrap().len();
        if seat == 0 {
            assert_eq!(hand_len, 14, "the dealer draws the opening 14th tile");
        } else {
            assert_eq!(hand_len, 13);
        }
    }

    // Scenario 6: reconnecting forwards the engine's own per-user snapshot
    // back through the same connector route the match was dealt over.
    let reconnect = Message::notify("game.reconnect", serde_json::Value::Null);
    let reply = dispatcher.handle("alice", reconnect).await.unwrap();
    assert!(reply.is_none());

    let reconnect_push = tokio::time::timeout(PUSH_TIMEOUT, connector_inbox.recv())
        .await
        .expect("timed out waiting for the reconnect snapshot")
        .unwrap();
    assert_eq!(reconnect_push.data["event"], "state_update");
    assert!(reconnect_push.data["state"].as_str().unwrap().starts_with("reconnect:"));
}

/// Scenario 2: a discard into an East triplet is ronned by a single seat,
/// settles a zero-sum payout, and rotates the dealer off the loser's seat.
#[tokio::test]
async fn ron_on_discard_pays_out_and_rotates_the_dealer() {
    let users = ["u0".to_string(), "u1".to_string(), "u2".to_string(), "u3".to_string()];
    let (events, mut pushes) = spin_up_room(users, |state, _turn| {
        state.player_mut(0).hand_tiles = vec![Tile::new(27, 9)];
        state.player_mut(1).hand_tiles = Vec::new();
        state.player_mut(2).hand_tiles = kinds_to_tiles(&[0, 1, 2, 9, 10, 11, 18, 19, 20, 27, 27, 17, 17]);
        state.player_mut(3).hand_tiles = Vec::new();
    })
    .await;

    events
        .send(GameEvent::DropTile { user_id: "u0".into(), tile: Tile::new(27, 9) })
        .await
        .unwrap();

    let discard = next_push(&mut pushes).await;
    assert_eq!(discard["event"], "discard");
    assert_eq!(discard["seat"], 0);

    let options = next_push(&mut pushes).await;
    assert_eq!(options["event"], "operation_options");
    assert!(options["options"].as_array().unwrap().iter().any(|o| o == "Hu"));

    let waiting = next_push(&mut pushes).await;
    assert_eq!(waiting["event"], "state_update");
    assert_eq!(waiting["state"], "wait_reactions");

    events.send(GameEvent::RongHu { user_id: "u2".into() }).await.unwrap();

    let ron = next_push(&mut pushes).await;
    assert_eq!(ron["event"], "ron");
    assert_eq!(ron["winners"], json!(["u2"]));
    assert_eq!(ron["loser"], "u0");
    let deltas: Vec<(String, i64)> = serde_json::from_value(ron["deltas"].clone()).unwrap();
    let by_user: HashMap<String, i64> = deltas.into_iter().collect();
    assert_eq!(by_user["u0"], -1600);
    assert_eq!(by_user["u2"], 1600);
    assert_eq!(by_user["u1"], 0);
    assert_eq!(by_user["u3"], 0);

    // The round ends non-dealer side up, so the next deal hands the button
    // to seat 1 instead of repeating seat 0.
    let next_round_start = next_push(&mut pushes).await;
    assert_eq!(next_round_start["event"], "round_start");
    assert_eq!(next_round_start["dealer_seat"], 1);
}

/// Scenario 3: a seat that never acts within its turn window gets its
/// newest tile auto-discarded and the turn moves on without it.
#[tokio::test]
async fn timeout_auto_discards_and_advances_the_turn() {
    let users = ["u0".to_string(), "u1".to_string(), "u2".to_string(), "u3".to_string()];
    let auto_discard = Tile::new(5, 1);
    let (events, mut pushes) = spin_up_room(users, |state, turn| {
        turn.current = 1;
        state.player_mut(1).hand_tiles = vec![auto_discard];
        state.player_mut(1).newest_tile = Some(auto_discard);
    })
    .await;

    events.send(GameEvent::Timeout { seat: 1 }).await.unwrap();

    let discard = next_push(&mut pushes).await;
    assert_eq!(discard["event"], "discard");
    assert_eq!(discard["seat"], 1);
    assert_eq!(discard["tile"]["kind"], 5);

    let draw = next_push(&mut pushes).await;
    assert_eq!(draw["event"], "draw");
    assert_eq!(draw["seat"], 2);

    let state_update = next_push(&mut pushes).await;
    assert_eq!(state_update["event"], "state_update");
    assert_eq!(state_update["current_turn"], 2);
    assert_eq!(state_update["state"], "wait_main");
}

/// Scenario 4: three seats ron the same discard at once, which aborts
/// the round instead of paying any of them out.
#[tokio::test]
async fn three_simultaneous_rons_abort_the_round() {
    let users = ["u0".to_string(), "u1".to_string(), "u2".to_string(), "u3".to_string()];
    let winning_hand = || kinds_to_tiles(&[0, 1, 2, 9, 10, 11, 18, 19, 20, 27, 27, 17, 17]);
    let (events, mut pushes) = spin_up_room(users, |state, _turn| {
        state.player_mut(0).hand_tiles = vec![Tile::new(27, 9)];
        state.player_mut(1).hand_tiles = winning_hand();
        state.player_mut(2).hand_tiles = winning_hand();
        state.player_mut(3).hand_tiles = winning_hand();
    })
    .await;

    events
        .send(GameEvent::DropTile { user_id: "u0".into(), tile: Tile::new(27, 9) })
        .await
        .unwrap();

    let _discard = next_push(&mut pushes).await;
    let _options = next_push(&mut pushes).await;
    let _waiting = next_push(&mut pushes).await;

    for user in ["u1", "u2", "u3"] {
        events.send(GameEvent::RongHu { user_id: user.into() }).await.unwrap();
    }

    let round_end = next_push(&mut pushes).await;
    assert_eq!(round_end["event"], "round_end");
    assert_eq!(round_end["kind"], "draw_3ron");
    assert_eq!(round_end["honba"], 1);
    assert_eq!(round_end["dealer_seat"], 0);
    let deltas: Vec<(String, i64)> = serde_json::from_value(round_end["deltas"].clone()).unwrap();
    assert!(deltas.iter().all(|(_, delta)| *delta == 0));
}

/// Scenario 5: declaring a kan once three kans have already happened and
/// the dead wall is nearly spent aborts the round instead of dealing a
/// replacement tile.
#[tokio::test]
async fn a_fourth_kan_aborts_the_round() {
    let users = ["u0".to_string(), "u1".to_string(), "u2".to_string(), "u3".to_string()];
    let (events, mut pushes) = spin_up_room(users, |state, _turn| {
        state.player_mut(0).hand_tiles = kinds_to_tiles(&[10, 10, 10, 10]);
        state.deck.kan_count = 4;
        state.deck.dead_wall.truncate(3);
    })
    .await;

    events
        .send(GameEvent::Ankan { user_id: "u0".into(), kind: 10 })
        .await
        .unwrap();

    let ankan = next_push(&mut pushes).await;
    assert_eq!(ankan["event"], "ankan");
    assert_eq!(ankan["seat"], 0);
    assert_eq!(ankan["kind"], 10);

    let round_end = next_push(&mut pushes).await;
    assert_eq!(round_end["event"], "round_end");
    assert_eq!(round_end["kind"], "draw_4kan");
    assert_eq!(round_end["honba"], 1);
    assert_eq!(round_end["dealer_seat"], 0);
}
