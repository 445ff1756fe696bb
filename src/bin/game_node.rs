//! Game Node process entry point: hosts live rooms, answers
//! `createRoom` from the matchmaker and `game.event` from connectors, and
//! reports load back to discovery.

use std::sync::Arc;

use mahjong_fabric::bus::MemoryBus;
use mahjong_fabric::config::NodeConfig;
use mahjong_fabric::discovery::{Registrar, RegistrarConfig, Role};
use mahjong_fabric::game::engine::EngineTemplate;
use mahjong_fabric::game::node::{run_load_monitor, run_node_dispatch_loop, RoomManager};
use mahjong_fabric::persistence::InMemoryGameRecordStore;
use mahjong_fabric::store::memory::MemoryStore;

/// Starting points for a fresh round.
const STARTING_POINTS: i64 = 25_000;
const RED_FIVES: bool = false;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mahjong_fabric::logging::init();
    let cfg = NodeConfig::parse_from_env()?;

    let kv = MemoryStore::new();
    let bus = Arc::new(MemoryBus::new());

    let registrar = Registrar::new(
        kv.clone(),
        RegistrarConfig {
            role: Role::Game,
            node_id: cfg.node_id.clone(),
            address: cfg.address.to_string(),
            weight: cfg.weight,
            ttl: cfg.lease_ttl(),
        },
    );
    registrar.register().await?;

    let template = EngineTemplate::new(STARTING_POINTS, RED_FIVES);
    let record_store = Arc::new(InMemoryGameRecordStore::new());
    let manager = RoomManager::new(template, Arc::clone(&bus), cfg.node_id.clone(), record_store);
    manager.attach_worker();

    tokio::spawn(run_node_dispatch_loop(Arc::clone(&manager), Arc::clone(&bus), cfg.node_id.clone()));
    tokio::spawn(run_load_monitor(Arc::clone(&manager), Arc::clone(&registrar)));

    let app = axum::Router::new().route("/healthz", axum::routing::get(healthz));
    let listener = tokio::net::TcpListener::bind(cfg.bind).await?;
    tracing::info!(target: "bin::game_node", bind = %cfg.bind, node_id = %cfg.node_id, "game node listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
