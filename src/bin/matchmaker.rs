//! Matchmaker (March) process entry point: runs one pool
//! driver per configured pool plus the bus front door that answers
//! `joinQueue`/`leaveQueue` from connectors.

use std::sync::Arc;

use mahjong_fabric::bus::MemoryBus;
use mahjong_fabric::config::NodeConfig;
use mahjong_fabric::discovery::{Registrar, RegistrarConfig, Resolver, Role, SelectionStrategy, Seeker};
use mahjong_fabric::matchmaker::{default_pools, run_matchmaker_dispatch_loop, spawn_matchmaker};
use mahjong_fabric::store::memory::MemoryStore;
use mahjong_fabric::store::RouteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mahjong_fabric::logging::init();
    let cfg = NodeConfig::parse_from_env()?;

    let kv = MemoryStore::new();
    let bus = Arc::new(MemoryBus::new());
    let route_store = Arc::new(RouteStore::new(kv.clone(), cfg.route_ttl()));

    let registrar = Registrar::new(
        kv.clone(),
        RegistrarConfig {
            role: Role::March,
            node_id: cfg.node_id.clone(),
            address: cfg.address.to_string(),
            weight: cfg.weight,
            ttl: cfg.lease_ttl(),
        },
    );
    registrar.register().await?;

    let game_resolver = Arc::new(Resolver::start(kv.clone(), Role::Game).await?);
    let game_seeker = Arc::new(Seeker::new(game_resolver, SelectionStrategy::LeastLoad));

    let service = Arc::new(spawn_matchmaker(
        default_pools(),
        game_seeker,
        Arc::clone(&route_store),
        Arc::clone(&bus),
        cfg.node_id.clone(),
    ));

    tokio::spawn(run_matchmaker_dispatch_loop(
        Arc::clone(&service),
        Arc::clone(&bus),
        cfg.node_id.clone(),
    ));

    let app = axum::Router::new().route("/healthz", axum::routing::get(healthz));
    let listener = tokio::net::TcpListener::bind(cfg.bind).await?;
    tracing::info!(target: "bin::matchmaker", bind = %cfg.bind, node_id = %cfg.node_id, "matchmaker listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
