//! Connector/Gateway process entry point: terminates client
//! websocket connections and dispatches authenticated traffic to the
//! matchmaker and game nodes over the bus.

use std::sync::Arc;

use mahjong_fabric::bus::MemoryBus;
use mahjong_fabric::config::NodeConfig;
use mahjong_fabric::connector::{
    run_push_consumer, ClientRegistry, ConnectionAdmission, ConnectorContext, ConnectorServer,
    Dispatcher, DispatchWorkerPool, RouteCache, SharedRegistry,
};
use mahjong_fabric::discovery::{Registrar, RegistrarConfig, Resolver, Role, SelectionStrategy, Seeker};
use mahjong_fabric::persistence::InMemoryAuthVerifier;
use mahjong_fabric::store::memory::MemoryStore;
use mahjong_fabric::store::RouteStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mahjong_fabric::logging::init();
    let cfg = NodeConfig::parse_from_env()?;

    let kv = MemoryStore::new();
    let bus = Arc::new(MemoryBus::new());
    let route_store = RouteStore::new(kv.clone(), cfg.route_ttl());

    let registrar = Registrar::new(
        kv.clone(),
        RegistrarConfig {
            role: Role::Connector,
            node_id: cfg.node_id.clone(),
            address: cfg.address.to_string(),
            weight: cfg.weight,
            ttl: cfg.lease_ttl(),
        },
    );
    registrar.register().await?;

    let march_resolver = Arc::new(Resolver::start(kv.clone(), Role::March).await?);
    let march_seeker = Arc::new(Seeker::new(march_resolver, SelectionStrategy::LeastLoad));

    let registry: SharedRegistry = Arc::new(ClientRegistry::new(cfg.registry_shards));
    let admission = Arc::new(ConnectionAdmission::new(cfg.conn_rate_per_sec, cfg.max_connections));
    let auth = Arc::new(InMemoryAuthVerifier::new());
    let route_cache = Arc::new(RouteCache::new(route_store.clone()));
    let dispatcher = Arc::new(Dispatcher {
        bus: Arc::clone(&bus),
        from_subject: cfg.node_id.clone(),
        route_cache: Arc::clone(&route_cache),
        march_seeker,
    });

    let dispatch_pool = DispatchWorkerPool::new(cfg.dispatch_worker_count());

    let context = Arc::new(ConnectorContext {
        node_id: cfg.node_id.clone(),
        registry: Arc::clone(&registry),
        admission,
        auth,
        route_store,
        dispatcher,
        dispatch_pool,
    });

    tokio::spawn(run_push_consumer(
        Arc::clone(&bus),
        cfg.node_id.clone(),
        Arc::clone(&registry),
        Arc::clone(&route_cache),
    ));

    let server = ConnectorServer::new(context);
    let listener = tokio::net::TcpListener::bind(cfg.bind).await?;
    tracing::info!(target: "bin::gateway", bind = %cfg.bind, node_id = %cfg.node_id, "connector listening");
    axum::serve(listener, server.into_router()).await?;
    Ok(())
}
