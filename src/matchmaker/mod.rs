//! The Matchmaker (March) role.

pub mod bus_dispatch;
pub mod config;
pub mod driver;
pub mod pool;
pub mod result;
pub mod service;

pub use bus_dispatch::run_matchmaker_dispatch_loop;
pub use config::{default_pools, PoolConfig};
pub use driver::{spawn_pool_driver, PoolTrigger};
pub use pool::{JoinQueueError, MatchPools};
pub use result::{run_result_consumer, MatchResult};
pub use service::MatchmakerService;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::discovery::Seeker;
use crate::store::RouteStore;

const RESULT_CHANNEL_CAPACITY: usize = 256;

/// Wires every configured pool's driver plus the single result consumer.
/// Returns the service handle (`join_queue`/`leave_queue`) callers use from
/// the bus dispatch layer.
pub fn spawn_matchmaker(
    pools_cfg: Vec<PoolConfig>,
    game_seeker: Arc<Seeker>,
    route_store: Arc<RouteStore>,
    bus: Arc<crate::bus::MemoryBus>,
    from_subject: String,
) -> MatchmakerService {
    let pools = MatchPools::new();
    let (results_tx, results_rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);

    let mut triggers = HashMap::new();
    for cfg in pools_cfg {
        let trigger = spawn_pool_driver(
            cfg.clone(),
            Arc::clone(&pools),
            Arc::clone(&game_seeker),
            Arc::clone(&route_store),
            results_tx.clone(),
        );
        triggers.insert(cfg.pool_id, trigger);
    }

    let service = MatchmakerService::new(Arc::clone(&pools), triggers);
    let original_scores = service.original_scores();

    tokio::spawn(run_result_consumer(
        results_rx,
        bus,
        route_store,
        pools,
        from_subject,
        original_scores,
    ));

    service
}
