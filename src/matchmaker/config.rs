//! Static pool configuration.

use std::time::Duration;

use crate::discovery::SelectionStrategy;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub pool_id: String,
    pub strategy: SelectionStrategy,
    pub batch_size: usize,
    pub interval: Duration,
}

impl PoolConfig {
    pub fn new(pool_id: impl Into<String>, batch_size: usize, interval_ms: u64) -> Self {
        Self {
            pool_id: pool_id.into(),
            strategy: SelectionStrategy::LeastLoad,
            batch_size,
            interval: Duration::from_millis(interval_ms),
        }
    }
}

/// The three pools this deployment ships with: `classic:rank4`, `classic:casual4`,
/// `classic:casual3`. Rank pools use a tighter batch interval since
/// matchmaking quality matters more there; casual4 is the default 4-player
/// pool; casual3 is a reduced-seat variant the client can opt into.
pub fn default_pools() -> Vec<PoolConfig> {
    vec![
        PoolConfig {
            pool_id: "classic:rank4".into(),
            strategy: SelectionStrategy::LeastLoad,
            batch_size: 4,
            interval: Duration::from_millis(1500),
        },
        PoolConfig::new("classic:casual4", 4, 2000),
        PoolConfig::new("classic:casual3", 3, 2000),
    ]
}
