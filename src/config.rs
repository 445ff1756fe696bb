//! Node configuration loaded from the environment.
//!
//! `NODE_ID` is the only variable with no default; every other knob below
//! carries a documented production-sane default so a node can start with
//! zero configuration beyond its identity.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::discovery::Role;

#[derive(Debug, Clone, Parser)]
pub struct NodeConfig {
    /// Globally unique node id. Required, no default.
    #[arg(long, env = "NODE_ID")]
    pub node_id: String,

    /// Role this process registers under in discovery.
    #[arg(long, env = "NODE_ROLE")]
    pub role: Role,

    /// Address other nodes should use to reach this one (RPC / bus).
    #[arg(long, env = "NODE_ADDRESS", default_value = "127.0.0.1:0")]
    pub address: SocketAddr,

    /// HTTP bind address for the admin/gateway surface.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Discovery lease TTL in seconds.
    #[arg(long, env = "LEASE_TTL_SECS", default_value_t = 30)]
    pub lease_ttl_secs: u64,

    /// Static weight this node advertises; load is reported separately.
    #[arg(long, env = "NODE_WEIGHT", default_value_t = 1)]
    pub weight: u32,

    /// Max concurrent gateway connections.
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 100_000)]
    pub max_connections: usize,

    /// Gateway upgrade rate limit in connections/sec.
    #[arg(long, env = "CONN_RATE_PER_SEC", default_value_t = 100)]
    pub conn_rate_per_sec: u32,

    /// Number of sharded client-registry buckets.
    #[arg(long, env = "REGISTRY_SHARDS", default_value_t = 32)]
    pub registry_shards: usize,

    /// Dispatch worker count; defaults to 2x the available CPUs.
    #[arg(long, env = "DISPATCH_WORKERS")]
    pub dispatch_workers: Option<usize>,

    /// Route cache TTL in seconds.
    #[arg(long, env = "ROUTE_TTL_SECS", default_value_t = 7_200)]
    pub route_ttl_secs: u64,
}

impl NodeConfig {
    pub fn parse_from_env() -> anyhow::Result<Self> {
        Ok(Self::try_parse()?)
    }

    pub fn dispatch_worker_count(&self) -> usize {
        self.dispatch_workers
            .unwrap_or_else(|| 2 * num_cpus_fallback())
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    pub fn route_ttl(&self) -> Duration {
        Duration::from_secs(self.route_ttl_secs)
    }
}

/// Avoids pulling in the `num_cpus` crate for a single call site; falls back
/// to 4 when the runtime can't report a thread count.
fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
