//! Load-weighted node selection.

use rand::Rng;
use thiserror::Error;

use super::types::ServerInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    LeastLoad,
    WeightedRoundRobin,
    Random,
}

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("no servers available")]
    NoServer,
}

/// `selected = f(servers)`. Takes a slice so callers can select straight out
/// of a [`Seeker`](super::seeker::Seeker) snapshot without cloning into an
/// owned buffer first.
pub fn select<'a>(
    strategy: SelectionStrategy,
    servers: &'a [ServerInfo],
) -> Result<&'a ServerInfo, SelectError> {
    if servers.is_empty() {
        return Err(SelectError::NoServer);
    }

    match strategy {
        SelectionStrategy::LeastLoad => Ok(least_load(servers)),
        SelectionStrategy::WeightedRoundRobin => Ok(weighted_round_robin(servers)),
        SelectionStrategy::Random => Ok(random(servers)),
    }
}

fn least_load(servers: &[ServerInfo]) -> &ServerInfo {
    // Ties broken by first encountered: a strict `<` keeps the earliest
    // minimum rather than the latest.
    let mut best = &servers[0];
    for candidate in &servers[1..] {
        if candidate.load < best.load {
            best = candidate;
        }
    }
    best
}

fn weighted_round_robin(servers: &[ServerInfo]) -> &ServerInfo {
    let total_weight: u64 = servers.iter().map(|s| effective_weight(s)).sum();
    if total_weight == 0 {
        return random(servers);
    }

    let mut pick = rand::thread_rng().gen_range(0..total_weight);
    for server in servers {
        let weight = effective_weight(server);
        if pick < weight {
            return server;
        }
        pick -= weight;
    }
    // Unreachable given the sum above, but avoid a panic on float/overflow
    // edge cases by falling back to the last server.
    &servers[servers.len() - 1]
}

fn effective_weight(server: &ServerInfo) -> u64 {
    // Zero weights default to 1.
    if server.weight == 0 {
        1
    } else {
        server.weight as u64
    }
}

fn random(servers: &[ServerInfo]) -> &ServerInfo {
    let idx = rand::thread_rng().gen_range(0..servers.len());
    &servers[idx]
}
