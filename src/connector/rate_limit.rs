//! Connection admission control: a token-bucket cap on new upgrades per
//! second plus a hard ceiling on concurrent connections, built on
//! `governor` the same way other axum/websocket gateways do.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{Quota, RateLimiter};
use tokio::sync::Semaphore;

use crate::errors::FabricError;

type DirectLimiter = RateLimiter<governor::state::direct::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// Guards new websocket upgrades: `conn_rate_per_sec` governs how fast new
/// connections are admitted, `max_connections` is a hard concurrency cap
/// enforced with a semaphore permit held for the connection's lifetime.
pub struct ConnectionAdmission {
    limiter: DirectLimiter,
    semaphore: Arc<Semaphore>,
}

/// Held by a connection for as long as it's alive; dropping it frees the
/// concurrency slot automatically.
pub struct AdmissionPermit(#[allow(dead_code)] tokio::sync::OwnedSemaphorePermit);

impl ConnectionAdmission {
    pub fn new(conn_rate_per_sec: u32, max_connections: usize) -> Self {
        let rate = NonZeroU32::new(conn_rate_per_sec.max(1)).expect("checked above");
        Self {
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            semaphore: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// `TryAdmit()`: refuses once the rate bucket is empty
    /// or every connection slot is taken, rather than queuing the upgrade.
    pub fn try_admit(&self) -> Result<AdmissionPermit, FabricError> {
        if self.limiter.check().is_err() {
            return Err(FabricError::Admission("connection rate limit exceeded".into()));
        }
        let permit = Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .map_err(|_| FabricError::Admission("connection limit reached".into()))?;
        Ok(AdmissionPermit(permit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_once_the_connection_cap_is_reached() {
        let admission = ConnectionAdmission::new(1000, 1);
        let first = admission.try_admit();
        assert!(first.is_ok());
        assert!(admission.try_admit().is_err());
        drop(first);
        assert!(admission.try_admit().is_ok());
    }

    #[test]
    fn refuses_once_the_rate_bucket_is_empty() {
        let admission = ConnectionAdmission::new(1, 1000);
        assert!(admission.try_admit().is_ok());
        assert!(admission.try_admit().is_err());
    }
}
