//! Per-worker dispatch queues fanning inbound packets out across N tasks
//! instead of processing every connection's frames on its own read-loop
//! task.
//!
//! `FNV(connID) mod workerCount` picks the worker, so every frame from the
//! same connection always lands on the same worker and is processed in
//! order. Overflowing a worker's queue falls back to inline dispatch on
//! the read loop's own task rather than blocking it.

use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fnv::FnvHasher;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::protocol::frame::Packet;
use crate::tokio_tools::spawn_named_task;

use super::session::Session;
use super::ws::{handle_packet, ConnectorContext};

const LOG_TARGET: &str = "connector::worker_pool";
const WORKER_QUEUE_CAPACITY: usize = 256;

struct WorkItem {
    packet: Packet,
    session: Arc<Session>,
    ctx: Arc<ConnectorContext>,
    result_tx: oneshot::Sender<Result<(), ()>>,
}

/// Fixed pool of dispatch workers, each with its own bounded queue. Built
/// once per connector process and shared across every connection.
pub struct DispatchWorkerPool {
    senders: Vec<mpsc::Sender<WorkItem>>,
    overflow_count: AtomicU64,
}

impl DispatchWorkerPool {
    pub fn new(worker_count: usize) -> Arc<Self> {
        let worker_count = worker_count.max(1);
        let mut senders = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let (tx, mut rx) = mpsc::channel::<WorkItem>(WORKER_QUEUE_CAPACITY);
            spawn_named_task(format!("dispatch-worker-{id}"), async move {
                while let Some(item) = rx.recv().await {
                    let outcome = handle_packet(item.packet, &item.session, &item.ctx).await;
                    let _ = item.result_tx.send(outcome);
                }
            });
            senders.push(tx);
        }
        Arc::new(Self {
            senders,
            overflow_count: AtomicU64::new(0),
        })
    }

    fn worker_index(&self, connection_id: &str) -> usize {
        let mut hasher = FnvHasher::default();
        hasher.write(connection_id.as_bytes());
        (hasher.finish() as usize) % self.senders.len()
    }

    /// Overflow-dispatch counter, observable for metrics/tests.
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count.load(Ordering::Relaxed)
    }

    /// Routes one packet onto its connection's worker queue; falls back to
    /// running it inline, on the caller's own task, when that queue is
    /// full or the worker has gone away.
    pub async fn dispatch(
        &self,
        connection_id: &str,
        packet: Packet,
        session: &Arc<Session>,
        ctx: &Arc<ConnectorContext>,
    ) -> Result<(), ()> {
        let index = self.worker_index(connection_id);
        let (result_tx, result_rx) = oneshot::channel();
        let item = WorkItem {
            packet,
            session: Arc::clone(session),
            ctx: Arc::clone(ctx),
            result_tx,
        };

        match self.senders[index].try_send(item) {
            Ok(()) => result_rx.await.unwrap_or(Err(())),
            Err(mpsc::error::TrySendError::Full(item)) => {
                self.overflow_count.fetch_add(1, Ordering::Relaxed);
                warn!(target: LOG_TARGET, connection_id, worker = index, "worker queue full, dispatching inline");
                handle_packet(item.packet, &item.session, &item.ctx).await
            }
            Err(mpsc::error::TrySendError::Closed(item)) => {
                handle_packet(item.packet, &item.session, &item.ctx).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::connector::{ClientRegistry, ConnectionAdmission, Dispatcher, RouteCache};
    use crate::discovery::{Resolver, Role, SelectionStrategy, Seeker};
    use crate::persistence::InMemoryAuthVerifier;
    use crate::protocol::frame::PacketType;
    use crate::store::memory::MemoryStore;
    use crate::store::RouteStore;
    use std::time::Duration;

    async fn sample_ctx() -> Arc<ConnectorContext> {
        let kv = MemoryStore::new();
        let bus = Arc::new(MemoryBus::new());
        let route_store = RouteStore::new(kv.clone(), Duration::from_secs(7200));
        let resolver = Arc::new(Resolver::start(kv.clone(), Role::March).await.unwrap());
        let march_seeker = Arc::new(Seeker::new(resolver, SelectionStrategy::LeastLoad));
        let route_cache = Arc::new(RouteCache::new(route_store.clone()));
        let dispatcher = Arc::new(Dispatcher {
            bus,
            from_subject: "connector/c1".into(),
            route_cache,
            march_seeker,
        });
        Arc::new(ConnectorContext {
            node_id: "connector/c1".into(),
            registry: Arc::new(ClientRegistry::new(4)),
            admission: Arc::new(ConnectionAdmission::new(1000, 1000)),
            auth: Arc::new(InMemoryAuthVerifier::new()),
            route_store,
            dispatcher,
            dispatch_pool: DispatchWorkerPool::new(1),
        })
    }

    fn sample_session() -> Arc<Session> {
        let (tx, _rx) = mpsc::channel(8);
        Arc::new(Session::new("conn-1".into(), tx))
    }

    #[tokio::test]
    async fn same_connection_id_always_picks_the_same_worker() {
        let pool = DispatchWorkerPool::new(8);
        let a = pool.worker_index("conn-42");
        let b = pool.worker_index("conn-42");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn heartbeat_round_trips_through_a_worker() {
        let pool = DispatchWorkerPool::new(2);
        let ctx = sample_ctx().await;
        let session = sample_session();
        let packet = Packet::new(PacketType::Heartbeat, Vec::new()).unwrap();

        let result = pool.dispatch("conn-1", packet, &session, &ctx).await;
        assert!(result.is_ok());
        assert_eq!(pool.overflow_count(), 0);
    }

    #[tokio::test]
    async fn a_full_worker_queue_falls_back_to_inline_dispatch() {
        // Built by hand rather than `DispatchWorkerPool::new` so no
        // background task drains the queue out from under the test —
        // draining it concurrently would make "full" a race.
        let (tx, _rx) = mpsc::channel::<WorkItem>(1);
        let pool = DispatchWorkerPool {
            senders: vec![tx],
            overflow_count: AtomicU64::new(0),
        };
        let ctx = sample_ctx().await;
        let session = sample_session();

        let (filler_tx, _filler_rx) = oneshot::channel();
        let filler = WorkItem {
            packet: Packet::new(PacketType::Heartbeat, Vec::new()).unwrap(),
            session: Arc::clone(&session),
            ctx: Arc::clone(&ctx),
            result_tx: filler_tx,
        };
        pool.senders[0].try_send(filler).expect("capacity-1 channel accepts the first item");

        let packet = Packet::new(PacketType::Heartbeat, Vec::new()).unwrap();
        let result = pool.dispatch("conn-1", packet, &session, &ctx).await;
        assert!(result.is_ok());
        assert_eq!(pool.overflow_count(), 1);
    }
}
