//! In-process stand-in for the subject-addressed bus fabric.
//! Each node subscribes to the subject equal to its own node id; publishing
//! to a subject hands the envelope to every subscriber currently registered
//! under it. Request/response is a reply-inbox subject with a one-shot
//! subscription.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::warn;

use super::envelope::ServicePacket;
use crate::errors::FabricError;

const LOG_TARGET: &str = "bus::memory";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

enum Mailbox {
    Subscriber(mpsc::Sender<ServicePacket>),
    Reply(oneshot::Sender<ServicePacket>),
}

/// A single shared bus instance. Clone to hand out to every role in the
/// same process; all clones share the same subject table.
#[derive(Clone)]
pub struct MemoryBus {
    subjects: Arc<DashMap<String, mpsc::Sender<ServicePacket>>>,
    inboxes: Arc<DashMap<String, oneshot::Sender<ServicePacket>>>,
    next_call_id: Arc<std::sync::atomic::AtomicU64>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self {
            subjects: Arc::new(DashMap::new()),
            inboxes: Arc::new(DashMap::new()),
            next_call_id: Arc::new(std::sync::atomic::AtomicU64::new(1)),
        }
    }

    /// Subscribes a subject and returns the receiving half. A node calls
    /// this once at startup with its own node-id subject.
    pub fn subscribe(&self, subject: impl Into<String>) -> mpsc::Receiver<ServicePacket> {
        let (tx, rx) = mpsc::channel(2048);
        self.subjects.insert(subject.into(), tx);
        rx
    }

    pub fn unsubscribe(&self, subject: &str) {
        self.subjects.remove(subject);
    }

    fn next_id(&self) -> u64 {
        self.next_call_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    /// Fire-and-forget publish to `packet.to`. Silently drops (with a log)
    /// if nothing is subscribed there — mirrors a real fabric where a
    /// vanished node simply never picks up the message.
    pub async fn publish(&self, packet: ServicePacket) -> Result<(), FabricError> {
        let Some(sender) = self.subjects.get(&packet.to).map(|e| e.value().clone()) else {
            warn!(target: LOG_TARGET, to = %packet.to, route = %packet.route, "publish to unknown subject");
            return Ok(());
        };
        sender
            .send(packet)
            .await
            .map_err(|_| FabricError::routing("subject closed"))
    }

    /// Request/response: publishes with a fresh reply-inbox subject and
    /// awaits either a reply or the per-call deadline.
    pub async fn request(
        &self,
        mut packet: ServicePacket,
        deadline: Option<Duration>,
    ) -> Result<ServicePacket, FabricError> {
        let call_id = self.next_id();
        let inbox = format!("_inbox.{}.{}", packet.from, call_id);
        packet.call_id = call_id;

        let (tx, rx) = oneshot::channel();
        self.inboxes.insert(inbox.clone(), tx);

        let destination = packet.to.clone();
        if let Err(err) = self.publish(packet).await {
            self.inboxes.remove(&inbox);
            return Err(err);
        }

        let wait = deadline.unwrap_or(DEFAULT_TIMEOUT);
        match timeout(wait, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.inboxes.remove(&inbox);
                Err(FabricError::routing(format!(
                    "reply inbox dropped before response from {destination}"
                )))
            }
            Err(_) => {
                self.inboxes.remove(&inbox);
                Err(FabricError::BusTimeout {
                    destination,
                    elapsed_ms: wait.as_millis() as u64,
                })
            }
        }
    }

    /// Delivers a response packet to the reply inbox named by the request's
    /// `call_id` and requester subject. Responders call this instead of
    /// `publish` when replying to a `Request` packet.
    pub fn reply(&self, inbox: &str, packet: ServicePacket) -> Result<(), FabricError> {
        match self.inboxes.remove(inbox) {
            Some((_, tx)) => tx
                .send(packet)
                .map_err(|_| FabricError::routing("requester no longer waiting")),
            None => Err(FabricError::routing(format!(
                "no pending request for inbox {inbox}"
            ))),
        }
    }

    pub fn inbox_subject(from: &str, call_id: u64) -> String {
        format!("_inbox.{from}.{call_id}")
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::MessageType;
    use serde_json::json;

    #[tokio::test]
    async fn publish_delivers_to_subscriber() {
        let bus = MemoryBus::new();
        let mut rx = bus.subscribe("game/g1");

        bus.publish(ServicePacket::notify(
            "march/m1".into(),
            "game/g1".into(),
            "createRoom",
            json!({}),
        ))
        .await
        .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.route, "createRoom");
    }

    #[tokio::test]
    async fn request_times_out_with_no_responder() {
        let bus = MemoryBus::new();
        bus.subscribe("game/g1");

        let packet = ServicePacket::request(
            "march/m1".into(),
            "game/g1".into(),
            0,
            "createRoom",
            json!({}),
        );
        let err = bus
            .request(packet, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, FabricError::BusTimeout { .. }));
    }

    #[tokio::test]
    async fn request_response_round_trips() {
        let bus = MemoryBus::new();
        let mut rx = bus.subscribe("game/g1");
        let responder_bus = bus.clone();

        tokio::spawn(async move {
            let packet = rx.recv().await.unwrap();
            let inbox = MemoryBus::inbox_subject(&packet.from, packet.call_id);
            responder_bus
                .reply(&inbox, packet.response(json!({"roomId": "r1"})))
                .unwrap();
        });

        let packet = ServicePacket::request(
            "march/m1".into(),
            "game/g1".into(),
            0,
            "createRoom",
            json!({}),
        );
        let kind = MessageType::Response;
        let response = bus.request(packet, None).await.unwrap();
        assert_eq!(response.kind, kind);
        assert_eq!(response.data["roomId"], "r1");
    }

    #[tokio::test]
    async fn publish_to_unknown_subject_does_not_error() {
        let bus = MemoryBus::new();
        bus.publish(ServicePacket::notify(
            "a".into(),
            "nowhere".into(),
            "x",
            json!({}),
        ))
        .await
        .unwrap();
    }
}
