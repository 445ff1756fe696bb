//! Per-connection session state: the handshake
//! must complete and auth must succeed before a connection is allowed to
//! carry any `game.*`/`connector.*` traffic.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use crate::protocol::message::Message;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingHandshake,
    AwaitingAuth,
    Ready,
}

/// Everything the writer task can put on the wire for one connection: an
/// application `Message` (wrapped in a `Data` packet), or one of the three
/// control frames the writer encodes directly.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Data(Message),
    HandshakeAck,
    Heartbeat,
    Kick,
}

/// One websocket connection's identity and outbound channel. Cheap to
/// clone; every clone shares the same phase flag and outbound sender.
pub struct Session {
    pub connection_id: String,
    pub outbound: mpsc::Sender<OutboundFrame>,
    handshaken: AtomicBool,
    user_id: parking_lot::RwLock<Option<String>>,
}

impl Session {
    pub fn new(connection_id: String, outbound: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            connection_id,
            outbound,
            handshaken: AtomicBool::new(false),
            user_id: parking_lot::RwLock::new(None),
        }
    }

    pub fn mark_handshaken(&self) {
        self.handshaken.store(true, Ordering::SeqCst);
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_id.read().clone()
    }

    /// `Bind(userID)`: completes auth, from then on the
    /// session is addressable by user id everywhere else in the gateway.
    pub fn bind(&self, user_id: String) {
        *self.user_id.write() = Some(user_id);
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.handshaken.load(Ordering::SeqCst) {
            SessionPhase::AwaitingHandshake
        } else if self.user_id().is_none() {
            SessionPhase::AwaitingAuth
        } else {
            SessionPhase::Ready
        }
    }

    pub async fn send(&self, message: Message) -> bool {
        self.outbound.send(OutboundFrame::Data(message)).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn phase_advances_through_handshake_then_auth() {
        let (tx, _rx) = mpsc::channel(8);
        let session = Session::new("c1".into(), tx);
        assert_eq!(session.phase(), SessionPhase::AwaitingHandshake);

        session.mark_handshaken();
        assert_eq!(session.phase(), SessionPhase::AwaitingAuth);

        session.bind("u1".into());
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert_eq!(session.user_id().as_deref(), Some("u1"));
    }
}
