//! Subject-addressed message envelope carried over the in-process bus.
//! Mirrors the wire `Message` shape so a handler can be written once and
//! either dispatched locally or, eventually, deserialized off a real
//! transport without changing its signature.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::message::MessageType;

/// One node's address on the bus: `{role}/{node_id}`, matching the
/// discovery registry's key scheme so routing and registration agree on
/// what a node is called.
pub type Subject = String;

pub fn subject_for(role: &str, node_id: &str) -> Subject {
    format!("{role}/{node_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePacket {
    pub kind: MessageType,
    pub call_id: u64,
    pub from: Subject,
    pub to: Subject,
    pub route: String,
    pub data: Value,
    pub error: Option<String>,
    /// Which userIDs are targeted when this is a push; empty for plain request/notify traffic.
    #[serde(default)]
    pub push_user: Vec<String>,
    #[serde(default)]
    pub session_data: Option<Value>,
}

impl ServicePacket {
    pub fn request(from: Subject, to: Subject, call_id: u64, route: impl Into<String>, data: Value) -> Self {
        Self {
            kind: MessageType::Request,
            call_id,
            from,
            to,
            route: route.into(),
            data,
            error: None,
            push_user: Vec::new(),
            session_data: None,
        }
    }

    pub fn notify(from: Subject, to: Subject, route: impl Into<String>, data: Value) -> Self {
        Self {
            kind: MessageType::Notify,
            call_id: 0,
            from,
            to,
            route: route.into(),
            data,
            error: None,
            push_user: Vec::new(),
            session_data: None,
        }
    }

    /// A push addressed to a connector subject for a specific set of
    /// users: `destination=connectorNodeID`,
    /// `pushUser=[userID...]`, `route=gamePush`.
    pub fn push(from: Subject, to: Subject, route: impl Into<String>, push_user: Vec<String>, data: Value) -> Self {
        Self {
            kind: MessageType::Push,
            call_id: 0,
            from,
            to,
            route: route.into(),
            data,
            error: None,
            push_user,
            session_data: None,
        }
    }

    pub fn response(&self, data: Value) -> Self {
        Self {
            kind: MessageType::Response,
            call_id: self.call_id,
            from: self.to.clone(),
            to: self.from.clone(),
            route: self.route.clone(),
            data,
            error: None,
            push_user: Vec::new(),
            session_data: None,
        }
    }

    pub fn error_response(&self, message: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Response,
            call_id: self.call_id,
            from: self.to.clone(),
            to: self.from.clone(),
            route: self.route.clone(),
            data: Value::Null,
            error: Some(message.into()),
            push_user: Vec::new(),
            session_data: None,
        }
    }
}
