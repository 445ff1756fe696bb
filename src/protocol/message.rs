//! Pomelo-style `Message` carried inside a `Data` packet.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Response,
    Notify,
    Push,
}

impl MessageType {
    /// Request/Response carry an `id` used to correlate the reply;
    /// Notify/Push are fire-and-forget.
    pub fn carries_id(self) -> bool {
        matches!(self, Self::Request | Self::Response)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub route: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Message {
    pub fn request(id: u64, route: impl Into<String>, data: Value) -> Self {
        Self {
            kind: MessageType::Request,
            id: Some(id),
            route: route.into(),
            data,
            error: None,
        }
    }

    pub fn notify(route: impl Into<String>, data: Value) -> Self {
        Self {
            kind: MessageType::Notify,
            id: None,
            route: route.into(),
            data,
            error: None,
        }
    }

    pub fn push(route: impl Into<String>, data: Value) -> Self {
        Self {
            kind: MessageType::Push,
            id: None,
            route: route.into(),
            data,
            error: None,
        }
    }

    pub fn response(id: u64, route: impl Into<String>, data: Value) -> Self {
        Self {
            kind: MessageType::Response,
            id: Some(id),
            route: route.into(),
            data,
            error: None,
        }
    }

    pub fn error_response(id: u64, route: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Response,
            id: Some(id),
            route: route.into(),
            data: Value::Null,
            error: Some(error.into()),
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, MessageError> {
        serde_json::to_vec(self).map_err(MessageError::Encode)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        serde_json::from_slice(bytes).map_err(MessageError::Decode)
    }

    /// First dot-separated segment of `route`, e.g. `"connector"` in
    /// `"connector.joinqueue"`.
    pub fn route_prefix(&self) -> &str {
        self.route.split('.').next().unwrap_or("")
    }
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to encode message: {0}")]
    Encode(serde_json::Error),
    #[error("failed to decode message: {0}")]
    Decode(serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeSys {
    #[serde(rename = "type")]
    pub client_type: String,
    pub version: String,
    #[serde(rename = "protoVersion")]
    pub proto_version: u32,
    pub heartbeat: u32,
    pub serializer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeRequest {
    pub sys: HandshakeSys,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeAckSys {
    pub heartbeat: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub code: u16,
    pub sys: HandshakeAckSys,
}

pub const HEARTBEAT_INTERVAL_SECS: u32 = 3;

impl HandshakeResponse {
    pub fn ok() -> Self {
        Self {
            code: 200,
            sys: HandshakeAckSys {
                heartbeat: HEARTBEAT_INTERVAL_SECS,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_prefix_splits_on_first_dot() {
        let msg = Message::notify("game.play.droptile", serde_json::json!({}));
        assert_eq!(msg.route_prefix(), "game");

        let msg = Message::notify("connector.joinqueue", serde_json::json!({}));
        assert_eq!(msg.route_prefix(), "connector");
    }

    #[test]
    fn handshake_response_encodes_expected_shape() {
        let resp = HandshakeResponse::ok();
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["code"], 200);
        assert_eq!(value["sys"]["heartbeat"], 3);
    }
}
