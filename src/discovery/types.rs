//! Node identity.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Connector,
    Game,
    March,
    /// The HTTP admission/auth facade. Out of scope for this core, but a first-class role value so discovery's key scheme and
    /// selector can address it uniformly with the in-scope roles.
    Gate,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Connector => "connector",
            Role::Game => "game",
            Role::March => "march",
            Role::Gate => "gate",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON-encoded value stored at `{role}/{nodeID}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub node_id: String,
    pub address: String,
    pub weight: u32,
    pub load: u32,
    pub ttl: u64,
    pub version: String,
}

impl ServerInfo {
    pub fn key(role: Role, node_id: &str) -> String {
        format!("{role}/{node_id}")
    }

    /// The prefix that must match exactly, not by string containment, per
    /// `"{R}/v10"` must not match a watch registered on `"{R}/v1"`.
    pub fn role_prefix(role: Role) -> String {
        format!("{role}/")
    }
}
