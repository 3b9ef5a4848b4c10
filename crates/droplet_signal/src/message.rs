//! Wire protocol — server-to-client message shapes.
//!
//! Every message is one JSON object with a `type` discriminator. Inbound
//! messages are classified by [`crate::validate`]; this module owns the
//! outbound side plus the small shared vocabulary (device kinds, peer
//! descriptors).

use serde::{Deserialize, Serialize};

use crate::identity::ClientId;

/// Client-asserted device classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Tablet,
    Mobile,
}

impl DeviceType {
    /// Parse the wire string form, if valid.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "desktop" => Some(Self::Desktop),
            "tablet" => Some(Self::Tablet),
            "mobile" => Some(Self::Mobile),
            _ => None,
        }
    }
}

/// One peer as seen by a specific recipient of a NETWORK message.
///
/// `is_local` is recipient-relative: the same underlying peer set yields a
/// different descriptor list per recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerEntry {
    pub client_id: ClientId,
    pub client_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    pub is_local: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
}

/// A server-to-client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Sent once at connect time, before initialization.
    #[serde(rename = "APP_INFO", rename_all = "camelCase")]
    AppInfo {
        remote_address: String,
        max_size: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice_text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice_url: Option<String>,
        app_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        abuse_email: Option<String>,
    },

    /// Reply to a successful INITIALIZE.
    #[serde(rename = "CLIENT_INFO", rename_all = "camelCase")]
    ClientInfo {
        client_id: ClientId,
        suggested_client_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        suggested_network_name: Option<String>,
        local_network_names: Vec<String>,
        rtc_configuration: serde_json::Value,
    },

    /// Current membership view of one named network.
    #[serde(rename = "NETWORK")]
    Network { clients: Vec<PeerEntry> },

    /// Distinct network labels in use among the recipient's local peers.
    #[serde(rename = "LOCAL_NETWORKS", rename_all = "camelCase")]
    LocalNetworks { local_network_names: Vec<String> },

    /// Keep-alive probe; timestamp is milliseconds since the Unix epoch.
    #[serde(rename = "PING")]
    Ping { timestamp: i64 },
}

impl ServerMessage {
    /// Serialize to the wire string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
