//! Inbound message validation and classification.
//!
//! Payloads arrive as untyped JSON and must match one of a closed set of
//! kinds before anything touches the registry. Each `is_*` function is a
//! pure structural predicate; [`classify`] runs them and produces the
//! typed [`InboundMessage`]. Anything unrecognized or malformed yields
//! `None` and is dropped by the caller with no reply — the protocol never
//! tells a sender what was wrong with its message.
//!
//! Targeted kinds (ACTION, negotiation, encrypted, transfer offers) keep
//! the raw JSON object so the relay can forward it verbatim.

use serde_json::Value;

use crate::message::DeviceType;

/// A structurally valid inbound message.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Initialize {
        secret: String,
        public_key: Option<String>,
    },
    SetNetworkName {
        network_name: String,
        device_type: Option<DeviceType>,
    },
    SetClientName {
        client_name: String,
    },
    /// Any of the targeted kinds, to be relayed without interpretation.
    Relay(RelayRequest),
}

/// A targeted message awaiting relay. `raw` is the full original payload.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub target_id: String,
    pub raw: Value,
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.as_object()?.get(key)?.as_str()
}

fn message_type<'a>(v: &'a Value) -> Option<&'a str> {
    str_field(v, "type")
}

/// True when `key` is absent or a string. Used for optional string fields.
fn optional_str(v: &Value, key: &str) -> bool {
    match v.as_object().and_then(|o| o.get(key)) {
        None => true,
        Some(val) => val.is_string(),
    }
}

/// Targeted kinds all require a string `targetId`.
fn has_target(v: &Value) -> bool {
    str_field(v, "targetId").is_some()
}

pub fn is_initialize(v: &Value) -> bool {
    message_type(v) == Some("INITIALIZE")
        && str_field(v, "secret").is_some_and(|s| !s.is_empty())
        && optional_str(v, "publicKey")
}

pub fn is_set_network_name(v: &Value) -> bool {
    message_type(v) == Some("SET_NETWORK_NAME")
        && str_field(v, "networkName").is_some()
        && match v.as_object().and_then(|o| o.get("deviceType")) {
            None => true,
            Some(val) => val.as_str().is_some_and(|s| DeviceType::from_wire(s).is_some()),
        }
}

pub fn is_set_client_name(v: &Value) -> bool {
    message_type(v) == Some("SET_CLIENT_NAME")
        && str_field(v, "clientName").is_some_and(|s| !s.is_empty())
}

pub fn is_action(v: &Value) -> bool {
    message_type(v) == Some("ACTION")
        && has_target(v)
        && str_field(v, "transferId").is_some()
        && matches!(
            str_field(v, "action"),
            Some("accept") | Some("reject") | Some("cancel")
        )
}

pub fn is_negotiation_description(v: &Value) -> bool {
    message_type(v) == Some("NEGOTIATION_DESCRIPTION")
        && has_target(v)
        && v.as_object()
            .and_then(|o| o.get("data"))
            .is_some_and(Value::is_object)
}

pub fn is_negotiation_candidate(v: &Value) -> bool {
    // A null candidate is meaningful: it signals end-of-candidates.
    message_type(v) == Some("NEGOTIATION_CANDIDATE")
        && has_target(v)
        && v.as_object().is_some_and(|o| o.contains_key("data"))
}

pub fn is_encrypted_envelope(v: &Value) -> bool {
    message_type(v) == Some("ENCRYPTED_ENVELOPE")
        && has_target(v)
        && str_field(v, "payload").is_some()
}

pub fn is_transfer_offer(v: &Value) -> bool {
    if message_type(v) != Some("TRANSFER_OFFER")
        || !has_target(v)
        || str_field(v, "transferId").is_none()
        || str_field(v, "fileName").is_none()
        || str_field(v, "fileType").is_none()
    {
        return false;
    }

    let size_ok = v
        .as_object()
        .and_then(|o| o.get("fileSize"))
        .and_then(Value::as_f64)
        .is_some_and(|n| n >= 0.0);
    if !size_ok {
        return false;
    }

    // Previews must be inline data URLs.
    match v.as_object().and_then(|o| o.get("preview")) {
        None => true,
        Some(p) => p.as_str().is_some_and(|s| s.starts_with("data:")),
    }
}

/// Classify an arbitrary decoded payload into a typed inbound message.
///
/// Returns `None` for anything outside the closed set or structurally
/// invalid; callers drop those silently.
pub fn classify(v: &Value) -> Option<InboundMessage> {
    if is_initialize(v) {
        return Some(InboundMessage::Initialize {
            secret: str_field(v, "secret")?.to_string(),
            public_key: str_field(v, "publicKey").map(str::to_string),
        });
    }

    if is_set_network_name(v) {
        return Some(InboundMessage::SetNetworkName {
            network_name: str_field(v, "networkName")?.to_string(),
            device_type: str_field(v, "deviceType").and_then(DeviceType::from_wire),
        });
    }

    if is_set_client_name(v) {
        return Some(InboundMessage::SetClientName {
            client_name: str_field(v, "clientName")?.to_string(),
        });
    }

    if is_action(v)
        || is_negotiation_description(v)
        || is_negotiation_candidate(v)
        || is_encrypted_envelope(v)
        || is_transfer_offer(v)
    {
        return Some(InboundMessage::Relay(RelayRequest {
            target_id: str_field(v, "targetId")?.to_string(),
            raw: v.clone(),
        }));
    }

    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
