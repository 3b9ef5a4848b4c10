//! Client sessions and the transport boundary.
//!
//! The core never touches sockets. Whatever owns the real transport hands
//! each session a [`Connection`] and keeps its [`ConnectionState`]
//! truthful; everything else in this crate works against that trait.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::SignalError;
use crate::identity::ClientId;
use crate::message::DeviceType;

/// Liveness of the underlying transport, as reported by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Writable.
    Open,
    /// Close initiated, not yet finished.
    Closing,
    /// Gone.
    Closed,
}

impl ConnectionState {
    /// Connecting and Open sessions are alive; Closing/Closed are broken.
    pub fn is_alive(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

/// The transport boundary for one session.
///
/// `send` is fire-and-forget but must fail observably once the transport
/// is no longer writable — the liveness sweeps treat that failure as
/// proof of a dead connection. `close` must be safe to call repeatedly.
pub trait Connection: Send {
    fn send(&self, payload: &str) -> Result<(), SignalError>;
    fn close(&self);
    fn state(&self) -> ConnectionState;
}

/// One connected, possibly-initialized client.
pub struct ClientSession {
    /// Internal connection handle, never exposed on the wire.
    pub conn_id: Uuid,
    /// Derived public identifier; `None` until INITIALIZE is accepted.
    pub client_id: Option<ClientId>,
    /// Client-supplied token the identifier was derived from. Set once.
    pub secret: Option<String>,
    /// Display name; starts as a server suggestion.
    pub client_name: String,
    /// Named group membership, uppercased. `None` = unassigned.
    pub network_name: Option<String>,
    /// Network origin of the connection, set by the transport owner.
    pub remote_address: String,
    pub device_type: Option<DeviceType>,
    pub public_key: Option<String>,
    pub first_seen: DateTime<Utc>,
    /// Updated on every inbound message, valid or not.
    pub last_seen: DateTime<Utc>,
    pub initialized: bool,
    conn: Box<dyn Connection>,
}

impl ClientSession {
    /// Create a fresh pre-init session for a just-accepted connection.
    pub fn new(
        conn: Box<dyn Connection>,
        remote_address: String,
        suggested_name: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            conn_id: Uuid::new_v4(),
            client_id: None,
            secret: None,
            client_name: suggested_name,
            network_name: None,
            remote_address,
            device_type: None,
            public_key: None,
            first_seen: now,
            last_seen: now,
            initialized: false,
            conn,
        }
    }

    /// Send a raw payload over this session's transport.
    pub fn send(&self, payload: &str) -> Result<(), SignalError> {
        self.conn.send(payload)
    }

    /// Force-close this session's transport.
    pub fn close(&self) {
        self.conn.close();
    }

    /// Current transport state, owned by the connection manager.
    pub fn connection_state(&self) -> ConnectionState {
        self.conn.state()
    }

    /// True when this session's id equals the given one.
    pub fn has_client_id(&self, id: &ClientId) -> bool {
        self.client_id.as_ref() == Some(id)
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("conn_id", &self.conn_id)
            .field("client_id", &self.client_id)
            .field("client_name", &self.client_name)
            .field("network_name", &self.network_name)
            .field("remote_address", &self.remote_address)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
