//! Droplet Signal — signaling and presence core for browser-to-browser
//! file transfer.
//!
//! This crate tracks connected clients, establishes their derived
//! identities, groups them into discoverable named networks, and relays
//! opaque negotiation and transfer-control messages between peers. File
//! bytes never pass through here; once two clients have exchanged
//! negotiation payloads they talk directly over their own transport.
//!
//! # Architecture
//!
//! - **Identity**: client secrets are hashed into stable, opaque ids.
//! - **Protocol**: JSON messages with a closed `type` discriminator;
//!   inbound payloads are validated structurally and dropped silently
//!   when they do not match.
//! - **Presence**: an in-memory registry of initialized sessions; network
//!   membership and local peer sets are derived views, recomputed on
//!   every change.
//! - **Relay**: targeted messages are stamped with the sender id and
//!   forwarded verbatim.
//! - **Liveness**: periodic ping, idle, and broken-connection sweeps
//!   evict dead sessions.
//!
//! The actual transport is supplied by the caller through the
//! [`Connection`](session::Connection) trait; see the `droplet_server`
//! crate for the WebSocket implementation.

pub mod config;
pub mod error;
pub mod hub;
pub mod identity;
pub mod message;
pub mod names;
pub mod network;
pub mod registry;
pub mod relay;
pub mod session;
pub mod supervisor;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

// ── Re-exports for convenience ──────────────────────────────────────────

pub use config::SignalConfig;
pub use error::SignalError;
pub use hub::SignalHub;
pub use identity::ClientId;
pub use message::{DeviceType, PeerEntry, ServerMessage};
pub use session::{ClientSession, Connection, ConnectionState};
