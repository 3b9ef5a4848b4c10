//! Client identity — derived, opaque, stable identifiers.
//!
//! A client proves nothing: it supplies a secret of its own choosing and
//! the server derives the public identifier from it. The same secret
//! always maps to the same id, so a client that reconnects keeps its
//! identity, while the secret itself never leaves the session record.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A derived, opaque identifier for a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl ClientId {
    /// Create a ClientId from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Return the inner string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derive the public client identifier from a client-supplied secret.
///
/// One-way: SHA-256 of the secret bytes, hex-encoded. Callers must reject
/// empty secrets before getting here (the INITIALIZE validator does).
pub fn derive_client_id(secret: &str) -> ClientId {
    let digest = Sha256::digest(secret.as_bytes());
    ClientId(hex::encode(digest))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
