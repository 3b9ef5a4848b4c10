//! Relay router — targeted message forwarding between identified clients.
//!
//! The relay never interprets what it carries. The payload goes out
//! exactly as it came in, with one change: a `clientId` field stamped
//! with the sender's identifier so the recipient knows who is talking.
//! Self-targeted and untargeted messages are dropped, and nobody is ever
//! told about a failed delivery.

use serde_json::Value;
use tracing::{debug, trace};

use crate::identity::ClientId;
use crate::registry::ClientRegistry;
use crate::validate::RelayRequest;

/// Forward a targeted message from an identified sender.
///
/// Delivers the stamped payload to every registered session whose id
/// equals the target — ordinarily one, but zero (peer gone) and, in the
/// degenerate duplicate-identifier case, several are tolerated.
pub fn relay(registry: &ClientRegistry, from: &ClientId, request: &RelayRequest) {
    if request.target_id.is_empty() || request.target_id == from.as_str() {
        trace!("Dropping self-targeted or untargeted relay from {from}");
        return;
    }

    let mut stamped = request.raw.clone();
    let Some(fields) = stamped.as_object_mut() else {
        return;
    };
    fields.insert("clientId".to_string(), Value::String(from.as_str().to_string()));

    let payload = match serde_json::to_string(&stamped) {
        Ok(json) => json,
        Err(e) => {
            debug!("Relay payload failed to serialize: {e}");
            return;
        }
    };

    let target = ClientId::from_string(request.target_id.clone());
    for session in registry.filter(|s| s.has_client_id(&target)) {
        if let Err(e) = session.send(&payload) {
            debug!("Relay delivery to {target} failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
