//! Network grouping — derived peer views.
//!
//! Membership is never stored as a relationship. Everything here is
//! recomputed on demand from two scalar session fields: `network_name`
//! (which named group, if any) and `remote_address` (which physical
//! endpoint). Keeping these as pure functions over the registry avoids
//! the registry and a membership table drifting apart.

use crate::message::PeerEntry;
use crate::registry::ClientRegistry;
use crate::session::ClientSession;

/// All sessions carrying the given label, most recently connected first.
pub fn members_of<'a>(registry: &'a ClientRegistry, label: &str) -> Vec<&'a ClientSession> {
    let mut members = registry.filter(|s| s.network_name.as_deref() == Some(label));
    members.sort_by(|a, b| b.first_seen.cmp(&a.first_seen));
    members
}

/// Peer descriptors for one recipient of a NETWORK broadcast.
///
/// `is_local` compares each member's endpoint against the recipient's, so
/// the emitted list differs per recipient even though the member set is
/// shared.
pub fn network_view(members: &[&ClientSession], recipient: &ClientSession) -> Vec<PeerEntry> {
    members
        .iter()
        .filter_map(|peer| {
            let client_id = peer.client_id.clone()?;
            Some(PeerEntry {
                client_id,
                client_name: peer.client_name.clone(),
                public_key: peer.public_key.clone(),
                is_local: peer.remote_address == recipient.remote_address,
                device_type: peer.device_type,
            })
        })
        .collect()
}

/// Sessions sharing an endpoint that are part of some network, most
/// recently active first. This is the audience for LOCAL_NETWORKS pushes
/// and the basis for label enumeration.
pub fn local_peers<'a>(registry: &'a ClientRegistry, remote_address: &str) -> Vec<&'a ClientSession> {
    let mut peers = registry
        .filter(|s| s.remote_address == remote_address && s.network_name.is_some());
    peers.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
    peers
}

/// Distinct labels in use at an endpoint, ordered by first appearance over
/// the most-recently-active-first local peer list.
pub fn local_network_names(registry: &ClientRegistry, remote_address: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for peer in local_peers(registry, remote_address) {
        if let Some(label) = &peer.network_name {
            if !names.iter().any(|n| n == label) {
                names.push(label.clone());
            }
        }
    }
    names
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
