//! The signaling hub — single owner of sessions and all
//! mutation-then-broadcast sequencing.
//!
//! Every transport event lands here: accepted connections, inbound
//! messages, disconnects. The hub holds pre-init sessions apart from the
//! registry, runs each event to completion, and pushes the derived
//! network views out to affected peers before the next event is
//! processed. Callers that run events from multiple tasks must serialize
//! them (the server wraps the hub in one mutex), which keeps each
//! sequence atomic without any locking in here.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::SignalConfig;
use crate::identity::derive_client_id;
use crate::message::{DeviceType, ServerMessage};
use crate::names;
use crate::network;
use crate::registry::ClientRegistry;
use crate::relay;
use crate::session::{ClientSession, Connection};
use crate::validate::{self, InboundMessage};

/// Orchestrates sessions, grouping, and relays for one server instance.
pub struct SignalHub {
    config: SignalConfig,
    /// Accepted connections that have not sent a valid INITIALIZE yet.
    pending: Vec<ClientSession>,
    registry: ClientRegistry,
}

impl SignalHub {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            registry: ClientRegistry::new(),
        }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Read-only access to the registry, for sweeps and tests.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Look up a session in either the pending list or the registry.
    pub fn find_session(&self, conn_id: Uuid) -> Option<&ClientSession> {
        self.pending
            .iter()
            .find(|s| s.conn_id == conn_id)
            .or_else(|| self.registry.get(conn_id))
    }

    /// Accept a new connection: create a pre-init session with a suggested
    /// display name and greet it with APP_INFO.
    pub fn accept(&mut self, conn: Box<dyn Connection>, remote_address: String) -> Uuid {
        let session = ClientSession::new(conn, remote_address, names::suggest_client_name());

        let app_info = ServerMessage::AppInfo {
            remote_address: session.remote_address.clone(),
            max_size: self.config.max_message_size,
            notice_text: self.config.notice_text.clone(),
            notice_url: self.config.notice_url.clone(),
            app_name: self.config.app_name.clone(),
            abuse_email: self.config.abuse_email.clone(),
        };
        send_message(&session, &app_info);

        let conn_id = session.conn_id;
        trace!("Accepted connection {conn_id} from {}", session.remote_address);
        self.pending.push(session);
        conn_id
    }

    /// Handle one raw inbound frame. Undecodable input still counts as
    /// activity for the session, then is dropped without a reply.
    pub fn handle_text(&mut self, conn_id: Uuid, raw: &str) {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => self.handle_message(conn_id, &value),
            Err(_) => {
                self.touch(conn_id);
            }
        }
    }

    /// Handle one decoded inbound message.
    pub fn handle_message(&mut self, conn_id: Uuid, message: &Value) {
        if !self.touch(conn_id) {
            return;
        }

        let Some(inbound) = validate::classify(message) else {
            trace!("Dropping unrecognized message from {conn_id}");
            return;
        };

        match inbound {
            InboundMessage::Initialize { secret, public_key } => {
                self.initialize(conn_id, secret, public_key);
            }
            InboundMessage::SetNetworkName {
                network_name,
                device_type,
            } => {
                self.set_network_name(conn_id, &network_name, device_type);
            }
            InboundMessage::SetClientName { client_name } => {
                self.set_client_name(conn_id, client_name);
            }
            InboundMessage::Relay(request) => {
                let Some(from) = self
                    .registry
                    .get(conn_id)
                    .and_then(|s| s.client_id.clone())
                else {
                    // Pre-init senders cannot relay.
                    return;
                };
                relay::relay(&self.registry, &from, &request);
            }
        }
    }

    /// A connection went away: forget a pending session, or unregister a
    /// registered one (which notifies its former group).
    pub fn disconnect(&mut self, conn_id: Uuid) {
        if let Some(pos) = self.pending.iter().position(|s| s.conn_id == conn_id) {
            self.pending.remove(pos);
            trace!("Dropped pending connection {conn_id}");
            return;
        }
        self.unregister(conn_id);
    }

    /// Remove a session from the registry, clearing its network label
    /// first so its former group and local peers get fresh views. Returns
    /// the removed session so callers can force-close the transport.
    /// Unregistering an absent session is a no-op.
    pub fn unregister(&mut self, conn_id: Uuid) -> Option<ClientSession> {
        if !self.registry.contains(conn_id) {
            return None;
        }
        self.apply_network_label(conn_id, None);
        self.registry.unregister(conn_id)
    }

    // -----------------------------------------------------------------------
    // Message handling
    // -----------------------------------------------------------------------

    /// Record inbound activity. Returns false for unknown connections.
    fn touch(&mut self, conn_id: Uuid) -> bool {
        if let Some(session) = self.pending.iter_mut().find(|s| s.conn_id == conn_id) {
            session.last_seen = Utc::now();
            return true;
        }
        if let Some(session) = self.registry.get_mut(conn_id) {
            session.last_seen = Utc::now();
            return true;
        }
        false
    }

    fn initialize(&mut self, conn_id: Uuid, secret: String, public_key: Option<String>) {
        let Some(pos) = self.pending.iter().position(|s| s.conn_id == conn_id) else {
            // Already initialized; a second INITIALIZE is a no-op.
            return;
        };

        let mut session = self.pending.remove(pos);
        let client_id = derive_client_id(&secret);
        session.secret = Some(secret);
        session.public_key = public_key;
        session.client_id = Some(client_id.clone());
        session.initialized = true;

        let local_network_names =
            network::local_network_names(&self.registry, &session.remote_address);

        let client_info = ServerMessage::ClientInfo {
            client_id: client_id.clone(),
            suggested_client_name: session.client_name.clone(),
            suggested_network_name: local_network_names.first().cloned(),
            local_network_names,
            rtc_configuration: self.config.rtc_configuration.clone(),
        };

        debug!(
            "Session {conn_id} initialized as {client_id} from {}",
            session.remote_address
        );
        self.registry.register(session);
        if let Some(session) = self.registry.get(conn_id) {
            send_message(session, &client_info);
        }
    }

    fn set_network_name(
        &mut self,
        conn_id: Uuid,
        network_name: &str,
        device_type: Option<DeviceType>,
    ) {
        let Some(session) = self.registry.get_mut(conn_id) else {
            return;
        };
        session.device_type = device_type;

        let label = if network_name.is_empty() {
            None
        } else {
            Some(network_name.to_uppercase())
        };
        self.apply_network_label(conn_id, label);
    }

    fn set_client_name(&mut self, conn_id: Uuid, client_name: String) {
        let Some(session) = self.registry.get_mut(conn_id) else {
            return;
        };
        session.client_name = client_name;

        // Re-run the label transition with the unchanged label so the
        // rename reaches group members and local peers.
        let label = session.network_name.clone();
        self.apply_network_label(conn_id, label);
    }

    /// The grouping transition: set the label, notify the group left
    /// behind, notify the group joined, and always refresh the local
    /// peers' view of which networks exist at their endpoint.
    fn apply_network_label(&mut self, conn_id: Uuid, new_label: Option<String>) {
        let Some(session) = self.registry.get_mut(conn_id) else {
            return;
        };
        let previous = session.network_name.take();
        session.network_name = new_label.clone();
        let remote_address = session.remote_address.clone();

        if let Some(previous) = &previous {
            if new_label.as_deref() != Some(previous.as_str()) {
                self.broadcast_network(previous);
            }
        }
        if let Some(label) = &new_label {
            self.broadcast_network(label);
        }
        self.push_local_networks(&remote_address);
    }

    // -----------------------------------------------------------------------
    // Broadcasts
    // -----------------------------------------------------------------------

    /// Send every member of a network its own view of the membership.
    /// Individual send failures never abort delivery to the rest.
    fn broadcast_network(&self, label: &str) {
        let members = network::members_of(&self.registry, label);
        for recipient in &members {
            let view = ServerMessage::Network {
                clients: network::network_view(&members, recipient),
            };
            send_message(recipient, &view);
        }
    }

    /// Tell every label-bearing session at an endpoint which networks are
    /// currently in use there.
    fn push_local_networks(&self, remote_address: &str) {
        let message = ServerMessage::LocalNetworks {
            local_network_names: network::local_network_names(&self.registry, remote_address),
        };
        for peer in network::local_peers(&self.registry, remote_address) {
            send_message(peer, &message);
        }
    }
}

/// Serialize and send, swallowing failures; dead recipients are caught by
/// the liveness sweeps.
fn send_message(session: &ClientSession, message: &ServerMessage) {
    let payload = match message.to_json() {
        Ok(json) => json,
        Err(e) => {
            debug!("Outbound message failed to serialize: {e}");
            return;
        }
    };
    if let Err(e) = session.send(&payload) {
        debug!("Send to {} failed: {e}", session.conn_id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::identity::derive_client_id;
    use crate::testing::RecordingConnection;

    fn hub() -> SignalHub {
        SignalHub::new(SignalConfig::default())
    }

    fn connect(hub: &mut SignalHub, addr: &str) -> (Uuid, RecordingConnection) {
        let conn = RecordingConnection::new();
        let conn_id = hub.accept(conn.boxed(), addr.to_string());
        (conn_id, conn)
    }

    fn initialize(hub: &mut SignalHub, conn_id: Uuid, secret: &str) {
        hub.handle_message(conn_id, &json!({"type": "INITIALIZE", "secret": secret}));
    }

    fn parsed(conn: &RecordingConnection) -> Vec<Value> {
        conn.sent()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    fn messages_of_type(conn: &RecordingConnection, kind: &str) -> Vec<Value> {
        parsed(conn)
            .into_iter()
            .filter(|v| v["type"] == kind)
            .collect()
    }

    #[test]
    fn test_accept_greets_with_app_info() {
        let mut hub = hub();
        let (_, conn) = connect(&mut hub, "192.0.2.1");

        let first: Value = serde_json::from_str(&conn.sent()[0]).unwrap();
        assert_eq!(first["type"], "APP_INFO");
        assert_eq!(first["remoteAddress"], "192.0.2.1");
        assert_eq!(first["appName"], "Droplet");
        assert_eq!(first["maxSize"], 65536);
    }

    #[test]
    fn test_initialize_replies_with_client_info() {
        let mut hub = hub();
        let (conn_id, conn) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, conn_id, "ABCABCABCABC");

        let infos = messages_of_type(&conn, "CLIENT_INFO");
        let info = &infos[0];
        assert_eq!(info["clientId"], derive_client_id("ABCABCABCABC").as_str());
        assert!(info["rtcConfiguration"]["iceServers"].is_array());

        // Stored identity matches the reply.
        let session = hub.registry().get(conn_id).expect("registered");
        assert!(session.initialized);
        assert_eq!(
            session.client_id.as_ref().map(|id| id.as_str().to_string()),
            info["clientId"].as_str().map(str::to_string)
        );
        assert_eq!(
            info["suggestedClientName"].as_str(),
            Some(session.client_name.as_str())
        );
    }

    #[test]
    fn test_duplicate_initialize_is_noop() {
        let mut hub = hub();
        let (conn_id, conn) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, conn_id, "first-secret");
        initialize(&mut hub, conn_id, "second-secret");

        assert_eq!(messages_of_type(&conn, "CLIENT_INFO").len(), 1);
        let session = hub.registry().get(conn_id).expect("registered");
        assert_eq!(session.secret.as_deref(), Some("first-secret"));
        assert_eq!(hub.registry().len(), 1);
    }

    #[test]
    fn test_pre_init_messages_are_dropped() {
        let mut hub = hub();
        let (conn_id, conn) = connect(&mut hub, "192.0.2.1");

        hub.handle_message(
            conn_id,
            &json!({"type": "SET_NETWORK_NAME", "networkName": "home"}),
        );
        assert!(hub.registry().is_empty());
        // Only the APP_INFO greeting went out.
        assert_eq!(conn.sent_count(), 1);
    }

    #[test]
    fn test_malformed_input_still_counts_as_activity() {
        let mut hub = hub();
        let (conn_id, _conn) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, conn_id, "s1");

        let before = hub.registry().get(conn_id).expect("registered").last_seen;
        std::thread::sleep(std::time::Duration::from_millis(5));
        hub.handle_text(conn_id, "this is not json");

        let after = hub.registry().get(conn_id).expect("registered").last_seen;
        assert!(after > before);
    }

    #[test]
    fn test_two_local_clients_join_a_network() {
        let mut hub = hub();
        let (id_a, conn_a) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_a, "s1");
        hub.handle_message(
            id_a,
            &json!({"type": "SET_NETWORK_NAME", "networkName": "home"}),
        );

        let (id_b, conn_b) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_b, "s2");

        // B's greeting already lists A's network, uppercased.
        let infos = messages_of_type(&conn_b, "CLIENT_INFO");
        let info = &infos[0];
        assert_eq!(info["suggestedNetworkName"], "HOME");
        assert_eq!(info["localNetworkNames"], json!(["HOME"]));

        hub.handle_message(
            id_b,
            &json!({"type": "SET_NETWORK_NAME", "networkName": "home", "deviceType": "mobile"}),
        );

        // Both now see a two-member view where everyone is local.
        for conn in [&conn_a, &conn_b] {
            let views = messages_of_type(conn, "NETWORK");
            let last = views.last().expect("received a network view");
            let clients = last["clients"].as_array().expect("clients array");
            assert_eq!(clients.len(), 2);
            assert!(clients.iter().all(|c| c["isLocal"] == true));
        }

        // The membership list is newest-first: B connected after A.
        let view_for_a = messages_of_type(&conn_a, "NETWORK");
        let clients = view_for_a.last().unwrap()["clients"].clone();
        assert_eq!(clients[0]["clientId"], derive_client_id("s2").as_str());
        assert_eq!(clients[0]["deviceType"], "mobile");
        assert_eq!(clients[1]["clientId"], derive_client_id("s1").as_str());
    }

    #[test]
    fn test_remote_peer_is_not_local() {
        let mut hub = hub();
        let (id_a, conn_a) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_a, "s1");
        hub.handle_message(
            id_a,
            &json!({"type": "SET_NETWORK_NAME", "networkName": "home"}),
        );

        let (id_b, _conn_b) = connect(&mut hub, "198.51.100.7");
        initialize(&mut hub, id_b, "s2");
        hub.handle_message(
            id_b,
            &json!({"type": "SET_NETWORK_NAME", "networkName": "home"}),
        );

        let views = messages_of_type(&conn_a, "NETWORK");
        let clients = views.last().unwrap()["clients"].as_array().unwrap().clone();
        let b_id = derive_client_id("s2");
        let b_entry = clients
            .iter()
            .find(|c| c["clientId"] == b_id.as_str())
            .expect("b in view");
        assert_eq!(b_entry["isLocal"], false);
    }

    #[test]
    fn test_relabel_notifies_the_group_left_behind() {
        let mut hub = hub();
        let (id_a, conn_a) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_a, "s1");
        hub.handle_message(
            id_a,
            &json!({"type": "SET_NETWORK_NAME", "networkName": "home"}),
        );
        let (id_b, conn_b) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_b, "s2");
        hub.handle_message(
            id_b,
            &json!({"type": "SET_NETWORK_NAME", "networkName": "home"}),
        );

        let a_views_before = messages_of_type(&conn_a, "NETWORK").len();
        hub.handle_message(
            id_b,
            &json!({"type": "SET_NETWORK_NAME", "networkName": "office"}),
        );

        // A got a fresh HOME view without B.
        let a_views = messages_of_type(&conn_a, "NETWORK");
        assert_eq!(a_views.len(), a_views_before + 1);
        let last = a_views.last().unwrap()["clients"].as_array().unwrap().clone();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0]["clientId"], derive_client_id("s1").as_str());

        // B's newest view is its one-member OFFICE network.
        let b_views = messages_of_type(&conn_b, "NETWORK");
        let b_last = b_views.last().unwrap()["clients"].as_array().unwrap().clone();
        assert_eq!(b_last.len(), 1);
        assert_eq!(b_last[0]["clientId"], derive_client_id("s2").as_str());
    }

    #[test]
    fn test_disconnect_updates_remaining_members() {
        let mut hub = hub();
        let (id_a, conn_a) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_a, "s1");
        hub.handle_message(
            id_a,
            &json!({"type": "SET_NETWORK_NAME", "networkName": "home"}),
        );
        let (id_b, conn_b) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_b, "s2");
        hub.handle_message(
            id_b,
            &json!({"type": "SET_NETWORK_NAME", "networkName": "home"}),
        );

        let a_count_before = conn_a.sent_count();
        hub.disconnect(id_a);

        // A is gone and received nothing further.
        assert_eq!(conn_a.sent_count(), a_count_before);
        assert!(hub.registry().get(id_a).is_none());

        // B sees a one-member view and refreshed local networks.
        let b_views = messages_of_type(&conn_b, "NETWORK");
        let last = b_views.last().unwrap()["clients"].as_array().unwrap().clone();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0]["clientId"], derive_client_id("s2").as_str());
        let locals = messages_of_type(&conn_b, "LOCAL_NETWORKS");
        assert_eq!(locals.last().unwrap()["localNetworkNames"], json!(["HOME"]));
    }

    #[test]
    fn test_disconnect_of_pending_session_is_silent() {
        let mut hub = hub();
        let (id_a, conn_a) = connect(&mut hub, "192.0.2.1");
        let count = conn_a.sent_count();

        hub.disconnect(id_a);
        assert_eq!(conn_a.sent_count(), count);
        assert!(hub.find_session(id_a).is_none());
    }

    #[test]
    fn test_set_client_name_rebroadcasts() {
        let mut hub = hub();
        let (id_a, conn_a) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_a, "s1");
        hub.handle_message(
            id_a,
            &json!({"type": "SET_NETWORK_NAME", "networkName": "home"}),
        );

        hub.handle_message(
            id_a,
            &json!({"type": "SET_CLIENT_NAME", "clientName": "Laptop"}),
        );

        let views = messages_of_type(&conn_a, "NETWORK");
        let last = views.last().unwrap()["clients"].as_array().unwrap().clone();
        assert_eq!(last[0]["clientName"], "Laptop");
    }

    #[test]
    fn test_clearing_label_via_empty_network_name() {
        let mut hub = hub();
        let (id_a, _conn_a) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_a, "s1");
        hub.handle_message(
            id_a,
            &json!({"type": "SET_NETWORK_NAME", "networkName": "home"}),
        );
        hub.handle_message(
            id_a,
            &json!({"type": "SET_NETWORK_NAME", "networkName": ""}),
        );

        let session = hub.registry().get(id_a).expect("still registered");
        assert!(session.network_name.is_none());
    }

    #[test]
    fn test_relay_through_handle_message() {
        let mut hub = hub();
        let (id_a, _conn_a) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_a, "s1");
        let (id_b, conn_b) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_b, "s2");

        let target = derive_client_id("s2");
        hub.handle_message(
            id_a,
            &json!({
                "type": "ACTION",
                "targetId": target.as_str(),
                "transferId": "ay3UIn8k4QsznfyHCt9mh",
                "action": "accept"
            }),
        );

        let actions = messages_of_type(&conn_b, "ACTION");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0]["clientId"], derive_client_id("s1").as_str());
    }

    #[test]
    fn test_transfer_offer_preview_policy() {
        let mut hub = hub();
        let (id_a, _conn_a) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_a, "s1");
        let (id_b, conn_b) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_b, "s2");
        let target = derive_client_id("s2");

        let offer = |preview: &str| {
            json!({
                "type": "TRANSFER_OFFER",
                "targetId": target.as_str(),
                "transferId": "x1",
                "fileName": "photo.png",
                "fileSize": 4,
                "fileType": "image/png",
                "preview": preview
            })
        };

        hub.handle_message(id_a, &offer("http://evil.example/x"));
        assert!(messages_of_type(&conn_b, "TRANSFER_OFFER").is_empty());

        hub.handle_message(id_a, &offer("data:image/png;base64,AAAA"));
        let delivered = messages_of_type(&conn_b, "TRANSFER_OFFER");
        assert_eq!(delivered.len(), 1);
        // Forwarded intact apart from the injected sender id.
        assert_eq!(delivered[0]["preview"], "data:image/png;base64,AAAA");
        assert_eq!(delivered[0]["fileName"], "photo.png");
        assert_eq!(delivered[0]["clientId"], derive_client_id("s1").as_str());
    }

    #[test]
    fn test_invalid_action_is_dropped() {
        let mut hub = hub();
        let (id_a, _conn_a) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_a, "s1");
        let (id_b, conn_b) = connect(&mut hub, "192.0.2.1");
        initialize(&mut hub, id_b, "s2");
        let before = conn_b.sent_count();

        // ACTION with no action field: structurally invalid, dropped.
        hub.handle_message(
            id_a,
            &json!({"type": "ACTION", "targetId": derive_client_id("s2").as_str()}),
        );
        assert_eq!(conn_b.sent_count(), before);
    }

    #[test]
    fn test_unknown_connection_is_ignored() {
        let mut hub = hub();
        hub.handle_message(Uuid::new_v4(), &json!({"type": "INITIALIZE", "secret": "x"}));
        assert!(hub.registry().is_empty());
    }
}
