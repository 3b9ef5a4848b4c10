//! Liveness supervision — heartbeat and eviction sweeps.
//!
//! Three independent, idempotent passes keep the registry honest:
//!
//! 1. **Heartbeat**: ping everyone; a failed send proves the connection
//!    is dead, so the session is evicted and its transport force-closed.
//! 2. **Idle eviction**: an open connection that has been silent past the
//!    configured timeout gets evicted and force-closed.
//! 3. **Broken eviction**: connections the transport already reports as
//!    closing or closed are dropped without a close call.
//!
//! Each sweep runs to completion under the same hub lock as message
//! handling, so they can never observe a half-applied mutation.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::hub::SignalHub;
use crate::message::ServerMessage;
use crate::session::ConnectionState;

/// Ping every registered session; evict and force-close any whose
/// transport refuses the write.
pub fn ping_all(hub: &mut SignalHub) {
    let ping = ServerMessage::Ping {
        timestamp: Utc::now().timestamp_millis(),
    };
    let payload = match ping.to_json() {
        Ok(json) => json,
        Err(e) => {
            debug!("Ping failed to serialize: {e}");
            return;
        }
    };

    let ids: Vec<Uuid> = hub.registry().all().iter().map(|s| s.conn_id).collect();
    for conn_id in ids {
        // Eviction broadcasts earlier in this sweep may already have
        // removed the session; skip it then.
        let failed = match hub.registry().get(conn_id) {
            Some(session) => session.send(&payload).is_err(),
            None => false,
        };
        if failed {
            info!("Heartbeat failed for {conn_id}, evicting");
            if let Some(session) = hub.unregister(conn_id) {
                session.close();
            }
        }
    }
}

/// Evict open sessions that have been silent longer than the idle
/// timeout. Sessions not in the open state are left for [`evict_broken`].
pub fn evict_idle(hub: &mut SignalHub) {
    let timeout = hub.config().idle_timeout;
    let now = Utc::now();

    let idle: Vec<Uuid> = hub
        .registry()
        .all()
        .iter()
        .filter(|s| s.connection_state() == ConnectionState::Open)
        .filter(|s| {
            now.signed_duration_since(s.last_seen)
                .to_std()
                .map(|silence| silence > timeout)
                .unwrap_or(false)
        })
        .map(|s| s.conn_id)
        .collect();

    for conn_id in idle {
        info!("Session {conn_id} idle past timeout, evicting");
        if let Some(session) = hub.unregister(conn_id) {
            session.close();
        }
    }
}

/// Evict sessions whose transport is already closing or closed. No close
/// call: the transport is considered gone.
pub fn evict_broken(hub: &mut SignalHub) {
    let broken: Vec<Uuid> = hub
        .registry()
        .all()
        .iter()
        .filter(|s| !s.connection_state().is_alive())
        .map(|s| s.conn_id)
        .collect();

    for conn_id in broken {
        debug!("Session {conn_id} transport is gone, evicting");
        hub.unregister(conn_id);
    }
}

/// Drive the sweeps until shutdown. Heartbeats and evictions tick on
/// their own intervals from the hub's config.
pub async fn run(hub: Arc<Mutex<SignalHub>>, mut shutdown: broadcast::Receiver<()>) {
    let (heartbeat_every, sweep_every) = {
        let hub = hub.lock();
        (
            hub.config().heartbeat_interval,
            hub.config().sweep_interval,
        )
    };

    let mut heartbeat = tokio::time::interval(heartbeat_every);
    let mut sweep = tokio::time::interval(sweep_every);

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                ping_all(&mut hub.lock());
            }
            _ = sweep.tick() => {
                let mut hub = hub.lock();
                evict_broken(&mut hub);
                evict_idle(&mut hub);
            }
            _ = shutdown.recv() => {
                debug!("Supervisor shutting down");
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
