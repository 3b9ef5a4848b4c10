//! Server configuration.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the signaling server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Address to listen on for incoming WebSocket connections.
    #[serde(with = "socket_addr_serde")]
    pub listen_addr: SocketAddr,

    /// Application name reported in APP_INFO.
    pub app_name: String,

    /// Abuse contact reported in APP_INFO, if any.
    pub abuse_email: Option<String>,

    /// Operator notice shown to clients, if any.
    pub notice_text: Option<String>,
    pub notice_url: Option<String>,

    /// Maximum accepted WebSocket message size in bytes; also reported to
    /// clients as `maxSize`.
    pub max_message_size: u64,

    /// Interval between PING probes to every registered session.
    #[serde(with = "duration_serde")]
    pub heartbeat_interval: Duration,

    /// Interval between idle/broken eviction sweeps.
    #[serde(with = "duration_serde")]
    pub sweep_interval: Duration,

    /// How long a session may stay silent before the idle sweep evicts it.
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,

    /// Take the remote endpoint from the first X-Forwarded-For entry.
    /// Only enable behind a proxy that always sets the header.
    pub trust_forwarded_for: bool,

    /// Opaque RTC configuration handed to clients in CLIENT_INFO.
    pub rtc_configuration: serde_json::Value,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5000".parse().expect("valid default listen address"),
            app_name: "Droplet".to_string(),
            abuse_email: None,
            notice_text: None,
            notice_url: None,
            max_message_size: 65536,
            heartbeat_interval: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(20),
            trust_forwarded_for: false,
            rtc_configuration: default_rtc_configuration(),
        }
    }
}

/// One public STUN entry; operators supply their own servers via the
/// config file.
fn default_rtc_configuration() -> serde_json::Value {
    serde_json::json!({
        "iceServers": [
            { "urls": "stun:stun.l.google.com:19302" }
        ]
    })
}

impl SignalConfig {
    /// Save the config to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create directory: {e}"))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {e}"))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Load config from a JSON file, or return defaults if missing.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str::<SignalConfig>(&data) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Corrupt config file, using defaults: {e}");
                    }
                },
                Err(e) => {
                    tracing::warn!("Cannot read config file, using defaults: {e}");
                }
            }
        }
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S: Serializer>(addr: &SocketAddr, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SocketAddr, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(dur: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(dur.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
