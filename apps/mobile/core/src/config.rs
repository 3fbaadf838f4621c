//! Runtime configuration.
//!
//! Priority: environment variables > defaults. Defaults match what the camera
//! firmware expects; the overrides exist for test rigs and camera emulators.

use std::env;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::types::ConnectionMode;

/// One row of the discovery probe table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTarget {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub mode: ConnectionMode,
}

impl ProbeTarget {
    pub const fn new(ip: Ipv4Addr, port: u16, mode: ConnectionMode) -> Self {
        Self { ip, port, mode }
    }
}

/// Camera access-point subnets seen on NX/WB models.
const CAMERA_AP_PRIMARY: Ipv4Addr = Ipv4Addr::new(192, 168, 102, 1);
const CAMERA_AP_SECONDARY: Ipv4Addr = Ipv4Addr::new(192, 168, 107, 1);

/// Probe order matters: the first reachable row wins.
pub const DEFAULT_PROBE_TABLE: [ProbeTarget; 6] = [
    ProbeTarget::new(CAMERA_AP_PRIMARY, 7676, ConnectionMode::Pull),
    ProbeTarget::new(CAMERA_AP_SECONDARY, 7676, ConnectionMode::Pull),
    ProbeTarget::new(CAMERA_AP_PRIMARY, 801, ConnectionMode::Push),
    ProbeTarget::new(CAMERA_AP_SECONDARY, 801, ConnectionMode::Push),
    ProbeTarget::new(CAMERA_AP_PRIMARY, 15740, ConnectionMode::Ptp),
    ProbeTarget::new(CAMERA_AP_SECONDARY, 15740, ConnectionMode::Ptp),
];

/// SSID fragments the camera uses for its own access point (matched case-insensitively).
pub const DEFAULT_SSID_PATTERNS: [&str; 6] = ["AP_SSC_", "SAMSUNG", "[NX]", "NX", "WB", "DIRECT-"];

/// Configuration for every protocol client and the orchestrator.
#[derive(Debug, Clone)]
pub struct CamlinkConfig {
    /// Name announced to the camera (PTP friendly name, DLNA client name, S2L body).
    pub client_name: String,

    // PTP/IP
    pub ptp_port: u16,
    /// Per-step budget during connect.
    pub ptp_step_timeout: Duration,
    /// Hard limit for a single exact-length read.
    pub ptp_read_timeout: Duration,

    // DLNA
    pub dlna_port: u16,
    pub dlna_stream_port: u16,
    pub http_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Pause before descending into each child container.
    pub browse_throttle: Duration,
    pub max_browse_depth: usize,

    // AutoShare (S2L)
    pub push_listen_port: u16,
    pub push_listen_ip: Ipv4Addr,
    pub registration_port: u16,
    pub handshake_attempts: u32,
    pub handshake_timeout: Duration,
    pub handshake_timeout_pause: Duration,
    pub handshake_error_pause: Duration,
    pub bind_retry_backoff: Duration,

    // Orchestrator
    pub probe_timeout: Duration,
    pub probe_table: Vec<ProbeTarget>,
    pub ssid_patterns: Vec<String>,

    /// Entries kept per client log buffer.
    pub log_capacity: usize,
}

impl Default for CamlinkConfig {
    fn default() -> Self {
        Self {
            client_name: "camlink".to_string(),
            ptp_port: 15740,
            ptp_step_timeout: Duration::from_secs(8),
            ptp_read_timeout: Duration::from_secs(10),
            dlna_port: 7676,
            dlna_stream_port: 7679,
            http_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(5),
            browse_throttle: Duration::from_millis(100),
            max_browse_depth: 16,
            push_listen_port: 1801,
            push_listen_ip: Ipv4Addr::UNSPECIFIED,
            registration_port: 801,
            handshake_attempts: 3,
            handshake_timeout: Duration::from_secs(4),
            handshake_timeout_pause: Duration::from_secs(2),
            handshake_error_pause: Duration::from_secs(1),
            bind_retry_backoff: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(2),
            probe_table: DEFAULT_PROBE_TABLE.to_vec(),
            ssid_patterns: DEFAULT_SSID_PATTERNS.iter().map(|s| s.to_string()).collect(),
            log_capacity: 500,
        }
    }
}

impl CamlinkConfig {
    /// Defaults overridden by `CAMLINK_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = env::var("CAMLINK_CLIENT_NAME") {
            if !name.trim().is_empty() {
                config.client_name = name.trim().to_string();
            }
        }
        config.ptp_port = env_parse("CAMLINK_PTP_PORT").unwrap_or(config.ptp_port);
        config.dlna_port = env_parse("CAMLINK_DLNA_PORT").unwrap_or(config.dlna_port);
        config.push_listen_port = env_parse("CAMLINK_PUSH_PORT").unwrap_or(config.push_listen_port);
        config.registration_port = env_parse("CAMLINK_REGISTRATION_PORT").unwrap_or(config.registration_port);
        if let Some(ms) = env_parse::<u64>("CAMLINK_PROBE_TIMEOUT_MS") {
            config.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("CAMLINK_HEARTBEAT_MS") {
            config.heartbeat_interval = Duration::from_millis(ms);
        }
        if let Some(ip) = env_parse::<Ipv4Addr>("CAMLINK_CAMERA_IP") {
            config.probe_table = probe_table_for(ip, &config);
        }

        config
    }
}

/// Builds a probe table for a single known camera address, in default mode order.
pub fn probe_table_for(ip: Ipv4Addr, config: &CamlinkConfig) -> Vec<ProbeTarget> {
    vec![
        ProbeTarget::new(ip, config.dlna_port, ConnectionMode::Pull),
        ProbeTarget::new(ip, config.registration_port, ConnectionMode::Push),
        ProbeTarget::new(ip, config.ptp_port, ConnectionMode::Ptp),
    ]
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
