// Deny unused code to catch dead code early
#![deny(unused)]
// Warn on unused dependencies to catch platform-specific cfg mismatches
#![warn(unused_crate_dependencies)]
// Warn on redundant path prefixes (e.g., std::time::Duration when Duration is imported)
#![warn(unused_qualifications)]
// Use log::* macros instead of println!/eprintln! for proper log level control
#![deny(clippy::print_stdout, clippy::print_stderr)]

//! Protocol engine for Samsung Wi-Fi cameras.
//!
//! The phone talks to the camera in one of three mutually exclusive ways:
//!
//! - `ptp`: PTP/IP over two TCP connections (command + event).
//! - `dlna`: the camera's UPnP ContentDirectory dialect (HTTP + SOAP + DIDL-Lite).
//! - `autoshare`: the camera pushes new photos to us over S2L/1.0.
//!
//! `orchestrator` detects the camera network, probes which of these the camera
//! currently speaks, and drives the matching client. Persistence and the OS photo
//! library are collaborators (see `collaborators`), injected by the host app.

//noinspection RsUnusedImport
// serde_json is used by the camlink-probe binary for its report output
use serde_json as _;

pub mod autoshare;
pub mod collaborators;
pub mod config;
pub mod dlna;
mod ignore_poison;
pub mod log_buffer;
pub mod orchestrator;
pub mod ptp;
pub mod types;

pub use config::CamlinkConfig;
pub use orchestrator::ConnectionOrchestrator;
pub use types::{CameraFile, ConnectionStatus, FileFormat};

/// Initializes logging. Respects `RUST_LOG` (default: info).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
