//! PTP/IP client (CIPA DC-005).
//!
//! The camera listens on one TCP port. We open a command connection, do the init
//! handshake, open a second connection for events, then run PTP transactions on
//! the command connection. Packet layout lives in `camlink_wire`.

mod client;
mod dataset;
mod errors;
mod transport;

#[cfg(test)]
pub(crate) mod fake_camera;

pub use client::{ObjectQuery, PROTOCOL_VERSION, PtpClient, PtpEvent};
pub use dataset::{DeviceInfo, ObjectInfo, StorageInfo};
pub use errors::PtpError;
