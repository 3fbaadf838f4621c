//! AutoShare: the camera pushes new photos to the phone over S2L/1.0.
//!
//! The phone listens on the push port, registers with the camera on its
//! registration port, and then receives one file per inbound connection.

mod errors;
mod handshake;
mod receiver;
mod server;

#[cfg(test)]
mod server_test;

pub use errors::PushServerError;
pub use handshake::ACCEPTANCE_MARKERS;
pub use receiver::PushOutcome;
pub use server::{AutoSharePushServer, PushEvent, PushServerState};
