//! Wire formats spoken by Samsung Wi-Fi cameras.
//!
//! Two unrelated encodings live here, both pure and allocation-light:
//!
//! - PTP/IP (CIPA DC-005): length-prefixed binary frames carrying PTP operations,
//!   responses, events and data phases. See [`frame`], [`packet`] and [`data`].
//! - S2L/1.0: the line-based text header the camera uses when it pushes photos to
//!   a registered phone ("AutoShare"). See [`s2l`].
//!
//! Nothing in this crate touches a socket. Callers read exactly one frame (or one
//! S2L header block) off the stream and hand the bytes over for decoding.
//!
//! Decoders are deliberately forgiving: vendor firmware routinely sends truncated
//! datasets, so reading past the end of a buffer yields zero values instead of an
//! error. Only the outer frame header is validated strictly.

pub mod codes;
pub mod data;
pub mod frame;
pub mod packet;
pub mod s2l;


pub use codes::{EventCode, ObjectFormatCode, OperationCode, ResponseCode};
pub use data::{DataReader, DataWriter};
pub use frame::{Frame, HEADER_LEN, PacketType, decode_frame, encode_frame};
pub use packet::{DataPhase, Packet};
pub use s2l::{S2lHeader, S2lResult};

/// Errors produced while decoding wire data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The PTP/IP frame header is malformed or names an unknown packet type.
    InvalidFrame(String),
    /// The S2L header block is empty or has no request line.
    InvalidHeader(String),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFrame(msg) => write!(f, "Invalid PTP/IP frame: {msg}"),
            Self::InvalidHeader(msg) => write!(f, "Invalid S2L header: {msg}"),
        }
    }
}

impl std::error::Error for WireError {}
