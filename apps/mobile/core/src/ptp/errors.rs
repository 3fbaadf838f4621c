//! Error types for PTP/IP operations.

use camlink_wire::{ResponseCode, WireError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtpError {
    /// No open connection; call `connect` first.
    NotConnected,
    /// A connect step or a read did not finish in time.
    Timeout,
    /// The camera closed the connection.
    Disconnected,
    /// Other socket error.
    Io(String),
    /// The camera sent bytes that don't form a valid PTP/IP frame.
    InvalidFrame(String),
    /// A well-formed packet arrived where a different one was expected.
    UnexpectedPacket(String),
    /// The camera refused the PTP/IP init handshake.
    InitFailed(u32),
    /// The camera answered an operation with a non-OK response code.
    OperationFailed(ResponseCode),
}

impl PtpError {
    /// True for connection-level failures (as opposed to protocol errors).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Timeout | Self::Disconnected | Self::Io(_))
    }
}

impl std::fmt::Display for PtpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "Not connected to a PTP/IP camera"),
            Self::Timeout => write!(f, "PTP/IP operation timed out"),
            Self::Disconnected => write!(f, "Camera closed the PTP/IP connection"),
            Self::Io(msg) => write!(f, "PTP/IP I/O error: {msg}"),
            Self::InvalidFrame(msg) => write!(f, "Invalid PTP/IP frame: {msg}"),
            Self::UnexpectedPacket(msg) => write!(f, "Unexpected PTP/IP packet: {msg}"),
            Self::InitFailed(reason) => write!(f, "Camera rejected PTP/IP init (reason {reason})"),
            Self::OperationFailed(code) => write!(f, "PTP operation failed: {code}"),
        }
    }
}

impl std::error::Error for PtpError {}

impl From<WireError> for PtpError {
    fn from(e: WireError) -> Self {
        Self::InvalidFrame(e.to_string())
    }
}

impl From<std::io::Error> for PtpError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
                Self::Disconnected
            }
            ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert_eq!(PtpError::from(eof), PtpError::Disconnected);
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(PtpError::from(refused), PtpError::Io(_)));
    }

    #[test]
    fn test_transport_classification() {
        assert!(PtpError::Timeout.is_transport());
        assert!(PtpError::Disconnected.is_transport());
        assert!(!PtpError::OperationFailed(ResponseCode::DeviceBusy).is_transport());
        assert!(!PtpError::InitFailed(1).is_transport());
    }

    #[test]
    fn test_display_names_response_code() {
        let e = PtpError::OperationFailed(ResponseCode::DeviceBusy);
        assert_eq!(e.to_string(), "PTP operation failed: DeviceBusy (0x2019)");
    }
}
