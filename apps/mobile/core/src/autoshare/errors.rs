//! Error types for the AutoShare push server.

use camlink_wire::WireError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushServerError {
    /// `start` called while a lifecycle is already running.
    AlreadyRunning,
    /// The listener could not be bound (other than address-in-use, which is retried).
    Bind(String),
    /// Socket error on a push or registration connection.
    Io(String),
    /// The peer closed the connection before a complete header arrived.
    Closed,
    /// The header block could not be parsed.
    InvalidHeader(String),
}

impl PushServerError {
    /// True for connection-level failures (as opposed to protocol errors).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Bind(_) | Self::Io(_) | Self::Closed)
    }
}

impl std::fmt::Display for PushServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "AutoShare server is already running"),
            Self::Bind(msg) => write!(f, "Could not bind AutoShare listener: {msg}"),
            Self::Io(msg) => write!(f, "AutoShare I/O error: {msg}"),
            Self::Closed => write!(f, "Peer closed the connection before sending a header"),
            Self::InvalidHeader(msg) => write!(f, "Invalid S2L header: {msg}"),
        }
    }
}

impl std::error::Error for PushServerError {}

impl From<std::io::Error> for PushServerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<WireError> for PushServerError {
    fn from(e: WireError) -> Self {
        Self::InvalidHeader(e.to_string())
    }
}
