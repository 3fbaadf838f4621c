//! Error types for the DLNA/SOAP client.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlnaError {
    /// Request could not be sent or the response could not be read.
    Http(String),
    /// The HTTP request timed out.
    Timeout,
    /// The camera answered with a status other than 200.
    HttpStatus(u16),
    /// Malformed XML in a descriptor, SOAP envelope or DIDL-Lite listing.
    Xml(String),
    /// A Browse response had no `<Result>` element.
    MissingResult,
    /// No camera connected; call `connect` first.
    NotConnected,
}

impl DlnaError {
    /// True for connection-level failures (as opposed to protocol errors).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout | Self::NotConnected)
    }
}

impl std::fmt::Display for DlnaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(msg) => write!(f, "HTTP error: {msg}"),
            Self::Timeout => write!(f, "HTTP request timed out"),
            Self::HttpStatus(code) => write!(f, "Camera returned HTTP {code}"),
            Self::Xml(msg) => write!(f, "Invalid XML from camera: {msg}"),
            Self::MissingResult => write!(f, "Browse response has no Result element"),
            Self::NotConnected => write!(f, "Not connected to a DLNA camera"),
        }
    }
}

impl std::error::Error for DlnaError {}

impl From<reqwest::Error> for DlnaError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e.to_string())
        }
    }
}

impl From<quick_xml::Error> for DlnaError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}
