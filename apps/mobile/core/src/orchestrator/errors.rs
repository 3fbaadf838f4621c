//! Error types for the connection orchestrator.

use crate::autoshare::PushServerError;
use crate::collaborators::CollaboratorError;
use crate::dlna::DlnaError;
use crate::ptp::PtpError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Every probe in the table failed.
    NoCameraFound,
    /// The operation needs an active pull-mode (DLNA or PTP) session.
    NotConnected,
    /// A DLNA item without a content URL can't be downloaded.
    MissingContentUrl(String),
    Ptp(PtpError),
    Dlna(DlnaError),
    Push(PushServerError),
    Collaborator(CollaboratorError),
}

impl OrchestratorError {
    /// True for connection-level failures in the underlying client.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Ptp(e) => e.is_transport(),
            Self::Dlna(e) => e.is_transport(),
            Self::Push(e) => e.is_transport(),
            Self::NoCameraFound | Self::NotConnected => true,
            Self::MissingContentUrl(_) | Self::Collaborator(_) => false,
        }
    }
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCameraFound => write!(f, "No camera found on any known address"),
            Self::NotConnected => write!(f, "No camera session is active"),
            Self::MissingContentUrl(name) => write!(f, "Camera listed {name} without a download URL"),
            Self::Ptp(e) => write!(f, "{e}"),
            Self::Dlna(e) => write!(f, "{e}"),
            Self::Push(e) => write!(f, "{e}"),
            Self::Collaborator(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<PtpError> for OrchestratorError {
    fn from(e: PtpError) -> Self {
        Self::Ptp(e)
    }
}

impl From<DlnaError> for OrchestratorError {
    fn from(e: DlnaError) -> Self {
        Self::Dlna(e)
    }
}

impl From<PushServerError> for OrchestratorError {
    fn from(e: PushServerError) -> Self {
        Self::Push(e)
    }
}

impl From<CollaboratorError> for OrchestratorError {
    fn from(e: CollaboratorError) -> Self {
        Self::Collaborator(e)
    }
}
