//! A connected pull-mode client, DLNA or PTP, behind one set of operations.

use camlink_wire::{EventCode, ResponseCode};
use log::debug;
use std::time::{Duration, Instant};

use super::OrchestratorError;
use crate::dlna::DlnaClient;
use crate::ptp::{PtpClient, PtpError};
use crate::types::CameraFile;

pub(crate) enum PullSession {
    Dlna(DlnaClient),
    Ptp(PtpClient),
}

impl PullSession {
    pub async fn list_files(&mut self) -> Result<Vec<CameraFile>, OrchestratorError> {
        Ok(match self {
            Self::Dlna(client) => client.list_files().await?,
            Self::Ptp(client) => client.list_files().await?,
        })
    }

    pub async fn download(&mut self, file: &CameraFile) -> Result<Vec<u8>, OrchestratorError> {
        match self {
            Self::Dlna(client) => {
                let url = file
                    .content_url
                    .as_deref()
                    .ok_or_else(|| OrchestratorError::MissingContentUrl(file.filename.clone()))?;
                Ok(client.download(url).await?)
            }
            Self::Ptp(client) => Ok(client.get_object(file.handle).await?),
        }
    }

    /// `Ok(None)` when the camera has no thumbnail for this file.
    pub async fn thumbnail(&mut self, file: &CameraFile) -> Result<Option<Vec<u8>>, OrchestratorError> {
        if let Some(bytes) = &file.thumbnail {
            return Ok(Some(bytes.clone()));
        }
        match self {
            Self::Dlna(client) => Ok(client.download_thumbnail(file).await?),
            Self::Ptp(client) => match client.get_thumb(file.handle).await {
                Ok(bytes) if bytes.is_empty() => Ok(None),
                Ok(bytes) => Ok(Some(bytes)),
                Err(PtpError::OperationFailed(ResponseCode::NoThumbnailPresent)) => Ok(None),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Fires the shutter. Returns the new object's reference when the camera
    /// reports one: a content URL for DLNA, the object handle for PTP.
    pub async fn capture(&mut self, wait: Duration) -> Result<Option<String>, OrchestratorError> {
        match self {
            Self::Dlna(client) => Ok(client.capture_image().await?),
            Self::Ptp(client) => {
                client.initiate_capture().await?;
                let deadline = Instant::now() + wait;
                loop {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                    let Some(event) = client.next_event(remaining).await? else {
                        continue;
                    };
                    match (event.code, event.params.first()) {
                        (EventCode::ObjectAdded, Some(handle)) => return Ok(Some(handle.to_string())),
                        (EventCode::CaptureComplete, _) => return Ok(None),
                        (code, _) => debug!("Ignoring event {code} while waiting for capture"),
                    }
                }
            }
        }
    }

    pub async fn disconnect(&mut self) {
        match self {
            Self::Dlna(client) => client.disconnect(),
            Self::Ptp(client) => client.disconnect().await,
        }
    }
}
