//! The sync pass: list the camera, record what's new, copy what isn't synced yet.

use serde::Serialize;

use super::OrchestratorError;
use super::session::PullSession;
use crate::collaborators::{MediaStatus, MediaStore, PhotoLibrarySink, ThumbnailCache};
use crate::log_buffer::LogBuffer;
use crate::types::CameraFile;

/// Counts from one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Files the camera listed.
    pub listed: usize,
    /// Files the media store had never seen.
    pub new_files: usize,
    /// Files copied into the photo library during this pass.
    pub downloaded: usize,
    /// Files that failed to copy. They stay `Available` for the next pass.
    pub failed: usize,
}

/// Where sync results go.
pub(crate) struct SyncTargets<'a> {
    pub store: &'a dyn MediaStore,
    pub library: &'a dyn PhotoLibrarySink,
    pub thumbnails: &'a dyn ThumbnailCache,
}

/// Lists the camera and copies every file not yet synced. A failed file is
/// counted and skipped; only a failed listing fails the pass.
pub(crate) async fn sync_pass(
    session: &mut PullSession,
    targets: &SyncTargets<'_>,
    log: &LogBuffer,
) -> Result<SyncReport, OrchestratorError> {
    let files = session.list_files().await?;
    let mut report = SyncReport {
        listed: files.len(),
        ..SyncReport::default()
    };

    for file in &files {
        match targets.store.status_of(&file.filename) {
            Some(MediaStatus::Synced | MediaStatus::Deleted) => continue,
            Some(MediaStatus::Available) => {}
            None => {
                report.new_files += 1;
                if let Err(e) = targets.store.upsert(file, MediaStatus::Available) {
                    log.error(format!("Could not record {}: {e}", file.filename));
                    report.failed += 1;
                    continue;
                }
            }
        }

        match sync_file(session, targets, file, log).await {
            Ok(size) => {
                report.downloaded += 1;
                log.info(format!("Synced {} ({size} bytes)", file.filename));
            }
            Err(e) => {
                report.failed += 1;
                log.error(format!("Could not sync {}: {e}", file.filename));
            }
        }
    }

    log.info(format!(
        "Sync pass: {} listed, {} new, {} downloaded, {} failed",
        report.listed, report.new_files, report.downloaded, report.failed
    ));
    Ok(report)
}

async fn sync_file(
    session: &mut PullSession,
    targets: &SyncTargets<'_>,
    file: &CameraFile,
    log: &LogBuffer,
) -> Result<usize, OrchestratorError> {
    let mut record = file.clone();
    if targets.thumbnails.load(&file.filename).is_none() {
        match session.thumbnail(file).await {
            Ok(Some(thumbnail)) => {
                if let Err(e) = targets.thumbnails.store(&file.filename, &thumbnail) {
                    log.error(format!("Could not cache thumbnail for {}: {e}", file.filename));
                }
                record = file.with_thumbnail(thumbnail);
            }
            Ok(None) => {}
            Err(e) if e.is_transport() => return Err(e),
            Err(e) => {
                log.error(format!("No thumbnail for {}: {e}", file.filename));
            }
        }
    }

    let bytes = session.download(file).await?;
    targets.library.save(&file.filename, &bytes, file.media_kind())?;
    targets.store.upsert(&record, MediaStatus::Synced)?;
    Ok(bytes.len())
}
