//! Things the protocol engine hands results to, but doesn't own.
//!
//! The host app supplies real implementations (a database, the OS photo library,
//! a disk cache). The in-memory and directory-backed versions here back the
//! diagnostics binary and the tests.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{Ipv4Addr, UdpSocket};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::ignore_poison::IgnorePoison;
use crate::types::{CameraFile, FileFormat, MediaKind, handle_for_object_id};

/// A collaborator refused or failed an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorError {
    pub message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CollaboratorError {}

impl From<std::io::Error> for CollaboratorError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Sync state of a camera file as far as the phone is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaStatus {
    /// Seen on the camera, not yet copied.
    Available,
    /// Copied into the photo library.
    Synced,
    /// Removed by the user; never re-downloaded.
    Deleted,
}

/// Persistent record of which camera files the phone knows about.
pub trait MediaStore: Send + Sync {
    fn status_of(&self, filename: &str) -> Option<MediaStatus>;
    fn upsert(&self, file: &CameraFile, status: MediaStatus) -> Result<(), CollaboratorError>;
    fn set_status(&self, filename: &str, status: MediaStatus) -> Result<(), CollaboratorError>;
}

/// The OS photo library (or whatever plays its part).
pub trait PhotoLibrarySink: Send + Sync {
    fn save(&self, filename: &str, bytes: &[u8], kind: MediaKind) -> Result<(), CollaboratorError>;
}

pub trait ThumbnailCache: Send + Sync {
    fn store(&self, filename: &str, bytes: &[u8]) -> Result<(), CollaboratorError>;
    fn load(&self, filename: &str) -> Option<Vec<u8>>;
}

/// Receives every file the camera pushes over AutoShare, after the body is complete.
pub trait PushedFileSink: Send + Sync {
    fn receive(&self, filename: &str, bytes: Vec<u8>) -> Result<(), CollaboratorError>;
}

/// What the phone knows about its own Wi-Fi link.
pub trait NetworkInfo: Send + Sync {
    /// SSID of the joined network, if the platform lets us see it.
    fn current_ssid(&self) -> Option<String>;
    /// The local address the OS would use to reach `camera`.
    fn local_ip_toward(&self, camera: Ipv4Addr) -> Option<Ipv4Addr>;
}

// ============================================================================
// In-memory implementations
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryMediaStore {
    entries: Mutex<HashMap<String, (CameraFile, MediaStatus)>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock_ignore_poison().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn file(&self, filename: &str) -> Option<CameraFile> {
        self.entries.lock_ignore_poison().get(filename).map(|(file, _)| file.clone())
    }
}

impl MediaStore for MemoryMediaStore {
    fn status_of(&self, filename: &str) -> Option<MediaStatus> {
        self.entries.lock_ignore_poison().get(filename).map(|(_, status)| *status)
    }

    fn upsert(&self, file: &CameraFile, status: MediaStatus) -> Result<(), CollaboratorError> {
        self.entries
            .lock_ignore_poison()
            .insert(file.filename.clone(), (file.clone(), status));
        Ok(())
    }

    fn set_status(&self, filename: &str, status: MediaStatus) -> Result<(), CollaboratorError> {
        match self.entries.lock_ignore_poison().get_mut(filename) {
            Some(entry) => {
                entry.1 = status;
                Ok(())
            }
            None => Err(CollaboratorError::new(format!("Unknown file: {filename}"))),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryThumbnailCache {
    thumbnails: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryThumbnailCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThumbnailCache for MemoryThumbnailCache {
    fn store(&self, filename: &str, bytes: &[u8]) -> Result<(), CollaboratorError> {
        self.thumbnails
            .lock_ignore_poison()
            .insert(filename.to_string(), bytes.to_vec());
        Ok(())
    }

    fn load(&self, filename: &str) -> Option<Vec<u8>> {
        self.thumbnails.lock_ignore_poison().get(filename).cloned()
    }
}

// ============================================================================
// Filesystem photo library
// ============================================================================

/// Writes saved media into one directory. Stands in for the OS photo library on
/// desktop and in the probe binary.
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    /// Creates the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CollaboratorError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `filename` lands. Directory parts sent by the camera are dropped.
    pub fn path_for(&self, filename: &str) -> Option<PathBuf> {
        let name = Path::new(filename).file_name()?;
        Some(self.root.join(name))
    }
}

impl PhotoLibrarySink for DirectoryLibrary {
    fn save(&self, filename: &str, bytes: &[u8], kind: MediaKind) -> Result<(), CollaboratorError> {
        let path = self
            .path_for(filename)
            .ok_or_else(|| CollaboratorError::new(format!("Invalid file name: {filename:?}")))?;
        std::fs::write(&path, bytes)?;
        debug!("Saved {kind:?} {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

// ============================================================================
// Push sink adapter
// ============================================================================

/// Saves pushed files to the photo library and records them as synced.
pub struct LibraryPushSink {
    library: Arc<dyn PhotoLibrarySink>,
    store: Arc<dyn MediaStore>,
}

impl LibraryPushSink {
    pub fn new(library: Arc<dyn PhotoLibrarySink>, store: Arc<dyn MediaStore>) -> Self {
        Self { library, store }
    }
}

impl PushedFileSink for LibraryPushSink {
    fn receive(&self, filename: &str, bytes: Vec<u8>) -> Result<(), CollaboratorError> {
        let file = pushed_file(filename, bytes.len() as u64);
        self.library.save(filename, &bytes, file.media_kind())?;
        if let Err(e) = self.store.upsert(&file, MediaStatus::Synced) {
            // The bytes are already in the library; don't make the camera resend.
            warn!("Pushed file {filename} saved but not recorded: {e}");
        }
        Ok(())
    }
}

/// A `CameraFile` for something the camera pushed. Pushes carry no metadata
/// beyond the name and length.
fn pushed_file(filename: &str, byte_size: u64) -> CameraFile {
    CameraFile {
        handle: handle_for_object_id(filename),
        object_id: filename.to_string(),
        filename: filename.to_string(),
        format: FileFormat::from_mime("", filename),
        byte_size,
        width: 0,
        height: 0,
        capture_date_raw: String::new(),
        capture_date: None,
        thumbnail: None,
        content_url: None,
        thumbnail_url: None,
    }
}

// ============================================================================
// Network info
// ============================================================================

/// Asks the OS. SSID lookup needs `iwgetid` (Linux); elsewhere it returns `None`
/// and the orchestrator falls back to probing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNetworkInfo;

impl NetworkInfo for SystemNetworkInfo {
    fn current_ssid(&self) -> Option<String> {
        if !cfg!(target_os = "linux") {
            return None;
        }
        let output = std::process::Command::new("iwgetid").arg("-r").output().ok()?;
        if !output.status.success() {
            return None;
        }
        let ssid = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!ssid.is_empty()).then_some(ssid)
    }

    fn local_ip_toward(&self, camera: Ipv4Addr) -> Option<Ipv4Addr> {
        // Connecting a UDP socket sends nothing; it only asks the OS to pick a route.
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
        socket.connect((camera, 9)).ok()?;
        match socket.local_addr().ok()?.ip() {
            std::net::IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
            _ => None,
        }
    }
}

/// Fixed answers, for tests and the probe binary's `--ssid` override.
#[derive(Debug, Clone, Default)]
pub struct StaticNetworkInfo {
    pub ssid: Option<String>,
    pub local_ip: Option<Ipv4Addr>,
}

impl NetworkInfo for StaticNetworkInfo {
    fn current_ssid(&self) -> Option<String> {
        self.ssid.clone()
    }

    fn local_ip_toward(&self, _camera: Ipv4Addr) -> Option<Ipv4Addr> {
        self.local_ip
    }
}
