//! Shared value types handed from the protocol clients to the host app.
//!
//! These types are serialized to JSON for the UI layer.

use camlink_wire::ObjectFormatCode;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File formats the camera produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "code")]
pub enum FileFormat {
    Jpeg,
    /// Samsung RAW (SRW).
    Raw,
    Tiff,
    Png,
    Bmp,
    Gif,
    Mp4,
    Mov,
    Avi,
    Mpeg,
    Folder,
    /// Raw PTP format code we have no mapping for.
    Unknown(u16),
}

impl FileFormat {
    /// Canonical lowercase extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Raw => "srw",
            Self::Tiff => "tif",
            Self::Png => "png",
            Self::Bmp => "bmp",
            Self::Gif => "gif",
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::Avi => "avi",
            Self::Mpeg => "mpg",
            Self::Folder => "",
            Self::Unknown(_) => "bin",
        }
    }

    pub fn is_video(self) -> bool {
        matches!(self, Self::Mp4 | Self::Mov | Self::Avi | Self::Mpeg)
    }

    pub fn is_image(self) -> bool {
        matches!(self, Self::Jpeg | Self::Raw | Self::Tiff | Self::Png | Self::Bmp | Self::Gif)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let format = match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "srw" | "raw" => Self::Raw,
            "tif" | "tiff" => Self::Tiff,
            "png" => Self::Png,
            "bmp" => Self::Bmp,
            "gif" => Self::Gif,
            "mp4" => Self::Mp4,
            "mov" => Self::Mov,
            "avi" => Self::Avi,
            "mpg" | "mpeg" => Self::Mpeg,
            _ => return None,
        };
        Some(format)
    }

    fn from_filename(filename: &str) -> Option<Self> {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Maps a PTP object format code. Generic codes fall back to the file extension,
    /// which is how SRW files show up.
    pub fn from_ptp(code: ObjectFormatCode, filename: &str) -> Self {
        match code {
            ObjectFormatCode::ExifJpeg | ObjectFormatCode::Jfif => Self::Jpeg,
            ObjectFormatCode::Tiff => Self::Tiff,
            ObjectFormatCode::Png => Self::Png,
            ObjectFormatCode::Bmp => Self::Bmp,
            ObjectFormatCode::Gif => Self::Gif,
            ObjectFormatCode::Mp4Container => Self::Mp4,
            ObjectFormatCode::QuickTime => Self::Mov,
            ObjectFormatCode::Avi => Self::Avi,
            ObjectFormatCode::Mpeg => Self::Mpeg,
            ObjectFormatCode::Association => Self::Folder,
            other => Self::from_filename(filename).unwrap_or(Self::Unknown(other.to_u16())),
        }
    }

    /// Maps a DLNA MIME type (`image/jpeg`, `video/mp4`, ...), falling back to the
    /// file extension.
    pub fn from_mime(mime: &str, filename: &str) -> Self {
        let format = match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/x-samsung-srw" | "image/x-raw" => Some(Self::Raw),
            "image/tiff" => Some(Self::Tiff),
            "image/png" => Some(Self::Png),
            "image/bmp" => Some(Self::Bmp),
            "image/gif" => Some(Self::Gif),
            "video/mp4" => Some(Self::Mp4),
            "video/quicktime" => Some(Self::Mov),
            "video/avi" | "video/x-msvideo" => Some(Self::Avi),
            "video/mpeg" => Some(Self::Mpeg),
            _ => None,
        };
        format
            .or_else(|| Self::from_filename(filename))
            .unwrap_or(Self::Unknown(0))
    }
}

/// Photo or video, as the photo library wants to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl From<FileFormat> for MediaKind {
    fn from(format: FileFormat) -> Self {
        if format.is_video() { Self::Video } else { Self::Image }
    }
}

/// A file stored on the camera. Immutable once built; replaced, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraFile {
    /// PTP object handle, or a stable number derived from the DLNA object id.
    pub handle: u32,
    /// Protocol-native identifier (the handle in decimal for PTP).
    pub object_id: String,
    pub filename: String,
    pub format: FileFormat,
    pub byte_size: u64,
    pub width: u32,
    pub height: u32,
    /// Capture date as the camera sent it.
    pub capture_date_raw: String,
    pub capture_date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl CameraFile {
    /// Returns a copy carrying the given thumbnail bytes.
    pub fn with_thumbnail(&self, thumbnail: Vec<u8>) -> Self {
        Self {
            thumbnail: Some(thumbnail),
            ..self.clone()
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        self.format.into()
    }
}

/// Derives a 32-bit handle from a DLNA object id. Numeric ids are used as-is,
/// anything else is hashed (FNV-1a) so the handle stays stable across listings.
pub fn handle_for_object_id(object_id: &str) -> u32 {
    if let Ok(numeric) = object_id.parse::<u32>() {
        return numeric;
    }
    object_id
        .bytes()
        .fold(0x811C_9DC5u32, |hash, byte| (hash ^ byte as u32).wrapping_mul(0x0100_0193))
}

/// Parses the date formats cameras send.
///
/// - PTP: `YYYYMMDDThhmmss` with optional tenths and zone suffix.
/// - DLNA `dc:date`: `YYYY-MM-DDThh:mm:ss` or a bare `YYYY-MM-DD`.
pub fn parse_capture_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.len() >= 15 && raw.is_char_boundary(15) {
        if let Ok(date) = NaiveDateTime::parse_from_str(&raw[..15], "%Y%m%dT%H%M%S") {
            return Some(date);
        }
    }
    if raw.len() >= 19 && raw.is_char_boundary(19) {
        if let Ok(date) = NaiveDateTime::parse_from_str(&raw[..19], "%Y-%m-%dT%H:%M:%S") {
            return Some(date);
        }
    }
    if raw.len() >= 10 && raw.is_char_boundary(10) {
        if let Ok(date) = NaiveDate::parse_from_str(&raw[..10], "%Y-%m-%d") {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Which protocol the camera is currently offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// DLNA/SOAP browsing ("MobileLink").
    Pull,
    /// S2L AutoShare, the camera pushes to us.
    Push,
    /// PTP/IP.
    Ptp,
}

/// The orchestrator's published state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "detail")]
pub enum ConnectionStatus {
    Disconnected,
    DetectingNetwork,
    /// Matched SSID, or the camera address when the SSID is unknown.
    NetworkFound(String),
    Connecting,
    Connected,
    PushModeActive,
    Error(String),
}

impl ConnectionStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connected | Self::PushModeActive)
    }
}

/// Outcome of a single port probe during a diagnostic sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredService {
    pub port: u16,
    pub label: String,
    pub reachable: bool,
}
