//! PTP datasets returned by the camera's data-in operations.
//!
//! Fields are decoded in the fixed order PTP (ISO 15740) prescribes. Truncated
//! datasets decode the missing tail as zeros and empty strings.

use camlink_wire::{DataReader, DataWriter, ObjectFormatCode, OperationCode};
use serde::Serialize;

use crate::types::{CameraFile, FileFormat, parse_capture_date};

/// Result of `GetDeviceInfo`, fetched once per session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub standard_version: u16,
    pub vendor_extension_id: u32,
    pub vendor_extension_version: u16,
    pub vendor_extension_desc: String,
    pub functional_mode: u16,
    pub operations_supported: Vec<u16>,
    pub events_supported: Vec<u16>,
    pub device_properties_supported: Vec<u16>,
    pub capture_formats: Vec<u16>,
    pub image_formats: Vec<u16>,
    pub manufacturer: String,
    pub model: String,
    pub device_version: String,
    pub serial_number: String,
}

impl DeviceInfo {
    pub fn parse(data: &[u8]) -> Self {
        let mut r = DataReader::new(data);
        Self {
            standard_version: r.read_u16(),
            vendor_extension_id: r.read_u32(),
            vendor_extension_version: r.read_u16(),
            vendor_extension_desc: r.read_string(),
            functional_mode: r.read_u16(),
            operations_supported: r.read_u16_array(),
            events_supported: r.read_u16_array(),
            device_properties_supported: r.read_u16_array(),
            capture_formats: r.read_u16_array(),
            image_formats: r.read_u16_array(),
            manufacturer: r.read_string(),
            model: r.read_string(),
            device_version: r.read_string(),
            serial_number: r.read_string(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = DataWriter::new();
        w.put_u16(self.standard_version)
            .put_u32(self.vendor_extension_id)
            .put_u16(self.vendor_extension_version)
            .put_string(&self.vendor_extension_desc)
            .put_u16(self.functional_mode)
            .put_u16_array(&self.operations_supported)
            .put_u16_array(&self.events_supported)
            .put_u16_array(&self.device_properties_supported)
            .put_u16_array(&self.capture_formats)
            .put_u16_array(&self.image_formats)
            .put_string(&self.manufacturer)
            .put_string(&self.model)
            .put_string(&self.device_version)
            .put_string(&self.serial_number);
        w.into_bytes()
    }

    pub fn supports(&self, opcode: OperationCode) -> bool {
        self.operations_supported.contains(&opcode.to_u16())
    }
}

/// Result of `GetStorageInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub storage_type: u16,
    pub filesystem_type: u16,
    pub access_capability: u16,
    pub max_capacity: u64,
    pub free_space_bytes: u64,
    pub free_space_images: u32,
    pub description: String,
    pub volume_label: String,
}

impl StorageInfo {
    pub fn parse(data: &[u8]) -> Self {
        let mut r = DataReader::new(data);
        Self {
            storage_type: r.read_u16(),
            filesystem_type: r.read_u16(),
            access_capability: r.read_u16(),
            max_capacity: r.read_u64(),
            free_space_bytes: r.read_u64(),
            free_space_images: r.read_u32(),
            description: r.read_string(),
            volume_label: r.read_string(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = DataWriter::new();
        w.put_u16(self.storage_type)
            .put_u16(self.filesystem_type)
            .put_u16(self.access_capability)
            .put_u64(self.max_capacity)
            .put_u64(self.free_space_bytes)
            .put_u32(self.free_space_images)
            .put_string(&self.description)
            .put_string(&self.volume_label);
        w.into_bytes()
    }
}

/// Result of `GetObjectInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub storage_id: u32,
    pub format: u16,
    pub protection_status: u16,
    pub compressed_size: u32,
    pub thumb_format: u16,
    pub thumb_compressed_size: u32,
    pub thumb_width: u32,
    pub thumb_height: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub image_bit_depth: u32,
    pub parent: u32,
    pub association_type: u16,
    pub association_desc: u32,
    pub sequence_number: u32,
    pub filename: String,
    pub capture_date: String,
    pub modification_date: String,
    pub keywords: String,
}

impl ObjectInfo {
    pub fn parse(data: &[u8]) -> Self {
        let mut r = DataReader::new(data);
        Self {
            storage_id: r.read_u32(),
            format: r.read_u16(),
            protection_status: r.read_u16(),
            compressed_size: r.read_u32(),
            thumb_format: r.read_u16(),
            thumb_compressed_size: r.read_u32(),
            thumb_width: r.read_u32(),
            thumb_height: r.read_u32(),
            image_width: r.read_u32(),
            image_height: r.read_u32(),
            image_bit_depth: r.read_u32(),
            parent: r.read_u32(),
            association_type: r.read_u16(),
            association_desc: r.read_u32(),
            sequence_number: r.read_u32(),
            filename: r.read_string(),
            capture_date: r.read_string(),
            modification_date: r.read_string(),
            keywords: r.read_string(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = DataWriter::new();
        w.put_u32(self.storage_id)
            .put_u16(self.format)
            .put_u16(self.protection_status)
            .put_u32(self.compressed_size)
            .put_u16(self.thumb_format)
            .put_u32(self.thumb_compressed_size)
            .put_u32(self.thumb_width)
            .put_u32(self.thumb_height)
            .put_u32(self.image_width)
            .put_u32(self.image_height)
            .put_u32(self.image_bit_depth)
            .put_u32(self.parent)
            .put_u16(self.association_type)
            .put_u32(self.association_desc)
            .put_u32(self.sequence_number)
            .put_string(&self.filename)
            .put_string(&self.capture_date)
            .put_string(&self.modification_date)
            .put_string(&self.keywords);
        w.into_bytes()
    }

    pub fn format_code(&self) -> ObjectFormatCode {
        ObjectFormatCode::from_u16(self.format)
    }

    pub fn is_folder(&self) -> bool {
        self.format_code() == ObjectFormatCode::Association
    }

    pub fn to_camera_file(&self, handle: u32) -> CameraFile {
        CameraFile {
            handle,
            object_id: handle.to_string(),
            filename: self.filename.clone(),
            format: FileFormat::from_ptp(self.format_code(), &self.filename),
            byte_size: self.compressed_size as u64,
            width: self.image_width,
            height: self.image_height,
            capture_date_raw: self.capture_date.clone(),
            capture_date: parse_capture_date(&self.capture_date),
            thumbnail: None,
            content_url: None,
            thumbnail_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_field_order() {
        let info = DeviceInfo {
            standard_version: 100,
            vendor_extension_id: 6,
            vendor_extension_version: 100,
            vendor_extension_desc: "microsoft.com: 1.0".to_string(),
            functional_mode: 0,
            operations_supported: vec![0x1001, 0x1002, 0x100E],
            events_supported: vec![0x4002],
            device_properties_supported: vec![],
            capture_formats: vec![0x3801],
            image_formats: vec![0x3801, 0xB982],
            manufacturer: "Samsung Electronics".to_string(),
            model: "NX300".to_string(),
            device_version: "1.41".to_string(),
            serial_number: "0123456789".to_string(),
        };
        let parsed = DeviceInfo::parse(&info.to_bytes());
        assert_eq!(parsed, info);
        assert!(parsed.supports(OperationCode::InitiateCapture));
        assert!(!parsed.supports(OperationCode::GetThumb));
    }

    #[test]
    fn test_truncated_device_info_is_zeroed() {
        // Standard version plus half of the vendor extension id.
        let parsed = DeviceInfo::parse(&[100, 0, 6, 0]);
        assert_eq!(parsed.standard_version, 100);
        assert_eq!(parsed.vendor_extension_id, 0);
        assert!(parsed.operations_supported.is_empty());
        assert_eq!(parsed.model, "");
    }

    #[test]
    fn test_storage_info_parse() {
        let info = StorageInfo {
            storage_type: 4,
            filesystem_type: 2,
            access_capability: 0,
            max_capacity: 32_000_000_000,
            free_space_bytes: 12_000_000_000,
            free_space_images: 900,
            description: "SD".to_string(),
            volume_label: "NX300".to_string(),
        };
        assert_eq!(StorageInfo::parse(&info.to_bytes()), info);
    }

    #[test]
    fn test_object_info_to_camera_file() {
        let info = ObjectInfo {
            storage_id: 0x0001_0001,
            format: 0x3801,
            compressed_size: 5_242_880,
            image_width: 5472,
            image_height: 3648,
            parent: 7,
            filename: "SAM_0042.JPG".to_string(),
            capture_date: "20240101T093000".to_string(),
            ..ObjectInfo::default()
        };
        let parsed = ObjectInfo::parse(&info.to_bytes());
        assert_eq!(parsed, info);

        let file = parsed.to_camera_file(42);
        assert_eq!(file.handle, 42);
        assert_eq!(file.object_id, "42");
        assert_eq!(file.format, FileFormat::Jpeg);
        assert_eq!(file.byte_size, 5_242_880);
        assert_eq!(file.width, 5472);
        assert!(file.capture_date.is_some());
        assert!(!parsed.is_folder());
    }

    #[test]
    fn test_association_is_folder() {
        let info = ObjectInfo {
            format: 0x3001,
            filename: "100PHOTO".to_string(),
            ..ObjectInfo::default()
        };
        assert!(info.is_folder());
    }
}
