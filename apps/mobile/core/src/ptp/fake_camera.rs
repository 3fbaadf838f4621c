//! In-process PTP/IP camera for tests.
//!
//! Serves one session at a time on an ephemeral 127.0.0.1 port and records the
//! opcode and transaction id of every operation request it receives.

use camlink_wire::{EventCode, OperationCode, Packet, ResponseCode};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::PROTOCOL_VERSION;
use super::dataset::{DeviceInfo, ObjectInfo, StorageInfo};
use super::transport::{read_packet, write_packet};

const WAIT: Duration = Duration::from_secs(5);

/// Handle announced in the `ObjectAdded` event after a capture.
pub(crate) const CAPTURED_HANDLE: u32 = 5;
pub(crate) const JPEG_BYTES: &[u8] = b"0123456789";
pub(crate) const VIDEO_BYTES: &[u8] = b"MP4!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum FakeBehavior {
    #[default]
    Normal,
    /// Answers InitCommandRequest with InitFail(1).
    RejectInit,
    /// Accepts the TCP connection and never answers.
    Silent,
}

pub(crate) struct FakePtpCamera {
    pub port: u16,
    requests: Arc<Mutex<Vec<(OperationCode, u32)>>>,
    task: JoinHandle<()>,
}

impl FakePtpCamera {
    pub async fn start(behavior: FakeBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let task = tokio::spawn(serve(listener, behavior, Arc::clone(&requests)));
        Self { port, requests, task }
    }

    pub fn transaction_ids(&self) -> Vec<u32> {
        self.requests.lock().unwrap().iter().map(|(_, txn)| *txn).collect()
    }

    pub fn opcodes(&self) -> Vec<OperationCode> {
        self.requests.lock().unwrap().iter().map(|(op, _)| *op).collect()
    }
}

impl Drop for FakePtpCamera {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) fn device_info() -> DeviceInfo {
    DeviceInfo {
        standard_version: 100,
        vendor_extension_desc: "Samsung".to_string(),
        operations_supported: vec![0x1001, 0x1002, 0x1003, 0x1007, 0x1008, 0x1009, 0x100E],
        events_supported: vec![0x4002],
        image_formats: vec![0x3801, 0xB982],
        manufacturer: "Samsung Electronics".to_string(),
        model: "NX300".to_string(),
        device_version: "1.41".to_string(),
        serial_number: "C0FFEE".to_string(),
        ..DeviceInfo::default()
    }
}

fn object_info(handle: u32) -> Option<ObjectInfo> {
    let (format, filename, size) = match handle {
        1 => (0x3001, "100PHOTO", 0),
        2 => (0x3801, "SAM_0001.JPG", JPEG_BYTES.len()),
        3 => (0xB982, "SAM_0002.MP4", VIDEO_BYTES.len()),
        _ => return None,
    };
    Some(ObjectInfo {
        storage_id: 0x0001_0001,
        format,
        compressed_size: size as u32,
        image_width: 640,
        image_height: 480,
        parent: if handle == 1 { 0 } else { 1 },
        filename: filename.to_string(),
        capture_date: "20240301T120000".to_string(),
        ..ObjectInfo::default()
    })
}

fn u32_array(values: &[u32]) -> Vec<u8> {
    let mut w = camlink_wire::DataWriter::new();
    w.put_u32_array(values);
    w.into_bytes()
}

async fn serve(listener: TcpListener, behavior: FakeBehavior, requests: Arc<Mutex<Vec<(OperationCode, u32)>>>) {
    loop {
        let Ok((mut command, _)) = listener.accept().await else {
            return;
        };
        let Ok(Packet::InitCommandRequest { .. }) = read_packet(&mut command, WAIT, WAIT).await else {
            continue;
        };

        match behavior {
            FakeBehavior::RejectInit => {
                let _ = write_packet(&mut command, &Packet::InitFail { reason: 1 }).await;
                continue;
            }
            FakeBehavior::Silent => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                continue;
            }
            FakeBehavior::Normal => {}
        }

        let ack = Packet::InitCommandAck {
            connection_number: 1,
            guid: [0xCA; 16],
            friendly_name: "NX300".to_string(),
            protocol_version: PROTOCOL_VERSION,
        };
        let _ = write_packet(&mut command, &ack).await;

        let Ok((mut event, _)) = listener.accept().await else {
            return;
        };
        let Ok(Packet::InitEventRequest { .. }) = read_packet(&mut event, WAIT, WAIT).await else {
            continue;
        };
        let _ = write_packet(&mut event, &Packet::InitEventAck).await;

        while let Ok(packet) = read_packet(&mut command, WAIT, WAIT).await {
            let Packet::OperationRequest {
                opcode,
                transaction_id,
                params,
                ..
            } = packet
            else {
                break;
            };
            requests.lock().unwrap().push((opcode, transaction_id));
            respond(&mut command, &mut event, opcode, transaction_id, &params).await;
        }
    }
}

async fn respond(command: &mut TcpStream, event: &mut TcpStream, opcode: OperationCode, txn: u32, params: &[u32]) {
    let first = params.first().copied().unwrap_or(0);
    match opcode {
        OperationCode::OpenSession | OperationCode::CloseSession => reply(command, txn, ResponseCode::Ok).await,
        OperationCode::GetDeviceInfo => send_data(command, txn, &device_info().to_bytes()).await,
        OperationCode::GetStorageIds => send_data(command, txn, &u32_array(&[0x0001_0001])).await,
        OperationCode::GetStorageInfo => {
            let info = StorageInfo {
                max_capacity: 1 << 30,
                free_space_bytes: 1 << 29,
                description: "SD".to_string(),
                ..StorageInfo::default()
            };
            send_data(command, txn, &info.to_bytes()).await;
        }
        OperationCode::GetObjectHandles => send_data(command, txn, &u32_array(&[1, 2, 3, 4])).await,
        OperationCode::GetObjectInfo => match object_info(first) {
            Some(info) => send_data(command, txn, &info.to_bytes()).await,
            None => reply(command, txn, ResponseCode::InvalidObjectHandle).await,
        },
        OperationCode::GetObject => match first {
            2 => send_data(command, txn, JPEG_BYTES).await,
            3 => send_data(command, txn, VIDEO_BYTES).await,
            _ => reply(command, txn, ResponseCode::InvalidObjectHandle).await,
        },
        OperationCode::GetThumb if first == 2 => send_data(command, txn, b"thumb").await,
        OperationCode::GetThumb => reply(command, txn, ResponseCode::NoThumbnailPresent).await,
        OperationCode::InitiateCapture => {
            reply(command, txn, ResponseCode::Ok).await;
            let added = Packet::Event {
                code: EventCode::ObjectAdded,
                transaction_id: txn,
                params: vec![CAPTURED_HANDLE],
            };
            let _ = write_packet(event, &added).await;
        }
        OperationCode::SamsungVendor1 => {
            // Starts a data phase, then gives up mid-way.
            let _ = write_packet(command, &Packet::StartData { transaction_id: txn, total_length: 10 }).await;
            let _ = write_packet(command, &Packet::Data { transaction_id: txn, payload: vec![0; 6] }).await;
            reply(command, txn, ResponseCode::DeviceBusy).await;
        }
        _ => reply(command, txn, ResponseCode::OperationNotSupported).await,
    }
}

async fn reply(command: &mut TcpStream, txn: u32, code: ResponseCode) {
    let response = Packet::OperationResponse {
        code,
        transaction_id: txn,
        params: vec![],
    };
    let _ = write_packet(command, &response).await;
}

/// Sends `bytes` as StartData + Data (first 6 bytes) + EndData (rest) + OK.
async fn send_data(command: &mut TcpStream, txn: u32, bytes: &[u8]) {
    let split = bytes.len().min(6);
    let packets = [
        Packet::StartData {
            transaction_id: txn,
            total_length: bytes.len() as u64,
        },
        Packet::Data {
            transaction_id: txn,
            payload: bytes[..split].to_vec(),
        },
        Packet::EndData {
            transaction_id: txn,
            payload: bytes[split..].to_vec(),
        },
    ];
    for packet in &packets {
        let _ = write_packet(command, packet).await;
    }
    reply(command, txn, ResponseCode::Ok).await;
}
