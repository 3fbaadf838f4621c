//! PTP/IP transaction client: one command connection, one event connection.

use camlink_wire::{DataPhase, DataReader, EventCode, OperationCode, Packet, ResponseCode};
use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;

use super::PtpError;
use super::dataset::{DeviceInfo, ObjectInfo, StorageInfo};
use super::transport::{read_packet, write_packet};
use crate::config::CamlinkConfig;
use crate::log_buffer::{LogBuffer, LogEntry};
use crate::types::CameraFile;

/// PTP/IP protocol version 1.0.
pub const PROTOCOL_VERSION: u32 = 0x0001_0000;

/// The only session id this client opens.
const SESSION_ID: u32 = 1;

/// Filter for `GetObjectHandles`. The default selects all storages, all formats,
/// root level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectQuery {
    pub storage_id: u32,
    pub format: u16,
    pub parent: u32,
}

impl ObjectQuery {
    pub const ALL_STORAGES: u32 = 0xFFFF_FFFF;
    pub const ROOT: u32 = 0xFFFF_FFFF;

    /// Every object on every storage, regardless of folder.
    pub fn everything() -> Self {
        Self {
            parent: 0,
            ..Self::default()
        }
    }
}

impl Default for ObjectQuery {
    fn default() -> Self {
        Self {
            storage_id: Self::ALL_STORAGES,
            format: 0,
            parent: Self::ROOT,
        }
    }
}

/// An event read from the event connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtpEvent {
    pub code: EventCode,
    pub params: Vec<u32>,
}

struct Session {
    command: TcpStream,
    event: TcpStream,
    connection_number: u32,
    open: bool,
}

pub struct PtpClient {
    friendly_name: String,
    guid: [u8; 16],
    step_timeout: Duration,
    read_timeout: Duration,
    next_transaction_id: u32,
    session: Option<Session>,
    device_info: Option<DeviceInfo>,
    log: LogBuffer,
}

impl PtpClient {
    pub fn new(config: &CamlinkConfig) -> Self {
        Self {
            friendly_name: config.client_name.clone(),
            guid: *uuid::Uuid::new_v4().as_bytes(),
            step_timeout: config.ptp_step_timeout,
            read_timeout: config.ptp_read_timeout,
            next_transaction_id: 1,
            session: None,
            device_info: None,
            log: LogBuffer::new("ptp", config.log_capacity),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Device info from the current session.
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.log.snapshot()
    }

    pub fn log_buffer(&self) -> &LogBuffer {
        &self.log
    }

    /// Runs the full PTP/IP handshake and opens a session.
    ///
    /// Each step has its own timeout. On any failure both sockets are dropped and
    /// the client stays disconnected.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<DeviceInfo, PtpError> {
        self.disconnect().await;
        self.next_transaction_id = 1;
        self.log.info(format!("Connecting to {host}:{port}"));

        match self.handshake(host, port).await {
            Ok(device_info) => {
                info!(
                    "PTP/IP session open with {} {} (serial {})",
                    device_info.manufacturer, device_info.model, device_info.serial_number
                );
                self.log.info(format!("Connected to {}", device_info.model));
                Ok(device_info)
            }
            Err(e) => {
                self.session = None;
                self.device_info = None;
                self.log.error(format!("Connect failed: {e}"));
                Err(e)
            }
        }
    }

    async fn handshake(&mut self, host: &str, port: u16) -> Result<DeviceInfo, PtpError> {
        let step = self.step_timeout;
        let read_timeout = self.read_timeout;

        let mut command = with_timeout(step, async { TcpStream::connect((host, port)).await.map_err(PtpError::from) }).await?;
        let _ = command.set_nodelay(true);

        let init = Packet::InitCommandRequest {
            guid: self.guid,
            friendly_name: self.friendly_name.clone(),
            protocol_version: PROTOCOL_VERSION,
        };
        self.log.sent("InitCommandRequest");
        let ack = with_timeout(step, async {
            write_packet(&mut command, &init).await?;
            read_packet(&mut command, read_timeout, read_timeout).await
        })
        .await?;
        let connection_number = match ack {
            Packet::InitCommandAck {
                connection_number,
                friendly_name,
                ..
            } => {
                self.log.received(format!("InitCommandAck from {friendly_name} (connection {connection_number})"));
                connection_number
            }
            Packet::InitFail { reason } => return Err(PtpError::InitFailed(reason)),
            other => return Err(unexpected("InitCommandAck", &other)),
        };

        let mut event = with_timeout(step, async { TcpStream::connect((host, port)).await.map_err(PtpError::from) }).await?;
        let _ = event.set_nodelay(true);
        self.log.sent("InitEventRequest");
        let ack = with_timeout(step, async {
            write_packet(&mut event, &Packet::InitEventRequest { connection_number }).await?;
            read_packet(&mut event, read_timeout, read_timeout).await
        })
        .await?;
        match ack {
            Packet::InitEventAck => {
                self.log.received("InitEventAck");
            }
            Packet::InitFail { reason } => return Err(PtpError::InitFailed(reason)),
            other => return Err(unexpected("InitEventAck", &other)),
        }

        self.session = Some(Session {
            command,
            event,
            connection_number,
            open: false,
        });

        with_timeout(step, self.simple_operation(OperationCode::OpenSession, &[SESSION_ID])).await?;
        if let Some(session) = self.session.as_mut() {
            session.open = true;
        }

        let data = with_timeout(step, self.data_in_operation(OperationCode::GetDeviceInfo, &[])).await?;
        let device_info = DeviceInfo::parse(&data);
        self.device_info = Some(device_info.clone());
        Ok(device_info)
    }

    /// Closes the session (best effort) and drops both sockets. Safe to call at
    /// any time, including when never connected.
    pub async fn disconnect(&mut self) {
        let open = match &self.session {
            Some(session) => session.open,
            None => return,
        };

        if open {
            let step = self.step_timeout;
            if let Err(e) = with_timeout(step, self.simple_operation(OperationCode::CloseSession, &[])).await {
                debug!("PTP/IP CloseSession failed (ignored): {e}");
            }
        }

        if let Some(session) = self.session.take() {
            debug!("PTP/IP dropping connection {}", session.connection_number);
        }
        self.device_info = None;
        self.log.info("Disconnected");
    }

    fn take_transaction_id(&mut self) -> u32 {
        let id = self.next_transaction_id;
        self.next_transaction_id = match id.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        id
    }

    async fn send_request(&mut self, opcode: OperationCode, data_phase: DataPhase, params: &[u32]) -> Result<(), PtpError> {
        if self.session.is_none() {
            return Err(PtpError::NotConnected);
        }
        let transaction_id = self.take_transaction_id();
        let request = Packet::OperationRequest {
            data_phase,
            opcode,
            transaction_id,
            params: params.to_vec(),
        };
        self.log.sent(format!("{} txn={transaction_id} params={params:?}", opcode.name()));

        let session = self.session.as_mut().ok_or(PtpError::NotConnected)?;
        write_packet(&mut session.command, &request).await
    }

    async fn receive(&mut self) -> Result<Packet, PtpError> {
        let timeout = self.read_timeout;
        let session = self.session.as_mut().ok_or(PtpError::NotConnected)?;
        read_packet(&mut session.command, timeout, timeout).await
    }

    fn check_response(&self, packet: Packet) -> Result<Vec<u32>, PtpError> {
        match packet {
            Packet::OperationResponse { code, params, .. } => {
                self.log.received(format!("Response {code}"));
                if code.is_ok() { Ok(params) } else { Err(PtpError::OperationFailed(code)) }
            }
            other => Err(unexpected("OperationResponse", &other)),
        }
    }

    /// Request without a data phase, answered by one `OperationResponse`.
    /// Returns the response parameters.
    pub async fn simple_operation(&mut self, opcode: OperationCode, params: &[u32]) -> Result<Vec<u32>, PtpError> {
        self.send_request(opcode, DataPhase::None, params).await?;
        let response = self.receive().await?;
        self.check_response(response)
    }

    /// Request with a data-in phase. Data packets are concatenated in arrival
    /// order; a non-OK response at any stage fails the call.
    pub async fn data_in_operation(&mut self, opcode: OperationCode, params: &[u32]) -> Result<Vec<u8>, PtpError> {
        self.send_request(opcode, DataPhase::DataIn, params).await?;

        let first = self.receive().await?;
        let total_length = match first {
            Packet::StartData { total_length, .. } => total_length,
            response @ Packet::OperationResponse { .. } => {
                self.check_response(response)?;
                return Ok(Vec::new());
            }
            other => return Err(unexpected("StartData", &other)),
        };

        self.log.received(format!("StartData total={total_length}"));
        let mut data = Vec::with_capacity(total_length.min(16 * 1024 * 1024) as usize);
        loop {
            match self.receive().await? {
                Packet::Data { payload, .. } => data.extend_from_slice(&payload),
                Packet::EndData { payload, .. } => {
                    data.extend_from_slice(&payload);
                    break;
                }
                response @ Packet::OperationResponse { .. } => {
                    self.check_response(response)?;
                    return Ok(data);
                }
                Packet::Cancel { .. } => return Err(PtpError::OperationFailed(ResponseCode::TransactionCancelled)),
                other => return Err(unexpected("Data", &other)),
            }
        }

        if data.len() as u64 != total_length {
            warn!("PTP/IP data phase: announced {total_length} bytes, got {}", data.len());
        }
        let response = self.receive().await?;
        self.check_response(response)?;
        Ok(data)
    }

    pub async fn get_device_info(&mut self) -> Result<DeviceInfo, PtpError> {
        let data = self.data_in_operation(OperationCode::GetDeviceInfo, &[]).await?;
        let device_info = DeviceInfo::parse(&data);
        self.device_info = Some(device_info.clone());
        Ok(device_info)
    }

    pub async fn get_storage_ids(&mut self) -> Result<Vec<u32>, PtpError> {
        let data = self.data_in_operation(OperationCode::GetStorageIds, &[]).await?;
        Ok(DataReader::new(&data).read_u32_array())
    }

    pub async fn get_storage_info(&mut self, storage_id: u32) -> Result<StorageInfo, PtpError> {
        let data = self.data_in_operation(OperationCode::GetStorageInfo, &[storage_id]).await?;
        Ok(StorageInfo::parse(&data))
    }

    pub async fn get_object_handles(&mut self, query: ObjectQuery) -> Result<Vec<u32>, PtpError> {
        let params = [query.storage_id, query.format as u32, query.parent];
        let data = self.data_in_operation(OperationCode::GetObjectHandles, &params).await?;
        Ok(DataReader::new(&data).read_u32_array())
    }

    pub async fn get_object_info(&mut self, handle: u32) -> Result<ObjectInfo, PtpError> {
        let data = self.data_in_operation(OperationCode::GetObjectInfo, &[handle]).await?;
        Ok(ObjectInfo::parse(&data))
    }

    /// Downloads a whole object.
    pub async fn get_object(&mut self, handle: u32) -> Result<Vec<u8>, PtpError> {
        self.data_in_operation(OperationCode::GetObject, &[handle]).await
    }

    pub async fn get_thumb(&mut self, handle: u32) -> Result<Vec<u8>, PtpError> {
        self.data_in_operation(OperationCode::GetThumb, &[handle]).await
    }

    /// Triggers the shutter. The new object is announced on the event connection.
    pub async fn initiate_capture(&mut self) -> Result<(), PtpError> {
        self.simple_operation(OperationCode::InitiateCapture, &[0, 0]).await?;
        Ok(())
    }

    /// Waits up to `wait` for an event. `Ok(None)` when nothing arrived.
    pub async fn next_event(&mut self, wait: Duration) -> Result<Option<PtpEvent>, PtpError> {
        let body_timeout = self.read_timeout;
        let session = self.session.as_mut().ok_or(PtpError::NotConnected)?;
        match read_packet(&mut session.event, wait, body_timeout).await {
            Ok(Packet::Event { code, params, .. }) => {
                self.log.received(format!("Event {code} {params:?}"));
                Ok(Some(PtpEvent { code, params }))
            }
            Ok(Packet::ProbeRequest) => {
                write_packet(&mut session.event, &Packet::ProbeResponse).await?;
                Ok(None)
            }
            Ok(other) => Err(unexpected("Event", &other)),
            Err(PtpError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Lists every non-folder object as a `CameraFile`. Objects whose info can't
    /// be read are skipped; transport errors abort the listing.
    pub async fn list_files(&mut self) -> Result<Vec<CameraFile>, PtpError> {
        let handles = self.get_object_handles(ObjectQuery::everything()).await?;
        self.log.info(format!("Listing {} objects", handles.len()));

        let mut files = Vec::with_capacity(handles.len());
        for handle in handles {
            match self.get_object_info(handle).await {
                Ok(info) if info.is_folder() => {}
                Ok(info) => files.push(info.to_camera_file(handle)),
                Err(e) if e.is_transport() => return Err(e),
                Err(e) => warn!("PTP/IP skipping object {handle}: {e}"),
            }
        }
        Ok(files)
    }
}

/// Races `fut` against a timer; the losing future is dropped, closing any socket
/// it owns.
async fn with_timeout<T, F>(duration: Duration, fut: F) -> Result<T, PtpError>
where
    F: Future<Output = Result<T, PtpError>>,
{
    tokio::time::timeout(duration, fut).await.unwrap_or(Err(PtpError::Timeout))
}

fn unexpected(expected: &str, got: &Packet) -> PtpError {
    PtpError::UnexpectedPacket(format!("expected {expected}, got {:?}", got.packet_type()))
}
