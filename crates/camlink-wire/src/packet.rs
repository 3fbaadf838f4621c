//! Typed PTP/IP packets.

use crate::WireError;
use crate::codes::{EventCode, OperationCode, ResponseCode};
use crate::data::{DataReader, DataWriter};
use crate::frame::{Frame, PacketType, decode_frame, encode_frame};

/// Maximum number of parameters an operation, response or event can carry.
pub const MAX_PARAMS: usize = 5;

/// The data phase announced in an operation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPhase {
    /// No data follows the request.
    None,
    /// The responder sends data back (StartData / Data / EndData).
    DataIn,
    /// A phase value this client doesn't produce.
    Other(u32),
}

impl DataPhase {
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::None,
            2 => Self::DataIn,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::None => 1,
            Self::DataIn => 2,
            Self::Other(value) => value,
        }
    }
}

/// A decoded PTP/IP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    InitCommandRequest {
        guid: [u8; 16],
        friendly_name: String,
        protocol_version: u32,
    },
    InitCommandAck {
        connection_number: u32,
        guid: [u8; 16],
        friendly_name: String,
        protocol_version: u32,
    },
    InitEventRequest {
        connection_number: u32,
    },
    InitEventAck,
    InitFail {
        reason: u32,
    },
    OperationRequest {
        data_phase: DataPhase,
        opcode: OperationCode,
        transaction_id: u32,
        params: Vec<u32>,
    },
    OperationResponse {
        code: ResponseCode,
        transaction_id: u32,
        params: Vec<u32>,
    },
    Event {
        code: EventCode,
        transaction_id: u32,
        params: Vec<u32>,
    },
    StartData {
        transaction_id: u32,
        total_length: u64,
    },
    Data {
        transaction_id: u32,
        payload: Vec<u8>,
    },
    Cancel {
        transaction_id: u32,
    },
    EndData {
        transaction_id: u32,
        payload: Vec<u8>,
    },
    ProbeRequest,
    ProbeResponse,
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::InitCommandRequest { .. } => PacketType::InitCommandRequest,
            Self::InitCommandAck { .. } => PacketType::InitCommandAck,
            Self::InitEventRequest { .. } => PacketType::InitEventRequest,
            Self::InitEventAck => PacketType::InitEventAck,
            Self::InitFail { .. } => PacketType::InitFail,
            Self::OperationRequest { .. } => PacketType::OperationRequest,
            Self::OperationResponse { .. } => PacketType::OperationResponse,
            Self::Event { .. } => PacketType::Event,
            Self::StartData { .. } => PacketType::StartData,
            Self::Data { .. } => PacketType::Data,
            Self::Cancel { .. } => PacketType::Cancel,
            Self::EndData { .. } => PacketType::EndData,
            Self::ProbeRequest => PacketType::ProbeRequest,
            Self::ProbeResponse => PacketType::ProbeResponse,
        }
    }

    /// Serializes the packet into a complete frame, header included.
    pub fn encode(&self) -> Vec<u8> {
        encode_frame(self.packet_type(), &self.encode_payload())
    }

    fn encode_payload(&self) -> Vec<u8> {
        let mut w = DataWriter::new();
        match self {
            Self::InitCommandRequest {
                guid,
                friendly_name,
                protocol_version,
            } => {
                w.put_bytes(guid).put_utf16z(friendly_name).put_u32(*protocol_version);
            }
            Self::InitCommandAck {
                connection_number,
                guid,
                friendly_name,
                protocol_version,
            } => {
                w.put_u32(*connection_number)
                    .put_bytes(guid)
                    .put_utf16z(friendly_name)
                    .put_u32(*protocol_version);
            }
            Self::InitEventRequest { connection_number } => {
                w.put_u32(*connection_number);
            }
            Self::InitFail { reason } => {
                w.put_u32(*reason);
            }
            Self::OperationRequest {
                data_phase,
                opcode,
                transaction_id,
                params,
            } => {
                w.put_u32(data_phase.code())
                    .put_u16(opcode.to_u16())
                    .put_u32(*transaction_id);
                put_params(&mut w, params);
            }
            Self::OperationResponse {
                code,
                transaction_id,
                params,
            } => {
                w.put_u16(code.to_u16()).put_u32(*transaction_id);
                put_params(&mut w, params);
            }
            Self::Event {
                code,
                transaction_id,
                params,
            } => {
                w.put_u16(code.to_u16()).put_u32(*transaction_id);
                put_params(&mut w, params);
            }
            Self::StartData {
                transaction_id,
                total_length,
            } => {
                w.put_u32(*transaction_id).put_u64(*total_length);
            }
            Self::Data {
                transaction_id,
                payload,
            }
            | Self::EndData {
                transaction_id,
                payload,
            } => {
                w.put_u32(*transaction_id).put_bytes(payload);
            }
            Self::Cancel { transaction_id } => {
                w.put_u32(*transaction_id);
            }
            Self::InitEventAck | Self::ProbeRequest | Self::ProbeResponse => {}
        }
        w.into_bytes()
    }

    /// Decodes the payload of an already validated frame. Missing trailing fields
    /// decode as zero.
    pub fn from_frame(frame: &Frame) -> Self {
        let mut r = DataReader::new(&frame.payload);
        match frame.packet_type {
            PacketType::InitCommandRequest => Self::InitCommandRequest {
                guid: r.read_bytes(),
                friendly_name: r.read_utf16z(),
                protocol_version: r.read_u32(),
            },
            PacketType::InitCommandAck => Self::InitCommandAck {
                connection_number: r.read_u32(),
                guid: r.read_bytes(),
                friendly_name: r.read_utf16z(),
                protocol_version: r.read_u32(),
            },
            PacketType::InitEventRequest => Self::InitEventRequest {
                connection_number: r.read_u32(),
            },
            PacketType::InitEventAck => Self::InitEventAck,
            PacketType::InitFail => Self::InitFail { reason: r.read_u32() },
            PacketType::OperationRequest => Self::OperationRequest {
                data_phase: DataPhase::from_u32(r.read_u32()),
                opcode: OperationCode::from_u16(r.read_u16()),
                transaction_id: r.read_u32(),
                params: read_params(&mut r),
            },
            PacketType::OperationResponse => Self::OperationResponse {
                code: ResponseCode::from_u16(r.read_u16()),
                transaction_id: r.read_u32(),
                params: read_params(&mut r),
            },
            PacketType::Event => Self::Event {
                code: EventCode::from_u16(r.read_u16()),
                transaction_id: r.read_u32(),
                params: read_params(&mut r),
            },
            PacketType::StartData => Self::StartData {
                transaction_id: r.read_u32(),
                total_length: r.read_u64(),
            },
            PacketType::Data => Self::Data {
                transaction_id: r.read_u32(),
                payload: r.read_rest().to_vec(),
            },
            PacketType::Cancel => Self::Cancel {
                transaction_id: r.read_u32(),
            },
            PacketType::EndData => Self::EndData {
                transaction_id: r.read_u32(),
                payload: r.read_rest().to_vec(),
            },
            PacketType::ProbeRequest => Self::ProbeRequest,
            PacketType::ProbeResponse => Self::ProbeResponse,
        }
    }

    /// Validates the frame header and decodes the packet in one step.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let frame = decode_frame(buf)?;
        Ok(Self::from_frame(&frame))
    }
}

fn put_params(w: &mut DataWriter, params: &[u32]) {
    for &param in params.iter().take(MAX_PARAMS) {
        w.put_u32(param);
    }
}

fn read_params(r: &mut DataReader<'_>) -> Vec<u32> {
    let count = (r.remaining() / 4).min(MAX_PARAMS);
    (0..count).map(|_| r.read_u32()).collect()
}
