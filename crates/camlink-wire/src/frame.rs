//! PTP/IP frame header: `u32 total_length | u32 packet_type | payload`.
//!
//! `total_length` counts the 8 header bytes too. Callers read the first four bytes
//! off the stream, then the remaining `total_length - 4`, and pass the whole
//! buffer to [`decode_frame`].

use crate::WireError;

/// Size of the length + type header.
pub const HEADER_LEN: usize = 8;

/// PTP/IP packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    InitCommandRequest,
    InitCommandAck,
    InitEventRequest,
    InitEventAck,
    InitFail,
    OperationRequest,
    OperationResponse,
    Event,
    StartData,
    Data,
    Cancel,
    EndData,
    ProbeRequest,
    ProbeResponse,
}

impl PacketType {
    pub fn from_u32(value: u32) -> Option<Self> {
        let packet_type = match value {
            0x01 => Self::InitCommandRequest,
            0x02 => Self::InitCommandAck,
            0x03 => Self::InitEventRequest,
            0x04 => Self::InitEventAck,
            0x05 => Self::InitFail,
            0x06 => Self::OperationRequest,
            0x07 => Self::OperationResponse,
            0x08 => Self::Event,
            0x09 => Self::StartData,
            0x0A => Self::Data,
            0x0B => Self::Cancel,
            0x0C => Self::EndData,
            0x0D => Self::ProbeRequest,
            0x0E => Self::ProbeResponse,
            _ => return None,
        };
        Some(packet_type)
    }

    pub fn code(self) -> u32 {
        match self {
            Self::InitCommandRequest => 0x01,
            Self::InitCommandAck => 0x02,
            Self::InitEventRequest => 0x03,
            Self::InitEventAck => 0x04,
            Self::InitFail => 0x05,
            Self::OperationRequest => 0x06,
            Self::OperationResponse => 0x07,
            Self::Event => 0x08,
            Self::StartData => 0x09,
            Self::Data => 0x0A,
            Self::Cancel => 0x0B,
            Self::EndData => 0x0C,
            Self::ProbeRequest => 0x0D,
            Self::ProbeResponse => 0x0E,
        }
    }
}

/// One undecoded PTP/IP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub packet_type: PacketType,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(packet_type: PacketType, payload: Vec<u8>) -> Self {
        Self { packet_type, payload }
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_frame(self.packet_type, &self.payload)
    }
}

/// Serializes a frame, header included.
pub fn encode_frame(packet_type: PacketType, payload: &[u8]) -> Vec<u8> {
    let total = (HEADER_LEN + payload.len()) as u32;
    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(&packet_type.code().to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Reads the declared total length from the first four bytes of a frame.
pub fn declared_length(prefix: [u8; 4]) -> u32 {
    u32::from_le_bytes(prefix)
}

/// Decodes a complete frame. `buf` must hold at least `total_length` bytes; any
/// bytes after that are ignored.
pub fn decode_frame(buf: &[u8]) -> Result<Frame, WireError> {
    if buf.len() < HEADER_LEN {
        return Err(WireError::InvalidFrame(format!(
            "need {} header bytes, got {}",
            HEADER_LEN,
            buf.len()
        )));
    }

    let total = declared_length([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if total < HEADER_LEN {
        return Err(WireError::InvalidFrame(format!("declared length {total} is below the header size")));
    }
    if buf.len() < total {
        return Err(WireError::InvalidFrame(format!(
            "declared length {total} but only {} bytes available",
            buf.len()
        )));
    }

    let raw_type = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let packet_type = PacketType::from_u32(raw_type)
        .ok_or_else(|| WireError::InvalidFrame(format!("unknown packet type 0x{raw_type:08X}")))?;

    Ok(Frame {
        packet_type,
        payload: buf[HEADER_LEN..total].to_vec(),
    })
}
