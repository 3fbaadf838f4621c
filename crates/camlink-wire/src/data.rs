//! Little-endian PTP dataset primitives.
//!
//! [`DataReader`] never fails: reading past the end of the buffer yields the zero
//! value of the requested field. Camera firmware is known to send datasets that
//! stop short of the fields the standard defines, and the fields that *were* sent
//! are still worth having.

/// Maximum number of UTF-16 units a PTP string can carry, including the null.
const MAX_STRING_UNITS: usize = 255;

/// Cursor over a PTP dataset.
#[derive(Debug, Clone)]
pub struct DataReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DataReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Takes up to `n` bytes. Shorter when the buffer runs out.
    fn take(&mut self, n: usize) -> &'a [u8] {
        let start = self.pos.min(self.buf.len());
        let end = self.pos.saturating_add(n).min(self.buf.len());
        self.pos = self.pos.saturating_add(n);
        &self.buf[start..end]
    }

    /// Reads `N` bytes, zero-filling whatever lies past the end.
    fn take_array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        let bytes = self.take(N);
        if bytes.len() == N {
            out.copy_from_slice(bytes);
            out
        } else {
            // A partially present field counts as absent.
            [0u8; N]
        }
    }

    pub fn read_u8(&mut self) -> u8 {
        self.take_array::<1>()[0]
    }

    pub fn read_u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take_array())
    }

    pub fn read_u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take_array())
    }

    pub fn read_u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take_array())
    }

    /// Reads a fixed number of raw bytes, zero-filled past the end.
    pub fn read_bytes<const N: usize>(&mut self) -> [u8; N] {
        self.take_array()
    }

    /// Everything after the cursor.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let n = self.remaining();
        self.take(n)
    }

    /// Reads a PTP string: a count byte (including the null) followed by that many
    /// UTF-16LE units. Embedded nulls are dropped.
    pub fn read_string(&mut self) -> String {
        let count = self.read_u8() as usize;
        let units: Vec<u16> = (0..count).map(|_| self.read_u16()).filter(|&u| u != 0).collect();
        String::from_utf16_lossy(&units)
    }

    /// Reads a null-terminated UTF-16LE string, as used by the PTP/IP init packets.
    pub fn read_utf16z(&mut self) -> String {
        let mut units = Vec::new();
        while self.remaining() >= 2 {
            let unit = self.read_u16();
            if unit == 0 {
                break;
            }
            units.push(unit);
        }
        String::from_utf16_lossy(&units)
    }

    /// Reads a `u32 count` followed by `count` u16 elements.
    ///
    /// A count larger than the remaining data is clamped to the elements that are
    /// actually present.
    pub fn read_u16_array(&mut self) -> Vec<u16> {
        let count = self.read_u32() as usize;
        let available = count.min(self.remaining() / 2);
        (0..available).map(|_| self.read_u16()).collect()
    }

    /// Reads a `u32 count` followed by `count` u32 elements (clamped like
    /// [`read_u16_array`](Self::read_u16_array)).
    pub fn read_u32_array(&mut self) -> Vec<u32> {
        let count = self.read_u32() as usize;
        let available = count.min(self.remaining() / 4);
        (0..available).map(|_| self.read_u32()).collect()
    }
}

/// Builder for PTP datasets and packet payloads.
#[derive(Debug, Default, Clone)]
pub struct DataWriter {
    buf: Vec<u8>,
}

impl DataWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Writes a PTP string. The empty string is a single zero count byte; anything
    /// else gets a count that includes the trailing null. Strings longer than the
    /// format allows are truncated.
    pub fn put_string(&mut self, value: &str) -> &mut Self {
        if value.is_empty() {
            return self.put_u8(0);
        }
        let units: Vec<u16> = value.encode_utf16().take(MAX_STRING_UNITS - 1).collect();
        self.put_u8((units.len() + 1) as u8);
        for unit in units {
            self.put_u16(unit);
        }
        self.put_u16(0)
    }

    /// Writes a null-terminated UTF-16LE string.
    pub fn put_utf16z(&mut self, value: &str) -> &mut Self {
        for unit in value.encode_utf16() {
            self.put_u16(unit);
        }
        self.put_u16(0)
    }

    pub fn put_u16_array(&mut self, values: &[u16]) -> &mut Self {
        self.put_u32(values.len() as u32);
        for &value in values {
            self.put_u16(value);
        }
        self
    }

    pub fn put_u32_array(&mut self, values: &[u32]) -> &mut Self {
        self.put_u32(values.len() as u32);
        for &value in values {
            self.put_u32(value);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
