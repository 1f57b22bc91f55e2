use bytes::{BufMut, Bytes, BytesMut};

use crate::packet::{SYNC_BYTE, TS_HEADER_SIZE, TS_PACKET_SIZE, TsPacket};
use crate::{Result, TsError};

/// Stuffing byte used to pad adaptation fields and short payloads
const STUFFING_BYTE: u8 = 0xFF;

/// Longest adaptation field that still fits behind the header and length byte
const MAX_ADAPTATION_FIELD_LENGTH: usize = TS_PACKET_SIZE - TS_HEADER_SIZE - 1;

/// Builds synthetic 188-byte packets.
///
/// Unused payload space is padded with `0xFF`, which can never form part of
/// a `00 00 01` start code.
#[derive(Debug, Clone)]
pub struct TsPacketBuilder {
    pid: u16,
    payload_start: bool,
    continuity_counter: u8,
    adaptation_field_length: Option<u8>,
    has_payload: bool,
    payload: Vec<u8>,
}

impl TsPacketBuilder {
    pub fn new(pid: u16) -> Self {
        Self {
            pid: pid & 0x1FFF,
            payload_start: false,
            continuity_counter: 0,
            adaptation_field_length: None,
            has_payload: true,
            payload: Vec::new(),
        }
    }

    pub fn payload_start(mut self, value: bool) -> Self {
        self.payload_start = value;
        self
    }

    pub fn continuity_counter(mut self, cc: u8) -> Self {
        self.continuity_counter = cc & 0x0F;
        self
    }

    /// Insert an adaptation field of `length` bytes (excluding the length byte)
    pub fn adaptation_field(mut self, length: u8) -> Self {
        self.adaptation_field_length = Some(length);
        self
    }

    /// Produce an adaptation-field-only packet
    pub fn without_payload(mut self) -> Self {
        self.has_payload = false;
        self
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    /// Number of payload bytes that fit after the header and adaptation field
    pub fn payload_capacity(&self) -> usize {
        match self.adaptation_field_length {
            Some(len) => TS_PACKET_SIZE.saturating_sub(TS_HEADER_SIZE + 1 + len as usize),
            None => TS_PACKET_SIZE - TS_HEADER_SIZE,
        }
    }

    /// Serialise the packet to its raw 188 bytes
    pub fn to_bytes(&self) -> Result<Bytes> {
        if let Some(len) = self.adaptation_field_length
            && len as usize > MAX_ADAPTATION_FIELD_LENGTH
        {
            return Err(TsError::AdaptationFieldTooLong {
                len: len as usize,
                max: MAX_ADAPTATION_FIELD_LENGTH,
            });
        }

        let available = if self.has_payload {
            self.payload_capacity()
        } else {
            0
        };
        if self.payload.len() > available {
            return Err(TsError::PayloadTooLarge {
                len: self.payload.len(),
                available,
            });
        }

        let adaptation_field_length = match (self.has_payload, self.adaptation_field_length) {
            (false, _) => Some(MAX_ADAPTATION_FIELD_LENGTH as u8),
            (true, len) => len,
        };
        let afc = match (adaptation_field_length.is_some(), self.has_payload) {
            (true, true) => 0x03,
            (true, false) => 0x02,
            _ => 0x01,
        };

        let mut buf = BytesMut::with_capacity(TS_PACKET_SIZE);
        buf.put_u8(SYNC_BYTE);
        let pusi = if self.payload_start { 0x40 } else { 0x00 };
        buf.put_u8(pusi | ((self.pid >> 8) as u8 & 0x1F));
        buf.put_u8((self.pid & 0xFF) as u8);
        buf.put_u8((afc << 4) | self.continuity_counter);

        if let Some(len) = adaptation_field_length {
            buf.put_u8(len);
            if len > 0 {
                // No flags set, the rest is stuffing
                buf.put_u8(0x00);
                buf.put_bytes(STUFFING_BYTE, len as usize - 1);
            }
        }
        buf.put_slice(&self.payload);
        buf.put_bytes(STUFFING_BYTE, TS_PACKET_SIZE - buf.len());

        Ok(buf.freeze())
    }

    pub fn build(&self) -> Result<TsPacket> {
        TsPacket::parse(self.to_bytes()?)
    }
}
