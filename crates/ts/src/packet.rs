use crate::{Result, TsError};
use bytes::{Buf, Bytes};

/// Size of a single transport stream packet
pub const TS_PACKET_SIZE: usize = 188;

/// Sync byte that starts every transport stream packet
pub const SYNC_BYTE: u8 = 0x47;

/// Size of the fixed packet header (sync byte, flags, PID, control bits)
pub const TS_HEADER_SIZE: usize = 4;

/// Transport Stream packet view.
///
/// Holds the full 188 bytes so that scanners can walk the payload in place,
/// starting at [`TsPacket::payload_offset`].
#[derive(Debug, Clone)]
pub struct TsPacket {
    /// Source packet data (exactly 188 bytes)
    data: Bytes,
    /// Transport Error Indicator
    pub transport_error_indicator: bool,
    /// Payload Unit Start Indicator
    pub payload_unit_start_indicator: bool,
    /// Packet Identifier
    pub pid: u16,
    /// Adaptation Field Control
    pub adaptation_field_control: u8,
    /// Continuity Counter
    pub continuity_counter: u8,
    /// Offset of the first payload byte, past the header and adaptation field
    payload_offset: usize,
}

impl TsPacket {
    /// Parse a TS packet from 188 bytes
    pub fn parse(data: Bytes) -> Result<Self> {
        if data.len() != TS_PACKET_SIZE {
            return Err(TsError::InvalidPacketSize(data.len()));
        }
        let mut reader = &data[..];
        let sync_byte = reader.get_u8();
        if sync_byte != SYNC_BYTE {
            return Err(TsError::InvalidSyncByte(sync_byte));
        }
        let byte1 = reader.get_u8();
        let byte2 = reader.get_u8();
        let byte3 = reader.get_u8();

        let transport_error_indicator = (byte1 & 0x80) != 0;
        let payload_unit_start_indicator = (byte1 & 0x40) != 0;
        let pid = ((byte1 as u16 & 0x1F) << 8) | byte2 as u16;
        let adaptation_field_control = (byte3 >> 4) & 0x03;
        let continuity_counter = byte3 & 0x0F;

        let mut payload_offset = TS_HEADER_SIZE;
        if adaptation_field_control & 0x02 != 0 {
            let adaptation_field_length = reader.get_u8() as usize;
            // A corrupt length byte pushes the payload off the end of the packet.
            payload_offset = (payload_offset + 1 + adaptation_field_length).min(TS_PACKET_SIZE);
        }

        Ok(TsPacket {
            data,
            transport_error_indicator,
            payload_unit_start_indicator,
            pid,
            adaptation_field_control,
            continuity_counter,
            payload_offset,
        })
    }

    /// Check if this packet carries a payload
    #[inline]
    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control & 0x01 != 0
    }

    /// Check if this packet has an adaptation field
    #[inline]
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control & 0x02 != 0
    }

    /// Whether this packet begins a new payload unit
    #[inline]
    pub fn payload_start(&self) -> bool {
        self.payload_unit_start_indicator
    }

    /// Offset of the payload within [`TsPacket::data`].
    ///
    /// Equals [`TS_PACKET_SIZE`] when the adaptation field fills the packet.
    #[inline]
    pub fn payload_offset(&self) -> usize {
        self.payload_offset
    }

    /// The complete 188 packet bytes
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload bytes, if the packet carries any
    pub fn payload(&self) -> Option<&[u8]> {
        if self.has_payload() && self.payload_offset < TS_PACKET_SIZE {
            Some(&self.data[self.payload_offset..])
        } else {
            None
        }
    }
}
