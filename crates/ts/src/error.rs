/// Errors produced while framing transport stream packets
#[derive(Debug, thiserror::Error)]
pub enum TsError {
    #[error("invalid packet size: {0} bytes, expected 188")]
    InvalidPacketSize(usize),

    #[error("invalid sync byte: 0x{0:02X}")]
    InvalidSyncByte(u8),

    #[error("payload of {len} bytes does not fit, at most {available} bytes available")]
    PayloadTooLarge { len: usize, available: usize },

    #[error("adaptation field of {len} bytes does not fit, at most {max} bytes allowed")]
    AdaptationFieldTooLong { len: usize, max: usize },
}
