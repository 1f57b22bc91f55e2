//! Start code matching for MPEG video elementary streams.
//!
//! ```text
//!   00 00 01 00: picture_start_code
//!   00 00 01 B8: group_start_code
//!   00 00 01 B3: sequence_header_code
//! ```
//!
//! The matcher is resumable: a start code may begin in one transport packet
//! and finish in the next, so the partial match is carried between packets
//! until a payload unit start resets it. This includes a complete prefix at
//! the very end of a packet, whose stream id is the next packet's first byte.

/// Stream id of a picture start code
pub const PICTURE_START_CODE: u8 = 0x00;
/// Stream id of a group of pictures start code
pub const GOP_START_CODE: u8 = 0xB8;
/// Stream id of a sequence header code
pub const SEQUENCE_START_CODE: u8 = 0xB3;

/// Progress toward the `00 00 01` start code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    NoMatch,
    /// Seen `00`
    OneZero,
    /// Seen `00 00` (or a longer run of zeros)
    TwoZeros,
    /// Seen `00 00 01`, the next byte is the stream id
    AwaitingStreamId,
}

impl ScanState {
    /// Feed one byte. Returns the stream id when the byte follows a complete
    /// start code prefix.
    ///
    /// The stream id byte is also fed to the matcher, so a picture id of
    /// `00` can begin the next prefix.
    #[inline(always)]
    pub fn advance(&mut self, byte: u8) -> Option<u8> {
        let stream_id = (*self == ScanState::AwaitingStreamId).then_some(byte);
        *self = match (*self, byte) {
            (ScanState::TwoZeros, 0x01) => ScanState::AwaitingStreamId,
            // zero_byte stuffing keeps us primed for the 0x01
            (ScanState::OneZero | ScanState::TwoZeros, 0x00) => ScanState::TwoZeros,
            (_, 0x00) => ScanState::OneZero,
            _ => ScanState::NoMatch,
        };
        stream_id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = ScanState::NoMatch;
    }
}

/// Classification of the stream id following a start code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartCode {
    Picture,
    GroupOfPictures,
    Sequence,
    Other(u8),
}

impl StartCode {
    #[inline]
    pub fn from_stream_id(stream_id: u8) -> Self {
        match stream_id {
            PICTURE_START_CODE => StartCode::Picture,
            GOP_START_CODE => StartCode::GroupOfPictures,
            SEQUENCE_START_CODE => StartCode::Sequence,
            other => StartCode::Other(other),
        }
    }
}
