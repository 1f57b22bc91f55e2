//! Transport Stream (TS) packet framing for MPEG-2 Transport Stream data
//!
//! This crate exposes fixed-size 188-byte packet views with the fields a
//! start-code scanner needs: the payload unit start flag, the payload offset
//! past any adaptation field, and the raw packet bytes. A small builder is
//! provided for synthesising packets in tests and benchmarks.

pub mod builder;
pub mod error;
pub mod packet;

pub use builder::TsPacketBuilder;
pub use error::TsError;
pub use packet::{SYNC_BYTE, TS_HEADER_SIZE, TS_PACKET_SIZE, TsPacket};

/// Result type for TS parsing operations
pub type Result<T> = std::result::Result<T, TsError>;
