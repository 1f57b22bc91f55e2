use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use ts::{TsPacket, TsPacketBuilder};

use crate::error::BoxError;
use crate::position_map::PositionMap;
use crate::sink::{MarkType, OutputSink, RecordingStore};

/// PID used for synthetic video packets
pub const VIDEO_PID: u16 = 0x100;

/// Initialize tracing for tests with appropriate settings
#[inline]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// In-memory stand-in for the ring buffer.
#[derive(Debug, Default)]
pub struct MemorySink {
    position: AtomicU64,
    flushed_size: AtomicU64,
    flushes: AtomicUsize,
}

impl MemorySink {
    /// Pretend `bytes` more bytes were written.
    pub fn advance(&self, bytes: u64) {
        self.position.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl OutputSink for MemorySink {
    fn flush(&self) -> std::io::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        self.flushed_size
            .store(self.position.load(Ordering::SeqCst), Ordering::SeqCst);
        Ok(())
    }

    fn write_position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    fn file_size(&self) -> u64 {
        self.flushed_size.load(Ordering::SeqCst)
    }
}

/// In-memory stand-in for the recording database row.
#[derive(Debug, Default)]
pub struct MemoryStore {
    deltas: Mutex<Vec<(PositionMap, MarkType)>>,
    sizes: Mutex<Vec<u64>>,
    fail_next: AtomicBool,
    fail_next_size: AtomicBool,
}

impl MemoryStore {
    /// Make the next `persist_delta` call fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Make the next `set_file_size` call fail.
    pub fn fail_next_size(&self) {
        self.fail_next_size.store(true, Ordering::SeqCst);
    }

    pub fn delta_sizes(&self) -> Vec<usize> {
        self.deltas.lock().iter().map(|(d, _)| d.len()).collect()
    }

    /// Every entry ever persisted, merged.
    pub fn persisted(&self) -> PositionMap {
        self.deltas
            .lock()
            .iter()
            .flat_map(|(d, _)| d.iter().map(|(&k, &v)| (k, v)))
            .collect()
    }

    pub fn last_size(&self) -> Option<u64> {
        self.sizes.lock().last().copied()
    }
}

impl RecordingStore for MemoryStore {
    fn persist_delta(&self, delta: &PositionMap, kind: MarkType) -> Result<(), BoxError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err("database unavailable".into());
        }
        self.deltas.lock().push((delta.clone(), kind));
        Ok(())
    }

    fn set_file_size(&self, size: u64) -> Result<(), BoxError> {
        if self.fail_next_size.swap(false, Ordering::SeqCst) {
            return Err("database unavailable".into());
        }
        self.sizes.lock().push(size);
        Ok(())
    }
}

pub fn packet_bytes(payload_start: bool, payload: &[u8]) -> Bytes {
    TsPacketBuilder::new(VIDEO_PID)
        .payload_start(payload_start)
        .payload(payload)
        .to_bytes()
        .unwrap()
}

pub fn packet(payload_start: bool, payload: &[u8]) -> TsPacket {
    TsPacket::parse(packet_bytes(payload_start, payload)).unwrap()
}

/// A payload unit start carrying one picture start code
pub fn picture_packet() -> TsPacket {
    packet(true, &[0x00, 0x00, 0x01, 0x00, 0x12, 0x34])
}

/// A payload unit start with a sequence header, GOP start and picture
pub fn sequence_gop_packet() -> TsPacket {
    packet(
        true,
        &[
            0x00, 0x00, 0x01, 0xB3, 0x2D, 0x01, 0xE0, //
            0x00, 0x00, 0x01, 0xB8, 0x08, 0x00, //
            0x00, 0x00, 0x01, 0x00, 0x00, 0x0F,
        ],
    )
}

/// A payload unit start with a GOP start and picture
pub fn gop_packet() -> TsPacket {
    packet(
        true,
        &[
            0x00, 0x00, 0x01, 0xB8, 0x08, 0x00, //
            0x00, 0x00, 0x01, 0x00, 0x00, 0x0F,
        ],
    )
}
