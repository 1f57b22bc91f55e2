//! Boundaries to the collaborators that store recorded bytes and index deltas.

use std::fmt;

use crate::error::BoxError;
use crate::position_map::PositionMap;

/// Kind tag attached to each persisted index delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MarkType {
    /// Keyframe entries keyed by frame ordinal
    GopByFrame,
}

/// Output destination that receives the recorded transport stream bytes.
///
/// Implementations are shared between the ingest thread and the control
/// thread, so every method takes `&self`.
pub trait OutputSink: Send + Sync {
    /// Push buffered bytes towards durable storage.
    fn flush(&self) -> std::io::Result<()>;

    /// Offset at which the next byte will be written.
    fn write_position(&self) -> u64;

    /// Size of the data that has reached the file so far.
    fn file_size(&self) -> u64;
}

/// Durable record of a recording, holding its seek index and size.
pub trait RecordingStore: Send + Sync {
    /// Append index entries that have not been persisted yet.
    fn persist_delta(&self, delta: &PositionMap, kind: MarkType) -> Result<(), BoxError>;

    /// Record the current size estimate of the recording.
    fn set_file_size(&self, size: u64) -> Result<(), BoxError>;
}

impl fmt::Debug for dyn OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("write_position", &self.write_position())
            .finish()
    }
}

impl fmt::Debug for dyn RecordingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordingStore")
    }
}
