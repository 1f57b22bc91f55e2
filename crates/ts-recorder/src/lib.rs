//! # TS Recorder
//!
//! Live keyframe detection and seek indexing for MPEG-2 transport stream
//! recordings.
//!
//! ## Features
//!
//! - Resumable `00 00 01` start code scanning across packet boundaries
//! - Keyframe selection from GOP and sequence start codes, with a periodic
//!   fallback for streams that carry neither
//! - A frame → byte offset seek index, persisted in batches to a
//!   [`RecordingStore`]
//! - Segment handoff at keyframe boundaries
//!
//! ## License
//!
//! MIT License
//!

pub mod buffer;
pub mod classifier;
pub mod config;
pub mod error;
mod lifecycle;
pub mod position_map;
mod recorder;
pub mod scan;
pub mod sink;

#[cfg(test)]
mod test_utils;

pub use buffer::{MIN_BUFFER_SIZE, PacketBuffer};
pub use classifier::{FirstKeyframe, FrameCounters, KeyframeClassifier};
pub use config::{RecorderConfig, RecorderOption};
pub use error::{BoxError, RecorderError};
pub use lifecycle::{ActiveSegment, PendingSegment, RecorderHandle};
pub use position_map::{PositionIndex, PositionMap, SaveOutcome};
pub use recorder::{BufferScan, Recorder, ScanOutcome};
pub use scan::{ScanState, StartCode};
pub use sink::{MarkType, OutputSink, RecordingStore};
