//! Keyframe seek index.
//!
//! The index keeps two maps behind one lock: the full frame → byte offset map
//! used to answer seek queries, and the delta of entries not yet handed to the
//! [`RecordingStore`]. Every entry of the delta is also in the full map.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::RecorderError;
use crate::sink::{MarkType, OutputSink, RecordingStore};

/// Frame ordinal → byte offset
pub type PositionMap = BTreeMap<u64, u64>;

/// Flush on every 5th keyframe while the index is younger than this.
const EARLY_SAVE_LIMIT: usize = 30;
const EARLY_SAVE_INTERVAL: usize = 5;
/// Flush once this many entries are waiting.
const DELTA_SAVE_THRESHOLD: usize = 30;

/// What a call to [`PositionIndex::save`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Flush conditions not met, or nothing to flush
    Skipped,
    /// This many entries were handed to the store
    Flushed(usize),
}

#[derive(Debug, Default)]
struct IndexMaps {
    map: PositionMap,
    delta: PositionMap,
}

#[derive(Debug, Default)]
pub struct PositionIndex {
    inner: Mutex<IndexMaps>,
}

impl PositionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset of an indexed keyframe. No interpolation is performed.
    pub fn get(&self, frame: u64) -> Option<u64> {
        self.inner.lock().map.get(&frame).copied()
    }

    /// The closest indexed keyframe at or before `frame`.
    pub fn keyframe_at_or_before(&self, frame: u64) -> Option<(u64, u64)> {
        self.inner
            .lock()
            .map
            .range(..=frame)
            .next_back()
            .map(|(&frame, &offset)| (frame, offset))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().map.is_empty()
    }

    /// Number of entries not yet persisted.
    pub fn unsaved_len(&self) -> usize {
        self.inner.lock().delta.len()
    }

    pub fn contains(&self, frame: u64) -> bool {
        self.inner.lock().map.contains_key(&frame)
    }

    /// Copy of the full map.
    pub fn snapshot(&self) -> PositionMap {
        self.inner.lock().map.clone()
    }

    /// Copy of the unsaved entries.
    pub fn unsaved_snapshot(&self) -> PositionMap {
        self.inner.lock().delta.clone()
    }

    /// Insert a keyframe unless its ordinal is already indexed. The offset is
    /// only queried when the entry is new. Returns whether it was inserted.
    pub(crate) fn insert_with(&self, frame: u64, offset: impl FnOnce() -> u64) -> bool {
        let mut maps = self.inner.lock();
        if maps.map.contains_key(&frame) {
            return false;
        }
        let offset = offset();
        maps.delta.insert(frame, offset);
        maps.map.insert(frame, offset);
        trace!(frame, offset, "Indexed keyframe");
        true
    }

    /// Hand the delta to `store` when forced or when the flush cadence says so.
    ///
    /// The delta is only cleared once the store accepted it; on error it is
    /// kept and retried on the next flush. The size estimate that follows is
    /// best effort: the delta is already stored, so a failure there is only
    /// logged.
    pub(crate) fn save(
        &self,
        force: bool,
        store: Option<&dyn RecordingStore>,
        sink: Option<&dyn OutputSink>,
    ) -> Result<SaveOutcome, RecorderError> {
        let mut maps = self.inner.lock();

        let size = maps.map.len();
        let force = force
            || (size < EARLY_SAVE_LIMIT && size % EARLY_SAVE_INTERVAL == 1)
            || maps.delta.len() >= DELTA_SAVE_THRESHOLD;

        let Some(store) = store else {
            return Ok(SaveOutcome::Skipped);
        };
        if !force || maps.delta.is_empty() {
            return Ok(SaveOutcome::Skipped);
        }

        store
            .persist_delta(&maps.delta, MarkType::GopByFrame)
            .map_err(RecorderError::Store)?;
        let flushed = maps.delta.len();
        maps.delta.clear();

        if let Some(sink) = sink
            && let Err(e) = store.set_file_size(sink.write_position())
        {
            warn!(error = %e, "Failed to record file size estimate");
        }

        debug!(flushed, indexed = size, "Saved position map delta");
        Ok(SaveOutcome::Flushed(flushed))
    }

    pub(crate) fn clear(&self) {
        let mut maps = self.inner.lock();
        maps.map.clear();
        maps.delta.clear();
    }
}
