//! Segment destinations and the control-side handle.
//!
//! The ingest thread owns the [`Recorder`](crate::Recorder). Everything other
//! threads may touch lives in [`Shared`], reachable through a cloneable
//! [`RecorderHandle`]: the position index (seek queries), the active
//! destination (flushed before a switch), and the pending next segment.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::RecorderError;
use crate::position_map::{PositionIndex, SaveOutcome};
use crate::sink::{OutputSink, RecordingStore};

/// Destination the recorder is currently writing to.
#[derive(Debug, Clone, Default)]
pub struct ActiveSegment {
    pub store: Option<Arc<dyn RecordingStore>>,
    pub sink: Option<Arc<dyn OutputSink>>,
}

/// Destination to switch to at the next keyframe boundary.
#[derive(Debug, Clone)]
pub struct PendingSegment {
    pub store: Option<Arc<dyn RecordingStore>>,
    pub sink: Arc<dyn OutputSink>,
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) index: PositionIndex,
    active: RwLock<ActiveSegment>,
    pending: Mutex<Option<PendingSegment>>,
    recording: AtomicBool,
}

impl Shared {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            index: PositionIndex::new(),
            active: RwLock::new(ActiveSegment::default()),
            pending: Mutex::new(None),
            recording: AtomicBool::new(false),
        }
    }

    /// Clone of the active destination; the lock is not held afterwards.
    pub(crate) fn active(&self) -> ActiveSegment {
        self.active.read().clone()
    }

    pub(crate) fn set_active(&self, segment: ActiveSegment) {
        *self.active.write() = segment;
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }

    pub(crate) fn set_recording(&self, value: bool) {
        self.recording.store(value, Ordering::Release);
    }

    pub(crate) fn save(&self, force: bool) -> Result<SaveOutcome, RecorderError> {
        let active = self.active();
        self.index
            .save(force, active.store.as_deref(), active.sink.as_deref())
    }

    /// Like [`Shared::save`], but failures only get logged. Capture must go on.
    pub(crate) fn save_logged(&self, force: bool) {
        if let Err(e) = self.save(force) {
            warn!(recorder = %self.name, error = %e, "Failed to save position map, will retry");
        }
    }

    pub(crate) fn flush_sink(&self) {
        if let Some(sink) = self.active().sink
            && let Err(e) = sink.flush()
        {
            warn!(recorder = %self.name, error = %e, "Failed to flush output sink");
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    pub(crate) fn take_pending(&self) -> Option<PendingSegment> {
        self.pending.lock().take()
    }

    fn set_pending(&self, pending: Option<PendingSegment>) {
        *self.pending.lock() = pending;
    }
}

/// Cloneable handle for seek queries and segment control from other threads.
#[derive(Debug, Clone)]
pub struct RecorderHandle {
    shared: Arc<Shared>,
}

impl RecorderHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Byte offset of the keyframe indexed under `frame`, if any.
    pub fn get_keyframe_position(&self, frame: u64) -> Option<u64> {
        self.shared.index.get(frame)
    }

    /// Closest indexed keyframe at or before `frame`, as `(frame, offset)`.
    pub fn keyframe_at_or_before(&self, frame: u64) -> Option<(u64, u64)> {
        self.shared.index.keyframe_at_or_before(frame)
    }

    pub fn position_index(&self) -> &PositionIndex {
        &self.shared.index
    }

    pub fn is_recording(&self) -> bool {
        self.shared.is_recording()
    }

    /// Flush the index delta, subject to the save cadence unless `force`.
    pub fn save_position_map(&self, force: bool) -> Result<SaveOutcome, RecorderError> {
        self.shared.save(force)
    }

    /// Queue the destination to switch to at the next keyframe.
    ///
    /// The current segment's index and sink are flushed first so the switch
    /// itself has little left to do. Passing no sink withdraws any pending
    /// segment.
    pub fn prepare_next(
        &self,
        store: Option<Arc<dyn RecordingStore>>,
        sink: Option<Arc<dyn OutputSink>>,
    ) {
        debug!(
            recorder = %self.shared.name,
            has_store = store.is_some(),
            has_sink = sink.is_some(),
            "Preparing next segment"
        );
        self.shared.save_logged(true);
        self.shared.flush_sink();

        self.shared
            .set_pending(sink.map(|sink| PendingSegment { store, sink }));
    }

    /// Drop the pending segment, if any.
    pub fn withdraw_next(&self) {
        self.prepare_next(None, None);
    }

    pub fn has_pending(&self) -> bool {
        self.shared.has_pending()
    }
}
