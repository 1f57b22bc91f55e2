//! Frame counting and keyframe selection.
//!
//! GOP start codes are the preferred seek points, but they are only required
//! of MPEG-1 streams. Sequence headers are a decent fallback for MPEG-2, and if
//! a stream carries neither, every 16th picture is declared a keyframe once
//! both markers have gone stale. Seeking to such a picture may show artifacts,
//! but the recording stays skippable.

use crate::scan::StartCode;

/// Default number of pictures after which GOP/sequence markers go stale.
pub const DEFAULT_MAX_KEYFRAME_DISTANCE: u64 = 32;

/// GOP start codes are ignored until the first sequence header by default.
pub const DEFAULT_WAIT_FOR_SEQSTART: bool = true;

/// Fallback keyframes are only placed on multiples of this many pictures.
const FALLBACK_KEYFRAME_INTERVAL: u64 = 16;

/// Where the first keyframe of a segment landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirstKeyframe {
    /// No keyframe handled since the segment started
    #[default]
    Unset,
    /// A keyframe was handled before any full frame had been written
    Deferred,
    /// Frame ordinal of the first keyframe once output had begun
    Frame(u64),
}

impl FirstKeyframe {
    #[inline]
    pub fn is_set(&self) -> bool {
        !matches!(self, FirstKeyframe::Unset)
    }
}

/// Per-segment picture statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameCounters {
    /// All pictures observed in the segment
    pub frames_seen: u64,
    /// Pictures counted once output has begun
    pub frames_written: u64,
    pub first_keyframe: FirstKeyframe,
    /// `frames_seen` at the most recent declared keyframe
    pub last_keyframe_frame: Option<u64>,
    /// `frames_seen` at the most recent GOP start code
    pub last_gop_frame: Option<u64>,
    /// `frames_seen` at the most recent sequence header
    pub last_seq_frame: Option<u64>,
}

impl FrameCounters {
    /// Ordinal of the most recently completed frame, clamped to 0.
    #[inline]
    pub fn current_frame(&self) -> u64 {
        self.frames_written.saturating_sub(1)
    }
}

#[derive(Debug, Clone)]
pub struct KeyframeClassifier {
    counters: FrameCounters,
    max_keyframe_distance: u64,
    wait_for_seqstart: bool,
    awaiting_sequence: bool,
}

impl KeyframeClassifier {
    pub fn new(max_keyframe_distance: u64, wait_for_seqstart: bool) -> Self {
        Self {
            counters: FrameCounters::default(),
            max_keyframe_distance,
            wait_for_seqstart,
            awaiting_sequence: wait_for_seqstart,
        }
    }

    #[inline]
    pub fn counters(&self) -> &FrameCounters {
        &self.counters
    }

    pub fn max_keyframe_distance(&self) -> u64 {
        self.max_keyframe_distance
    }

    pub fn wait_for_seqstart(&self) -> bool {
        self.wait_for_seqstart
    }

    /// Takes effect immediately and on every following segment.
    pub fn set_wait_for_seqstart(&mut self, value: bool) {
        self.wait_for_seqstart = value;
        self.awaiting_sequence = value;
    }

    /// Whether GOP start codes are being ignored until a sequence header.
    pub fn awaiting_sequence(&self) -> bool {
        self.awaiting_sequence
    }

    pub fn reset(&mut self) {
        self.counters = FrameCounters::default();
        self.awaiting_sequence = self.wait_for_seqstart;
    }

    /// A marker recorded at `last` is stale once `max_keyframe_distance`
    /// pictures have passed. A marker never seen is always stale.
    #[inline]
    fn is_stale(&self, last: Option<u64>) -> bool {
        match last {
            Some(frame) => {
                frame.saturating_add(self.max_keyframe_distance) < self.counters.frames_seen
            }
            None => true,
        }
    }

    /// Account for one start code. Returns `true` if it makes the current
    /// picture a keyframe.
    #[inline]
    pub fn observe(&mut self, code: StartCode) -> bool {
        match code {
            StartCode::Picture => {
                if self.counters.first_keyframe.is_set() {
                    self.counters.frames_written += 1;
                }
                self.counters.frames_seen += 1;

                self.counters.frames_seen % FALLBACK_KEYFRAME_INTERVAL == 0
                    && self.is_stale(self.counters.last_gop_frame)
                    && self.is_stale(self.counters.last_seq_frame)
            }
            StartCode::GroupOfPictures => {
                if self.awaiting_sequence {
                    return false;
                }
                self.counters.last_gop_frame = Some(self.counters.frames_seen);
                true
            }
            StartCode::Sequence => {
                self.awaiting_sequence = false;
                // A sequence header right behind a GOP start is the same seek point.
                let keyframe = self.is_stale(self.counters.last_gop_frame);
                self.counters.last_seq_frame = Some(self.counters.frames_seen);
                keyframe
            }
            StartCode::Other(_) => false,
        }
    }

    /// Book-keeping for a keyframe that is about to be indexed. Returns the
    /// frame ordinal the keyframe is filed under.
    pub fn mark_keyframe(&mut self) -> u64 {
        let counters = &mut self.counters;
        let frame = counters.current_frame();
        counters.last_keyframe_frame = Some(counters.frames_seen);

        if !counters.first_keyframe.is_set() && counters.frames_seen > 0 {
            counters.first_keyframe = if counters.frames_written > 0 {
                FirstKeyframe::Frame(frame)
            } else {
                FirstKeyframe::Deferred
            };
        }
        frame
    }
}

impl Default for KeyframeClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEYFRAME_DISTANCE, DEFAULT_WAIT_FOR_SEQSTART)
    }
}
