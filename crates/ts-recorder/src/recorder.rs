//! # Transport stream recorder
//!
//! Scans MPEG-2 transport packets for picture, GOP and sequence start codes,
//! counts frames, and files every keyframe's byte offset into the
//! [`PositionIndex`] so that playback can seek while the recording is still
//! growing.
//!
//! ## Design:
//!
//! The [`Recorder`] is driven by a single ingest thread, one packet at a time
//! and in arrival order, so the scan state and frame counters need no locking.
//! Seek queries and segment control come from other threads through a
//! [`RecorderHandle`].
//!
//! Keyframe boundaries are the only points where output may move to another
//! destination without splitting a GOP. [`Recorder::scan`] reports when one is
//! reached while a segment is pending; the caller then finishes the current
//! segment and begins the next one.
//!
//! NOTE: this does not only find keyframes but also tracks the total frame
//! count. Seeking has been broken before by short-circuiting the scan once a
//! keyframe stream id was found, so every byte of every packet is scanned.

use std::sync::Arc;

use bytes::{Buf, Bytes};
use memchr::memchr;
use tracing::{debug, error, info, warn};
use ts::{SYNC_BYTE, TS_PACKET_SIZE, TsPacket};

use crate::buffer::PacketBuffer;
use crate::classifier::{FrameCounters, KeyframeClassifier};
use crate::config::{RecorderConfig, RecorderOption};
use crate::error::RecorderError;
use crate::lifecycle::{ActiveSegment, PendingSegment, RecorderHandle, Shared};
use crate::position_map::PositionIndex;
use crate::scan::{ScanState, StartCode};
use crate::sink::{OutputSink, RecordingStore};

/// What scanning one packet produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Frame ordinal of the keyframe handled for this packet
    pub keyframe: Option<u64>,
    /// A keyframe was reached while a next segment is pending
    pub switch_ready: bool,
}

/// Totals for a run of packets scanned out of the packet buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferScan {
    /// Packets scanned
    pub packets: usize,
    /// Keyframes handled
    pub keyframes: usize,
    /// Bytes skipped while looking for a sync byte
    pub skipped_bytes: usize,
    /// Bytes consumed; anything after this is a partial packet
    pub consumed: usize,
    /// Frame ordinal of the first keyframe at which a switch became possible
    pub switch_ready_at: Option<u64>,
}

pub struct Recorder {
    shared: Arc<Shared>,
    classifier: KeyframeClassifier,
    scan_state: ScanState,
    buffer: PacketBuffer,
    /// Set once a keyframe start code was found outside the first packet of
    /// its payload unit.
    streamid_not_in_first_packet: bool,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Result<Self, RecorderError> {
        let buffer = PacketBuffer::with_size(config.packet_buffer_size)?;
        debug!(
            recorder = %config.name,
            buffer_size = buffer.len(),
            wait_for_seqstart = config.wait_for_seqstart,
            max_keyframe_distance = config.max_keyframe_distance,
            "Created recorder"
        );

        Ok(Self {
            shared: Arc::new(Shared::new(config.name)),
            classifier: KeyframeClassifier::new(
                config.max_keyframe_distance,
                config.wait_for_seqstart,
            ),
            scan_state: ScanState::default(),
            buffer,
            streamid_not_in_first_packet: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Handle for seek queries and segment control from other threads.
    pub fn handle(&self) -> RecorderHandle {
        RecorderHandle::new(self.shared.clone())
    }

    pub fn counters(&self) -> &FrameCounters {
        self.classifier.counters()
    }

    pub fn scan_state(&self) -> ScanState {
        self.scan_state
    }

    pub fn position_index(&self) -> &PositionIndex {
        &self.shared.index
    }

    pub fn get_keyframe_position(&self, frame: u64) -> Option<u64> {
        self.shared.index.get(frame)
    }

    pub fn is_recording(&self) -> bool {
        self.shared.is_recording()
    }

    pub fn buffer(&self) -> &PacketBuffer {
        &self.buffer
    }

    /// Mutable access for capture drivers filling the buffer.
    pub fn buffer_mut(&mut self) -> &mut PacketBuffer {
        &mut self.buffer
    }

    pub fn wait_for_seqstart(&self) -> bool {
        self.classifier.wait_for_seqstart()
    }

    /// Whether a keyframe was ever found outside the first packet of its
    /// payload unit.
    pub fn saw_streamid_outside_first_packet(&self) -> bool {
        self.streamid_not_in_first_packet
    }

    // ========== Configuration ==========

    /// Set a named option: `wait_for_seqstart` or `pkt_buf_size`.
    pub fn set_option(&mut self, name: &str, value: i64) -> Result<(), RecorderError> {
        match RecorderOption::parse(name)? {
            RecorderOption::WaitForSeqstart => {
                self.set_wait_for_seqstart(value == 1);
                Ok(())
            }
            RecorderOption::PktBufSize => {
                self.resize_buffer(usize::try_from(value).unwrap_or(0))?;
                Ok(())
            }
        }
    }

    pub fn set_wait_for_seqstart(&mut self, value: bool) {
        self.classifier.set_wait_for_seqstart(value);
    }

    /// Resize the packet buffer. Refused while recording, since a capture
    /// thread may be reading into it. Returns the normalized size.
    pub fn resize_buffer(&mut self, requested: usize) -> Result<usize, RecorderError> {
        if self.shared.is_recording() {
            error!(
                recorder = %self.shared.name,
                requested,
                "Attempt made to resize packet buffer while recording"
            );
            return Err(RecorderError::Configuration {
                reason: "cannot resize packet buffer while recording".to_owned(),
            });
        }

        match self.buffer.resize(requested) {
            Ok(size) => {
                debug!(recorder = %self.shared.name, requested, size, "Resized packet buffer");
                Ok(size)
            }
            Err(e) => {
                error!(recorder = %self.shared.name, error = %e, "Could not allocate new packet buffer");
                Err(e)
            }
        }
    }

    // ========== Scanning ==========

    /// Scan one transport packet for start codes, updating frame counters and
    /// indexing the keyframe if the packet holds one.
    pub fn scan(&mut self, packet: &TsPacket) -> ScanOutcome {
        if !packet.has_payload() {
            return ScanOutcome::default();
        }

        // If the packet starts a new payload unit, look for a fresh start code,
        // otherwise pick up where the previous packet left off.
        let payload_start = packet.payload_start();
        if payload_start {
            self.scan_state.reset();
        }

        //   byte 0  byte 1  byte 2  byte 3
        //   0x00    0x00    0x01    stream_id
        let payload = &packet.data()[packet.payload_offset()..];
        let mut has_keyframe = false;
        for &byte in payload {
            if let Some(stream_id) = self.scan_state.advance(byte) {
                has_keyframe |= self.classifier.observe(StartCode::from_stream_id(stream_id));
            }
        }

        if !has_keyframe {
            return ScanOutcome::default();
        }

        let outcome = self.handle_keyframe();

        if !payload_start && !self.streamid_not_in_first_packet {
            // Handling this properly means holding back every packet after the
            // payload unit start until the stream id is known, and only then
            // writing them out and handling the keyframe.
            warn!(
                recorder = %self.shared.name,
                pid = packet.pid,
                "Keyframe stream_id not in first TS packet. This is not an error, \
                 but seeking near this keyframe may be imprecise"
            );
            self.streamid_not_in_first_packet = true;
        }

        outcome
    }

    /// File the current frame in the position map and report whether a
    /// segment switch can happen here.
    fn handle_keyframe(&mut self) -> ScanOutcome {
        let frame = self.classifier.mark_keyframe();

        let active = self.shared.active();
        let inserted = self.shared.index.insert_with(frame, || {
            active.sink.as_ref().map_or(0, |sink| sink.write_position())
        });
        if inserted {
            self.shared.save_logged(false);
        }

        ScanOutcome {
            keyframe: Some(frame),
            switch_ready: self.shared.has_pending(),
        }
    }

    /// Scan the first `len` bytes of the packet buffer, resynchronising on the
    /// sync byte where needed. A trailing partial packet is left unconsumed.
    pub fn scan_buffer(&mut self, len: usize) -> BufferScan {
        let len = len.min(self.buffer.len());
        let mut remaining = Bytes::copy_from_slice(&self.buffer.as_slice()[..len]);
        let mut summary = BufferScan::default();

        while remaining.len() >= TS_PACKET_SIZE {
            if remaining[0] != SYNC_BYTE {
                let skip = memchr(SYNC_BYTE, &remaining).unwrap_or(remaining.len());
                summary.skipped_bytes += skip;
                remaining.advance(skip);
                continue;
            }

            match TsPacket::parse(remaining.slice(..TS_PACKET_SIZE)) {
                Ok(packet) => {
                    let outcome = self.scan(&packet);
                    summary.packets += 1;
                    if let Some(frame) = outcome.keyframe {
                        summary.keyframes += 1;
                        if outcome.switch_ready && summary.switch_ready_at.is_none() {
                            summary.switch_ready_at = Some(frame);
                        }
                    }
                    remaining.advance(TS_PACKET_SIZE);
                }
                Err(e) => {
                    debug!(recorder = %self.shared.name, error = %e, "Skipping invalid packet");
                    summary.skipped_bytes += 1;
                    remaining.advance(1);
                }
            }
        }

        summary.consumed = len - remaining.len();
        summary
    }

    // ========== Segment lifecycle ==========

    /// Start writing to a new destination: resets per-segment state and marks
    /// the recorder as recording.
    pub fn begin_segment(
        &mut self,
        store: Option<Arc<dyn RecordingStore>>,
        sink: Arc<dyn OutputSink>,
    ) {
        info!(
            recorder = %self.shared.name,
            has_store = store.is_some(),
            write_position = sink.write_position(),
            "Beginning segment"
        );
        self.shared.set_active(ActiveSegment {
            store,
            sink: Some(sink),
        });
        self.reset_for_new_segment();
        self.shared.set_recording(true);
    }

    /// Clear scan state, frame counters and the position index.
    pub fn reset_for_new_segment(&mut self) {
        debug!(recorder = %self.shared.name, "Resetting for new segment");
        self.scan_state.reset();
        self.classifier.reset();
        self.shared.index.clear();
    }

    /// Flush the sink, store the final size and remaining index entries, and
    /// drop the in-memory index.
    pub fn finish(&mut self) {
        let active = self.shared.active();
        self.shared.flush_sink();

        if let (Some(store), Some(sink)) = (&active.store, &active.sink)
            && let Err(e) = store.set_file_size(sink.file_size())
        {
            warn!(recorder = %self.shared.name, error = %e, "Failed to record final file size");
        }
        self.shared.save_logged(true);

        info!(
            recorder = %self.shared.name,
            frames_seen = self.counters().frames_seen,
            frames_written = self.counters().frames_written,
            keyframes = self.shared.index.len(),
            "Finished segment"
        );
        self.shared.index.clear();
        self.shared.set_recording(false);
    }

    /// Queue the next destination; see [`RecorderHandle::prepare_next`].
    pub fn prepare_next(
        &self,
        store: Option<Arc<dyn RecordingStore>>,
        sink: Option<Arc<dyn OutputSink>>,
    ) {
        self.handle().prepare_next(store, sink);
    }

    pub fn has_pending(&self) -> bool {
        self.shared.has_pending()
    }

    /// Take the pending segment so the caller can promote it.
    pub fn take_pending(&self) -> Option<PendingSegment> {
        self.shared.take_pending()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.streamid_not_in_first_packet {
            warn!(
                recorder = %self.shared.name,
                "Saw keyframe stream_id which was not in first TS packet"
            );
        }
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("name", &self.shared.name)
            .field("counters", self.classifier.counters())
            .field("scan_state", &self.scan_state)
            .field("buffer_size", &self.buffer.len())
            .field("recording", &self.shared.is_recording())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MIN_BUFFER_SIZE;
    use crate::classifier::FirstKeyframe;
    use crate::test_utils::{
        MemorySink, MemoryStore, VIDEO_PID, gop_packet, init_tracing, packet, packet_bytes,
        picture_packet, sequence_gop_packet,
    };
    use ts::TsPacketBuilder;

    fn recorder() -> Recorder {
        init_tracing();
        Recorder::new(
            RecorderConfig::default()
                .with_name("test")
                .with_wait_for_seqstart(false),
        )
        .unwrap()
    }

    fn recording() -> (Recorder, Arc<MemoryStore>, Arc<MemorySink>) {
        let mut recorder = recorder();
        let store = Arc::new(MemoryStore::default());
        let sink = Arc::new(MemorySink::default());
        recorder.begin_segment(Some(store.clone()), sink.clone());
        (recorder, store, sink)
    }

    /// Feed one GOP packet followed by `pictures` plain picture packets,
    /// advancing the sink as if each packet had been written.
    fn feed_gop(recorder: &mut Recorder, sink: &MemorySink, pictures: usize) -> ScanOutcome {
        let outcome = recorder.scan(&gop_packet());
        sink.advance(TS_PACKET_SIZE as u64);
        for _ in 0..pictures {
            recorder.scan(&picture_packet());
            sink.advance(TS_PACKET_SIZE as u64);
        }
        outcome
    }

    #[test]
    fn test_packet_without_payload_is_ignored() {
        let mut recorder = recorder();
        let packet = TsPacketBuilder::new(VIDEO_PID)
            .payload_start(true)
            .without_payload()
            .build()
            .unwrap();
        assert_eq!(recorder.scan(&packet), ScanOutcome::default());
        assert_eq!(recorder.counters(), &FrameCounters::default());
    }

    #[test]
    fn test_fallback_keyframes_on_picture_only_stream() {
        let (mut recorder, _store, _sink) = recording();

        let mut keyframe_pictures = Vec::new();
        for picture in 1..=100u64 {
            if recorder.scan(&picture_packet()).keyframe.is_some() {
                keyframe_pictures.push(picture);
            }
        }

        assert_eq!(keyframe_pictures.first(), Some(&16));
        for window_start in 1..=(100 - 32 + 1) {
            let window = window_start..window_start + 32;
            assert!(
                keyframe_pictures.iter().any(|p| window.contains(p)),
                "no keyframe in pictures {window:?}"
            );
        }
        assert_eq!(recorder.counters().frames_seen, 100);
        assert_eq!(recorder.counters().first_keyframe, FirstKeyframe::Deferred);
        // Pictures after the 16th are written
        assert_eq!(recorder.counters().frames_written, 84);
        assert_eq!(recorder.get_keyframe_position(0), Some(0));
        assert_eq!(recorder.get_keyframe_position(15), Some(0));
    }

    #[test]
    fn test_sequence_header_right_after_gop_is_suppressed() {
        let (mut recorder, _store, sink) = recording();
        for _ in 0..10 {
            recorder.scan(&picture_packet());
        }

        let outcome = feed_gop(&mut recorder, &sink, 4);
        assert!(outcome.keyframe.is_some());
        assert_eq!(recorder.counters().last_gop_frame, Some(10));

        let sequence_only = packet(true, &[0x00, 0x00, 0x01, 0xB3, 0x2D, 0x01, 0xE0]);
        assert_eq!(recorder.scan(&sequence_only).keyframe, None);
        assert_eq!(recorder.counters().last_seq_frame, Some(15));
    }

    #[test]
    fn test_one_keyframe_per_packet() {
        let (mut recorder, _store, _sink) = recording();
        recorder.scan(&picture_packet());

        // Sequence header and GOP both qualify, but the packet is handled once
        let outcome = recorder.scan(&sequence_gop_packet());
        assert_eq!(outcome.keyframe, Some(0));
        assert_eq!(recorder.position_index().len(), 1);
        assert_eq!(recorder.counters().frames_seen, 2);
        assert_eq!(recorder.counters().last_keyframe_frame, Some(2));
    }

    #[test]
    fn test_wait_for_seqstart_ignores_leading_gop() {
        let mut recorder = Recorder::new(RecorderConfig::default()).unwrap();
        assert!(recorder.wait_for_seqstart());

        recorder.scan(&picture_packet());
        assert_eq!(recorder.scan(&gop_packet()).keyframe, None);
        assert!(recorder.scan(&sequence_gop_packet()).keyframe.is_some());
        assert!(recorder.scan(&gop_packet()).keyframe.is_some());

        recorder.set_option("wait_for_seqstart", 0).unwrap();
        assert!(!recorder.wait_for_seqstart());
    }

    #[test]
    fn test_start_code_spanning_packets() {
        let (mut recorder, _store, _sink) = recording();
        recorder.scan(&picture_packet());

        let mut head = vec![0xFF; 184 - 2];
        head.extend_from_slice(&[0x00, 0x00]);
        recorder.scan(&packet(true, &head));
        assert_eq!(recorder.scan_state(), ScanState::TwoZeros);

        let outcome = recorder.scan(&packet(false, &[0x01, 0xB8, 0x08, 0x00]));
        assert!(outcome.keyframe.is_some());
        assert!(recorder.saw_streamid_outside_first_packet());
    }

    #[test]
    fn test_stream_id_in_next_packet() {
        let (mut recorder, _store, _sink) = recording();

        let mut head = vec![0xFF; 184 - 3];
        head.extend_from_slice(&[0x00, 0x00, 0x01]);
        recorder.scan(&packet(true, &head));
        assert_eq!(recorder.scan_state(), ScanState::AwaitingStreamId);
        assert_eq!(recorder.counters().frames_seen, 0);

        recorder.scan(&packet(false, &[0x00, 0x12, 0x34]));
        assert_eq!(recorder.counters().frames_seen, 1);
        assert_eq!(recorder.scan_state(), ScanState::NoMatch);

        recorder.scan(&packet(true, &head));
        let outcome = recorder.scan(&packet(false, &[0xB8, 0x08, 0x00]));
        assert!(outcome.keyframe.is_some());
        assert_eq!(recorder.counters().last_gop_frame, Some(1));
    }

    #[test]
    fn test_payload_start_discards_partial_match() {
        let (mut recorder, _store, _sink) = recording();

        let mut head = vec![0xFF; 184 - 2];
        head.extend_from_slice(&[0x00, 0x00]);
        recorder.scan(&packet(true, &head));

        let outcome = recorder.scan(&packet(true, &[0x01, 0xB8, 0x08, 0x00]));
        assert_eq!(outcome.keyframe, None);
        assert!(!recorder.saw_streamid_outside_first_packet());
    }

    #[test]
    fn test_streamid_outside_first_packet_reported_once() {
        let (mut recorder, _store, _sink) = recording();
        let continuation = packet(false, &[0x00, 0x00, 0x01, 0xB8, 0x08, 0x00]);

        assert!(recorder.scan(&continuation).keyframe.is_some());
        assert!(recorder.saw_streamid_outside_first_packet());
        assert!(recorder.scan(&continuation).keyframe.is_some());
        assert!(recorder.saw_streamid_outside_first_packet());

        // Sticky for the lifetime of the recorder, not the segment
        recorder.reset_for_new_segment();
        assert!(recorder.saw_streamid_outside_first_packet());
    }

    #[test]
    fn test_persistence_cadence_over_40_keyframes() {
        let (mut recorder, store, sink) = recording();

        for _ in 0..40 {
            let outcome = feed_gop(&mut recorder, &sink, 14);
            assert!(outcome.keyframe.is_some());
            let map = recorder.position_index().snapshot();
            for (frame, offset) in recorder.position_index().unsaved_snapshot() {
                assert_eq!(map.get(&frame), Some(&offset));
            }
        }

        assert_eq!(recorder.position_index().len(), 40);
        assert_eq!(store.delta_sizes(), vec![1, 5, 5, 5, 5, 5]);
        assert_eq!(recorder.position_index().unsaved_len(), 14);
    }

    #[test]
    fn test_keyframe_offsets_come_from_sink() {
        let (mut recorder, _store, sink) = recording();

        feed_gop(&mut recorder, &sink, 14);
        feed_gop(&mut recorder, &sink, 14);

        assert_eq!(recorder.get_keyframe_position(0), Some(0));
        assert_eq!(recorder.get_keyframe_position(14), Some(15 * 188));
        assert_eq!(recorder.get_keyframe_position(7), None);
        assert_eq!(recorder.handle().keyframe_at_or_before(7), Some((0, 0)));
    }

    #[test]
    fn test_get_unchanged_by_flush() {
        let (mut recorder, _store, sink) = recording();
        feed_gop(&mut recorder, &sink, 14);
        feed_gop(&mut recorder, &sink, 14);
        assert_eq!(recorder.position_index().unsaved_len(), 1);

        let before = recorder.get_keyframe_position(14);
        assert_eq!(
            recorder.handle().save_position_map(true).unwrap(),
            crate::SaveOutcome::Flushed(1)
        );
        assert_eq!(recorder.get_keyframe_position(14), before);
    }

    #[test]
    fn test_reset_for_new_segment() {
        let (mut recorder, _store, sink) = recording();
        feed_gop(&mut recorder, &sink, 20);
        let mut partial = vec![0xFF; 184 - 2];
        partial.extend_from_slice(&[0x00, 0x00]);
        recorder.scan(&packet(true, &partial));
        assert_eq!(recorder.scan_state(), ScanState::TwoZeros);

        recorder.reset_for_new_segment();
        assert_eq!(recorder.counters(), &FrameCounters::default());
        assert_eq!(recorder.scan_state(), ScanState::NoMatch);
        assert!(recorder.position_index().is_empty());
        assert_eq!(recorder.position_index().unsaved_len(), 0);

        recorder.scan(&picture_packet());
        assert_eq!(recorder.counters().frames_seen, 1);
        assert!(feed_gop(&mut recorder, &sink, 0).keyframe.is_some());
        assert_eq!(recorder.position_index().len(), 1);
    }

    #[test]
    fn test_resize_buffer_when_idle() {
        let mut recorder = recorder();
        recorder.set_option("pkt_buf_size", 500).unwrap();
        assert_eq!(recorder.buffer().len(), MIN_BUFFER_SIZE);
        assert_eq!(recorder.buffer().len() % TS_PACKET_SIZE, 0);

        recorder.set_option("pkt_buf_size", 188 * 200 + 100).unwrap();
        assert_eq!(recorder.buffer().len(), 188 * 200);

        recorder.set_option("pkt_buf_size", -1).unwrap();
        assert_eq!(recorder.buffer().len(), MIN_BUFFER_SIZE);
    }

    #[test]
    fn test_resize_buffer_rejected_while_recording() {
        let (mut recorder, _store, _sink) = recording();
        let before = recorder.buffer().len();

        let err = recorder.set_option("pkt_buf_size", 500).unwrap_err();
        assert!(matches!(err, RecorderError::Configuration { .. }));
        assert_eq!(recorder.buffer().len(), before);

        recorder.finish();
        assert!(!recorder.is_recording());
        assert!(recorder.resize_buffer(188 * 64).is_ok());
    }

    #[test]
    fn test_unknown_option() {
        let mut recorder = recorder();
        assert!(matches!(
            recorder.set_option("videodevice", 1),
            Err(RecorderError::UnknownOption { .. })
        ));
    }

    #[test]
    fn test_finish_persists_and_clears() {
        let (mut recorder, store, sink) = recording();
        for _ in 0..3 {
            feed_gop(&mut recorder, &sink, 14);
        }
        assert_eq!(recorder.position_index().unsaved_len(), 2);

        recorder.finish();

        assert_eq!(sink.flush_count(), 1);
        assert_eq!(store.persisted().len(), 3);
        assert_eq!(store.last_size(), Some(sink.write_position()));
        assert!(recorder.position_index().is_empty());
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_segment_switch_at_keyframe() {
        let (mut recorder, first_store, first_sink) = recording();
        feed_gop(&mut recorder, &first_sink, 14);

        let next_store = Arc::new(MemoryStore::default());
        let next_sink = Arc::new(MemorySink::default());
        recorder
            .handle()
            .prepare_next(Some(next_store.clone()), Some(next_sink.clone()));
        assert_eq!(first_sink.flush_count(), 1);

        // Pictures alone are not a switch point
        assert!(!recorder.scan(&picture_packet()).switch_ready);

        let outcome = feed_gop(&mut recorder, &first_sink, 0);
        assert!(outcome.switch_ready);

        recorder.finish();
        let pending = recorder.take_pending().unwrap();
        recorder.begin_segment(pending.store, pending.sink);

        assert_eq!(first_store.persisted().len(), 2);
        assert!(!recorder.has_pending());
        assert!(recorder.is_recording());
        assert_eq!(recorder.counters().frames_seen, 0);

        next_sink.advance(1_000);
        let outcome = feed_gop(&mut recorder, &next_sink, 0);
        assert_eq!(
            outcome,
            ScanOutcome {
                keyframe: Some(0),
                switch_ready: false
            }
        );
        assert_eq!(next_store.persisted().get(&0), Some(&1_000));
    }

    #[test]
    fn test_seek_queries_during_capture() {
        let (mut recorder, _store, sink) = recording();
        let handle = recorder.handle();

        std::thread::scope(|scope| {
            let reader = scope.spawn(move || {
                let mut hits = 0usize;
                for _ in 0..10_000 {
                    if let Some(offset) = handle.get_keyframe_position(0) {
                        assert_eq!(offset, 0);
                        hits += 1;
                    }
                    let index = handle.position_index();
                    let map = index.snapshot();
                    assert!(map.keys().zip(map.keys().skip(1)).all(|(a, b)| a < b));
                }
                hits
            });

            for _ in 0..50 {
                feed_gop(&mut recorder, &sink, 14);
            }
            reader.join().unwrap();
        });

        assert_eq!(recorder.position_index().len(), 50);
    }

    #[test]
    fn test_scan_buffer_resyncs_and_keeps_partial_packet() {
        let mut recorder = recorder();
        let garbage = [0x12u8, 0x34, 0x56];
        let mut raw = Vec::new();
        raw.extend_from_slice(&garbage);
        raw.extend_from_slice(&packet_bytes(true, &[0x00, 0x00, 0x01, 0xB3, 0x00]));
        raw.extend_from_slice(&packet_bytes(true, &[0x00, 0x00, 0x01, 0x00, 0x00]));
        raw.extend_from_slice(&packet_bytes(true, &[0x00, 0x00, 0x01, 0x00, 0x00])[..100]);

        recorder.buffer_mut().as_mut_slice()[..raw.len()].copy_from_slice(&raw);
        let summary = recorder.scan_buffer(raw.len());

        assert_eq!(summary.packets, 2);
        assert_eq!(summary.keyframes, 1);
        assert_eq!(summary.skipped_bytes, garbage.len());
        assert_eq!(summary.consumed, garbage.len() + 2 * TS_PACKET_SIZE);
        assert_eq!(recorder.counters().frames_seen, 1);
    }
}
