//! Recorder configuration and named scalar options.

use std::str::FromStr;

use crate::buffer::MIN_BUFFER_SIZE;
use crate::classifier::{DEFAULT_MAX_KEYFRAME_DISTANCE, DEFAULT_WAIT_FOR_SEQSTART};
use crate::error::RecorderError;

/// Options that can be set by name, e.g. from a capture card profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum RecorderOption {
    /// `1` to ignore GOP start codes until a sequence header has been seen
    WaitForSeqstart,
    /// Packet scratch buffer size in bytes
    PktBufSize,
}

impl RecorderOption {
    pub fn parse(name: &str) -> Result<Self, RecorderError> {
        Self::from_str(name).map_err(|_| RecorderError::UnknownOption {
            name: name.to_owned(),
        })
    }
}

/// Initial recorder settings.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Label used in log output
    pub name: String,
    /// Ignore GOP start codes until a sequence header has been seen
    pub wait_for_seqstart: bool,
    /// Requested packet buffer size in bytes (normalized on allocation)
    pub packet_buffer_size: usize,
    /// Pictures after which GOP/sequence markers are considered stale
    pub max_keyframe_distance: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            name: "recorder".to_owned(),
            wait_for_seqstart: DEFAULT_WAIT_FOR_SEQSTART,
            packet_buffer_size: MIN_BUFFER_SIZE,
            max_keyframe_distance: DEFAULT_MAX_KEYFRAME_DISTANCE,
        }
    }
}

impl RecorderConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_wait_for_seqstart(mut self, value: bool) -> Self {
        self.wait_for_seqstart = value;
        self
    }

    pub fn with_packet_buffer_size(mut self, size: usize) -> Self {
        self.packet_buffer_size = size;
        self
    }

    pub fn with_max_keyframe_distance(mut self, distance: u64) -> Self {
        self.max_keyframe_distance = distance;
        self
    }
}
