//! Scratch buffer that capture drivers read raw transport packets into.

use ts::TS_PACKET_SIZE;

use crate::error::RecorderError;

/// The buffer never holds fewer than this many packets.
pub const MIN_BUFFER_PACKETS: usize = 50;

/// Smallest accepted buffer size in bytes.
pub const MIN_BUFFER_SIZE: usize = MIN_BUFFER_PACKETS * TS_PACKET_SIZE;

/// Fill value for bytes that have never been written.
pub const PAD_BYTE: u8 = 0xFF;

/// Round a requested size down to whole packets, but never below
/// [`MIN_BUFFER_SIZE`].
pub fn normalize_buffer_size(requested: usize) -> usize {
    (requested - requested % TS_PACKET_SIZE).max(MIN_BUFFER_SIZE)
}

/// Owned packet buffer whose length is always a whole number of packets.
#[derive(Debug, Clone, Default)]
pub struct PacketBuffer {
    data: Vec<u8>,
}

impl PacketBuffer {
    pub fn with_size(requested: usize) -> Result<Self, RecorderError> {
        let mut buffer = Self::default();
        buffer.resize(requested)?;
        Ok(buffer)
    }

    /// Reallocate to `requested` bytes (normalized). Existing contents are kept
    /// up to the smaller of the two sizes and new bytes are padded. On
    /// allocation failure the current buffer is left untouched.
    pub fn resize(&mut self, requested: usize) -> Result<usize, RecorderError> {
        let size = normalize_buffer_size(requested);

        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| RecorderError::Allocation { requested: size })?;

        let keep = self.data.len().min(size);
        data.extend_from_slice(&self.data[..keep]);
        data.resize(size, PAD_BYTE);

        self.data = data;
        Ok(size)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Capacity in whole packets
    pub fn packet_capacity(&self) -> usize {
        self.data.len() / TS_PACKET_SIZE
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
