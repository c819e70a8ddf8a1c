//! Bounded command buffer
//!
//! Commands and responses share one fixed capacity. The last byte is the
//! terminator slot, so at most `capacity - 1` payload bytes are ever kept.
//! Longer payloads are truncated, never rejected. The region is zero-filled
//! before every use so stale bytes never reach the next exchange.

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CommandBuffer {
    data: Vec<u8>,
    len: usize,
}

impl CommandBuffer {
    /// Create a buffer of `capacity` bytes (terminator slot included)
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity.max(1)],
            len: 0,
        }
    }

    /// Largest payload the buffer keeps
    pub fn max_payload(&self) -> usize {
        self.data.len() - 1
    }

    /// Zero the whole region
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.len = 0;
    }

    /// Copy `payload` in, truncating to [`max_payload`](Self::max_payload)
    pub fn load(&mut self, payload: &[u8]) -> &[u8] {
        self.clear();
        let keep = payload.len().min(self.max_payload());
        if keep < payload.len() {
            log::warn!(
                "Payload of {} bytes truncated to {} bytes",
                payload.len(),
                keep
            );
        }
        self.data[..keep].copy_from_slice(&payload[..keep]);
        self.len = keep;
        self.as_bytes()
    }

    /// Zero the region and let `fill` write up to `max_payload` bytes into it
    ///
    /// `fill` returns how many bytes it wrote; that becomes the payload length.
    pub fn read_with<F>(&mut self, fill: F) -> Result<usize>
    where
        F: FnOnce(&mut [u8]) -> Result<usize>,
    {
        self.clear();
        let max = self.max_payload();
        let n = fill(&mut self.data[..max])?.min(max);
        self.len = n;
        Ok(n)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
