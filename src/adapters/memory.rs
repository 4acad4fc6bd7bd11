//! In-memory sample source
//!
//! Serves an `AudioBuffer` in caller-sized reads. Used to drive the streaming
//! decoder from a fully loaded recording, and by tests to check that chunked
//! decoding matches whole-buffer decoding.

use crate::domain::{AudioBuffer, AudioSample, RttyResult};
use crate::ports::SampleSource;

pub struct MemorySource {
    buffer: AudioBuffer,
    position: usize,
}

impl MemorySource {
    pub fn new(buffer: AudioBuffer) -> Self {
        Self { buffer, position: 0 }
    }

    /// Samples not yet read
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Start reading from the beginning again
    pub fn rewind(&mut self) {
        self.position = 0;
    }
}

impl SampleSource for MemorySource {
    fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate()
    }

    fn read(&mut self, buf: &mut [AudioSample]) -> RttyResult<usize> {
        let n = buf.len().min(self.remaining());
        let end = self.position + n;
        buf[..n].copy_from_slice(&self.buffer.samples()[self.position..end]);
        self.position = end;
        Ok(n)
    }
}
