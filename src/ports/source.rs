//! Audio source port

use crate::domain::{AudioSample, RttyResult};

/// A pull-based stream of mono audio, normalized to [-1, 1]
pub trait SampleSource {
    /// Samples per second of the stream
    fn sample_rate(&self) -> u32;

    /// Fill `buf` with the next samples and return how many were written.
    ///
    /// Returns `Ok(0)` at end of stream.
    fn read(&mut self, buf: &mut [AudioSample]) -> RttyResult<usize>;
}
