//! Dual-tone correlator
//!
//! Turns raw audio into a mark/space confidence stream. Each block of
//! `block_size` samples yields one `CorrelationSample` whose value is
//! `(P_mark − P_space) / (P_mark + P_space)`: +1 when all energy sits on
//! the mark tone, −1 when it all sits on the space tone.
//!
//! The correlator is streaming: samples may arrive in arbitrary chunks and
//! the block cursor carries over between `process` calls. Blocks may overlap
//! (`hop_size < block_size`); the trailing window lives in a ring buffer.

use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

use super::goertzel::Goertzel;
use crate::domain::{AudioSample, CorrelationSample, FskParameters};

/// Combined power below which a block is treated as silence (value 0)
const SILENCE_EPSILON: f64 = 1e-10;

/// Smallest block the default derivation will choose
const MIN_BLOCK_SIZE: usize = 32;

/// Default block length: long enough to resolve one cycle of the shift.
///
/// With `N ≥ sr / shift` the two tones land in different Goertzel bins.
pub fn default_block_size(params: &FskParameters, sample_rate: u32) -> usize {
    let cycles = (sample_rate as f64 / params.shift_hz()).ceil() as usize;
    cycles.max(MIN_BLOCK_SIZE)
}

/// Default hop: half a block, doubling the timing resolution of the stream
pub fn default_hop_size(block_size: usize) -> usize {
    (block_size / 2).max(1)
}

/// Streaming mark/space correlator
pub struct ToneCorrelator {
    mark: Goertzel,
    space: Goertzel,
    invert: bool,
    block_size: usize,
    hop_size: usize,
    window: HeapRb<AudioSample>,
    /// Samples pushed since the last emitted block
    pending: usize,
    next_index: u64,
    last_magnitude: f32,
}

impl ToneCorrelator {
    /// Create a correlator for `params` at `sample_rate`.
    ///
    /// `hop_size` is clamped to `1..=block_size`.
    pub fn new(params: &FskParameters, sample_rate: u32, block_size: usize, hop_size: usize) -> Self {
        let block_size = block_size.max(1);
        let sr = sample_rate as f64;
        Self {
            mark: Goertzel::for_bin(params.mark_hz, sr, block_size),
            space: Goertzel::for_bin(params.space_hz, sr, block_size),
            invert: params.invert_polarity,
            block_size,
            hop_size: hop_size.clamp(1, block_size),
            window: HeapRb::new(block_size),
            pending: 0,
            next_index: 0,
            last_magnitude: 0.0,
        }
    }

    /// Correlator with the default block and hop derivation
    pub fn with_defaults(params: &FskParameters, sample_rate: u32) -> Self {
        let block_size = default_block_size(params, sample_rate);
        Self::new(params, sample_rate, block_size, default_hop_size(block_size))
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Magnitude of the most recent block
    pub fn last_magnitude(&self) -> f32 {
        self.last_magnitude
    }

    /// Feed a chunk of audio, appending one sample per completed block to `out`
    pub fn process_into(&mut self, samples: &[AudioSample], out: &mut Vec<CorrelationSample>) {
        for &sample in samples {
            self.window.push_overwrite(sample);
            self.pending += 1;
            if self.window.is_full() && self.pending >= self.hop_size {
                self.pending = 0;
                out.push(self.correlate_window());
            }
        }
    }

    /// Feed a chunk of audio and return the blocks it completed
    pub fn process(&mut self, samples: &[AudioSample]) -> Vec<CorrelationSample> {
        let mut out = Vec::with_capacity(samples.len() / self.hop_size + 1);
        self.process_into(samples, &mut out);
        out
    }

    fn correlate_window(&mut self) -> CorrelationSample {
        let (head, tail) = self.window.as_slices();
        let mark_power = self.mark.power(head.iter().chain(tail).copied());
        let space_power = self.space.power(head.iter().chain(tail).copied());

        let total = mark_power + space_power;
        let mut value = if total > SILENCE_EPSILON {
            ((mark_power - space_power) / total) as f32
        } else {
            0.0
        };
        if self.invert {
            value = -value;
        }

        let index = self.next_index;
        self.next_index += 1;
        self.last_magnitude = total as f32;

        CorrelationSample {
            index,
            value,
            magnitude: total as f32,
        }
    }

    /// Drop buffered audio and restart block numbering
    pub fn reset(&mut self) {
        self.window.clear();
        self.pending = 0;
        self.next_index = 0;
        self.last_magnitude = 0.0;
    }
}

/// Correlate a whole buffer in one call
pub fn correlate(
    samples: &[AudioSample],
    sample_rate: u32,
    params: &FskParameters,
    block_size: usize,
    hop_size: usize,
) -> Vec<CorrelationSample> {
    ToneCorrelator::new(params, sample_rate, block_size, hop_size).process(samples)
}
