//! Fixed-timing bit slicer
//!
//! Fallback for segments too short or ragged for the PLL to lock. Scans the
//! correlation stream for a start bit (value below `-threshold` sustained
//! for half a bit), then samples every bit of the frame at offsets derived
//! only from the baud rate. Each sample is the mean over a quarter bit
//! either side of the nominal centre.

use std::collections::VecDeque;

use crate::domain::{BitDecision, CorrelationSample};

/// Bits in one frame including start and one stop bit
const FRAME_BITS: usize = 7;

/// Streaming fixed-offset slicer
pub struct FixedTimingSlicer {
    blocks_per_bit: f64,
    threshold: f32,
    buffer: VecDeque<f32>,
    /// Correlation index of `buffer[0]`
    base: u64,
    false_starts: u64,
}

impl FixedTimingSlicer {
    pub fn new(blocks_per_bit: f64, threshold: f32) -> Self {
        Self {
            blocks_per_bit,
            threshold,
            buffer: VecDeque::new(),
            base: 0,
            false_starts: 0,
        }
    }

    /// Consume one correlation sample, appending any completed frame's
    /// decisions (start, five data bits, stop) to `out`
    pub fn process_into(&mut self, sample: &CorrelationSample, out: &mut Vec<BitDecision>) {
        if self.buffer.is_empty() {
            self.base = sample.index;
        }
        self.buffer.push_back(sample.value);

        loop {
            while self.buffer.front().is_some_and(|&v| v >= -self.threshold) {
                self.advance(1);
            }
            let half = self.half_bit();
            if self.buffer.len() < half {
                return;
            }
            if self.mean(0, half) >= -self.threshold {
                self.false_start();
                continue;
            }
            if self.buffer.len() < self.frame_span() {
                return;
            }
            // Re-verify at the start-bit centre before trusting the frame
            if self.sample_at(self.blocks_per_bit * 0.5) >= 0.0 {
                self.false_start();
                continue;
            }
            self.emit_frame(out);
            // Resume at the stop-bit centre so 1, 1.5 and 2 stop bits all work
            let resume = (self.blocks_per_bit * (FRAME_BITS as f64 - 0.5)).floor() as usize + 1;
            self.advance(resume.min(self.buffer.len()));
        }
    }

    fn false_start(&mut self) {
        log::trace!("fixed timing: false start at {}", self.base);
        self.false_starts += 1;
        self.advance(1);
    }

    fn half_bit(&self) -> usize {
        ((self.blocks_per_bit * 0.5).round() as usize).max(1)
    }

    /// Samples needed past the start edge to evaluate a whole frame
    fn frame_span(&self) -> usize {
        (self.blocks_per_bit * FRAME_BITS as f64).ceil() as usize + 1
    }

    fn half_window(&self) -> usize {
        ((self.blocks_per_bit * 0.25).floor() as usize).max(1)
    }

    /// Mean over `[from, to)`, clipped to the buffer
    fn mean(&self, from: usize, to: usize) -> f32 {
        let to = to.min(self.buffer.len());
        if from >= to {
            return 0.0;
        }
        let sum: f32 = self.buffer.range(from..to).sum();
        sum / (to - from) as f32
    }

    /// Mean around the nominal centre `offset` (in correlation samples)
    fn sample_at(&self, offset: f64) -> f32 {
        let centre = offset.round() as usize;
        let w = self.half_window();
        self.mean(centre.saturating_sub(w), centre + w + 1)
    }

    fn emit_frame(&self, out: &mut Vec<BitDecision>) {
        for bit in 0..FRAME_BITS {
            let offset = self.blocks_per_bit * (bit as f64 + 0.5);
            let v = self.sample_at(offset);
            out.push(BitDecision {
                position: self.base as f64 + offset,
                value: u8::from(v > 0.0),
                confidence: v.abs(),
            });
        }
    }

    fn advance(&mut self, n: usize) {
        self.buffer.drain(..n);
        self.base += n as u64;
    }

    /// A qualifying start bit is buffered but its frame is not complete
    pub fn pending_frame(&self) -> bool {
        match self.buffer.front() {
            Some(&v) if v < -self.threshold => {
                let half = self.half_bit();
                self.buffer.len() < half || self.mean(0, half) < -self.threshold
            }
            _ => false,
        }
    }

    pub fn false_starts(&self) -> u64 {
        self.false_starts
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.base = 0;
        self.false_starts = 0;
    }
}
