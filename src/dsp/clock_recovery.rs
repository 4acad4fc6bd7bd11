//! Bit clock recovery
//!
//! First-order PLL over the correlation stream. The phase accumulator
//! advances by `1 / blocks_per_bit` per correlation sample; a decision is
//! taken each time it wraps past 1.0, so phase 0 is the bit centre and 0.5
//! is the bit boundary. Transitions (hysteresis-qualified sign changes) pull
//! the phase at the interpolated zero crossing toward 0.5.

use crate::domain::{BitDecision, CorrelationSample};

/// Bits without a transition after which the loop is considered unlocked
const LOCK_TIMEOUT_BITS: u32 = 32;

/// Correlation samples per bit period
pub fn blocks_per_bit(sample_rate: u32, baud_rate: f64, hop_size: usize) -> f64 {
    sample_rate as f64 / baud_rate / hop_size as f64
}

/// Wrap a phase difference into [-0.5, 0.5)
fn wrap_error(e: f64) -> f64 {
    e - (e + 0.5).floor()
}

/// PLL-tracked bit clock
pub struct BitClock {
    increment: f64,
    phase: f64,
    gain: f64,
    threshold: f32,
    /// Hysteresis level: +1 mark, -1 space, 0 not yet seen
    level: i8,
    previous: Option<(u64, f32)>,
    /// Fractional index of the most recent raw zero crossing
    last_crossing: Option<f64>,
    locked: bool,
    bits_since_transition: u32,
    start_sync: bool,
}

impl BitClock {
    /// `gain`: fraction of the measured phase error removed per transition.
    /// `threshold`: hysteresis half-width a value must exceed to change level.
    pub fn new(blocks_per_bit: f64, gain: f64, threshold: f32) -> Self {
        Self {
            increment: 1.0 / blocks_per_bit,
            phase: 0.0,
            gain,
            threshold,
            level: 0,
            previous: None,
            last_crossing: None,
            locked: false,
            bits_since_transition: 0,
            start_sync: false,
        }
    }

    /// Arm (or disarm) snapping to the next mark→space edge.
    ///
    /// The framer arms this while idle so each start bit re-centres the
    /// clock; the stop bit may last 1.5 or 2 bits, which a slow loop
    /// cannot absorb.
    pub fn set_start_sync(&mut self, armed: bool) {
        self.start_sync = armed;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Current phase in [0, 1)
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Consume one correlation sample; returns a decision at each bit centre
    pub fn process(&mut self, sample: &CorrelationSample) -> Option<BitDecision> {
        let now = sample.index as f64;
        let v = sample.value;

        if let Some((prev_index, prev_value)) = self.previous {
            if (prev_value < 0.0) != (v < 0.0) {
                let a = prev_index as f64;
                let span = (prev_value - v) as f64;
                let frac = if span.abs() > f64::EPSILON {
                    prev_value as f64 / span
                } else {
                    0.5
                };
                self.last_crossing = Some(a + frac.clamp(0.0, 1.0) * (now - a));
            }
        }
        self.previous = Some((sample.index, v));

        self.phase += self.increment;

        let level = if v > self.threshold {
            1
        } else if v < -self.threshold {
            -1
        } else {
            self.level
        };
        if self.level != 0 && level != self.level {
            self.on_transition(now, level < 0);
        }
        self.level = level;

        if self.phase < 1.0 {
            return None;
        }
        self.phase -= self.phase.floor();

        self.bits_since_transition = self.bits_since_transition.saturating_add(1);
        if self.locked && self.bits_since_transition > LOCK_TIMEOUT_BITS {
            log::debug!("bit clock lost lock at {}", sample.index);
            self.locked = false;
        }

        Some(BitDecision {
            position: now - self.phase / self.increment,
            value: u8::from(v > 0.0),
            confidence: v.abs(),
        })
    }

    fn on_transition(&mut self, now: f64, falling: bool) {
        let bits_per_block = self.increment;
        let boundary = match self.last_crossing {
            Some(x) if now - x <= 1.0 / bits_per_block => x,
            _ => now - 0.5,
        };
        let since = (now - boundary) * bits_per_block;

        if !self.locked || (self.start_sync && falling) {
            self.phase = 0.5 + since;
            self.locked = true;
        } else {
            let error = wrap_error(self.phase - since - 0.5);
            self.phase -= self.gain * error;
        }
        // Never step back across a decision already taken
        self.phase = self.phase.max(0.0);
        self.bits_since_transition = 0;
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.level = 0;
        self.previous = None;
        self.last_crossing = None;
        self.locked = false;
        self.bits_since_transition = 0;
        self.start_sync = false;
    }
}

/// Run the PLL over a whole correlation stream
pub fn recover(
    samples: &[CorrelationSample],
    blocks_per_bit: f64,
    gain: f64,
    threshold: f32,
) -> Vec<BitDecision> {
    let mut clock = BitClock::new(blocks_per_bit, gain, threshold);
    samples.iter().filter_map(|s| clock.process(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(levels: &[f32], blocks_per_bit: usize) -> Vec<CorrelationSample> {
        levels
            .iter()
            .flat_map(|&v| std::iter::repeat(v).take(blocks_per_bit))
            .enumerate()
            .map(|(i, value)| CorrelationSample {
                index: i as u64,
                value,
                magnitude: 1.0,
            })
            .collect()
    }

    #[test]
    fn endless_idle_saturates_transition_count() {
        let mut clock = BitClock::new(4.0, 0.05, 0.2);
        clock.bits_since_transition = u32::MAX;
        let decisions: Vec<BitDecision> = stream(&[1.0; 3], 4)
            .iter()
            .filter_map(|s| clock.process(s))
            .collect();
        assert_eq!(decisions.len(), 3);
        assert_eq!(clock.bits_since_transition, u32::MAX);
        assert!(!clock.is_locked());
    }

    #[test]
    fn blocks_per_bit_at_common_rates() {
        assert!((blocks_per_bit(8000, 45.45, 24) - 7.334).abs() < 0.01);
        assert!((blocks_per_bit(48000, 50.0, 480) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn wrap_error_range() {
        assert!((wrap_error(0.7) - -0.3).abs() < 1e-12);
        assert!((wrap_error(-0.2) - -0.2).abs() < 1e-12);
        assert!((wrap_error(0.5) - -0.5).abs() < 1e-12);
    }

    #[test]
    fn samples_at_bit_centres_after_first_edge() {
        // two idle marks, then space mark space space mark
        let levels = [1.0, 1.0, -1.0, 1.0, -1.0, -1.0, 1.0];
        let decisions = recover(&stream(&levels, 8), 8.0, 0.05, 0.15);

        let after_edge: Vec<_> = decisions.iter().filter(|d| d.position > 15.5).collect();
        let values: Vec<u8> = after_edge.iter().map(|d| d.value).collect();
        assert_eq!(values, vec![0, 1, 0, 0, 1]);
        // First edge falls between blocks 15 and 16; centres are 4 blocks later
        assert!((after_edge[0].position - 19.5).abs() < 1e-9);
        assert!((after_edge[1].position - 27.5).abs() < 1e-9);
    }

    #[test]
    fn confidence_is_absolute_value() {
        let levels = [1.0, -0.6, -0.6];
        let decisions = recover(&stream(&levels, 8), 8.0, 0.05, 0.15);
        let last = decisions.last().unwrap();
        assert_eq!(last.value, 0);
        assert!((last.confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn tracks_slow_baud_offset() {
        // Real bit length 8.05 blocks, clock assumes 8.0
        let pattern = [1.0f32, -1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0];
        let bits: Vec<f32> = pattern.iter().cycle().take(400).copied().collect();
        let samples: Vec<CorrelationSample> = (0..(400.0 * 8.05) as usize)
            .map(|i| CorrelationSample {
                index: i as u64,
                value: bits[(i as f64 / 8.05) as usize],
                magnitude: 1.0,
            })
            .collect();

        let mut clock = BitClock::new(8.0, 0.05, 0.15);
        let decisions: Vec<_> = samples.iter().filter_map(|s| clock.process(s)).collect();
        assert!(clock.is_locked());

        // Every decision in the second half lands well inside its bit
        for d in decisions.iter().filter(|d| d.position > 1600.0) {
            let bit_pos = d.position / 8.05;
            let offset = bit_pos - bit_pos.floor();
            assert!((0.15..0.85).contains(&offset), "offset {offset} at {}", d.position);
        }
    }

    #[test]
    fn start_sync_snaps_to_falling_edge() {
        // Idle mark, a 1.5-bit stop, then a start bit off the old grid
        let mut levels = vec![1.0f32; 4];
        levels.extend([-1.0, 1.0, -1.0, 1.0]);
        let mut samples = stream(&levels, 8);
        let offset = samples.len() as u64;
        samples.extend((0..4).map(|i| CorrelationSample {
            index: offset + i,
            value: 1.0,
            magnitude: 1.0,
        }));
        let offset = samples.len() as u64;
        samples.extend((0..16).map(|i| CorrelationSample {
            index: offset + i,
            value: -1.0,
            magnitude: 1.0,
        }));

        let mut clock = BitClock::new(8.0, 0.05, 0.15);
        clock.set_start_sync(true);
        let decisions: Vec<_> = samples.iter().filter_map(|s| clock.process(s)).collect();
        let last_start = offset as f64 - 0.5;
        assert!(decisions
            .iter()
            .any(|d| (d.position - (last_start + 4.0)).abs() < 1e-9));
    }

    #[test]
    fn reset_unlocks() {
        let mut clock = BitClock::new(8.0, 0.05, 0.15);
        for s in stream(&[1.0, -1.0], 8) {
            clock.process(&s);
        }
        assert!(clock.is_locked());
        clock.reset();
        assert!(!clock.is_locked());
        assert_eq!(clock.phase(), 0.0);
    }
}
