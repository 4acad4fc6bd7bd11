//! RTTY decoder: converts FSK audio samples to text
//!
//! Pipeline: audio samples → tone correlator → bit clock (PLL or fixed
//!           timing) → Baudot framer → characters
//!
//! `RttyDecoder` is a caller-owned session: the correlator block cursor,
//! clock phase and framer shift state all live here and carry over between
//! `process` calls, so audio can be fed in arbitrary chunks. Independent
//! sessions share nothing.
//!
//! Note: characters already returned are never retracted. A frame cut off
//! by the end of the stream is dropped and reported via `DecodeResult::partial`.

use crate::domain::{
    AudioBuffer, AudioSample, BitDecision, ClockStrategy, CorrelationSample, DecodeResult,
    DecodeStats, DecoderConfig, FskParameters, RttyError, RttyResult,
};
use crate::dsp::clock_recovery::{blocks_per_bit, BitClock};
use crate::dsp::correlator::{default_block_size, default_hop_size, ToneCorrelator};
use crate::dsp::fixed_timing::FixedTimingSlicer;
use crate::modem::baudot::Shift;
use crate::modem::framer::BaudotFramer;
use crate::ports::SampleSource;

/// Fewest correlation samples per bit the clock can work with. Below this
/// a bit can fall between two blocks.
const MIN_BLOCKS_PER_BIT: f64 = 2.0;

/// Read size used by `decode_source` when the caller passes zero
const DEFAULT_CHUNK: usize = 4096;

enum Clock {
    Pll(BitClock),
    Fixed(FixedTimingSlicer),
}

/// Streaming RTTY decoder session
pub struct RttyDecoder {
    params: FskParameters,
    sample_rate: u32,
    correlator: ToneCorrelator,
    clock: Clock,
    framer: BaudotFramer,

    /// Everything decoded since construction or the last reset
    text: String,
    correlation_samples: u64,
    bit_decisions: u64,

    blocks: Vec<CorrelationSample>,
    decisions: Vec<BitDecision>,
}

impl RttyDecoder {
    /// Create a session for `params` on audio sampled at `sample_rate`
    pub fn new(params: FskParameters, sample_rate: u32, config: &DecoderConfig) -> RttyResult<Self> {
        params.validate_for(sample_rate)?;
        config.validate()?;

        let block_size = config
            .block_size
            .unwrap_or_else(|| default_block_size(&params, sample_rate));
        let hop_size = config.hop_size.unwrap_or_else(|| default_hop_size(block_size));
        let bpb = blocks_per_bit(sample_rate, params.baud_rate, hop_size.min(block_size));
        if bpb < MIN_BLOCKS_PER_BIT {
            return Err(RttyError::InvalidParameters(format!(
                "{} baud needs a hop below {} samples at {sample_rate} Hz",
                params.baud_rate,
                (sample_rate as f64 / params.baud_rate / MIN_BLOCKS_PER_BIT).floor()
            )));
        }

        let clock = match config.strategy {
            ClockStrategy::Pll => {
                let mut pll = BitClock::new(bpb, config.pll_gain, config.transition_threshold as f32);
                pll.set_start_sync(true);
                Clock::Pll(pll)
            }
            ClockStrategy::FixedTiming => {
                Clock::Fixed(FixedTimingSlicer::new(bpb, config.transition_threshold as f32))
            }
        };

        log::info!(
            "RTTY decoder: mark {:.1} Hz, space {:.1} Hz, {} baud{}, block {block_size}/{hop_size}, {:?}",
            params.mark_hz,
            params.space_hz,
            params.baud_rate,
            if params.invert_polarity { ", inverted" } else { "" },
            config.strategy,
        );

        Ok(Self {
            params,
            sample_rate,
            correlator: ToneCorrelator::new(&params, sample_rate, block_size, hop_size),
            clock,
            framer: BaudotFramer::new(config.start_threshold as f32),
            text: String::new(),
            correlation_samples: 0,
            bit_decisions: 0,
            blocks: Vec::new(),
            decisions: Vec::new(),
        })
    }

    /// Feed a chunk of audio. Returns the characters completed by it.
    pub fn process(&mut self, samples: &[AudioSample]) -> String {
        let mut blocks = std::mem::take(&mut self.blocks);
        blocks.clear();
        self.correlator.process_into(samples, &mut blocks);
        let out = self.process_correlation(&blocks);
        self.blocks = blocks;
        out
    }

    /// Feed correlation samples directly, bypassing the correlator
    pub fn process_correlation(&mut self, samples: &[CorrelationSample]) -> String {
        let mut out = String::new();
        for sample in samples {
            self.correlation_samples += 1;
            match &mut self.clock {
                Clock::Pll(pll) => {
                    if let Some(decision) = pll.process(sample) {
                        self.decisions.push(decision);
                    }
                }
                Clock::Fixed(slicer) => slicer.process_into(sample, &mut self.decisions),
            }

            let mut decisions = std::mem::take(&mut self.decisions);
            for decision in decisions.drain(..) {
                self.bit_decisions += 1;
                if let Some(ch) = self.framer.push(&decision) {
                    out.push(ch);
                }
                if let Clock::Pll(pll) = &mut self.clock {
                    pll.set_start_sync(self.framer.is_idle());
                }
            }
            self.decisions = decisions;
        }
        self.text.push_str(&out);
        out
    }

    /// Text so far, plus whether a frame is in flight and the run counters
    pub fn result(&self) -> DecodeResult {
        let pending = match &self.clock {
            Clock::Fixed(slicer) => slicer.pending_frame(),
            Clock::Pll(_) => false,
        };
        let slicer_false_starts = match &self.clock {
            Clock::Fixed(slicer) => slicer.false_starts(),
            Clock::Pll(_) => 0,
        };

        let framer = self.framer.stats();
        let stats = DecodeStats {
            correlation_samples: self.correlation_samples,
            bit_decisions: self.bit_decisions,
            false_starts: framer.false_starts + slicer_false_starts,
            ..*framer
        };

        DecodeResult {
            text: self.text.clone(),
            partial: self.framer.is_mid_frame() || pending,
            stats,
        }
    }

    /// End of stream: close the session and report
    pub fn finish(self) -> DecodeResult {
        let result = self.result();
        if result.partial {
            log::debug!("stream ended mid-frame; last character dropped");
        }
        log::debug!("decode finished: {:?}", result.stats);
        result
    }

    /// Magnitude (mark + space power) of the most recent correlator block
    pub fn signal_level(&self) -> f32 {
        self.correlator.last_magnitude()
    }

    pub fn shift(&self) -> Shift {
        self.framer.shift()
    }

    pub fn params(&self) -> &FskParameters {
        &self.params
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Everything decoded so far. A long-running session should drain this
    /// with `take_text`; it is otherwise kept for `result`.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Hand over the text decoded so far and start accumulating afresh.
    /// Framer state and counters are untouched.
    pub fn take_text(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    /// Back to a pristine session: Letters shift, clock unlocked, no text
    pub fn reset(&mut self) {
        self.correlator.reset();
        match &mut self.clock {
            Clock::Pll(pll) => {
                pll.reset();
                pll.set_start_sync(true);
            }
            Clock::Fixed(slicer) => slicer.reset(),
        }
        self.framer.reset();
        self.text.clear();
        self.correlation_samples = 0;
        self.bit_decisions = 0;
    }
}

/// Decode a whole buffer with known parameters
pub fn decode(
    audio: &AudioBuffer,
    params: &FskParameters,
    config: &DecoderConfig,
) -> RttyResult<DecodeResult> {
    let mut decoder = RttyDecoder::new(*params, audio.sample_rate(), config)?;
    decoder.process(audio.samples());
    Ok(decoder.finish())
}

/// Decode a pull-based source to its end, reading `chunk_size` samples at a time
pub fn decode_source(
    source: &mut dyn SampleSource,
    params: &FskParameters,
    config: &DecoderConfig,
    chunk_size: usize,
) -> RttyResult<DecodeResult> {
    let mut decoder = RttyDecoder::new(*params, source.sample_rate(), config)?;
    let mut buf = vec![0.0; if chunk_size == 0 { DEFAULT_CHUNK } else { chunk_size }];
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        decoder.process(&buf[..n]);
    }
    Ok(decoder.finish())
}
