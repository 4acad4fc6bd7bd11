//! Baudot framer: bit decisions in, characters out
//!
//! Frame on the wire: one space start bit, five data bits (LSB first),
//! then mark stop bits. The framer sees one `BitDecision` per bit:
//!
//! ```text
//! Idle ──space──▶ StartVerify ──confident──▶ Data[0..5) ──▶ Stop ──▶ Idle
//!                      └──────weak──────▶ Idle (false start)
//! ```
//!
//! A start bit is confirmed by its own decision confidence; a space decision
//! too weak to trust (silence, noise at a tone boundary) is a false start and
//! the framer keeps hunting. The shift state survives for the whole run.

use super::baudot::{Baudot, Shift, Symbol, CODE_BITS};
use crate::domain::{BitDecision, DecodeStats};

/// Where the framer is within a character frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerPhase {
    Idle,
    StartVerify,
    Data { bits: u8, code: u8 },
    Stop { code: u8 },
}

/// Baudot frame assembler with persistent shift state
pub struct BaudotFramer {
    phase: FramerPhase,
    shift: Shift,
    start_threshold: f32,
    stats: DecodeStats,
}

impl BaudotFramer {
    /// `start_threshold`: minimum confidence for a start bit to be trusted
    pub fn new(start_threshold: f32) -> Self {
        Self {
            phase: FramerPhase::Idle,
            shift: Shift::Letters,
            start_threshold,
            stats: DecodeStats::default(),
        }
    }

    /// Push one bit decision. Returns `Some(char)` when a frame completes
    /// with a mapped character.
    pub fn push(&mut self, decision: &BitDecision) -> Option<char> {
        if self.phase == FramerPhase::Idle && decision.is_space() {
            self.phase = FramerPhase::StartVerify;
        }

        match self.phase {
            FramerPhase::Idle => None,
            FramerPhase::StartVerify => {
                if decision.is_space() && decision.confidence >= self.start_threshold {
                    self.phase = FramerPhase::Data { bits: 0, code: 0 };
                } else {
                    log::trace!("false start at {:.1}", decision.position);
                    self.stats.false_starts += 1;
                    self.phase = FramerPhase::Idle;
                }
                None
            }
            FramerPhase::Data { bits, code } => {
                let code = code | (decision.value & 1) << bits;
                let bits = bits + 1;
                self.phase = if bits >= CODE_BITS {
                    FramerPhase::Stop { code }
                } else {
                    FramerPhase::Data { bits, code }
                };
                None
            }
            FramerPhase::Stop { code } => {
                if !decision.is_mark() {
                    self.stats.framing_errors += 1;
                }
                self.phase = FramerPhase::Idle;
                self.emit(code)
            }
        }
    }

    fn emit(&mut self, code: u8) -> Option<char> {
        match Baudot::decode(code, self.shift) {
            Symbol::Shift(shift) => {
                if shift != self.shift {
                    log::trace!("shift {:?} -> {:?}", self.shift, shift);
                    self.stats.shift_changes += 1;
                }
                self.shift = shift;
                None
            }
            Symbol::Char(ch) => {
                self.stats.characters += 1;
                Some(ch)
            }
            Symbol::Unmapped => {
                self.stats.dropped_codes += 1;
                None
            }
        }
    }

    pub fn phase(&self) -> FramerPhase {
        self.phase
    }

    pub fn shift(&self) -> Shift {
        self.shift
    }

    /// Ready to accept a start bit
    pub fn is_idle(&self) -> bool {
        self.phase == FramerPhase::Idle
    }

    /// A frame has started but not completed
    pub fn is_mid_frame(&self) -> bool {
        matches!(self.phase, FramerPhase::Data { .. } | FramerPhase::Stop { .. })
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    pub fn reset(&mut self) {
        self.phase = FramerPhase::Idle;
        self.shift = Shift::Letters;
        self.stats = DecodeStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::baudot::{FIGS, LTRS};

    fn bit(value: u8) -> BitDecision {
        BitDecision {
            position: 0.0,
            value,
            confidence: 1.0,
        }
    }

    /// Start, five data bits LSB first, one stop bit
    fn frame(code: u8) -> Vec<BitDecision> {
        let mut bits = vec![bit(0)];
        bits.extend((0..5).map(|i| bit((code >> i) & 1)));
        bits.push(bit(1));
        bits
    }

    fn run(framer: &mut BaudotFramer, codes: &[u8]) -> String {
        let mut text = String::new();
        for &code in codes {
            for d in frame(code) {
                if let Some(ch) = framer.push(&d) {
                    text.push(ch);
                }
            }
        }
        text
    }

    #[test]
    fn decodes_letters() {
        let mut framer = BaudotFramer::new(0.15);
        assert_eq!(run(&mut framer, &Baudot::encode_text("CQ DE W1AW")), "CQ DE W1AW");
    }

    #[test]
    fn figures_shift_persists_until_letters() {
        let mut framer = BaudotFramer::new(0.15);
        // FIGS, '5' (0x10), then 0x03 which is 'A' in letters and '-' in figures
        let text = run(&mut framer, &[FIGS, 0x10, 0x03]);
        assert_eq!(text, "5-");
        assert_eq!(framer.shift(), Shift::Figures);

        let text = run(&mut framer, &[0x04, LTRS, 0x03]);
        assert_eq!(text, " A");
        assert_eq!(framer.shift(), Shift::Letters);
        assert_eq!(framer.stats().shift_changes, 2);
    }

    #[test]
    fn idle_marks_are_ignored() {
        let mut framer = BaudotFramer::new(0.15);
        for _ in 0..20 {
            assert_eq!(framer.push(&bit(1)), None);
        }
        assert!(framer.is_idle());
    }

    #[test]
    fn weak_start_bit_is_a_false_start() {
        let mut framer = BaudotFramer::new(0.15);
        let weak = BitDecision {
            position: 3.0,
            value: 0,
            confidence: 0.01,
        };
        assert_eq!(framer.push(&weak), None);
        assert!(framer.is_idle());
        assert_eq!(framer.stats().false_starts, 1);
    }

    #[test]
    fn reserved_code_is_dropped_silently() {
        let mut framer = BaudotFramer::new(0.15);
        let text = run(&mut framer, &[0x00, 0x01]);
        assert_eq!(text, "E");
        assert_eq!(framer.stats().dropped_codes, 1);
        assert_eq!(framer.stats().characters, 1);
    }

    #[test]
    fn space_stop_bit_counts_framing_error_but_decodes() {
        let mut framer = BaudotFramer::new(0.15);
        let mut bits = frame(0x01);
        bits.last_mut().unwrap().value = 0;
        let text: String = bits.iter().filter_map(|d| framer.push(d)).collect();
        assert_eq!(text, "E");
        assert_eq!(framer.stats().framing_errors, 1);
    }

    #[test]
    fn truncated_frame_emits_nothing_and_reports_mid_frame() {
        let mut framer = BaudotFramer::new(0.15);
        let bits = frame(0x0E);
        for d in &bits[..4] {
            assert_eq!(framer.push(d), None);
        }
        assert!(framer.is_mid_frame());
        assert_eq!(framer.phase(), FramerPhase::Data { bits: 3, code: 0b110 });
    }

    #[test]
    fn reset_restores_letters() {
        let mut framer = BaudotFramer::new(0.15);
        run(&mut framer, &[FIGS]);
        assert_eq!(framer.shift(), Shift::Figures);
        framer.reset();
        assert_eq!(framer.shift(), Shift::Letters);
        assert!(framer.is_idle());
    }
}
