//! ITA2 (Baudot) character tables
//!
//! Five-bit codes, sent least-significant bit first. Two codes switch
//! between the Letters and Figures tables; a few codes are unmapped.

use serde::{Deserialize, Serialize};

/// Switch to the Letters table
pub const LTRS: u8 = 0x1F;

/// Switch to the Figures table
pub const FIGS: u8 = 0x1B;

/// Number of bits in a Baudot code
pub const CODE_BITS: u8 = 5;

const LETTERS: [Option<char>; 32] = [
    None,       Some('E'),  Some('\n'), Some('A'),  Some(' '),  Some('S'),  Some('I'),  Some('U'),
    Some('\r'), Some('D'),  Some('R'),  Some('J'),  Some('N'),  Some('F'),  Some('C'),  Some('K'),
    Some('T'),  Some('Z'),  Some('L'),  Some('W'),  Some('H'),  Some('Y'),  Some('P'),  Some('Q'),
    Some('O'),  Some('B'),  Some('G'),  None,       Some('M'),  Some('X'),  Some('V'),  None,
];

const FIGURES: [Option<char>; 32] = [
    None,       Some('3'),  Some('\n'), Some('-'),  Some(' '),  Some('\''), Some('8'),  Some('7'),
    Some('\r'), Some('$'),  Some('4'),  Some('\x07'), Some(','), Some('!'), Some(':'),  Some('('),
    Some('5'),  Some('+'),  Some(')'),  Some('2'),  Some('#'),  Some('6'),  Some('0'),  Some('1'),
    Some('9'),  Some('?'),  Some('&'),  None,       Some('.'),  Some('/'),  Some(';'),  None,
];

/// Letters/Figures interpretation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Shift {
    #[default]
    Letters,
    Figures,
}

/// What a received code means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// A shift control code
    Shift(Shift),
    Char(char),
    /// Reserved or unused table entry
    Unmapped,
}

/// Baudot lookup tables
pub struct Baudot;

impl Baudot {
    /// Interpret `code` (low five bits) under `shift`
    pub fn decode(code: u8, shift: Shift) -> Symbol {
        let code = code & 0x1F;
        match code {
            LTRS => Symbol::Shift(Shift::Letters),
            FIGS => Symbol::Shift(Shift::Figures),
            _ => {
                let table = match shift {
                    Shift::Letters => &LETTERS,
                    Shift::Figures => &FIGURES,
                };
                table[code as usize].map_or(Symbol::Unmapped, Symbol::Char)
            }
        }
    }

    /// Code for `ch` and the shift it needs.
    ///
    /// Shift is `None` for characters present in both tables at the same code
    /// (space, CR, LF). Lowercase letters map to their uppercase code.
    pub fn encode(ch: char) -> Option<(u8, Option<Shift>)> {
        let ch = ch.to_ascii_uppercase();
        let in_letters = LETTERS.iter().position(|&c| c == Some(ch));
        let in_figures = FIGURES.iter().position(|&c| c == Some(ch));
        match (in_letters, in_figures) {
            (Some(l), Some(f)) if l == f => Some((l as u8, None)),
            (Some(l), _) => Some((l as u8, Some(Shift::Letters))),
            (None, Some(f)) => Some((f as u8, Some(Shift::Figures))),
            (None, None) => None,
        }
    }

    /// Code sequence for `text`, inserting LTRS/FIGS only where the shift changes.
    ///
    /// Starts with an explicit LTRS so the receiver's shift state is known.
    /// Characters with no Baudot code are skipped.
    pub fn encode_text(text: &str) -> Vec<u8> {
        let mut codes = vec![LTRS];
        let mut shift = Shift::Letters;
        for ch in text.chars() {
            let Some((code, needed)) = Self::encode(ch) else {
                continue;
            };
            if let Some(needed) = needed {
                if needed != shift {
                    codes.push(match needed {
                        Shift::Letters => LTRS,
                        Shift::Figures => FIGS,
                    });
                    shift = needed;
                }
            }
            codes.push(code);
        }
        codes
    }
}
