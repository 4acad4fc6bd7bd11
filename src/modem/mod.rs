//! RTTY modem
//!
//! ITA2 tables, Baudot framing and the streaming decode session

pub mod baudot;
pub mod framer;
pub mod decoder;

pub use baudot::{Baudot, Shift};
pub use decoder::{decode, decode_source, RttyDecoder};
pub use framer::BaudotFramer;
