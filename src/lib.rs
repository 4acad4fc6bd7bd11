//! RTTY decoder
//!
//! Decodes RTTY (Baudot / ITA2 over two-tone FSK) audio into text, and
//! estimates the tone pair and baud rate of a recording when they are unknown.
//!
//! ## Architecture (Hexagonal / Ports & Adapters)
//!
//! - `domain/` - Pure domain types, errors and configuration profiles
//! - `dsp/` - Signal processing (Goertzel correlator, bit clocks, FFT)
//! - `modem/` - RTTY protocol logic (Baudot tables, framer, decode session)
//! - `estimator/` - Blind mark/space/baud estimation
//! - `ports/` - Trait definitions for external audio sources
//! - `adapters/` - Implementations of ports (in-memory source)
//!
//! Pipeline: audio → tone correlator → bit clock → Baudot framer → text

// Core domain (pure, no I/O)
pub mod domain;
pub mod dsp;
pub mod estimator;
pub mod modem;
pub mod ports;

// Adapters (external I/O)
pub mod adapters;

pub use domain::{
    AudioBuffer, ClockStrategy, DecodeResult, DecodeStats, DecoderConfig, EstimatorConfig,
    FskParameters, RttyError, RttyResult,
};
pub use estimator::{resolve_parameters, Estimate, ParameterEstimator, PASS_CONFIDENCE};
pub use modem::{decode, decode_source, RttyDecoder};
