//! Digital Signal Processing
//!
//! Pure functions for signal processing. No I/O dependencies.

pub mod goertzel;
pub mod correlator;
pub mod fft;
pub mod clock_recovery;
pub mod fixed_timing;

// Re-export commonly used items
pub use clock_recovery::BitClock;
pub use correlator::ToneCorrelator;
pub use fft::FftProcessor;
pub use fixed_timing::FixedTimingSlicer;
