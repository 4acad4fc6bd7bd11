//! Port traits (interfaces)
//!
//! These traits define the boundary between the decoding core and external
//! audio I/O. Adapters implement them for concrete sources.

pub mod source;

pub use source::*;
