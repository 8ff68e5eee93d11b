//! Turns motion events into G-code text and reads G-code back into events.

pub mod error;
pub mod reader;
pub mod small;
pub mod stats;
pub mod template;
mod writer;

pub use error::{PostprocessError, PostprocessErrorKind, ReadError};
pub use stats::GcodeStats;
pub use writer::PostProcessor;
