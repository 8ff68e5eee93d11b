//! Types shared by the slicing pipeline crates: math aliases, the slice
//! configuration, motion events and job plumbing.

pub mod catalogue;
pub mod config;
pub mod math;
pub mod misc;
pub mod motion;
pub mod progress;
pub mod serde;
