//! Mesh to toolpath pipeline: carving a mesh into layer loops, building the
//! printable geometry of every layer and planning it into motion events.

pub mod builder;
pub mod cache;
pub mod carve;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod job;
pub mod layer;
pub mod mesh;
pub mod planner;
pub mod pool;
pub mod scene;
pub mod segments;

pub use error::{GeometryError, PlanError, SliceError};
pub use job::{JobInput, SliceJob, SliceOutput, SliceStats};
