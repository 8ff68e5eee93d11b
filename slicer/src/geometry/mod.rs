//! Planar geometry on oriented loop sets: offsetting, booleans and fill
//! patterns.

pub mod boolean;
pub mod fill;
pub mod offset;
pub mod point_index;
pub mod polygon;

pub use boolean::{difference, intersection, union, union_all};
pub use fill::{fill, FillSettings};
pub use offset::offset;
pub use polygon::{Polygon, Polyline};
