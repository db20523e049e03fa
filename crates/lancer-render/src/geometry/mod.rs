//! Vertex layouts and GPU geometry.
//!
//! Two flavors:
//! - [`StaticGeometry`]: append-only uploads, returns base vertex / start index
//! - [`StreamingGeometry`]: CPU-mirrored streams rewritten every flush

mod layout;
mod static_geometry;
mod streaming;

pub use layout::{ElementSlot, ElementType, VertexElement, VertexLayout};
pub use static_geometry::{GeometryRange, StaticGeometry};
pub use streaming::StreamingGeometry;

/// Smallest power-of-two multiple of `current` that holds `required`.
pub(crate) fn grown_capacity(current: usize, required: usize) -> usize {
    let mut capacity = current.max(1);
    while capacity < required {
        capacity *= 2;
    }
    capacity
}
