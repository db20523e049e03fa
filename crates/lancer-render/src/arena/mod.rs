//! Append-only per-frame storage.
//!
//! Responsibilities:
//! - generic growable arena (doubling growth, O(1) reset)
//! - per-frame transform pairs (world + normal matrix)
//! - per-frame lighting blobs with last-entry deduplication

mod bytes;
mod growable;
mod lighting;
mod transforms;

pub use bytes::ByteArena;
pub use growable::Arena;
pub use lighting::{LightingArena, LightingHandle};
pub use transforms::{TransformArena, TransformHandle};
