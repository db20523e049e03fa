//! Draw command stream.
//!
//! Responsibilities:
//! - store one command per static draw or dynamic-draw element
//! - encode submission priority in a 64-bit key (opaque first, then material, then depth)
//! - sort descending at flush time; ties are broken arbitrarily

mod cmd;
mod key;
mod queue;

pub use cmd::{DrawCmd, DrawPayload, DynamicPayload, StaticPayload};
pub use key::{depth_bits, SortKey};
pub use queue::DrawQueue;
