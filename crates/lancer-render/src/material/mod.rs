//! Material records and their handle store.
//!
//! Responsibilities:
//! - own material state (blend, cull, shader collection, samplers, parameter blocks)
//! - validate every handle through the block store before use
//! - track frame-scoped (temporary) materials for release at end of frame

mod record;
mod store;

pub use record::{Material, MaterialHandle, ParamBlock, Sampler, MAX_SAMPLERS};
pub use store::MaterialStore;
