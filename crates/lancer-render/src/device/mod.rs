//! GPU device layer.
//!
//! This module is responsible for:
//! - the immediate-mode [`GpuBackend`] surface the frame pipeline talks to
//! - [`Device`], which caches bound state and forwards only real changes
//! - [`Gpu`], the wgpu implementation

mod backend;
mod gpu;
mod state;
mod types;

#[cfg(test)]
pub(crate) mod recording;

pub use backend::GpuBackend;
pub use gpu::{Gpu, GpuInit, OffscreenTarget, ProgramDesc, RenderTarget};
pub use state::{Device, DeviceState, TextureLoader};
pub use types::*;
