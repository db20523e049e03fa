//! Lancer render crate.
//!
//! A frame-lifetime draw pipeline: materials and draws are submitted between
//! [`render::Context::begin_frame`] and [`render::Context::end_frame`], queued
//! under a 64-bit sort key and flushed through a state-diffing binder onto a
//! [`device::GpuBackend`].

pub mod arena;
pub mod coords;
pub mod device;
pub mod error;
pub mod geometry;
pub mod handle;
pub mod logging;
pub mod material;
pub mod render;
pub mod scene;
pub mod shader;
pub mod uniform;
