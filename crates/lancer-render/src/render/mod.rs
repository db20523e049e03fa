//! Frame pipeline.
//!
//! Draw requests are recorded into a queue during a frame and submitted at
//! flush time, sorted for transparency correctness and minimal state churn.
//!
//! Flush points:
//! - `end_frame`
//! - any global state change (viewport, scissor, camera, clears)
//! - destroying a dynamic draw

mod binder;
mod config;
mod context;
mod dynamic;
mod frame;


pub use config::ContextConfig;
pub use context::{Context, DrawCall};
pub use dynamic::{DynamicDrawId, DYNAMIC_MAX_TEMPLATE};
pub use frame::Camera;
