//! Error reporting.
//!
//! Two layers:
//! - typed errors (`AllocError`, `MaterialError`, `ShaderError`) returned by the
//!   stores, so they can be tested in isolation
//! - [`ErrorReporter`], which turns failures into `Warning`/`Critical` reports for
//!   the frame-level API

mod kinds;
mod report;

pub use kinds::{AllocError, MaterialError, ShaderError};
pub use report::{ErrorCallback, ErrorReporter, Severity};
