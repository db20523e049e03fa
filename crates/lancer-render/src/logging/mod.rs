//! Logging setup.
//!
//! The renderer itself only emits through the `log` facade (frame boundaries,
//! buffer growth, texture reloads). Without an error callback, warnings and
//! critical errors are logged here as well. Binaries call [`init_logging`] once.

mod init;

pub use init::{init_logging, LoggingConfig};
