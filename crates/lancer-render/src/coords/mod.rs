//! Framebuffer coordinate types.
//!
//! Canonical space for viewports and scissor rects handed to a backend:
//! - physical pixels
//! - origin bottom-left
//! - +X right, +Y up
//!
//! Backends with a top-left origin convert with [`PixelRect::flip_y`].

mod rect;

pub use rect::PixelRect;
