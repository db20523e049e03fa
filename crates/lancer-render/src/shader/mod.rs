//! Shader programs and variant collections.
//!
//! A [`ShaderCollection`] maps (vertex-layout hash, capability bitmask) to a
//! [`Shader`]. Each `Shader` carries the uniform state last uploaded to its
//! program so the binder can skip redundant uploads.

mod collection;
mod library;
mod program;

pub use collection::{ShaderCollection, MAX_CAPABILITY_VARIANTS, MAX_VERTEX_ENTRIES};
pub use library::{CollectionId, ShaderId, ShaderLibrary};
pub use program::Shader;

pub(crate) use program::UniformCache;
