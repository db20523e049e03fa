use xxhash_rust::xxh3::xxh3_64;

use crate::device::{BlendFactors, CullMode, TextureId, MAX_TEXTURE_UNITS};
use crate::handle::Handle;
use crate::shader::CollectionId;

/// Sampler slots per material. Slot `i` samples from texture unit `i`.
pub const MAX_SAMPLERS: usize = MAX_TEXTURE_UNITS;

/// Reference to a live material in a [`MaterialStore`](super::MaterialStore).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialHandle(pub(crate) Handle);

impl MaterialHandle {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0.raw()
    }
}

/// Named sampler uniform plus the texture it samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sampler {
    pub(crate) name: Option<String>,
    pub(crate) name_hash: u64,
    pub(crate) texture: Option<TextureId>,
}

impl Sampler {
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub(crate) fn set_name(&mut self, name: Option<&str>) {
        self.name = name.map(str::to_owned);
        self.name_hash = name.map_or(0, |n| xxh3_64(n.as_bytes()));
    }
}

/// Uniform parameter bytes, vec4-packed, with a content hash for change detection.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBlock {
    bytes: Vec<u8>,
    hash: u64,
}

impl ParamBlock {
    /// `None` unless `bytes.len()` is a multiple of 16.
    pub fn new(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % 16 != 0 {
            return None;
        }
        Some(Self {
            bytes: bytes.to_vec(),
            hash: xxh3_64(bytes),
        })
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }
}

/// Material state consumed by the binder.
///
/// `Clone` deep-copies parameter blocks; shader collections and textures are
/// referenced by id and therefore shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// `Some` marks the material transparent.
    pub(crate) blend: Option<BlendFactors>,
    pub(crate) cull: CullMode,
    pub(crate) shaders: Option<CollectionId>,
    pub(crate) capabilities: u32,
    pub(crate) samplers: [Sampler; MAX_SAMPLERS],
    pub(crate) vertex_params: Option<ParamBlock>,
    pub(crate) fragment_params: Option<ParamBlock>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            blend: None,
            cull: CullMode::Ccw,
            shaders: None,
            capabilities: 0,
            samplers: Default::default(),
            vertex_params: None,
            fragment_params: None,
        }
    }
}

impl Material {
    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.blend.is_some()
    }

    #[inline]
    pub fn blend(&self) -> Option<BlendFactors> {
        self.blend
    }

    #[inline]
    pub fn cull(&self) -> CullMode {
        self.cull
    }

    #[inline]
    pub fn shaders(&self) -> Option<CollectionId> {
        self.shaders
    }

    #[inline]
    pub fn capabilities(&self) -> u32 {
        self.capabilities
    }

    #[inline]
    pub fn samplers(&self) -> &[Sampler; MAX_SAMPLERS] {
        &self.samplers
    }

    #[inline]
    pub fn vertex_params(&self) -> Option<&ParamBlock> {
        self.vertex_params.as_ref()
    }

    #[inline]
    pub fn fragment_params(&self) -> Option<&ParamBlock> {
        self.fragment_params.as_ref()
    }
}
