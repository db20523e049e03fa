use crate::device::{ProgramId, UniformBinding};
use crate::material::MAX_SAMPLERS;

/// Sampler uniform state of one program slot.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub(crate) struct SamplerState {
    /// Hash of the sampler name last bound to this slot. `0` = never bound.
    pub name_hash: u64,
    pub location: Option<u32>,
}

/// Uniform state last uploaded to a program.
///
/// Caching is per program: switching programs re-uploads even identical data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UniformCache {
    /// Camera version last uploaded. Versions start at 1.
    pub camera_version: u64,
    pub vertex_params: Option<u64>,
    pub fragment_params: Option<u64>,
    /// Content hash of the lighting blob, `0` for "no lights".
    pub lighting: Option<u64>,
    /// `(frame << 32) | handle`, `0` for identity.
    pub transform: Option<u64>,
    pub uniform_buffer: Option<UniformBinding>,
    pub samplers: [SamplerState; MAX_SAMPLERS],
}

/// A linked program plus its uniform cache.
#[derive(Debug)]
pub struct Shader {
    program: ProgramId,
    pub(crate) cache: UniformCache,
}

impl Shader {
    pub(crate) fn new(program: ProgramId) -> Self {
        Self {
            program,
            cache: UniformCache::default(),
        }
    }

    #[inline]
    pub fn program(&self) -> ProgramId {
        self.program
    }
}
