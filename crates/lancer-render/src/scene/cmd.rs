use crate::arena::{LightingHandle, TransformHandle};
use crate::device::{Primitive, TextureId, UniformBinding, VertexArrayId};
use crate::material::MaterialHandle;
use crate::render::DynamicDrawId;

use super::SortKey;

/// One queued draw. Lives from `draw`/`dynamic_draw` until the next flush.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawCmd {
    pub key: SortKey,
    pub material: MaterialHandle,
    pub payload: DrawPayload,
}

/// What the flush loop issues for a command.
///
/// Extending the queue:
/// - add a variant here
/// - add its arm to the flush loop in `render::flush`
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DrawPayload {
    Static(StaticPayload),
    Dynamic(DynamicPayload),
}

/// Indexed range of a static geometry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StaticPayload {
    pub vertex_array: VertexArrayId,
    pub layout_hash: u64,
    pub transform: Option<TransformHandle>,
    pub lighting: Option<LightingHandle>,
    pub uniforms: Option<UniformBinding>,
    pub primitive: Primitive,
    pub base_vertex: u32,
    pub start_index: u32,
    pub index_count: u32,
}

/// One element appended to a dynamic-draw batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DynamicPayload {
    pub batch: DynamicDrawId,
    pub texture: TextureId,
    pub base_vertex: u32,
}
