use crate::coords::PixelRect;
use crate::geometry::VertexLayout;

use super::types::{
    BlendFactors, BufferId, BufferKind, CullMode, DepthMode, Primitive, ProgramId,
    RenderTargetId, TextureId, UniformBinding, UniformSlot, VertexArrayId,
};

/// Immediate-mode GPU command surface.
///
/// The frame pipeline never calls state setters directly; it goes through
/// [`Device`](super::Device), which filters out redundant changes. Implementations
/// may therefore apply every call they receive.
///
/// Rects arrive in bottom-left-origin framebuffer pixels.
pub trait GpuBackend {
    /// Required alignment, in bytes, of uniform-buffer binding offsets.
    fn uniform_offset_alignment(&self) -> usize;

    // ── buffers ──────────────────────────────────────────────────────────

    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> BufferId;
    /// Grows `buffer` to `size` bytes, keeping its first `preserve` bytes.
    fn resize_buffer(&mut self, buffer: BufferId, size: usize, preserve: usize);
    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]);
    fn destroy_buffer(&mut self, buffer: BufferId);

    // ── vertex arrays ────────────────────────────────────────────────────

    fn create_vertex_array(
        &mut self,
        layout: &VertexLayout,
        vertices: BufferId,
        indices: BufferId,
    ) -> VertexArrayId;
    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayId);
    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId);

    // ── fixed function ───────────────────────────────────────────────────

    /// Redirects subsequent clears and draws. `None` restores the frame target.
    fn set_render_target(&mut self, target: Option<RenderTargetId>);
    fn set_viewport(&mut self, rect: PixelRect);
    fn set_scissor(&mut self, rect: Option<PixelRect>);
    fn set_cull(&mut self, cull: CullMode);
    /// `None` disables blending.
    fn set_blend(&mut self, blend: Option<BlendFactors>);
    fn set_depth(&mut self, depth: DepthMode);
    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool);

    // ── programs ─────────────────────────────────────────────────────────

    fn use_program(&mut self, program: ProgramId);
    /// Location of a sampler uniform, `None` if the program does not declare it.
    fn sampler_location(&mut self, program: ProgramId, name: &str) -> Option<u32>;
    fn set_sampler_unit(&mut self, program: ProgramId, location: u32, unit: u32);
    fn upload_uniform(&mut self, program: ProgramId, slot: UniformSlot, data: &[u8]);
    fn bind_uniform_buffer(&mut self, program: ProgramId, binding: UniformBinding);

    // ── textures ─────────────────────────────────────────────────────────

    fn texture_resident(&self, texture: TextureId) -> bool;
    fn bind_texture(&mut self, unit: u32, texture: TextureId);
    /// Drops the texture's storage. The id stays valid and the loader may
    /// bring it back.
    fn unload_texture(&mut self, texture: TextureId);

    // ── draws ────────────────────────────────────────────────────────────

    /// Indexed draw with 16-bit indices from the bound vertex array.
    fn draw_indexed(
        &mut self,
        primitive: Primitive,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    );

    /// Drains one pending backend error, if any.
    fn take_error(&mut self) -> Option<String>;
}
