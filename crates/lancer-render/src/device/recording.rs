//! Capturing backend for unit tests.

use std::collections::{HashMap, HashSet};

use crate::coords::PixelRect;
use crate::geometry::VertexLayout;

use super::types::*;
use super::GpuBackend;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GpuCall {
    CreateBuffer { id: BufferId, kind: BufferKind, size: usize },
    ResizeBuffer { id: BufferId, size: usize, preserve: usize },
    WriteBuffer { id: BufferId, offset: usize, data: Vec<u8> },
    DestroyBuffer(BufferId),
    CreateVertexArray(VertexArrayId),
    DestroyVertexArray(VertexArrayId),
    BindVertexArray(VertexArrayId),
    RenderTarget(Option<RenderTargetId>),
    Viewport(PixelRect),
    Scissor(Option<PixelRect>),
    Cull(CullMode),
    Blend(Option<BlendFactors>),
    Depth(DepthMode),
    Clear { color: Option<[f32; 4]>, depth: bool },
    UseProgram(ProgramId),
    SamplerUnit { program: ProgramId, location: u32, unit: u32 },
    Uniform { program: ProgramId, slot: UniformSlot, data: Vec<u8> },
    UniformBuffer { program: ProgramId, binding: UniformBinding },
    BindTexture { unit: u32, texture: TextureId },
    UnloadTexture(TextureId),
    Draw(DrawRecord),
}

/// Draw call plus the bindings in effect when it was issued.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct DrawRecord {
    pub primitive: Primitive,
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
    pub program: Option<ProgramId>,
    pub vertex_array: Option<VertexArrayId>,
    pub textures: [Option<TextureId>; MAX_TEXTURE_UNITS],
    pub blend: Option<BlendFactors>,
    pub depth: DepthMode,
}

#[derive(Debug)]
pub(crate) struct RecordingBackend {
    pub calls: Vec<GpuCall>,
    pub resident: HashSet<TextureId>,
    /// Sampler names programs do not declare.
    pub undeclared_samplers: HashSet<String>,
    pub pending_errors: Vec<String>,
    pub alignment: usize,
    pub location_lookups: usize,
    locations: HashMap<(ProgramId, String), u32>,
    next_id: u32,
    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
    textures: [Option<TextureId>; MAX_TEXTURE_UNITS],
    blend: Option<BlendFactors>,
    depth: DepthMode,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            resident: HashSet::new(),
            undeclared_samplers: HashSet::new(),
            pending_errors: Vec::new(),
            alignment: 256,
            location_lookups: 0,
            locations: HashMap::new(),
            next_id: 0,
            program: None,
            vertex_array: None,
            textures: [None; MAX_TEXTURE_UNITS],
            blend: None,
            depth: DepthMode::All,
        }
    }
}

impl RecordingBackend {
    pub fn with_resident(textures: &[TextureId]) -> Self {
        Self {
            resident: textures.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                GpuCall::Draw(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    pub fn uniforms(&self, slot: UniformSlot) -> Vec<(ProgramId, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                GpuCall::Uniform { program, slot: s, data } if *s == slot => {
                    Some((*program, data.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&GpuCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBackend for RecordingBackend {
    fn uniform_offset_alignment(&self) -> usize {
        self.alignment
    }

    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> BufferId {
        let id = BufferId(self.next());
        self.calls.push(GpuCall::CreateBuffer { id, kind, size });
        id
    }

    fn resize_buffer(&mut self, buffer: BufferId, size: usize, preserve: usize) {
        self.calls.push(GpuCall::ResizeBuffer { id: buffer, size, preserve });
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) {
        self.calls.push(GpuCall::WriteBuffer { id: buffer, offset, data: data.to_vec() });
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.calls.push(GpuCall::DestroyBuffer(buffer));
    }

    fn create_vertex_array(&mut self, _: &VertexLayout, _: BufferId, _: BufferId) -> VertexArrayId {
        let id = VertexArrayId(self.next());
        self.calls.push(GpuCall::CreateVertexArray(id));
        id
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.calls.push(GpuCall::DestroyVertexArray(vertex_array));
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.vertex_array = Some(vertex_array);
        self.calls.push(GpuCall::BindVertexArray(vertex_array));
    }

    fn set_render_target(&mut self, target: Option<RenderTargetId>) {
        self.calls.push(GpuCall::RenderTarget(target));
    }

    fn set_viewport(&mut self, rect: PixelRect) {
        self.calls.push(GpuCall::Viewport(rect));
    }

    fn set_scissor(&mut self, rect: Option<PixelRect>) {
        self.calls.push(GpuCall::Scissor(rect));
    }

    fn set_cull(&mut self, cull: CullMode) {
        self.calls.push(GpuCall::Cull(cull));
    }

    fn set_blend(&mut self, blend: Option<BlendFactors>) {
        self.blend = blend;
        self.calls.push(GpuCall::Blend(blend));
    }

    fn set_depth(&mut self, depth: DepthMode) {
        self.depth = depth;
        self.calls.push(GpuCall::Depth(depth));
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool) {
        self.calls.push(GpuCall::Clear { color, depth });
    }

    fn use_program(&mut self, program: ProgramId) {
        self.program = Some(program);
        self.calls.push(GpuCall::UseProgram(program));
    }

    fn sampler_location(&mut self, program: ProgramId, name: &str) -> Option<u32> {
        self.location_lookups += 1;
        if self.undeclared_samplers.contains(name) {
            return None;
        }
        let next = self.locations.len() as u32;
        Some(*self.locations.entry((program, name.to_owned())).or_insert(next))
    }

    fn set_sampler_unit(&mut self, program: ProgramId, location: u32, unit: u32) {
        self.calls.push(GpuCall::SamplerUnit { program, location, unit });
    }

    fn upload_uniform(&mut self, program: ProgramId, slot: UniformSlot, data: &[u8]) {
        self.calls.push(GpuCall::Uniform { program, slot, data: data.to_vec() });
    }

    fn bind_uniform_buffer(&mut self, program: ProgramId, binding: UniformBinding) {
        self.calls.push(GpuCall::UniformBuffer { program, binding });
    }

    fn texture_resident(&self, texture: TextureId) -> bool {
        self.resident.contains(&texture)
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        if let Some(slot) = self.textures.get_mut(unit as usize) {
            *slot = Some(texture);
        }
        self.calls.push(GpuCall::BindTexture { unit, texture });
    }

    fn unload_texture(&mut self, texture: TextureId) {
        self.resident.remove(&texture);
        self.calls.push(GpuCall::UnloadTexture(texture));
    }

    fn draw_indexed(
        &mut self,
        primitive: Primitive,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) {
        self.calls.push(GpuCall::Draw(DrawRecord {
            primitive,
            index_count,
            start_index,
            base_vertex,
            program: self.program,
            vertex_array: self.vertex_array,
            textures: self.textures,
            blend: self.blend,
            depth: self.depth,
        }));
    }

    fn take_error(&mut self) -> Option<String> {
        self.pending_errors.pop()
    }
}
