//! wgpu implementation of [`GpuBackend`].
//!
//! The immediate-mode calls are recorded, not executed: buffer writes become
//! staged copies, draws capture a pipeline key plus every binding, and
//! [`Gpu::finish`] replays the whole log into a [`RenderTarget`]. Draws issued
//! while a [`RenderTargetId`] is selected land in that backend-owned target
//! instead.
//!
//! WGSL binding model shared by every program:
//! - `@group(0) @binding(0)` camera: view, projection, view-projection (192 bytes)
//! - `@group(0) @binding(1)` transform: world, normal (128 bytes)
//! - `@group(0) @binding(2)` lighting blob (up to 1024 bytes)
//! - `@group(0) @binding(3)` / `@binding(4)` vertex / fragment parameters (up to 256 bytes)
//! - `@group(1) @binding(2i)` / `@binding(2i + 1)` texture and sampler `i`, where
//!   `i` is the position of the sampler name in [`ProgramDesc::samplers`]
//! - `@group(2) @binding(0)` the draw's uniform-buffer window
//!
//! Vertex attributes use the shader location of their [`ElementSlot`](crate::geometry::ElementSlot).

mod convert;
mod init;
mod pipeline;
mod replay;
mod target;

pub use init::GpuInit;
pub use target::{OffscreenTarget, RenderTarget};

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU64;

use anyhow::{Context, Result};
use wgpu::util::DeviceExt;

use crate::coords::PixelRect;
use crate::geometry::VertexLayout;

use super::types::*;
use super::GpuBackend;
use pipeline::{Layouts, PipelineCache, PipelineKey, ProgramModule, UNIFORM_WINDOWS};
use replay::{DrawOp, Op, Replay};

/// Size of the placeholder bound when a draw has no uniform buffer.
const DUMMY_UNIFORM_BYTES: u64 = 256;

/// One program: a WGSL module and the sampler names it declares.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
    /// Sampler names in binding order.
    pub samplers: &'a [&'a str],
}

struct BufferEntry {
    kind: BufferKind,
    /// Pool entry currently backing the buffer.
    raw: usize,
    shadow: Vec<u8>,
}

struct VertexArray {
    layout: VertexLayout,
    vertices: BufferId,
    indices: BufferId,
}

struct Program {
    module: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_entry: String,
    samplers: Vec<String>,
    /// Texture unit read by each sampler binding.
    units: [u32; MAX_TEXTURE_UNITS],
    uniforms: [Vec<u8>; UniformSlot::COUNT],
    /// Offsets into this frame's uniform arena; `None` until first drawn.
    staged: [Option<u32>; UniformSlot::COUNT],
    user: Option<UniformBinding>,
}

/// Current immediate-mode state.
#[derive(Default)]
struct Bound {
    program: Option<ProgramId>,
    vertex_array: Option<VertexArrayId>,
    viewport: PixelRect,
    scissor: Option<PixelRect>,
    cull: CullMode,
    blend: Option<BlendFactors>,
    depth: DepthMode,
    textures: [Option<TextureId>; MAX_TEXTURE_UNITS],
}

/// Everything recorded since the last [`Gpu::finish`].
#[derive(Default)]
struct Recording {
    ops: Vec<Op>,
    uniforms: Vec<u8>,
    texture_groups: Vec<wgpu::BindGroup>,
    texture_group_keys: HashMap<[Option<TextureId>; MAX_TEXTURE_UNITS], usize>,
    user_groups: Vec<wgpu::BindGroup>,
    user_group_keys: HashMap<(usize, u64), usize>,
    /// Pool entries released after replay: staging copies and retired buffers.
    transient: Vec<usize>,
}

/// Owns wgpu core objects and every resource the frame pipeline creates.
///
/// Headless: callers provide the target on [`finish`](Self::finish), either
/// from a surface texture or an [`OffscreenTarget`].
pub struct Gpu {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    formats: (wgpu::TextureFormat, wgpu::TextureFormat),
    alignment: usize,

    layouts: Layouts,
    pipelines: PipelineCache,
    sampler: wgpu::Sampler,
    fallback: wgpu::TextureView,
    dummy_uniforms: usize,

    pool: Vec<Option<wgpu::Buffer>>,
    free_pool: Vec<usize>,
    buffers: Vec<Option<BufferEntry>>,
    vertex_arrays: Vec<Option<VertexArray>>,
    programs: Vec<Option<Program>>,
    textures: Vec<Option<(wgpu::Texture, wgpu::TextureView)>>,
    targets: Vec<Option<OffscreenTarget>>,

    bound: Bound,
    recording: Recording,
    errors: VecDeque<String>,
}

impl Gpu {
    /// Creates a headless GPU backend.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(init: GpuInit) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lancer device"),
                required_features: init.required_features,
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let alignment = device.limits().min_uniform_buffer_offset_alignment as usize;
        log::info!(
            "gpu: {} ({:?}), uniform alignment {alignment}",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        let layouts = Layouts::new(&device);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lancer sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });
        let fallback = create_rgba8(&device, &queue, "lancer fallback texture", 1, 1, &[255; 4]).1;
        let dummy = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lancer dummy uniforms"),
            size: DUMMY_UNIFORM_BYTES,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });

        Ok(Self {
            adapter,
            device,
            queue,
            formats: (init.color_format, init.depth_format),
            alignment: alignment.max(1),
            layouts,
            pipelines: PipelineCache::default(),
            sampler,
            fallback,
            dummy_uniforms: 0,
            pool: vec![Some(dummy)],
            free_pool: Vec::new(),
            buffers: Vec::new(),
            vertex_arrays: Vec::new(),
            programs: Vec::new(),
            textures: Vec::new(),
            targets: Vec::new(),
            bound: Bound::default(),
            recording: Recording::default(),
            errors: VecDeque::new(),
        })
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn create_encoder(&self) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lancer frame encoder"),
            })
    }

    pub fn create_offscreen_target(&self, width: u32, height: u32) -> OffscreenTarget {
        OffscreenTarget::new(&self.device, self.formats, width, height)
    }

    /// Allocates an offscreen target that draws can be redirected into with
    /// [`GpuBackend::set_render_target`].
    pub fn create_render_target(&mut self, width: u32, height: u32) -> RenderTargetId {
        self.targets
            .push(Some(OffscreenTarget::new(&self.device, self.formats, width, height)));
        let id = RenderTargetId(self.targets.len() as u32);
        log::debug!("render target {} created ({width}x{height})", id.0);
        id
    }

    /// Textures of a target, for copies or readback after replay.
    pub fn render_target(&self, target: RenderTargetId) -> Option<&OffscreenTarget> {
        slot(&self.targets, target.0)
    }

    /// Releases a target. Draws already recorded into it fall back to the
    /// replay target.
    pub fn destroy_render_target(&mut self, target: RenderTargetId) {
        if let Some(entry) = slot_mut(&mut self.targets, target.0) {
            *entry = None;
        }
    }

    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    // ── programs ─────────────────────────────────────────────────────────

    pub fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId> {
        anyhow::ensure!(
            desc.samplers.len() <= MAX_TEXTURE_UNITS,
            "program '{}' declares {} samplers (max {MAX_TEXTURE_UNITS})",
            desc.label,
            desc.samplers.len()
        );
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.source.into()),
            });

        self.programs.push(Some(Program {
            module,
            vertex_entry: desc.vertex_entry.to_owned(),
            fragment_entry: desc.fragment_entry.to_owned(),
            samplers: desc.samplers.iter().map(|s| (*s).to_owned()).collect(),
            units: std::array::from_fn(|i| i as u32),
            uniforms: Default::default(),
            staged: [None; UniformSlot::COUNT],
            user: None,
        }));
        let id = ProgramId(self.programs.len() as u32);
        log::debug!("program '{}' created as {}", desc.label, id.0);
        Ok(id)
    }

    pub fn destroy_program(&mut self, program: ProgramId) {
        if let Some(slot) = slot_mut(&mut self.programs, program.0) {
            *slot = None;
            self.pipelines.forget_program(program);
            if self.bound.program == Some(program) {
                self.bound.program = None;
            }
        }
    }

    // ── textures ─────────────────────────────────────────────────────────

    /// Allocates a texture id. It stays non-resident until uploaded.
    pub fn create_texture(&mut self) -> TextureId {
        self.textures.push(None);
        TextureId(self.textures.len() as u32)
    }

    /// Uploads tightly packed sRGB RGBA8 pixels, making the texture resident.
    pub fn upload_texture_rgba8(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<()> {
        anyhow::ensure!(width > 0 && height > 0, "texture {} has zero size", texture.0);
        anyhow::ensure!(
            pixels.len() == width as usize * height as usize * 4,
            "texture {}: expected {} bytes, got {}",
            texture.0,
            width as usize * height as usize * 4,
            pixels.len()
        );
        let slot = slot_mut(&mut self.textures, texture.0)
            .with_context(|| format!("unknown texture {}", texture.0))?;
        *slot = Some(create_rgba8(
            &self.device,
            &self.queue,
            "lancer texture",
            width,
            height,
            pixels,
        ));
        self.recording.texture_group_keys.clear();
        Ok(())
    }

    // ── replay ───────────────────────────────────────────────────────────

    /// Encodes everything recorded since the last call into `target`.
    ///
    /// Returns the number of draws issued. Submission is up to the caller.
    pub fn finish(&mut self, mut target: RenderTarget<'_>) -> usize {
        let recording = std::mem::take(&mut self.recording);
        for program in self.programs.iter_mut().flatten() {
            program.staged = [None; UniformSlot::COUNT];
        }

        let mut arena = recording.uniforms;
        let min_len = UNIFORM_WINDOWS.iter().copied().max().unwrap_or(0) as usize;
        if arena.len() < min_len {
            arena.resize(min_len, 0);
        }
        let arena = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("lancer uniform arena"),
                contents: &arena,
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let entries: Vec<_> = UNIFORM_WINDOWS
            .iter()
            .enumerate()
            .map(|(i, &window)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &arena,
                    offset: 0,
                    size: NonZeroU64::new(window),
                }),
            })
            .collect();
        let uniforms = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lancer uniforms"),
            layout: &self.layouts.uniforms,
            entries: &entries,
        });

        let replay = Replay {
            pool: &self.pool,
            pipelines: &self.pipelines,
            uniforms: &uniforms,
            texture_groups: &recording.texture_groups,
            user_groups: &recording.user_groups,
            targets: &self.targets,
        };
        let issued = replay.run(&recording.ops, &mut target);

        for index in recording.transient {
            if let Some(slot) = self.pool.get_mut(index) {
                *slot = None;
                self.free_pool.push(index);
            }
        }
        log::trace!("gpu: replayed {} ops, {issued} draws", recording.ops.len());
        issued
    }

    // ── recording helpers ────────────────────────────────────────────────

    fn alloc_raw(&mut self, buffer: wgpu::Buffer) -> usize {
        match self.free_pool.pop() {
            Some(index) => {
                self.pool[index] = Some(buffer);
                index
            }
            None => {
                self.pool.push(Some(buffer));
                self.pool.len() - 1
            }
        }
    }

    fn create_raw(&mut self, kind: BufferKind, size: usize) -> usize {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
            BufferKind::Uniform => wgpu::BufferUsages::UNIFORM,
        };
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lancer buffer"),
            size: size as u64,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.alloc_raw(buffer)
    }

    /// Records a copy of `bytes` into pool entry `dst` at `offset`.
    fn stage_copy(&mut self, dst: usize, offset: usize, bytes: &[u8]) {
        let staging = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("lancer staging"),
                contents: bytes,
                usage: wgpu::BufferUsages::COPY_SRC,
            });
        let src = self.alloc_raw(staging);
        self.recording.transient.push(src);
        self.recording.ops.push(Op::Copy {
            src,
            dst,
            offset: offset as u64,
            size: bytes.len() as u64,
        });
    }

    /// Appends the program's stale uniform slots to the frame arena.
    fn stage_uniforms(&mut self, program: ProgramId) -> Option<[u32; UniformSlot::COUNT]> {
        let alignment = self.alignment;
        let arena = &mut self.recording.uniforms;
        let program = slot_mut(&mut self.programs, program.0)?.as_mut()?;

        let mut offsets = [0; UniformSlot::COUNT];
        for (slot, offset) in offsets.iter_mut().enumerate() {
            *offset = match program.staged[slot] {
                Some(staged) => staged,
                None => {
                    let start = arena.len().next_multiple_of(alignment);
                    let bytes = &program.uniforms[slot];
                    arena.resize(start + UNIFORM_WINDOWS[slot] as usize, 0);
                    arena[start..start + bytes.len()].copy_from_slice(bytes);
                    program.staged[slot] = Some(start as u32);
                    start as u32
                }
            };
        }
        Some(offsets)
    }

    /// Bind group for the textures the program's samplers read.
    fn texture_group(&mut self, program: ProgramId) -> Option<usize> {
        let program = slot(&self.programs, program.0)?;
        let key: [Option<TextureId>; MAX_TEXTURE_UNITS] = std::array::from_fn(|i| {
            let unit = program.units[i] as usize;
            self.bound
                .textures
                .get(unit)
                .copied()
                .flatten()
                .filter(|t| slot(&self.textures, t.0).is_some())
        });
        if let Some(&index) = self.recording.texture_group_keys.get(&key) {
            return Some(index);
        }

        let mut entries = Vec::with_capacity(MAX_TEXTURE_UNITS * 2);
        for (i, texture) in key.iter().enumerate() {
            let view = match texture.and_then(|t| slot(&self.textures, t.0)) {
                Some((_, view)) => view,
                None => &self.fallback,
            };
            entries.push(wgpu::BindGroupEntry {
                binding: 2 * i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2 * i as u32 + 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
        }
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lancer textures"),
            layout: &self.layouts.textures,
            entries: &entries,
        });

        let index = self.recording.texture_groups.len();
        self.recording.texture_groups.push(group);
        self.recording.texture_group_keys.insert(key, index);
        Some(index)
    }

    /// Bind group and dynamic offset for the program's uniform-buffer window.
    fn user_group(&mut self, program: ProgramId) -> Result<(usize, u32), String> {
        let binding = slot(&self.programs, program.0).and_then(|p| p.user);
        let (raw, size, offset) = match binding {
            Some(b) => {
                let entry = slot(&self.buffers, b.buffer.0)
                    .ok_or_else(|| format!("unknown uniform buffer {}", b.buffer.0))?;
                if b.size == 0 || b.offset + b.size > entry.shadow.len() {
                    return Err(format!(
                        "uniform window {}..{} outside buffer {} ({} bytes)",
                        b.offset,
                        b.offset + b.size,
                        b.buffer.0,
                        entry.shadow.len()
                    ));
                }
                (entry.raw, b.size as u64, b.offset as u32)
            }
            None => (self.dummy_uniforms, DUMMY_UNIFORM_BYTES, 0),
        };

        if let Some(&index) = self.recording.user_group_keys.get(&(raw, size)) {
            return Ok((index, offset));
        }
        let buffer = self
            .pool
            .get(raw)
            .and_then(Option::as_ref)
            .ok_or_else(|| "uniform buffer was released".to_owned())?;
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lancer user uniforms"),
            layout: &self.layouts.user,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: NonZeroU64::new(size),
                }),
            }],
        });

        let index = self.recording.user_groups.len();
        self.recording.user_groups.push(group);
        self.recording.user_group_keys.insert((raw, size), index);
        Ok((index, offset))
    }

    fn record_draw(
        &mut self,
        primitive: Primitive,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) -> Result<(), String> {
        let program_id = self
            .bound
            .program
            .ok_or_else(|| "draw without a program".to_owned())?;
        let va_id = self
            .bound
            .vertex_array
            .ok_or_else(|| "draw without a vertex array".to_owned())?;
        let va = slot(&self.vertex_arrays, va_id.0)
            .ok_or_else(|| format!("unknown vertex array {}", va_id.0))?;
        let raw = |id: BufferId| {
            slot(&self.buffers, id.0)
                .map(|b| b.raw)
                .ok_or_else(|| format!("vertex array {} uses released buffer {}", va_id.0, id.0))
        };
        let (vertices, indices) = (raw(va.vertices)?, raw(va.indices)?);

        let key = PipelineKey {
            program: program_id,
            layout_hash: va.layout.hash(),
            primitive,
            blend: self.bound.blend,
            cull: self.bound.cull,
            depth: self.bound.depth,
        };
        let program = slot(&self.programs, program_id.0)
            .ok_or_else(|| format!("unknown program {}", program_id.0))?;
        self.pipelines.ensure(
            &self.device,
            &self.layouts,
            self.formats,
            key,
            ProgramModule {
                module: &program.module,
                vertex_entry: &program.vertex_entry,
                fragment_entry: &program.fragment_entry,
            },
            &va.layout,
        )?;

        let uniform_offsets = self
            .stage_uniforms(program_id)
            .ok_or_else(|| format!("unknown program {}", program_id.0))?;
        let textures = self
            .texture_group(program_id)
            .ok_or_else(|| format!("unknown program {}", program_id.0))?;
        let (user, user_offset) = self.user_group(program_id)?;

        self.recording.ops.push(Op::Draw(DrawOp {
            pipeline: key,
            vertices,
            indices,
            viewport: self.bound.viewport,
            scissor: self.bound.scissor,
            uniform_offsets,
            textures,
            user,
            user_offset,
            start_index,
            index_count,
            base_vertex,
        }));
        Ok(())
    }

    fn error(&mut self, message: String) {
        log::debug!("gpu error: {message}");
        self.errors.push_back(message);
    }
}

impl GpuBackend for Gpu {
    fn uniform_offset_alignment(&self) -> usize {
        self.alignment
    }

    // ── buffers ──────────────────────────────────────────────────────────

    fn create_buffer(&mut self, kind: BufferKind, size: usize) -> BufferId {
        let size = size.max(4).next_multiple_of(4);
        let raw = self.create_raw(kind, size);
        self.buffers.push(Some(BufferEntry {
            kind,
            raw,
            shadow: vec![0; size],
        }));
        BufferId(self.buffers.len() as u32)
    }

    fn resize_buffer(&mut self, buffer: BufferId, size: usize, preserve: usize) {
        let size = size.max(4).next_multiple_of(4);
        let Some(entry) = slot_mut(&mut self.buffers, buffer.0).and_then(Option::as_mut) else {
            self.error(format!("resize of unknown buffer {}", buffer.0));
            return;
        };
        let preserve = preserve.min(entry.shadow.len()).min(size);
        entry.shadow.truncate(preserve);
        entry.shadow.resize(size, 0);
        let (kind, retired) = (entry.kind, entry.raw);

        let raw = self.create_raw(kind, size);
        self.recording.transient.push(retired);
        let Some(entry) = slot_mut(&mut self.buffers, buffer.0).and_then(Option::as_mut) else {
            return;
        };
        entry.raw = raw;

        if preserve > 0 {
            let kept = entry.shadow[..preserve.next_multiple_of(4).min(size)].to_vec();
            self.stage_copy(raw, 0, &kept);
        }
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let Some(entry) = slot_mut(&mut self.buffers, buffer.0).and_then(Option::as_mut) else {
            self.error(format!("write to unknown buffer {}", buffer.0));
            return;
        };
        let end = offset + data.len();
        if end > entry.shadow.len() {
            let len = entry.shadow.len();
            self.error(format!(
                "write of {}..{end} past the end of buffer {} ({len} bytes)",
                offset, buffer.0
            ));
            return;
        }
        entry.shadow[offset..end].copy_from_slice(data);

        // Copies move whole words.
        let start = offset & !3;
        let stop = end.next_multiple_of(4).min(entry.shadow.len());
        let bytes = entry.shadow[start..stop].to_vec();
        let dst = entry.raw;
        self.stage_copy(dst, start, &bytes);
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(entry) = slot_mut(&mut self.buffers, buffer.0).and_then(Option::take) {
            self.recording.transient.push(entry.raw);
        }
    }

    // ── vertex arrays ────────────────────────────────────────────────────

    fn create_vertex_array(
        &mut self,
        layout: &VertexLayout,
        vertices: BufferId,
        indices: BufferId,
    ) -> VertexArrayId {
        if let Err(e) = convert::vertex_attributes(layout) {
            self.error(format!(
                "vertex element {:?} ({:?} x{}) has no wgpu vertex format",
                e.slot, e.kind, e.count
            ));
        }
        self.vertex_arrays.push(Some(VertexArray {
            layout: layout.clone(),
            vertices,
            indices,
        }));
        VertexArrayId(self.vertex_arrays.len() as u32)
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if let Some(entry) = slot_mut(&mut self.vertex_arrays, vertex_array.0) {
            *entry = None;
        }
        if self.bound.vertex_array == Some(vertex_array) {
            self.bound.vertex_array = None;
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        self.bound.vertex_array = Some(vertex_array);
    }

    // ── fixed function ───────────────────────────────────────────────────

    fn set_render_target(&mut self, target: Option<RenderTargetId>) {
        self.recording.ops.push(Op::Target(target));
    }

    fn set_viewport(&mut self, rect: PixelRect) {
        self.bound.viewport = rect;
    }

    fn set_scissor(&mut self, rect: Option<PixelRect>) {
        self.bound.scissor = rect;
    }

    fn set_cull(&mut self, cull: CullMode) {
        self.bound.cull = cull;
    }

    fn set_blend(&mut self, blend: Option<BlendFactors>) {
        self.bound.blend = blend;
    }

    fn set_depth(&mut self, depth: DepthMode) {
        self.bound.depth = depth;
    }

    fn clear(&mut self, color: Option<[f32; 4]>, depth: bool) {
        self.recording.ops.push(Op::Clear { color, depth });
    }

    // ── programs ─────────────────────────────────────────────────────────

    fn use_program(&mut self, program: ProgramId) {
        self.bound.program = Some(program);
    }

    fn sampler_location(&mut self, program: ProgramId, name: &str) -> Option<u32> {
        slot(&self.programs, program.0)?
            .samplers
            .iter()
            .position(|s| s == name)
            .map(|i| i as u32)
    }

    fn set_sampler_unit(&mut self, program: ProgramId, location: u32, unit: u32) {
        if unit as usize >= MAX_TEXTURE_UNITS {
            self.error(format!("texture unit {unit} out of range"));
            return;
        }
        if let Some(p) = slot_mut(&mut self.programs, program.0).and_then(Option::as_mut) {
            if let Some(u) = p.units.get_mut(location as usize) {
                *u = unit;
            }
        }
    }

    fn upload_uniform(&mut self, program: ProgramId, slot: UniformSlot, data: &[u8]) {
        let window = UNIFORM_WINDOWS[slot.index()] as usize;
        let Some(p) = slot_mut(&mut self.programs, program.0).and_then(Option::as_mut) else {
            self.error(format!("uniform upload to unknown program {}", program.0));
            return;
        };
        let len = data.len().min(window);
        let stored = &mut p.uniforms[slot.index()];
        stored.clear();
        stored.extend_from_slice(&data[..len]);
        p.staged[slot.index()] = None;

        if data.len() > window {
            self.error(format!(
                "{slot:?} upload of {} bytes exceeds the {window}-byte window",
                data.len()
            ));
        }
    }

    fn bind_uniform_buffer(&mut self, program: ProgramId, binding: UniformBinding) {
        if let Some(p) = slot_mut(&mut self.programs, program.0).and_then(Option::as_mut) {
            p.user = Some(binding);
        }
    }

    // ── textures ─────────────────────────────────────────────────────────

    fn texture_resident(&self, texture: TextureId) -> bool {
        slot(&self.textures, texture.0).is_some()
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        if let Some(bound) = self.bound.textures.get_mut(unit as usize) {
            *bound = Some(texture);
        }
    }

    /// The id stays valid and can be re-uploaded.
    fn unload_texture(&mut self, texture: TextureId) {
        if let Some(slot) = slot_mut(&mut self.textures, texture.0) {
            *slot = None;
            self.recording.texture_group_keys.clear();
        }
    }

    // ── draws ────────────────────────────────────────────────────────────

    fn draw_indexed(
        &mut self,
        primitive: Primitive,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) {
        if index_count == 0 {
            return;
        }
        if let Err(message) = self.record_draw(primitive, index_count, start_index, base_vertex) {
            self.error(message);
        }
    }

    fn take_error(&mut self) -> Option<String> {
        self.errors.pop_front()
    }
}

// ── id lookup ─────────────────────────────────────────────────────────────

/// Ids are 1-based indices into their table.
fn slot<T>(table: &[Option<T>], id: u32) -> Option<&T> {
    let index = (id as usize).checked_sub(1)?;
    table.get(index)?.as_ref()
}

fn slot_mut<T>(table: &mut [Option<T>], id: u32) -> Option<&mut Option<T>> {
    let index = (id as usize).checked_sub(1)?;
    table.get_mut(index)
}

fn create_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> (wgpu::Texture, wgpu::TextureView) {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
