//! Bind group layouts and the render pipeline cache.
//!
//! Every program shares one pipeline layout:
//! - group 0: per-draw uniform windows (camera, transform, lighting, vertex and
//!   fragment parameters), each with a dynamic offset into the frame arena
//! - group 1: `MAX_TEXTURE_UNITS` texture/sampler pairs at bindings `2i`, `2i + 1`
//! - group 2: the draw's uniform-buffer window, dynamic offset

use std::collections::HashMap;
use std::num::NonZeroU64;

use crate::device::{
    BlendFactors, CullMode, DepthMode, Primitive, ProgramId, UniformSlot, MAX_TEXTURE_UNITS,
};
use crate::geometry::VertexLayout;

use super::convert;

/// Bytes bound per uniform slot, in [`UniformSlot::index`] order.
pub(super) const UNIFORM_WINDOWS: [u64; UniformSlot::COUNT] = [192, 128, 1024, 256, 256];

/// Shared bind group layouts and the pipeline layout built from them.
pub(super) struct Layouts {
    pub uniforms: wgpu::BindGroupLayout,
    pub textures: wgpu::BindGroupLayout,
    pub user: wgpu::BindGroupLayout,
    pub pipeline: wgpu::PipelineLayout,
}

impl Layouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_entries: Vec<_> = UNIFORM_WINDOWS
            .iter()
            .enumerate()
            .map(|(i, &window)| wgpu::BindGroupLayoutEntry {
                binding: i as u32,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(window),
                },
                count: None,
            })
            .collect();
        let uniforms = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lancer uniforms bgl"),
            entries: &uniform_entries,
        });

        let mut texture_entries = Vec::with_capacity(MAX_TEXTURE_UNITS * 2);
        for i in 0..MAX_TEXTURE_UNITS as u32 {
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 * i,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            texture_entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 * i + 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        let textures = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lancer textures bgl"),
            entries: &texture_entries,
        });

        let user = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lancer user uniforms bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lancer pipeline layout"),
            bind_group_layouts: &[&uniforms, &textures, &user],
            immediate_size: 0,
        });

        Self {
            uniforms,
            textures,
            user,
            pipeline,
        }
    }
}

/// Everything a pipeline bakes in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    pub program: ProgramId,
    pub layout_hash: u64,
    pub primitive: Primitive,
    pub blend: Option<BlendFactors>,
    pub cull: CullMode,
    pub depth: DepthMode,
}

/// Shader module plus entry points of one program.
pub(super) struct ProgramModule<'a> {
    pub module: &'a wgpu::ShaderModule,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
}

/// Pipelines built so far. Entries live as long as the backend.
#[derive(Default)]
pub(super) struct PipelineCache {
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    #[inline]
    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Builds the pipeline for `key` unless cached.
    pub fn ensure(
        &mut self,
        device: &wgpu::Device,
        layouts: &Layouts,
        formats: (wgpu::TextureFormat, wgpu::TextureFormat),
        key: PipelineKey,
        program: ProgramModule<'_>,
        vertex_layout: &VertexLayout,
    ) -> Result<(), String> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }
        let (color_format, depth_format) = formats;

        let attributes = convert::vertex_attributes(vertex_layout).map_err(|e| {
            format!(
                "vertex element {:?} ({:?} x{}) has no wgpu vertex format",
                e.slot, e.kind, e.count
            )
        })?;
        let buffers = [wgpu::VertexBufferLayout {
            array_stride: u64::from(vertex_layout.stride()),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lancer pipeline"),
            layout: Some(&layouts.pipeline),
            vertex: wgpu::VertexState {
                module: program.module,
                entry_point: Some(program.vertex_entry),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: program.module,
                entry_point: Some(program.fragment_entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: convert::blend_state(key.blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: convert::primitive_state(key.primitive, key.cull),
            depth_stencil: Some(convert::depth_state(key.depth, depth_format)),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!(
            "pipeline built for program {} (layout {:#x}, {} cached)",
            key.program.0,
            key.layout_hash,
            self.pipelines.len() + 1
        );
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    /// Drops every pipeline of `program`.
    pub fn forget_program(&mut self, program: ProgramId) {
        self.pipelines.retain(|k, _| k.program != program);
    }
}
