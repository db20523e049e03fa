//! Recorded frame operations and their encoding into render passes.
//!
//! Recording happens through the immediate-mode backend calls. Replay keeps
//! their order: a buffer copy ends the open pass, a clear opens a new one with
//! clear load ops, a target switch ends the pass and redirects the next one,
//! and draws run in whatever pass is open.

use crate::coords::PixelRect;
use crate::device::{RenderTargetId, UniformSlot};

use super::convert;
use super::pipeline::{PipelineCache, PipelineKey};
use super::target::{OffscreenTarget, RenderTarget};

pub(super) enum Op {
    /// Copy `size` bytes from staging pool entry `src` into pool entry `dst`.
    Copy {
        src: usize,
        dst: usize,
        offset: u64,
        size: u64,
    },
    Clear {
        color: Option<[f32; 4]>,
        depth: bool,
    },
    /// Later passes render into this target; `None` is the replay target.
    Target(Option<RenderTargetId>),
    Draw(DrawOp),
}

/// One indexed draw with every binding resolved at record time.
pub(super) struct DrawOp {
    pub pipeline: PipelineKey,
    /// Pool entries of the vertex and index buffers.
    pub vertices: usize,
    pub indices: usize,
    pub viewport: PixelRect,
    pub scissor: Option<PixelRect>,
    pub uniform_offsets: [u32; UniformSlot::COUNT],
    pub textures: usize,
    pub user: usize,
    pub user_offset: u32,
    pub start_index: u32,
    pub index_count: u32,
    pub base_vertex: i32,
}

/// Resources a replay reads.
pub(super) struct Replay<'a> {
    pub pool: &'a [Option<wgpu::Buffer>],
    pub pipelines: &'a PipelineCache,
    pub uniforms: &'a wgpu::BindGroup,
    pub texture_groups: &'a [wgpu::BindGroup],
    pub user_groups: &'a [wgpu::BindGroup],
    pub targets: &'a [Option<OffscreenTarget>],
}

/// Views the open pass writes to.
#[derive(Clone, Copy)]
struct Attachments<'v> {
    color: &'v wgpu::TextureView,
    depth: &'v wgpu::TextureView,
    width: u32,
    height: u32,
}

impl<'v> Attachments<'v> {
    fn offscreen(target: &'v OffscreenTarget) -> Self {
        Self {
            color: &target.color_view,
            depth: &target.depth_view,
            width: target.width,
            height: target.height,
        }
    }
}

impl Replay<'_> {
    /// Encodes `ops` into `target`. Returns the number of draws issued.
    pub fn run(&self, ops: &[Op], target: &mut RenderTarget<'_>) -> usize {
        let frame = Attachments {
            color: target.color_view,
            depth: target.depth_view,
            width: target.width,
            height: target.height,
        };
        let mut current = frame;
        let mut pass: Option<wgpu::RenderPass<'static>> = None;
        let mut issued = 0;

        for op in ops {
            match op {
                Op::Copy {
                    src,
                    dst,
                    offset,
                    size,
                } => {
                    pass = None;
                    let (Some(src), Some(dst)) = (self.buffer(*src), self.buffer(*dst)) else {
                        log::warn!("replay: copy references a released buffer");
                        continue;
                    };
                    target
                        .encoder
                        .copy_buffer_to_buffer(src, 0, dst, *offset, *size);
                }
                Op::Clear { color, depth } => {
                    // An encoder holds one pass at a time.
                    drop(pass.take());
                    pass = Some(begin_pass(target.encoder, &current, *color, *depth));
                }
                Op::Target(id) => {
                    drop(pass.take());
                    current = match id {
                        None => frame,
                        Some(id) => match self.target(*id) {
                            Some(offscreen) => Attachments::offscreen(offscreen),
                            None => {
                                log::warn!("replay: unknown render target {}", id.0);
                                frame
                            }
                        },
                    };
                }
                Op::Draw(draw) => {
                    let (Some(pipeline), Some(vertices), Some(indices)) = (
                        self.pipelines.get(&draw.pipeline),
                        self.buffer(draw.vertices),
                        self.buffer(draw.indices),
                    ) else {
                        log::warn!("replay: draw references a released resource");
                        continue;
                    };
                    let (width, height) = (current.width, current.height);
                    let Some(viewport) = convert::target_rect(draw.viewport, width, height) else {
                        continue;
                    };
                    let scissor = match draw.scissor {
                        Some(rect) => convert::target_rect(rect, width, height),
                        None => Some((0, 0, width, height)),
                    };
                    let Some((sx, sy, sw, sh)) = scissor else {
                        continue;
                    };

                    let pass = pass
                        .get_or_insert_with(|| begin_pass(target.encoder, &current, None, false));
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, self.uniforms, &draw.uniform_offsets);
                    pass.set_bind_group(1, &self.texture_groups[draw.textures], &[]);
                    pass.set_bind_group(2, &self.user_groups[draw.user], &[draw.user_offset]);
                    pass.set_vertex_buffer(0, vertices.slice(..));
                    pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);

                    let (vx, vy, vw, vh) = viewport;
                    pass.set_viewport(vx as f32, vy as f32, vw as f32, vh as f32, 0.0, 1.0);
                    pass.set_scissor_rect(sx, sy, sw, sh);
                    pass.draw_indexed(
                        draw.start_index..draw.start_index + draw.index_count,
                        draw.base_vertex,
                        0..1,
                    );
                    issued += 1;
                }
            }
        }

        drop(pass);
        issued
    }

    #[inline]
    fn buffer(&self, index: usize) -> Option<&wgpu::Buffer> {
        self.pool.get(index).and_then(Option::as_ref)
    }

    /// Ids are 1-based.
    fn target(&self, id: RenderTargetId) -> Option<&OffscreenTarget> {
        let index = (id.0 as usize).checked_sub(1)?;
        self.targets.get(index)?.as_ref()
    }
}

fn begin_pass(
    encoder: &mut wgpu::CommandEncoder,
    attachments: &Attachments<'_>,
    color: Option<[f32; 4]>,
    clear_depth: bool,
) -> wgpu::RenderPass<'static> {
    let color_load = match color {
        Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
            r: f64::from(r),
            g: f64::from(g),
            b: f64::from(b),
            a: f64::from(a),
        }),
        None => wgpu::LoadOp::Load,
    };
    let depth_load = if clear_depth {
        wgpu::LoadOp::Clear(1.0)
    } else {
        wgpu::LoadOp::Load
    };

    encoder
        .begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lancer pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: attachments.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: attachments.depth,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
        .forget_lifetime()
}
