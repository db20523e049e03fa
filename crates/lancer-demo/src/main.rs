//! Headless showcase: a lit mesh grid, a translucent overlay, textured
//! billboards through a dynamic batch and a top-down minimap drawn into its own
//! render target, rendered offscreen for a few frames.

use anyhow::{Context as _, Result};
use bytemuck::{Pod, Zeroable};
use glam::{vec3, Mat4, Quat, Vec3};

use lancer_render::device::{BlendFactors, Gpu, GpuInit, ProgramDesc, TextureId};
use lancer_render::error::Severity;
use lancer_render::geometry::{ElementSlot, ElementType, StaticGeometry, VertexElement, VertexLayout};
use lancer_render::logging::{init_logging, LoggingConfig};
use lancer_render::material::MaterialHandle;
use lancer_render::render::{Context, ContextConfig, DrawCall, DynamicDrawId};

const WIDTH: u32 = 960;
const HEIGHT: u32 = 540;
const FRAMES: u32 = 3;

const CHECKER_SIZE: u32 = 8;
const MINIMAP: (u32, u32) = (240, 135);

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct MeshVertex {
    position: [f32; 3],
    normal: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct SpriteVertex {
    position: [f32; 3],
    uv: [f32; 2],
    color: [u8; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Lights {
    direction: [f32; 4],
    color: [f32; 4],
    ambient: [f32; 4],
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let mut gpu = pollster::block_on(Gpu::new(GpuInit::default()))?;
    let info = gpu.adapter_info();
    log::info!("rendering {FRAMES} frames at {WIDTH}x{HEIGHT} on {}", info.name);

    let lit = gpu.create_program(&ProgramDesc {
        label: "lit",
        source: include_str!("../shaders/lit.wgsl"),
        vertex_entry: "vs_main",
        fragment_entry: "fs_main",
        samplers: &[],
    })?;
    let sprite = gpu.create_program(&ProgramDesc {
        label: "sprite",
        source: include_str!("../shaders/sprite.wgsl"),
        vertex_entry: "vs_main",
        fragment_entry: "fs_main",
        samplers: &["sprite_tex"],
    })?;

    // The checker texture starts non-resident; the loader brings it in on first use.
    let checker = gpu.create_texture();
    let glow = gpu.create_texture();
    gpu.upload_texture_rgba8(glow, 1, 1, &[255, 220, 160, 255])?;

    let mut ctx = Context::new(gpu, ContextConfig::default());
    ctx.set_error_callback(Some(Box::new(|severity: Severity, msg: &str| match severity {
        Severity::Warning => log::warn!("render: {msg}"),
        Severity::Critical => log::error!("render: {msg}"),
    })));
    let pixels = checker_pixels();
    ctx.set_texture_loader(Some(Box::new(move |gpu: &mut Gpu, texture: TextureId| {
        if let Err(e) = gpu.upload_texture_rgba8(texture, CHECKER_SIZE, CHECKER_SIZE, &pixels) {
            log::warn!("texture {} failed to load: {e:#}", texture.0);
        }
    })));

    let shaders = ctx.shaders_mut();
    let lit_shader = shaders.create_shader(lit);
    let lit_collection = shaders.create_collection();
    shaders.add_default_shader(lit_collection, 0, lit_shader)?;
    let sprite_shader = shaders.create_shader(sprite);
    let sprite_collection = shaders.create_collection();
    shaders.add_default_shader(sprite_collection, 0, sprite_shader)?;

    let solid = ctx.create_material().context("material store exhausted")?;
    ctx.set_shaders(solid, Some(lit_collection))?;
    ctx.set_fragment_parameters(solid, bytemuck::bytes_of(&[0.8f32, 0.8, 0.85, 1.0]))?;

    let sprites = ctx.create_material().context("material store exhausted")?;
    ctx.set_shaders(sprites, Some(sprite_collection))?;
    ctx.set_blend_mode(sprites, Some(BlendFactors::ALPHA))?;
    ctx.set_sampler_name(sprites, 0, Some("sprite_tex"))?;

    let (vertices, indices) = cube();
    let mut cube_geometry = StaticGeometry::new(ctx.device_mut(), mesh_layout());
    let cube_range = cube_geometry.upload(
        ctx.device_mut(),
        bytemuck::cast_slice(&vertices),
        &indices,
    );

    let batch = ctx
        .create_dynamic_draw(sprite_layout(), sprites, 4, 6, &[0, 1, 2, 0, 2, 3])
        .context("sprite batch rejected")?;
    ctx.set_dynamic_sampler(batch, Some(0));

    let target = ctx.device().backend().create_offscreen_target(WIDTH, HEIGHT);
    let minimap = ctx
        .device_mut()
        .backend_mut()
        .create_render_target(MINIMAP.0, MINIMAP.1);
    let projection = Mat4::perspective_rh(
        45f32.to_radians(),
        WIDTH as f32 / HEIGHT as f32,
        0.1,
        100.0,
    );
    let lights = Lights {
        direction: [-0.4, -1.0, -0.6, 0.0],
        color: [1.0, 0.95, 0.9, 0.0],
        ambient: [0.15, 0.15, 0.2, 0.0],
    };

    for frame in 0..FRAMES {
        let eye = Quat::from_rotation_y(frame as f32 * 0.2) * vec3(0.0, 4.0, 12.0);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);

        ctx.begin_frame(WIDTH as i32, HEIGHT as i32);
        ctx.clear_all([0.05, 0.06, 0.08, 1.0]);
        ctx.set_camera(view, projection);
        let lighting = ctx.set_lights(bytemuck::bytes_of(&lights));

        for x in -2..=2 {
            for z in -2..=2 {
                let position = vec3(x as f32 * 2.5, 0.0, z as f32 * 2.5);
                let spin = Quat::from_rotation_y((x + z) as f32 * 0.3 + frame as f32 * 0.1);
                let transform = ctx.alloc_transform(Mat4::from_rotation_translation(spin, position));
                ctx.draw(
                    &DrawCall::new(solid, &cube_geometry, cube_range)
                        .with_transform(transform)
                        .with_lighting(lighting)
                        .at_depth(view.transform_point3(position).z.abs()),
                );
            }
        }

        // Translucent overlay cube reusing the solid material's state.
        if let Some(glass) = ctx.clone_temporary_material(solid) {
            ctx.set_blend_mode(glass, Some(BlendFactors::ALPHA))?;
            ctx.set_fragment_parameters(glass, bytemuck::bytes_of(&[0.3f32, 0.6, 1.0, 0.4]))?;
            let position = vec3(0.0, 2.0, 0.0);
            let transform = ctx.alloc_transform(Mat4::from_scale_rotation_translation(
                Vec3::splat(1.6),
                Quat::IDENTITY,
                position,
            ));
            ctx.draw(
                &DrawCall::new(glass, &cube_geometry, cube_range)
                    .with_transform(transform)
                    .with_lighting(lighting)
                    .at_depth(view.transform_point3(position).z.abs()),
            );
        }

        draw_sprites(&mut ctx, batch, view, checker, glow);

        // Minimap: same scene from above, into its own target.
        ctx.set_render_target(Some(minimap));
        ctx.push_viewport(0, 0, MINIMAP.0 as i32, MINIMAP.1 as i32);
        ctx.clear_all([0.0, 0.0, 0.0, 1.0]);
        ctx.set_camera(
            Mat4::look_at_rh(vec3(0.0, 20.0, 0.1), Vec3::ZERO, Vec3::Y),
            projection,
        );
        let transform = ctx.alloc_transform(Mat4::IDENTITY);
        ctx.draw(
            &DrawCall::new(solid, &cube_geometry, cube_range)
                .with_transform(transform)
                .with_lighting(lighting),
        );
        ctx.pop_viewport();
        ctx.set_render_target(None);

        ctx.end_frame();

        let gpu = ctx.device_mut().backend_mut();
        let mut encoder = gpu.create_encoder();
        let draws = gpu.finish(target.target(&mut encoder));
        gpu.submit(encoder);
        log::info!(
            "frame {frame}: {draws} draws, {} pipelines cached",
            gpu.pipeline_count()
        );
    }

    ctx.destroy_dynamic_draw(batch);
    cube_geometry.destroy(ctx.device_mut());
    ctx.unload_texture(checker);
    ctx.device_mut().backend_mut().destroy_render_target(minimap);
    log::info!("done after {} frames", ctx.frame_number());
    Ok(())
}

/// A ring of camera-facing quads alternating between two textures.
fn draw_sprites(
    ctx: &mut Context<Gpu>,
    batch: DynamicDrawId,
    view: Mat4,
    checker: TextureId,
    glow: TextureId,
) {
    let inverse = view.inverse();
    let right = inverse.transform_vector3(Vec3::X) * 0.4;
    let up = inverse.transform_vector3(Vec3::Y) * 0.4;

    for i in 0..16 {
        let angle = i as f32 / 16.0 * std::f32::consts::TAU;
        let center = vec3(angle.cos() * 7.0, 1.5, angle.sin() * 7.0);
        let corners = [center - right - up, center + right - up, center + right + up, center - right + up];
        let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
        let quad: [SpriteVertex; 4] = std::array::from_fn(|k| SpriteVertex {
            position: corners[k].to_array(),
            uv: uvs[k],
            color: [255, 255, 255, 200],
        });

        let texture = if i % 2 == 0 { checker } else { glow };
        let depth = view.transform_point3(center).z.abs();
        ctx.dynamic_draw(batch, bytemuck::cast_slice(&quad), texture, depth);
    }
}

fn mesh_layout() -> VertexLayout {
    VertexLayout::new(
        24,
        &[
            VertexElement::new(ElementSlot::Position, ElementType::Float, 3, 0),
            VertexElement::new(ElementSlot::Normal, ElementType::Float, 3, 12),
        ],
    )
}

fn sprite_layout() -> VertexLayout {
    VertexLayout::new(
        24,
        &[
            VertexElement::new(ElementSlot::Position, ElementType::Float, 3, 0),
            VertexElement::new(ElementSlot::Texture1, ElementType::Float, 2, 12),
            VertexElement::new(ElementSlot::Color, ElementType::UByte, 4, 20).normalized(),
        ],
    )
}

/// Unit cube with per-face normals, counter-clockwise faces.
fn cube() -> (Vec<MeshVertex>, Vec<u16>) {
    let faces = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for normal in faces {
        // Tangent basis so (u, v, normal) is right-handed.
        let u = if normal.y.abs() > 0.5 { Vec3::X } else { Vec3::Y.cross(normal) };
        let v = normal.cross(u);
        let base = vertices.len() as u16;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            vertices.push(MeshVertex {
                position: ((normal + u * su + v * sv) * 0.5).to_array(),
                normal: normal.to_array(),
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

fn checker_pixels() -> Vec<u8> {
    let mut pixels = Vec::with_capacity((CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    for y in 0..CHECKER_SIZE {
        for x in 0..CHECKER_SIZE {
            let texel: [u8; 4] = if (x + y) % 2 == 0 {
                [240, 240, 240, 255]
            } else {
                [40, 40, 48, 255]
            };
            pixels.extend_from_slice(&texel);
        }
    }
    pixels
}
