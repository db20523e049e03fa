//! Material binding ("prepare").
//!
//! Responsibilities:
//! - apply fixed-function state (cull, blend, depth) through the `Device` cache
//! - resolve the shader variant for (layout hash, capabilities)
//! - bind samplers and textures, reloading non-resident textures
//! - upload uniforms only when the program's cached copy is stale
//! - bind the program last

use glam::Mat4;

use crate::arena::{LightingArena, LightingHandle, TransformArena, TransformHandle};
use crate::device::{
    DepthMode, Device, GpuBackend, ProgramId, TextureId, UniformBinding, UniformSlot,
};
use crate::error::ErrorReporter;
use crate::material::{Material, MaterialHandle, MaterialStore, ParamBlock};
use crate::shader::{ShaderLibrary, UniformCache};

use super::Camera;

/// Uploaded when a draw has no lighting.
const NO_LIGHTS: [u8; 16] = [0; 16];

const IDENTITY_PAIR: [Mat4; 2] = [Mat4::IDENTITY; 2];

/// Per-draw inputs besides the material.
#[derive(Debug, Copy, Clone, Default)]
pub(crate) struct DrawBindings {
    pub layout_hash: u64,
    pub transform: Option<TransformHandle>,
    pub lighting: Option<LightingHandle>,
    pub uniforms: Option<UniformBinding>,
    /// Replaces the texture of one sampler slot for this draw only.
    pub texture_override: Option<(usize, TextureId)>,
}

/// Borrowed view of everything prepare reads or updates.
pub(crate) struct Binder<'a, B: GpuBackend> {
    pub device: &'a mut Device<B>,
    pub materials: &'a MaterialStore,
    pub shaders: &'a mut ShaderLibrary,
    pub camera: &'a Camera,
    pub transforms: &'a TransformArena,
    pub lighting: &'a LightingArena,
    pub frame: u64,
    pub errors: &'a mut ErrorReporter,
}

impl<B: GpuBackend> Binder<'_, B> {
    /// Makes the device ready to draw with `handle`.
    ///
    /// Returns `false` after reporting a critical error; the draw must be skipped.
    pub fn prepare(&mut self, handle: MaterialHandle, draw: &DrawBindings) -> bool {
        let Some(material) = self.materials.get(handle) else {
            self.errors
                .critical(&format!("prepare: invalid material handle {}", handle.raw()));
            return false;
        };

        self.device.set_cull(material.cull());
        match material.blend() {
            Some(factors) => {
                self.device.set_blend(Some(factors));
                self.device.set_depth(DepthMode::NoWrite);
            }
            None => {
                self.device.set_blend(None);
                self.device.set_depth(DepthMode::All);
            }
        }

        let Some(collection) = material.shaders() else {
            self.errors.critical(&format!(
                "prepare: material {} has no shader collection",
                handle.raw()
            ));
            return false;
        };
        let Some(shader_id) =
            self.shaders
                .lookup(collection, draw.layout_hash, material.capabilities())
        else {
            self.errors.critical(&format!(
                "prepare: no shader for layout {:#x} with capabilities {:#x}",
                draw.layout_hash,
                material.capabilities()
            ));
            return false;
        };
        let Some(shader) = self.shaders.shader_mut(shader_id) else {
            self.errors
                .critical(&format!("prepare: unknown shader {shader_id:?}"));
            return false;
        };
        let program = shader.program();
        let cache = &mut shader.cache;

        if !bind_samplers(self.device, self.errors, program, cache, material, draw) {
            return false;
        }

        upload_params(
            self.device,
            program,
            UniformSlot::VertexParams,
            &mut cache.vertex_params,
            material.vertex_params(),
        );
        upload_params(
            self.device,
            program,
            UniformSlot::FragmentParams,
            &mut cache.fragment_params,
            material.fragment_params(),
        );

        if cache.camera_version != self.camera.version() {
            let matrices = self.camera.uniform();
            self.device.backend_mut().upload_uniform(
                program,
                UniformSlot::Camera,
                bytemuck::cast_slice(&matrices[..]),
            );
            cache.camera_version = self.camera.version();
        }

        let (lighting_key, lights) = match draw.lighting {
            None => (0, &NO_LIGHTS[..]),
            Some(h) => match self.lighting.get(h) {
                Some((bytes, hash)) => (hash, bytes),
                None => {
                    self.errors
                        .warn(&format!("prepare: invalid lighting handle {}", h.raw()));
                    (0, &NO_LIGHTS[..])
                }
            },
        };
        if cache.lighting != Some(lighting_key) {
            self.device
                .backend_mut()
                .upload_uniform(program, UniformSlot::Lighting, lights);
            cache.lighting = Some(lighting_key);
        }

        let transform_key = draw
            .transform
            .map_or(0, |h| (self.frame << 32) | u64::from(h.raw()));
        if cache.transform != Some(transform_key) {
            let pair = match draw.transform {
                None => &IDENTITY_PAIR,
                Some(h) => match self.transforms.get(h) {
                    Some(pair) => pair,
                    None => {
                        self.errors
                            .warn(&format!("prepare: invalid transform handle {}", h.raw()));
                        &IDENTITY_PAIR
                    }
                },
            };
            self.device.backend_mut().upload_uniform(
                program,
                UniformSlot::Transform,
                bytemuck::cast_slice(&pair[..]),
            );
            cache.transform = Some(transform_key);
        }

        if let Some(binding) = draw.uniforms {
            if cache.uniform_buffer != Some(binding) {
                self.device
                    .backend_mut()
                    .bind_uniform_buffer(program, binding);
                cache.uniform_buffer = Some(binding);
            }
        }

        self.device.use_program(program);
        true
    }
}

fn bind_samplers<B: GpuBackend>(
    device: &mut Device<B>,
    errors: &mut ErrorReporter,
    program: ProgramId,
    cache: &mut UniformCache,
    material: &Material,
    draw: &DrawBindings,
) -> bool {
    for (unit, sampler) in material.samplers().iter().enumerate() {
        let texture = match draw.texture_override {
            Some((slot, texture)) if slot == unit => Some(texture),
            _ => sampler.texture(),
        };
        let Some(texture) = texture else { continue };

        let state = &mut cache.samplers[unit];
        if let Some(name) = sampler.name() {
            if state.name_hash != sampler.name_hash {
                let location = device.backend_mut().sampler_location(program, name);
                match location {
                    Some(loc) => device
                        .backend_mut()
                        .set_sampler_unit(program, loc, unit as u32),
                    None => errors.warn(&format!(
                        "prepare: program {} does not declare sampler '{name}'",
                        program.0
                    )),
                }
                state.name_hash = sampler.name_hash;
                state.location = location;
            }
        }

        if !device.ensure_resident(texture) {
            errors.critical(&format!(
                "prepare: texture {} could not be made resident",
                texture.0
            ));
            return false;
        }
        device.bind_texture(unit, texture);
    }
    true
}

fn upload_params<B: GpuBackend>(
    device: &mut Device<B>,
    program: ProgramId,
    slot: UniformSlot,
    cached: &mut Option<u64>,
    block: Option<&ParamBlock>,
) {
    let hash = block.map(ParamBlock::hash);
    if *cached == hash {
        return;
    }
    if let Some(block) = block {
        device
            .backend_mut()
            .upload_uniform(program, slot, block.bytes());
    }
    *cached = hash;
}
