use crate::coords::PixelRect;

use super::GpuBackend;
use super::types::{
    BlendFactors, CullMode, DepthMode, ProgramId, RenderTargetId, TextureId, VertexArrayId,
    MAX_TEXTURE_UNITS,
};

/// Last state sent to the backend.
///
/// This is the single source of truth for "is this already bound/enabled";
/// nothing re-queries the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub cull: CullMode,
    pub blend: Option<BlendFactors>,
    pub depth: DepthMode,
    pub program: Option<ProgramId>,
    pub vertex_array: Option<VertexArrayId>,
    pub textures: [Option<TextureId>; MAX_TEXTURE_UNITS],
    pub viewport: Option<PixelRect>,
    pub scissor: Option<PixelRect>,
    pub render_target: Option<RenderTargetId>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            cull: CullMode::Ccw,
            blend: None,
            depth: DepthMode::All,
            program: None,
            vertex_array: None,
            textures: [None; MAX_TEXTURE_UNITS],
            viewport: None,
            scissor: None,
            render_target: None,
        }
    }
}

/// Reload hook invoked when a non-resident texture is about to be sampled.
pub type TextureLoader<B> = Box<dyn FnMut(&mut B, TextureId)>;

/// Backend plus its state cache.
///
/// Every setter compares against [`DeviceState`] and forwards only real changes.
pub struct Device<B: GpuBackend> {
    backend: B,
    state: DeviceState,
    texture_loader: Option<TextureLoader<B>>,
}

impl<B: GpuBackend> Device<B> {
    /// Wraps `backend` and pushes the default fixed-function state so the cache
    /// and the backend agree from the first draw.
    pub fn new(mut backend: B) -> Self {
        let state = DeviceState::default();
        backend.set_cull(state.cull);
        backend.set_blend(state.blend);
        backend.set_depth(state.depth);
        backend.set_scissor(None);

        Self {
            backend,
            state,
            texture_loader: None,
        }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Raw backend access. State changed through it bypasses the cache.
    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn set_texture_loader(&mut self, loader: Option<TextureLoader<B>>) {
        self.texture_loader = loader;
    }

    pub fn set_cull(&mut self, cull: CullMode) {
        if self.state.cull != cull {
            self.state.cull = cull;
            self.backend.set_cull(cull);
        }
    }

    pub fn set_blend(&mut self, blend: Option<BlendFactors>) {
        if self.state.blend != blend {
            self.state.blend = blend;
            self.backend.set_blend(blend);
        }
    }

    pub fn set_depth(&mut self, depth: DepthMode) {
        if self.state.depth != depth {
            self.state.depth = depth;
            self.backend.set_depth(depth);
        }
    }

    pub fn use_program(&mut self, program: ProgramId) {
        if self.state.program != Some(program) {
            self.state.program = Some(program);
            self.backend.use_program(program);
        }
    }

    pub fn bind_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if self.state.vertex_array != Some(vertex_array) {
            self.state.vertex_array = Some(vertex_array);
            self.backend.bind_vertex_array(vertex_array);
        }
    }

    pub fn bind_texture(&mut self, unit: usize, texture: TextureId) {
        let Some(bound) = self.state.textures.get_mut(unit) else {
            debug_assert!(false, "texture unit {unit} out of range");
            return;
        };
        if *bound != Some(texture) {
            *bound = Some(texture);
            self.backend.bind_texture(unit as u32, texture);
        }
    }

    pub fn set_viewport(&mut self, rect: PixelRect) {
        if self.state.viewport != Some(rect) {
            self.state.viewport = Some(rect);
            self.backend.set_viewport(rect);
        }
    }

    pub fn set_render_target(&mut self, target: Option<RenderTargetId>) {
        if self.state.render_target != target {
            self.state.render_target = target;
            self.backend.set_render_target(target);
        }
    }

    pub fn set_scissor(&mut self, rect: Option<PixelRect>) {
        if self.state.scissor != rect {
            self.state.scissor = rect;
            self.backend.set_scissor(rect);
        }
    }

    /// Makes `texture` resident, calling the loader if needed.
    ///
    /// Returns `false` if it is still not resident afterwards.
    pub fn ensure_resident(&mut self, texture: TextureId) -> bool {
        if self.backend.texture_resident(texture) {
            return true;
        }
        if let Some(loader) = self.texture_loader.as_mut() {
            log::debug!("reloading texture {}", texture.0);
            loader(&mut self.backend, texture);
        }
        self.backend.texture_resident(texture)
    }

    pub fn destroy_vertex_array(&mut self, vertex_array: VertexArrayId) {
        if self.state.vertex_array == Some(vertex_array) {
            self.state.vertex_array = None;
        }
        self.backend.destroy_vertex_array(vertex_array);
    }

    /// Evicts a texture. Units that held it are forgotten, so a reloaded
    /// texture is bound again on next use.
    pub fn unload_texture(&mut self, texture: TextureId) {
        self.invalidate_texture(texture);
        self.backend.unload_texture(texture);
    }

    fn invalidate_texture(&mut self, texture: TextureId) {
        for bound in self.state.textures.iter_mut() {
            if *bound == Some(texture) {
                *bound = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::recording::{GpuCall, RecordingBackend};

    fn device() -> Device<RecordingBackend> {
        let mut d = Device::new(RecordingBackend::default());
        d.backend_mut().calls.clear();
        d
    }

    // ── diffing ───────────────────────────────────────────────────────────

    #[test]
    fn unchanged_state_is_not_forwarded() {
        let mut d = device();
        d.set_cull(CullMode::Ccw);
        d.set_blend(None);
        d.set_depth(DepthMode::All);
        assert!(d.backend().calls.is_empty());
    }

    #[test]
    fn changes_are_forwarded_once() {
        let mut d = device();
        d.set_cull(CullMode::None);
        d.set_cull(CullMode::None);
        d.use_program(ProgramId(3));
        d.use_program(ProgramId(3));
        d.bind_texture(2, TextureId(9));
        d.bind_texture(2, TextureId(9));

        assert_eq!(
            d.backend().calls,
            vec![
                GpuCall::Cull(CullMode::None),
                GpuCall::UseProgram(ProgramId(3)),
                GpuCall::BindTexture { unit: 2, texture: TextureId(9) },
            ]
        );
    }

    #[test]
    fn invalidated_texture_rebinds() {
        let mut d = device();
        d.bind_texture(0, TextureId(1));
        d.invalidate_texture(TextureId(1));
        d.bind_texture(0, TextureId(1));
        assert_eq!(d.backend().calls.len(), 2);
    }

    #[test]
    fn render_target_switches_are_diffed() {
        let mut d = device();
        d.set_render_target(None);
        d.set_render_target(Some(RenderTargetId(1)));
        d.set_render_target(Some(RenderTargetId(1)));
        d.set_render_target(None);

        assert_eq!(
            d.backend().calls,
            vec![
                GpuCall::RenderTarget(Some(RenderTargetId(1))),
                GpuCall::RenderTarget(None),
            ]
        );
    }

    // ── residency ─────────────────────────────────────────────────────────

    #[test]
    fn unloaded_texture_is_evicted_and_rebound_after_reload() {
        let mut d = device();
        d.backend_mut().resident.insert(TextureId(2));
        d.bind_texture(1, TextureId(2));

        d.unload_texture(TextureId(2));
        assert!(!d.backend().texture_resident(TextureId(2)));

        d.set_texture_loader(Some(Box::new(|b: &mut RecordingBackend, t| {
            b.resident.insert(t);
        })));
        assert!(d.ensure_resident(TextureId(2)));
        d.bind_texture(1, TextureId(2));
        assert_eq!(
            d.backend().count(|c| matches!(c, GpuCall::BindTexture { unit: 1, .. })),
            2
        );
    }

    #[test]
    fn loader_restores_residency() {
        let mut d = device();
        d.set_texture_loader(Some(Box::new(|b: &mut RecordingBackend, t| {
            b.resident.insert(t);
        })));
        assert!(d.ensure_resident(TextureId(4)));
    }

    #[test]
    fn missing_loader_leaves_texture_evicted() {
        let mut d = device();
        assert!(!d.ensure_resident(TextureId(4)));
    }
}
