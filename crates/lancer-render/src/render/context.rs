use glam::Mat4;

use crate::arena::{LightingArena, LightingHandle, TransformArena, TransformHandle};
use crate::coords::PixelRect;
use crate::device::{
    BlendFactors, CullMode, Device, GpuBackend, Primitive, RenderTargetId, TextureId,
    TextureLoader, UniformBinding, VertexArrayId,
};
use crate::error::{AllocError, ErrorCallback, ErrorReporter, MaterialError};
use crate::geometry::{GeometryRange, StaticGeometry, VertexLayout};
use crate::handle::BlockStore;
use crate::material::{Material, MaterialHandle, MaterialStore, MAX_SAMPLERS};
use crate::scene::{DrawCmd, DrawPayload, DrawQueue, DynamicPayload, SortKey, StaticPayload};
use crate::shader::{CollectionId, ShaderLibrary};
use crate::uniform::UniformBuffer;

use super::binder::{Binder, DrawBindings};
use super::dynamic::{DynamicBatch, DynamicDrawId, Processed, DYNAMIC_MAX_TEMPLATE};
use super::frame::{Camera, FrameState};
use super::ContextConfig;

/// One static draw request.
///
/// Built from a geometry range; the remaining fields default to "none",
/// a triangle list and depth 0.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawCall {
    pub material: MaterialHandle,
    pub vertex_array: VertexArrayId,
    pub layout_hash: u64,
    pub transform: Option<TransformHandle>,
    pub lighting: Option<LightingHandle>,
    pub uniforms: Option<UniformBinding>,
    pub primitive: Primitive,
    /// View-space distance used for ordering. Larger is farther.
    pub depth: f32,
    pub base_vertex: u32,
    pub start_index: u32,
    pub index_count: u32,
}

impl DrawCall {
    pub fn new(material: MaterialHandle, geometry: &StaticGeometry, range: GeometryRange) -> Self {
        Self {
            material,
            vertex_array: geometry.vertex_array(),
            layout_hash: geometry.layout().hash(),
            transform: None,
            lighting: None,
            uniforms: None,
            primitive: Primitive::TriangleList,
            depth: 0.0,
            base_vertex: range.base_vertex,
            start_index: range.start_index,
            index_count: range.index_count,
        }
    }

    pub fn with_transform(mut self, transform: Option<TransformHandle>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_lighting(mut self, lighting: Option<LightingHandle>) -> Self {
        self.lighting = lighting;
        self
    }

    pub fn with_uniforms(mut self, uniforms: UniformBinding) -> Self {
        self.uniforms = Some(uniforms);
        self
    }

    pub fn with_primitive(mut self, primitive: Primitive) -> Self {
        self.primitive = primitive;
        self
    }

    pub fn at_depth(mut self, depth: f32) -> Self {
        self.depth = depth;
        self
    }
}

/// Frame-lifetime draw pipeline over a GPU backend.
///
/// State machine:
/// - closed: only setup calls (materials, shaders, geometry) are valid
/// - open (after `begin_frame`): draws, viewports, scissor, camera, clears
///
/// Camera, viewport and scissor changes flush queued draws first; the sort key
/// only orders draws recorded under one global state.
///
/// Misuse is reported through the [`ErrorReporter`]: invalid handles as
/// warnings, frame-state and layout violations as critical errors.
pub struct Context<B: GpuBackend> {
    device: Device<B>,
    errors: ErrorReporter,
    frame: FrameState,
    materials: MaterialStore,
    shaders: ShaderLibrary,
    queue: DrawQueue,
    transforms: TransformArena,
    lighting: LightingArena,
    batches: BlockStore<DynamicBatch>,
}

impl<B: GpuBackend> Context<B> {
    pub fn new(backend: B, config: ContextConfig) -> Self {
        log::debug!("context created: {config:?}");
        Self {
            device: Device::new(backend),
            errors: ErrorReporter::new(),
            frame: FrameState::new(config.max_viewports),
            materials: MaterialStore::new(config.material_address_limit),
            shaders: ShaderLibrary::new(),
            queue: DrawQueue::with_capacity(config.initial_commands),
            transforms: TransformArena::with_capacity(config.initial_transforms),
            lighting: LightingArena::with_capacity(config.initial_lighting_bytes),
            batches: BlockStore::new(u32::MAX),
        }
    }

    // ── setup ────────────────────────────────────────────────────────────

    /// Routes warnings and critical errors to `callback` instead of the log.
    ///
    /// With a callback installed, critical errors no longer abort.
    pub fn set_error_callback(&mut self, callback: Option<ErrorCallback>) {
        self.errors.set_callback(callback);
    }

    pub fn set_texture_loader(&mut self, loader: Option<TextureLoader<B>>) {
        self.device.set_texture_loader(loader);
    }

    /// Evicts a texture's storage. Queued draws are submitted first; later
    /// draws that sample it go through the texture loader again.
    pub fn unload_texture(&mut self, texture: TextureId) {
        self.flush();
        self.device.unload_texture(texture);
        log::debug!("texture {} unloaded", texture.0);
    }

    #[inline]
    pub fn device(&self) -> &Device<B> {
        &self.device
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut Device<B> {
        &mut self.device
    }

    #[inline]
    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    #[inline]
    pub fn shaders_mut(&mut self) -> &mut ShaderLibrary {
        &mut self.shaders
    }

    #[inline]
    pub fn materials(&self) -> &MaterialStore {
        &self.materials
    }

    pub fn into_backend(self) -> B {
        self.device.into_backend()
    }

    // ── frame ────────────────────────────────────────────────────────────

    #[inline]
    pub fn in_frame(&self) -> bool {
        self.frame.is_open()
    }

    /// Frames begun so far. The first frame is 1.
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame.number()
    }

    /// Active viewport in bottom-left framebuffer pixels.
    #[inline]
    pub fn viewport(&self) -> PixelRect {
        self.frame.viewport()
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.frame.camera
    }

    /// Commands recorded since the last flush.
    #[inline]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Lighting entries appended this frame.
    #[inline]
    pub fn lighting_entries(&self) -> usize {
        self.lighting.entry_count()
    }

    pub fn begin_frame(&mut self, width: i32, height: i32) {
        if self.frame.is_open() {
            self.errors.critical("begin_frame: frame already open");
            return;
        }
        self.transforms.reset();
        self.lighting.reset();
        let base = self.frame.begin(width, height);
        self.device.set_viewport(base);
        log::debug!("frame {} begin ({width}x{height})", self.frame.number());
    }

    pub fn end_frame(&mut self) {
        if !self.require_frame("end_frame") {
            return;
        }
        self.flush();
        self.device.set_render_target(None);

        let pushed = self.frame.pushed();
        if pushed != 0 {
            self.errors
                .critical(&format!("end_frame: {pushed} viewport(s) still pushed"));
            let base = self.frame.unwind_viewports();
            self.device.set_viewport(base);
        }
        self.device.set_scissor(None);
        let released = self.materials.release_temporaries();
        self.frame.close();
        log::debug!(
            "frame {} end ({released} temporary materials released)",
            self.frame.number()
        );
    }

    /// Pushes a viewport in bottom-left framebuffer pixels.
    pub fn push_viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        if !self.require_frame("push_viewport") {
            return;
        }
        self.flush();
        let rect = PixelRect::new(x, y, width, height);
        if !self.frame.push_viewport(rect) {
            self.errors.critical("push_viewport: viewport stack overflow");
            return;
        }
        self.device.set_viewport(rect);
    }

    pub fn pop_viewport(&mut self) {
        if !self.require_frame("pop_viewport") {
            return;
        }
        self.flush();
        match self.frame.pop_viewport() {
            Some(rect) => self.device.set_viewport(rect),
            None => self.errors.critical("pop_viewport: viewport stack underflow"),
        }
    }

    /// Restricts drawing to a rect given relative to the active viewport, origin
    /// at its top-left corner.
    pub fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        if !self.require_frame("scissor") {
            return;
        }
        self.flush();
        let rect = self.frame.scissor_rect(x, y, width, height);
        self.device.set_scissor(Some(rect));
    }

    pub fn clear_scissor(&mut self) {
        if !self.require_frame("clear_scissor") {
            return;
        }
        self.flush();
        self.device.set_scissor(None);
    }

    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        if !self.require_frame("set_camera") {
            return;
        }
        self.flush();
        self.frame.camera.set(view, projection);
    }

    /// Stores `world` and its normal matrix for this frame.
    pub fn alloc_transform(&mut self, world: Mat4) -> Option<TransformHandle> {
        if !self.require_frame("alloc_transform") {
            return None;
        }
        self.transforms.alloc(world)
    }

    /// Stores a lighting blob for this frame. Returns the previous handle when
    /// `bytes` repeats the last call; `None` for empty input.
    pub fn set_lights(&mut self, bytes: &[u8]) -> Option<LightingHandle> {
        if !self.require_frame("set_lights") {
            return None;
        }
        self.lighting.set(bytes)
    }

    /// Redirects later clears and draws into `target`, or back to the frame
    /// target with `None`. Queued draws are submitted to the previous target
    /// first. The frame target is restored by `end_frame`.
    pub fn set_render_target(&mut self, target: Option<RenderTargetId>) {
        if !self.require_frame("set_render_target") {
            return;
        }
        self.flush();
        self.device.set_render_target(target);
    }

    pub fn clear_all(&mut self, color: [f32; 4]) {
        if !self.require_frame("clear_all") {
            return;
        }
        self.flush();
        self.device.backend_mut().clear(Some(color), true);
    }

    pub fn clear_depth(&mut self) {
        if !self.require_frame("clear_depth") {
            return;
        }
        self.flush();
        self.device.backend_mut().clear(None, true);
    }

    /// Queues a static draw.
    pub fn draw(&mut self, call: &DrawCall) {
        if !self.require_frame("draw") {
            return;
        }
        let transparent = match self.materials.is_transparent(call.material) {
            Ok(t) => t,
            Err(e) => {
                self.errors.warn(&format!("draw: {e}"));
                return;
            }
        };
        if let Some(binding) = call.uniforms {
            let alignment = self.device.backend().uniform_offset_alignment().max(1);
            if binding.offset % alignment != 0 {
                self.errors.critical(&format!(
                    "draw: uniform binding offset {} is not aligned to {alignment}",
                    binding.offset
                ));
                return;
            }
        }

        self.queue.push(DrawCmd {
            key: SortKey::for_draw(transparent, call.material, call.depth),
            material: call.material,
            payload: DrawPayload::Static(StaticPayload {
                vertex_array: call.vertex_array,
                layout_hash: call.layout_hash,
                transform: call.transform,
                lighting: call.lighting,
                uniforms: call.uniforms,
                primitive: call.primitive,
                base_vertex: call.base_vertex,
                start_index: call.start_index,
                index_count: call.index_count,
            }),
        });
    }

    // ── materials ────────────────────────────────────────────────────────

    pub fn create_material(&mut self) -> Option<MaterialHandle> {
        match self.materials.create() {
            Ok(h) => Some(h),
            Err(e) => {
                self.report_alloc("create_material", e);
                None
            }
        }
    }

    pub fn free_material(&mut self, handle: MaterialHandle) {
        let result = self.materials.free(handle);
        let _ = self.checked("free_material", result);
    }

    /// Creates a material freed automatically at `end_frame`.
    pub fn create_temporary_material(&mut self) -> Option<MaterialHandle> {
        if !self.require_frame("create_temporary_material") {
            return None;
        }
        let result = self.materials.create_temporary();
        self.checked("create_temporary_material", result).ok()
    }

    /// Copies `source` into a material freed automatically at `end_frame`.
    pub fn clone_temporary_material(&mut self, source: MaterialHandle) -> Option<MaterialHandle> {
        if !self.require_frame("clone_temporary_material") {
            return None;
        }
        let result = self.materials.clone_temporary(source);
        self.checked("clone_temporary_material", result).ok()
    }

    #[inline]
    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle)
    }

    pub fn is_transparent(&mut self, handle: MaterialHandle) -> bool {
        let result = self.materials.is_transparent(handle);
        self.checked("is_transparent", result).unwrap_or(false)
    }

    /// `Some(factors)` makes the material transparent, `None` opaque.
    pub fn set_blend_mode(
        &mut self,
        handle: MaterialHandle,
        blend: Option<BlendFactors>,
    ) -> Result<(), MaterialError> {
        let result = self.materials.set_blend_mode(handle, blend);
        self.checked("set_blend_mode", result)
    }

    pub fn set_cull(&mut self, handle: MaterialHandle, cull: CullMode) -> Result<(), MaterialError> {
        let result = self.materials.set_cull(handle, cull);
        self.checked("set_cull", result)
    }

    pub fn set_shaders(
        &mut self,
        handle: MaterialHandle,
        shaders: Option<CollectionId>,
    ) -> Result<(), MaterialError> {
        let result = self.materials.set_shaders(handle, shaders);
        self.checked("set_shaders", result)
    }

    pub fn set_capabilities(&mut self, handle: MaterialHandle, caps: u32) -> Result<(), MaterialError> {
        let result = self.materials.set_capabilities(handle, caps);
        self.checked("set_capabilities", result)
    }

    pub fn set_sampler_name(
        &mut self,
        handle: MaterialHandle,
        index: usize,
        name: Option<&str>,
    ) -> Result<(), MaterialError> {
        let result = self.materials.set_sampler_name(handle, index, name);
        self.checked("set_sampler_name", result)
    }

    pub fn set_sampler_texture(
        &mut self,
        handle: MaterialHandle,
        index: usize,
        texture: Option<TextureId>,
    ) -> Result<(), MaterialError> {
        let result = self.materials.set_sampler_texture(handle, index, texture);
        self.checked("set_sampler_texture", result)
    }

    /// `bytes.len()` must be a multiple of 16. Empty clears the block.
    pub fn set_fragment_parameters(
        &mut self,
        handle: MaterialHandle,
        bytes: &[u8],
    ) -> Result<(), MaterialError> {
        let result = self.materials.set_fragment_parameters(handle, bytes);
        self.checked("set_fragment_parameters", result)
    }

    /// `bytes.len()` must be a multiple of 16. Empty clears the block.
    pub fn set_vertex_parameters(
        &mut self,
        handle: MaterialHandle,
        bytes: &[u8],
    ) -> Result<(), MaterialError> {
        let result = self.materials.set_vertex_parameters(handle, bytes);
        self.checked("set_vertex_parameters", result)
    }

    // ── dynamic draws ────────────────────────────────────────────────────

    /// Creates a batch drawing elements of `vertices_per_element` vertices,
    /// each expanded through the first `indices_per_element` entries of
    /// `template`.
    pub fn create_dynamic_draw(
        &mut self,
        layout: VertexLayout,
        material: MaterialHandle,
        vertices_per_element: usize,
        indices_per_element: usize,
        template: &[u16],
    ) -> Option<DynamicDrawId> {
        if indices_per_element == 0
            || indices_per_element > DYNAMIC_MAX_TEMPLATE
            || indices_per_element > template.len()
        {
            self.errors.critical(&format!(
                "create_dynamic_draw: index template must hold 1..={DYNAMIC_MAX_TEMPLATE} indices (got {indices_per_element} of {})",
                template.len()
            ));
            return None;
        }
        let template = &template[..indices_per_element];
        if vertices_per_element == 0 || layout.stride() == 0 {
            self.errors
                .critical("create_dynamic_draw: elements must have at least one non-empty vertex");
            return None;
        }
        if let Some(&bad) = template
            .iter()
            .find(|&&i| i as usize >= vertices_per_element)
        {
            self.errors.critical(&format!(
                "create_dynamic_draw: template index {bad} out of range for {vertices_per_element} vertices"
            ));
            return None;
        }
        if !self.materials.contains(material) {
            self.errors.warn(&format!(
                "create_dynamic_draw: invalid material handle {}",
                material.raw()
            ));
            return None;
        }

        let device = &mut self.device;
        match self.batches.allocate_with(|| {
            DynamicBatch::new(device, layout, material, vertices_per_element, template)
        }) {
            Ok(handle) => Some(DynamicDrawId(handle)),
            Err(e) => {
                self.report_alloc("create_dynamic_draw", e);
                None
            }
        }
    }

    /// Selects the material sampler slot that receives each run's texture.
    /// `None` leaves the material's textures untouched.
    pub fn set_dynamic_sampler(&mut self, id: DynamicDrawId, index: Option<usize>) {
        if index.is_some_and(|i| i >= MAX_SAMPLERS) {
            self.errors.warn(&format!(
                "set_dynamic_sampler: sampler index {index:?} out of range"
            ));
            return;
        }
        match self.batch_mut(id) {
            Some(batch) => batch.set_sampler(index),
            None => self.invalid_batch("set_dynamic_sampler", id),
        }
    }

    /// Queues one element. `vertex_bytes` must hold exactly one element.
    pub fn dynamic_draw(
        &mut self,
        id: DynamicDrawId,
        vertex_bytes: &[u8],
        texture: TextureId,
        depth: f32,
    ) {
        if !self.require_frame("dynamic_draw") {
            return;
        }
        let Some(batch) = self.batches.get_mut(id.0) else {
            self.invalid_batch("dynamic_draw", id);
            return;
        };

        let expected = batch.element_bytes();
        if vertex_bytes.len() != expected {
            let msg = format!(
                "dynamic_draw: expected {expected} vertex bytes, got {}",
                vertex_bytes.len()
            );
            self.errors.critical(&msg);
            return;
        }
        let material = batch.material();
        let transparent = match self.materials.is_transparent(material) {
            Ok(t) => t,
            Err(e) => {
                self.errors.warn(&format!("dynamic_draw: {e}"));
                return;
            }
        };

        let base_vertex = batch.append(vertex_bytes);
        self.queue.push(DrawCmd {
            key: SortKey::for_draw(transparent, material, depth),
            material,
            payload: DrawPayload::Dynamic(DynamicPayload {
                batch: id,
                texture,
                base_vertex,
            }),
        });
    }

    /// Destroys a batch. Queued elements are drawn first.
    pub fn destroy_dynamic_draw(&mut self, id: DynamicDrawId) {
        if self.batch_mut(id).is_none() {
            self.invalid_batch("destroy_dynamic_draw", id);
            return;
        }
        self.flush();
        if let Some(batch) = self.batches.remove(id.0) {
            batch.destroy(&mut self.device);
        }
    }

    // ── uniform buffers ──────────────────────────────────────────────────

    /// `stride` must be a non-zero multiple of 16.
    pub fn create_uniform_buffer(&mut self, count: usize, stride: usize) -> Option<UniformBuffer> {
        let buffer = UniformBuffer::new(&mut self.device, count, stride);
        if buffer.is_none() {
            self.errors.critical(&format!(
                "create_uniform_buffer: stride {stride} is not a non-zero multiple of 16"
            ));
        }
        buffer
    }

    /// Alignment draw-time uniform binding offsets must satisfy.
    #[inline]
    pub fn uniform_alignment(&self) -> usize {
        self.device.backend().uniform_offset_alignment()
    }

    // ── flush ────────────────────────────────────────────────────────────

    /// Sorts and submits every queued command, then polls backend errors.
    fn flush(&mut self) {
        let Self {
            device,
            errors,
            frame,
            materials,
            shaders,
            queue,
            transforms,
            lighting,
            batches,
        } = self;

        if !queue.is_empty() {
            queue.sort();
            let mut binder = Binder {
                device: &mut *device,
                materials: &*materials,
                shaders: &mut *shaders,
                camera: &frame.camera,
                transforms: &*transforms,
                lighting: &*lighting,
                frame: frame.number(),
                errors: &mut *errors,
            };

            let mut open: Option<DynamicDrawId> = None;
            let mut overflowed = 0usize;
            for cmd in queue.as_slice() {
                match &cmd.payload {
                    DrawPayload::Static(draw) => {
                        if let Some(id) = open.take() {
                            flush_batch(batches, id, &mut binder);
                        }
                        binder.device.bind_vertex_array(draw.vertex_array);
                        let bindings = DrawBindings {
                            layout_hash: draw.layout_hash,
                            transform: draw.transform,
                            lighting: draw.lighting,
                            uniforms: draw.uniforms,
                            texture_override: None,
                        };
                        if binder.prepare(cmd.material, &bindings) {
                            binder.device.backend_mut().draw_indexed(
                                draw.primitive,
                                draw.index_count,
                                draw.start_index,
                                draw.base_vertex as i32,
                            );
                        }
                    }
                    DrawPayload::Dynamic(element) => {
                        if let Some(prev) = open.filter(|&prev| prev != element.batch) {
                            flush_batch(batches, prev, &mut binder);
                        }
                        open = Some(element.batch);
                        let Some(batch) = batches.get_mut(element.batch.0) else {
                            binder.errors.critical("flush: dynamic draw batch missing");
                            continue;
                        };
                        if batch.process(&mut binder, element) == Processed::IndexOverflow {
                            overflowed += 1;
                        }
                    }
                }
            }
            if let Some(id) = open {
                flush_batch(batches, id, &mut binder);
            }
            if overflowed > 0 {
                binder.errors.critical(&format!(
                    "flush: dropped {overflowed} dynamic draw elements beyond the 16-bit index range"
                ));
            }

            log::trace!("flushed {} draw commands", queue.len());
            queue.reset();
            for batch in batches.values_mut() {
                batch.end_segment();
            }
        }

        while let Some(message) = device.backend_mut().take_error() {
            errors.critical(&format!("gpu: {message}"));
        }
    }

    // ── helpers ──────────────────────────────────────────────────────────

    fn require_frame(&mut self, op: &str) -> bool {
        if self.frame.is_open() {
            return true;
        }
        self.errors.critical(&format!("{op} must call BeginFrame"));
        false
    }

    fn batch_mut(&mut self, id: DynamicDrawId) -> Option<&mut DynamicBatch> {
        self.batches.get_mut(id.0)
    }

    fn invalid_batch(&mut self, op: &str, id: DynamicDrawId) {
        self.errors
            .warn(&format!("{op}: invalid dynamic draw {}", id.0.raw()));
    }

    fn report_alloc(&mut self, op: &str, e: AllocError) {
        let msg = format!("{op}: {e}");
        match e {
            AllocError::OutOfAddressSpace => self.errors.warn(&msg),
            AllocError::ReallocFailure => self.errors.critical(&msg),
        }
    }

    /// Reports a failed material operation and passes the result through.
    ///
    /// Invalid handles and range errors are warnings; misaligned parameter
    /// blocks and failed storage growth are critical.
    fn checked<T>(&mut self, op: &str, result: Result<T, MaterialError>) -> Result<T, MaterialError> {
        if let Err(e) = &result {
            let msg = format!("{op}: {e}");
            match e {
                MaterialError::Misaligned(_) | MaterialError::Alloc(AllocError::ReallocFailure) => {
                    self.errors.critical(&msg)
                }
                _ => self.errors.warn(&msg),
            }
        }
        result
    }
}

fn flush_batch<B: GpuBackend>(
    batches: &mut BlockStore<DynamicBatch>,
    id: DynamicDrawId,
    binder: &mut Binder<'_, B>,
) {
    if let Some(batch) = batches.get_mut(id.0) {
        batch.flush(binder);
    }
}
