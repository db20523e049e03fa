use crate::device::{Device, GpuBackend, Primitive, TextureId};
use crate::geometry::{StreamingGeometry, VertexLayout};
use crate::handle::Handle;
use crate::material::MaterialHandle;
use crate::scene::DynamicPayload;

use super::binder::{Binder, DrawBindings};

/// Longest index template a dynamic draw accepts.
pub const DYNAMIC_MAX_TEMPLATE: usize = 32;

/// Elements the streams are sized for before their first growth.
const DYNAMIC_INITIAL_ELEMENTS: usize = 64;

/// Reference to a dynamic draw owned by a [`Context`](super::Context).
///
/// Generation-checked like material handles: an id outlives its batch only as
/// a dead reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DynamicDrawId(pub(crate) Handle);

/// Outcome of appending one element's indices during flush.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Processed {
    Appended,
    /// The element's indices do not fit in 16 bits.
    IndexOverflow,
}

/// CPU-streamed batch of small elements sharing a material and an index pattern.
///
/// Recording appends vertices and returns the element's base vertex. Flush
/// expands the template per element and draws each same-texture run once.
#[derive(Debug)]
pub(crate) struct DynamicBatch {
    geometry: StreamingGeometry,
    material: MaterialHandle,
    vertices_per_element: usize,
    template: Vec<u16>,
    max_template_index: u16,
    sampler: Option<usize>,

    /// Vertices appended since the last queue flush.
    vertex_cursor: usize,
    /// Indices waiting for the next batch flush.
    pending_indices: usize,
    last_texture: Option<TextureId>,
}

impl DynamicBatch {
    /// `template` must be non-empty, at most [`DYNAMIC_MAX_TEMPLATE`] long, and
    /// index below `vertices_per_element`; the context checks this.
    pub fn new<B: GpuBackend>(
        device: &mut Device<B>,
        layout: VertexLayout,
        material: MaterialHandle,
        vertices_per_element: usize,
        template: &[u16],
    ) -> Self {
        let geometry = StreamingGeometry::new(
            device,
            layout,
            DYNAMIC_INITIAL_ELEMENTS * vertices_per_element,
            DYNAMIC_INITIAL_ELEMENTS * template.len(),
        );
        Self {
            geometry,
            material,
            vertices_per_element,
            template: template.to_vec(),
            max_template_index: template.iter().copied().max().unwrap_or(0),
            sampler: None,
            vertex_cursor: 0,
            pending_indices: 0,
            last_texture: None,
        }
    }

    #[inline]
    pub fn material(&self) -> MaterialHandle {
        self.material
    }

    /// Byte length one `append` expects.
    #[inline]
    pub fn element_bytes(&self) -> usize {
        self.geometry.layout().stride() as usize * self.vertices_per_element
    }

    #[inline]
    pub fn set_sampler(&mut self, index: Option<usize>) {
        self.sampler = index;
    }

    /// Copies one element's vertices into the stream. Returns its base vertex.
    pub fn append(&mut self, bytes: &[u8]) -> u32 {
        debug_assert_eq!(bytes.len(), self.element_bytes());
        if !self.geometry.vertices_open() {
            self.geometry.begin_vertices();
        }

        let base = self.vertex_cursor;
        let stride = self.geometry.layout().stride() as usize;
        let end = base + self.vertices_per_element;
        let stream = self.geometry.resize_vertices(end);
        stream[base * stride..end * stride].copy_from_slice(bytes);

        self.vertex_cursor = end;
        base as u32
    }

    /// Adds one queued element to the pending run, flushing first if its
    /// texture differs from the run's.
    pub fn process<B: GpuBackend>(
        &mut self,
        binder: &mut Binder<'_, B>,
        payload: &DynamicPayload,
    ) -> Processed {
        if self.geometry.vertices_open() {
            self.geometry
                .finish_vertices(binder.device, self.vertex_cursor);
        }
        if self.last_texture.is_some_and(|t| t != payload.texture) {
            self.flush(binder);
        }
        self.last_texture = Some(payload.texture);

        let top = payload.base_vertex as usize + self.max_template_index as usize;
        if top > u16::MAX as usize {
            return Processed::IndexOverflow;
        }
        let base = payload.base_vertex as u16;

        if !self.geometry.indices_open() {
            self.geometry.begin_indices();
        }
        let start = self.pending_indices;
        let end = start + self.template.len();
        let stream = self.geometry.resize_indices(end);
        for (dst, &src) in stream[start..end].iter_mut().zip(&self.template) {
            *dst = src + base;
        }
        self.pending_indices = end;
        Processed::Appended
    }

    /// Draws the pending run, if any, with the run's texture in the batch's
    /// sampler slot.
    pub fn flush<B: GpuBackend>(&mut self, binder: &mut Binder<'_, B>) {
        if self.pending_indices == 0 {
            return;
        }
        self.geometry
            .finish_indices(binder.device, self.pending_indices);
        binder
            .device
            .bind_vertex_array(self.geometry.vertex_array());

        let bindings = DrawBindings {
            layout_hash: self.geometry.layout().hash(),
            texture_override: self.sampler.zip(self.last_texture),
            ..DrawBindings::default()
        };
        if binder.prepare(self.material, &bindings) {
            binder.device.backend_mut().draw_indexed(
                Primitive::TriangleList,
                self.pending_indices as u32,
                0,
                0,
            );
        }

        self.pending_indices = 0;
        self.last_texture = None;
    }

    /// Rewinds the vertex stream once the queue that referenced it is drained.
    pub fn end_segment(&mut self) {
        debug_assert!(!self.geometry.vertices_open(), "unprocessed dynamic vertices");
        debug_assert_eq!(self.pending_indices, 0);
        self.vertex_cursor = 0;
    }

    pub fn destroy<B: GpuBackend>(self, device: &mut Device<B>) {
        self.geometry.destroy(device);
    }
}
