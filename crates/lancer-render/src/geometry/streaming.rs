use crate::device::{BufferId, BufferKind, Device, GpuBackend, VertexArrayId};

use super::{grown_capacity, VertexLayout};

/// Vertex and index streams with CPU mirrors, re-uploaded from offset 0 on finish.
///
/// Protocol per stream: `begin` → any number of `resize` → `finish(count)`.
#[derive(Debug)]
pub struct StreamingGeometry {
    layout: VertexLayout,
    vertex_array: VertexArrayId,
    vertex_buffer: BufferId,
    index_buffer: BufferId,

    vertices: Vec<u8>,
    indices: Vec<u16>,
    /// GPU-side sizes in bytes.
    gpu_vertex_bytes: usize,
    gpu_index_bytes: usize,

    vertices_open: bool,
    indices_open: bool,
}

impl StreamingGeometry {
    pub fn new<B: GpuBackend>(
        device: &mut Device<B>,
        layout: VertexLayout,
        vertex_capacity: usize,
        index_capacity: usize,
    ) -> Self {
        let stride = layout.stride() as usize;
        let gpu_vertex_bytes = vertex_capacity.max(1) * stride;
        let gpu_index_bytes = index_capacity.max(1) * 2;

        let backend = device.backend_mut();
        let vertex_buffer = backend.create_buffer(BufferKind::Vertex, gpu_vertex_bytes);
        let index_buffer = backend.create_buffer(BufferKind::Index, gpu_index_bytes);
        let vertex_array = backend.create_vertex_array(&layout, vertex_buffer, index_buffer);

        Self {
            layout,
            vertex_array,
            vertex_buffer,
            index_buffer,
            vertices: vec![0; gpu_vertex_bytes],
            indices: vec![0; gpu_index_bytes / 2],
            gpu_vertex_bytes,
            gpu_index_bytes,
            vertices_open: false,
            indices_open: false,
        }
    }

    #[inline]
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    #[inline]
    pub fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }

    /// CPU mirror capacity in vertices.
    #[inline]
    pub fn vertex_capacity(&self) -> usize {
        self.vertices.len() / (self.layout.stride() as usize).max(1)
    }

    #[inline]
    pub fn index_capacity(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn vertices_open(&self) -> bool {
        self.vertices_open
    }

    #[inline]
    pub fn indices_open(&self) -> bool {
        self.indices_open
    }

    // ── vertices ─────────────────────────────────────────────────────────

    pub fn begin_vertices(&mut self) -> &mut [u8] {
        debug_assert!(!self.vertices_open, "vertex stream already open");
        self.vertices_open = true;
        &mut self.vertices
    }

    /// Grows the mirror (doubling) to hold at least `vertex_count` vertices.
    pub fn resize_vertices(&mut self, vertex_count: usize) -> &mut [u8] {
        let required = vertex_count * self.layout.stride() as usize;
        if required > self.vertices.len() {
            let size = grown_capacity(self.vertices.len(), required);
            self.vertices.resize(size, 0);
        }
        &mut self.vertices
    }

    /// Uploads the first `vertex_count` vertices and closes the stream.
    pub fn finish_vertices<B: GpuBackend>(&mut self, device: &mut Device<B>, vertex_count: usize) {
        debug_assert!(self.vertices_open, "vertex stream not open");
        self.vertices_open = false;
        let len = vertex_count * self.layout.stride() as usize;
        if len == 0 {
            return;
        }

        let backend = device.backend_mut();
        if len > self.gpu_vertex_bytes {
            self.gpu_vertex_bytes = self.vertices.len();
            backend.resize_buffer(self.vertex_buffer, self.gpu_vertex_bytes, 0);
            log::debug!("streaming vertex buffer grew to {} bytes", self.gpu_vertex_bytes);
        }
        backend.write_buffer(self.vertex_buffer, 0, &self.vertices[..len]);
    }

    // ── indices ──────────────────────────────────────────────────────────

    pub fn begin_indices(&mut self) -> &mut [u16] {
        debug_assert!(!self.indices_open, "index stream already open");
        self.indices_open = true;
        &mut self.indices
    }

    pub fn resize_indices(&mut self, index_count: usize) -> &mut [u16] {
        if index_count > self.indices.len() {
            let size = grown_capacity(self.indices.len(), index_count);
            self.indices.resize(size, 0);
        }
        &mut self.indices
    }

    pub fn finish_indices<B: GpuBackend>(&mut self, device: &mut Device<B>, index_count: usize) {
        debug_assert!(self.indices_open, "index stream not open");
        self.indices_open = false;
        if index_count == 0 {
            return;
        }

        let backend = device.backend_mut();
        let len = index_count * 2;
        if len > self.gpu_index_bytes {
            self.gpu_index_bytes = self.indices.len() * 2;
            backend.resize_buffer(self.index_buffer, self.gpu_index_bytes, 0);
            log::debug!("streaming index buffer grew to {} bytes", self.gpu_index_bytes);
        }
        backend.write_buffer(
            self.index_buffer,
            0,
            bytemuck::cast_slice(&self.indices[..index_count]),
        );
    }

    pub fn destroy<B: GpuBackend>(self, device: &mut Device<B>) {
        device.destroy_vertex_array(self.vertex_array);
        device.backend_mut().destroy_buffer(self.vertex_buffer);
        device.backend_mut().destroy_buffer(self.index_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::recording::{GpuCall, RecordingBackend};
    use crate::geometry::{ElementSlot, ElementType, VertexElement};

    fn stream(device: &mut Device<RecordingBackend>) -> StreamingGeometry {
        let layout = VertexLayout::new(
            8,
            &[VertexElement::new(ElementSlot::Position, ElementType::Float, 2, 0)],
        );
        StreamingGeometry::new(device, layout, 4, 6)
    }

    #[test]
    fn finish_uploads_only_the_written_prefix() {
        let mut device = Device::new(RecordingBackend::default());
        let mut s = stream(&mut device);

        s.begin_vertices()[..8].copy_from_slice(&[1; 8]);
        s.finish_vertices(&mut device, 1);

        let writes: Vec<_> = device
            .backend()
            .calls
            .iter()
            .filter_map(|c| match c {
                GpuCall::WriteBuffer { data, .. } => Some(data.len()),
                _ => None,
            })
            .collect();
        assert_eq!(writes, vec![8]);
        assert!(!s.vertices_open());
    }

    #[test]
    fn resize_doubles_mirror_and_gpu_buffer_follows() {
        let mut device = Device::new(RecordingBackend::default());
        let mut s = stream(&mut device);

        s.begin_vertices();
        s.resize_vertices(5);
        assert_eq!(s.vertex_capacity(), 8);
        s.finish_vertices(&mut device, 5);

        assert_eq!(
            device.backend().count(|c| matches!(c, GpuCall::ResizeBuffer { size: 64, .. })),
            1
        );
    }

    #[test]
    fn empty_finish_closes_without_upload() {
        let mut device = Device::new(RecordingBackend::default());
        let mut s = stream(&mut device);

        s.begin_indices();
        s.finish_indices(&mut device, 0);

        assert!(!s.indices_open());
        assert_eq!(device.backend().count(|c| matches!(c, GpuCall::WriteBuffer { .. })), 0);
    }
}
