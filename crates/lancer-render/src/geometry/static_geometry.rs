use crate::device::{BufferId, BufferKind, Device, GpuBackend, VertexArrayId};

use super::{grown_capacity, VertexLayout};

/// Initial capacity, in vertices and in indices.
const STATIC_INITIAL_CAPACITY: usize = 512;

/// Where an upload landed inside a [`StaticGeometry`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GeometryRange {
    pub base_vertex: u32,
    pub start_index: u32,
    pub index_count: u32,
}

/// Append-only vertex and index storage behind one vertex array.
///
/// Buffers double when an upload does not fit; existing contents are preserved
/// and the vertex array keeps its id, so earlier ranges stay drawable.
#[derive(Debug)]
pub struct StaticGeometry {
    layout: VertexLayout,
    vertex_array: VertexArrayId,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    vertex_capacity: usize,
    index_capacity: usize,
    vertex_offset: usize,
    index_offset: usize,
}

impl StaticGeometry {
    pub fn new<B: GpuBackend>(device: &mut Device<B>, layout: VertexLayout) -> Self {
        let stride = layout.stride() as usize;
        let vertex_capacity = STATIC_INITIAL_CAPACITY * stride;
        let index_capacity = STATIC_INITIAL_CAPACITY * 2;

        let backend = device.backend_mut();
        let vertex_buffer = backend.create_buffer(BufferKind::Vertex, vertex_capacity);
        let index_buffer = backend.create_buffer(BufferKind::Index, index_capacity);
        let vertex_array = backend.create_vertex_array(&layout, vertex_buffer, index_buffer);

        Self {
            layout,
            vertex_array,
            vertex_buffer,
            index_buffer,
            vertex_capacity,
            index_capacity,
            vertex_offset: 0,
            index_offset: 0,
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

    /// Appends interleaved vertices; returns the base vertex of the upload.
    pub fn upload_vertices<B: GpuBackend>(&mut self, device: &mut Device<B>, data: &[u8]) -> u32 {
        let stride = self.layout.stride() as usize;
        debug_assert!(stride > 0 && data.len() % stride == 0, "vertex data is not a whole number of vertices");

        let required = self.vertex_offset + data.len();
        if required > self.vertex_capacity {
            let size = grown_capacity(self.vertex_capacity, required);
            device
                .backend_mut()
                .resize_buffer(self.vertex_buffer, size, self.vertex_offset);
            log::debug!("static vertex buffer grew to {size} bytes");
            self.vertex_capacity = size;
        }

        let base_vertex = (self.vertex_offset / stride.max(1)) as u32;
        device
            .backend_mut()
            .write_buffer(self.vertex_buffer, self.vertex_offset, data);
        self.vertex_offset = required;
        base_vertex
    }

    /// Appends 16-bit indices; returns the start index of the upload.
    pub fn upload_indices<B: GpuBackend>(&mut self, device: &mut Device<B>, indices: &[u16]) -> u32 {
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        let required = self.index_offset + bytes.len();
        if required > self.index_capacity {
            let size = grown_capacity(self.index_capacity, required);
            device
                .backend_mut()
                .resize_buffer(self.index_buffer, size, self.index_offset);
            log::debug!("static index buffer grew to {size} bytes");
            self.index_capacity = size;
        }

        let start_index = (self.index_offset / 2) as u32;
        device
            .backend_mut()
            .write_buffer(self.index_buffer, self.index_offset, bytes);
        self.index_offset = required;
        start_index
    }

    /// Uploads one mesh.
    pub fn upload<B: GpuBackend>(
        &mut self,
        device: &mut Device<B>,
        vertices: &[u8],
        indices: &[u16],
    ) -> GeometryRange {
        GeometryRange {
            base_vertex: self.upload_vertices(device, vertices),
            start_index: self.upload_indices(device, indices),
            index_count: indices.len() as u32,
        }
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

    fn layout() -> VertexLayout {
        VertexLayout::new(12, &[VertexElement::new(ElementSlot::Position, ElementType::Float, 3, 0)])
    }

    #[test]
    fn uploads_report_running_offsets() {
        let mut device = Device::new(RecordingBackend::default());
        let mut geo = StaticGeometry::new(&mut device, layout());

        let a = geo.upload(&mut device, &[0u8; 36], &[0, 1, 2]);
        let b = geo.upload(&mut device, &[0u8; 48], &[0, 1, 2, 2, 3, 0]);

        assert_eq!(a, GeometryRange { base_vertex: 0, start_index: 0, index_count: 3 });
        assert_eq!(b, GeometryRange { base_vertex: 3, start_index: 3, index_count: 6 });
    }

    #[test]
    fn overflow_grows_and_preserves_contents() {
        let mut device = Device::new(RecordingBackend::default());
        let mut geo = StaticGeometry::new(&mut device, layout());
        let vb = device
            .backend()
            .calls
            .iter()
            .find_map(|c| match c {
                GpuCall::CreateBuffer { id, kind: BufferKind::Vertex, .. } => Some(*id),
                _ => None,
            })
            .expect("vertex buffer created");

        geo.upload_vertices(&mut device, &vec![0u8; 500 * 12]);
        geo.upload_vertices(&mut device, &vec![0u8; 100 * 12]);

        assert!(device.backend().calls.contains(&GpuCall::ResizeBuffer {
            id: vb,
            size: 1024 * 12,
            preserve: 500 * 12,
        }));
    }
}
