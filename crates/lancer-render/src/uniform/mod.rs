//! Uniform buffers bound per draw.
//!
//! A buffer holds `count` elements of `stride` bytes. A draw binds one element
//! window; the element's byte offset must satisfy the backend's offset alignment.

use crate::device::{BufferId, BufferKind, Device, GpuBackend, UniformBinding};

#[derive(Debug)]
pub struct UniformBuffer {
    buffer: BufferId,
    stride: usize,
    count: usize,
}

impl UniformBuffer {
    /// `None` if `stride` is zero or not a multiple of 16.
    pub fn new<B: GpuBackend>(device: &mut Device<B>, count: usize, stride: usize) -> Option<Self> {
        if stride == 0 || stride % 16 != 0 {
            return None;
        }
        let buffer = device
            .backend_mut()
            .create_buffer(BufferKind::Uniform, count.max(1) * stride);
        Some(Self { buffer, stride, count })
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Writes `data` starting at element `start`.
    pub fn set_data<B: GpuBackend>(&self, device: &mut Device<B>, start: usize, data: &[u8]) {
        debug_assert!(start * self.stride + data.len() <= self.count * self.stride);
        device
            .backend_mut()
            .write_buffer(self.buffer, start * self.stride, data);
    }

    /// Smallest element index `>= index` whose byte offset is a multiple of `alignment`.
    pub fn align_index(&self, index: usize, alignment: usize) -> usize {
        let alignment = alignment.max(1);
        let mut i = index;
        while (i * self.stride) % alignment != 0 {
            i += 1;
        }
        i
    }

    /// Binding window for element `index`.
    #[inline]
    pub fn binding(&self, index: usize) -> UniformBinding {
        UniformBinding {
            buffer: self.buffer,
            offset: index * self.stride,
            size: self.stride,
        }
    }

    pub fn destroy<B: GpuBackend>(self, device: &mut Device<B>) {
        device.backend_mut().destroy_buffer(self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::recording::RecordingBackend;

    #[test]
    fn stride_must_be_vec4_packed() {
        let mut device = Device::new(RecordingBackend::default());
        assert!(UniformBuffer::new(&mut device, 8, 20).is_none());
        assert!(UniformBuffer::new(&mut device, 8, 0).is_none());
        assert!(UniformBuffer::new(&mut device, 8, 64).is_some());
    }

    #[test]
    fn align_index_rounds_up_to_offset_alignment() {
        let mut device = Device::new(RecordingBackend::default());
        let ubo = UniformBuffer::new(&mut device, 64, 64).unwrap();

        assert_eq!(ubo.align_index(0, 256), 0);
        assert_eq!(ubo.align_index(1, 256), 4);
        assert_eq!(ubo.align_index(4, 256), 4);
        assert_eq!(ubo.binding(4).offset, 256);
    }
}
