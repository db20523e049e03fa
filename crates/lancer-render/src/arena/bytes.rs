/// Byte arena with aligned allocation.
#[derive(Debug, Clone, Default)]
pub struct ByteArena {
    bytes: Vec<u8>,
}

impl ByteArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reserves `len` zeroed bytes starting at a multiple of `align` and returns the offset.
    ///
    /// `align` must be a power of two.
    pub fn alloc(&mut self, len: usize, align: usize) -> usize {
        debug_assert!(align.is_power_of_two());
        let offset = (self.bytes.len() + align - 1) & !(align - 1);
        let end = offset + len;

        if end > self.bytes.capacity() {
            let mut new_capacity = self.bytes.capacity().max(64);
            while new_capacity < end {
                new_capacity *= 2;
            }
            self.bytes.reserve_exact(new_capacity - self.bytes.len());
        }

        self.bytes.resize(end, 0);
        offset
    }

    #[inline]
    pub fn slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.bytes.get(offset..offset.checked_add(len)?)
    }

    #[inline]
    pub fn slice_mut(&mut self, offset: usize, len: usize) -> Option<&mut [u8]> {
        self.bytes.get_mut(offset..offset.checked_add(len)?)
    }

    #[inline]
    pub fn reset(&mut self) {
        self.bytes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_respects_alignment() {
        let mut arena = ByteArena::default();
        assert_eq!(arena.alloc(3, 16), 0);
        assert_eq!(arena.alloc(5, 16), 16);
        assert_eq!(arena.len(), 21);
        assert_eq!(arena.alloc(1, 4), 24);
    }

    #[test]
    fn slice_bounds_are_checked() {
        let mut arena = ByteArena::default();
        let off = arena.alloc(8, 16);
        arena.slice_mut(off, 8).unwrap().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(arena.slice(off + 4, 4), Some(&[5, 6, 7, 8][..]));
        assert_eq!(arena.slice(off + 4, 5), None);
    }
}
