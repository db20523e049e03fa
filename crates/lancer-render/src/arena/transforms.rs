use glam::Mat4;

use crate::handle::Handle;

use super::Arena;

/// Frame-local reference to a (world, normal) matrix pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TransformHandle(Handle);

impl TransformHandle {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0.raw()
    }
}

/// Per-frame transform storage. Entries are never mutated after `alloc`.
#[derive(Debug, Clone, Default)]
pub struct TransformArena {
    pairs: Arena<[Mat4; 2]>,
}

impl TransformArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pairs: Arena::with_capacity(capacity),
        }
    }

    /// Stores `world` and its normal matrix (inverse transpose).
    pub fn alloc(&mut self, world: Mat4) -> Option<TransformHandle> {
        let normal = world.inverse().transpose();
        let index = self.pairs.push([world, normal]);
        Handle::from_index(index).map(TransformHandle)
    }

    /// `[world, normal]` for a handle from the current frame.
    #[inline]
    pub fn get(&self, handle: TransformHandle) -> Option<&[Mat4; 2]> {
        self.pairs.get(handle.0.index())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[inline]
    pub fn reset(&mut self) {
        self.pairs.reset();
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn stores_world_and_normal() {
        let mut arena = TransformArena::default();
        let world = Mat4::from_scale(Vec3::new(2.0, 2.0, 2.0));
        let h = arena.alloc(world).unwrap();

        let [w, n] = *arena.get(h).unwrap();
        assert_eq!(w, world);
        assert!(n.abs_diff_eq(Mat4::from_scale(Vec3::splat(0.5)), 1e-6));
    }

    #[test]
    fn handles_are_distinct_and_reset_clears() {
        let mut arena = TransformArena::default();
        let a = arena.alloc(Mat4::IDENTITY).unwrap();
        let b = arena.alloc(Mat4::IDENTITY).unwrap();
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);

        arena.reset();
        assert!(arena.get(a).is_none());
    }
}
