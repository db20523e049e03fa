use crate::arena::Arena;

use super::DrawCmd;

/// Per-frame command queue.
///
/// Performance characteristics:
/// - `push()` is amortized O(1)
/// - `sort()` is an unstable in-place sort; no per-frame allocation once warmed
#[derive(Debug, Default)]
pub struct DrawQueue {
    items: Arena<DrawCmd>,
}

impl DrawQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Arena::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn push(&mut self, cmd: DrawCmd) {
        self.items.push(cmd);
    }

    /// Orders commands by key, highest first.
    pub fn sort(&mut self) {
        self.items
            .as_mut_slice()
            .sort_unstable_by(|a, b| b.key.cmp(&a.key));
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<DrawCmd> {
        self.items.get(index).copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[DrawCmd] {
        self.items.as_slice()
    }

    /// Empties the queue, keeping capacity.
    #[inline]
    pub fn reset(&mut self) {
        self.items.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::TextureId;
    use crate::handle::Handle;
    use crate::material::MaterialHandle;
    use crate::render::DynamicDrawId;
    use crate::scene::{DrawPayload, DynamicPayload, SortKey};

    fn cmd(key: SortKey, tag: u32) -> DrawCmd {
        DrawCmd {
            key,
            material: MaterialHandle(Handle::from_raw(1).unwrap()),
            payload: DrawPayload::Dynamic(DynamicPayload {
                batch: DynamicDrawId(Handle::from_raw(1).unwrap()),
                texture: TextureId(0),
                base_vertex: tag,
            }),
        }
    }

    fn tags(q: &DrawQueue) -> Vec<u32> {
        q.as_slice()
            .iter()
            .map(|c| match c.payload {
                DrawPayload::Dynamic(d) => d.base_vertex,
                DrawPayload::Static(_) => u32::MAX,
            })
            .collect()
    }

    #[test]
    fn sort_is_descending_by_key() {
        let m = MaterialHandle(Handle::from_raw(1).unwrap());
        let mut q = DrawQueue::with_capacity(4);
        q.push(cmd(SortKey::transparent(1.0), 0));
        q.push(cmd(SortKey::opaque(m, 5.0), 1));
        q.push(cmd(SortKey::transparent(9.0), 2));
        q.push(cmd(SortKey::opaque(m, 2.0), 3));

        q.sort();
        assert_eq!(tags(&q), vec![3, 1, 2, 0]);
    }

    #[test]
    fn reset_empties() {
        let mut q = DrawQueue::default();
        q.push(cmd(SortKey::transparent(0.0), 0));
        q.reset();
        assert!(q.is_empty());
        assert_eq!(q.get(0), None);
    }
}
