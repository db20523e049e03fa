use crate::error::ShaderError;

use super::ShaderId;

/// Vertex-layout specific entries per collection.
pub const MAX_VERTEX_ENTRIES: usize = 8;

/// Capability variants per entry.
pub const MAX_CAPABILITY_VARIANTS: usize = 16;

#[derive(Debug, Clone, Default)]
struct ShaderEntry {
    default: Option<ShaderId>,
    variants: Vec<(u32, ShaderId)>,
}

impl ShaderEntry {
    fn lookup(&self, caps: u32) -> Option<ShaderId> {
        self.variants
            .iter()
            .find(|(c, _)| *c == caps)
            .map(|&(_, s)| s)
            .or(self.default)
    }

    /// `caps == 0` sets the entry default.
    fn insert(&mut self, caps: u32, shader: ShaderId) -> Result<(), ShaderError> {
        if caps == 0 {
            self.default = Some(shader);
            return Ok(());
        }
        if let Some(slot) = self.variants.iter_mut().find(|(c, _)| *c == caps) {
            slot.1 = shader;
            return Ok(());
        }
        if self.variants.len() >= MAX_CAPABILITY_VARIANTS {
            return Err(ShaderError::TooManyVariants);
        }
        self.variants.push((caps, shader));
        Ok(())
    }
}

/// Lookup table from (vertex-layout hash, capability bitmask) to shader.
///
/// Resolution order:
/// 1) entry for the exact layout hash: exact caps, then that entry's default
/// 2) collection default entry, only when no entry matches the layout hash
///
/// A matching layout entry is final: a miss there resolves to `None` rather
/// than a shader built for another vertex format.
#[derive(Debug, Clone, Default)]
pub struct ShaderCollection {
    fallback: ShaderEntry,
    by_vertex: Vec<(u64, ShaderEntry)>,
}

impl ShaderCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_default(&mut self, caps: u32, shader: ShaderId) -> Result<(), ShaderError> {
        self.fallback.insert(caps, shader)
    }

    pub fn add_for_layout(
        &mut self,
        layout_hash: u64,
        caps: u32,
        shader: ShaderId,
    ) -> Result<(), ShaderError> {
        if let Some((_, entry)) = self.by_vertex.iter_mut().find(|(h, _)| *h == layout_hash) {
            return entry.insert(caps, shader);
        }
        if self.by_vertex.len() >= MAX_VERTEX_ENTRIES {
            return Err(ShaderError::TooManyVertexEntries);
        }
        let mut entry = ShaderEntry::default();
        entry.insert(caps, shader)?;
        self.by_vertex.push((layout_hash, entry));
        Ok(())
    }

    pub fn lookup(&self, layout_hash: u64, caps: u32) -> Option<ShaderId> {
        match self.by_vertex.iter().find(|(h, _)| *h == layout_hash) {
            Some((_, entry)) => entry.lookup(caps),
            None => self.fallback.lookup(caps),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ShaderId = ShaderId(1);
    const B: ShaderId = ShaderId(2);
    const C: ShaderId = ShaderId(3);
    const D: ShaderId = ShaderId(4);

    // ── precedence ────────────────────────────────────────────────────────

    #[test]
    fn layout_entry_wins_over_default() {
        let mut col = ShaderCollection::new();
        col.add_default(0, A).unwrap();
        col.add_for_layout(0xBEEF, 0, B).unwrap();

        assert_eq!(col.lookup(0xBEEF, 0), Some(B));
        assert_eq!(col.lookup(0xCAFE, 0), Some(A));
    }

    #[test]
    fn exact_caps_win_over_entry_default() {
        let mut col = ShaderCollection::new();
        col.add_for_layout(7, 0, A).unwrap();
        col.add_for_layout(7, 0b10, B).unwrap();

        assert_eq!(col.lookup(7, 0b10), Some(B));
        assert_eq!(col.lookup(7, 0b01), Some(A));
    }

    #[test]
    fn layout_entry_miss_does_not_fall_back_to_default_entry() {
        let mut col = ShaderCollection::new();
        col.add_default(0b1, C).unwrap();
        col.add_for_layout(7, 0b10, D).unwrap();

        assert_eq!(col.lookup(7, 0b1), None);
        assert_eq!(col.lookup(7, 0b10), Some(D));
        // Unknown layouts still use the default entry.
        assert_eq!(col.lookup(8, 0b1), Some(C));
    }

    #[test]
    fn empty_collection_resolves_nothing() {
        assert_eq!(ShaderCollection::new().lookup(1, 0), None);
    }

    // ── limits ────────────────────────────────────────────────────────────

    #[test]
    fn vertex_entries_are_bounded() {
        let mut col = ShaderCollection::new();
        for h in 0..MAX_VERTEX_ENTRIES as u64 {
            col.add_for_layout(h, 0, A).unwrap();
        }
        assert_eq!(col.add_for_layout(99, 0, A), Err(ShaderError::TooManyVertexEntries));
        // Existing entry still accepts variants.
        assert_eq!(col.add_for_layout(0, 4, B), Ok(()));
    }

    #[test]
    fn variants_are_bounded() {
        let mut col = ShaderCollection::new();
        for caps in 1..=MAX_CAPABILITY_VARIANTS as u32 {
            col.add_default(caps, A).unwrap();
        }
        assert_eq!(col.add_default(1000, A), Err(ShaderError::TooManyVariants));
        assert_eq!(col.add_default(1, B), Ok(()));
        assert_eq!(col.lookup(0, 1), Some(B));
    }
}
