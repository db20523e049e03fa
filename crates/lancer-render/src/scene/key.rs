use crate::material::MaterialHandle;

const OPAQUE_BIT: u64 = 1 << 63;
const MATERIAL_MASK: u64 = 0x7FFF_FFFF;

/// Draw-order key. Commands are submitted in descending key order.
///
/// Layout:
/// - opaque: `1 | material (31 bits) | !depth_bits(z) (32 bits)`, front-to-back per material
/// - transparent: `0 | 0 (31 bits) | depth_bits(z) (32 bits)`, back-to-front
///
/// The high bit puts every opaque command ahead of every transparent one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey(u64);

impl SortKey {
    #[inline]
    pub fn opaque(material: MaterialHandle, depth: f32) -> Self {
        let material = (material.raw() as u64 & MATERIAL_MASK) << 32;
        SortKey(OPAQUE_BIT | material | (!depth_bits(depth)) as u64)
    }

    #[inline]
    pub fn transparent(depth: f32) -> Self {
        SortKey(depth_bits(depth) as u64)
    }

    #[inline]
    pub fn for_draw(transparent: bool, material: MaterialHandle, depth: f32) -> Self {
        if transparent {
            Self::transparent(depth)
        } else {
            Self::opaque(material, depth)
        }
    }

    #[inline]
    pub const fn is_opaque(self) -> bool {
        self.0 & OPAQUE_BIT != 0
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Maps a float to a `u32` with the same ordering.
///
/// Flips the sign bit of non-negative values and every bit of negative ones, so
/// unsigned comparison matches float comparison for all finite inputs (and
/// infinities). `-0.0` sorts just below `+0.0`. NaN inputs have no defined order.
#[inline]
pub fn depth_bits(depth: f32) -> u32 {
    let bits = depth.to_bits();
    let mask = ((bits as i32 >> 31) as u32) | 0x8000_0000;
    bits ^ mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Handle;

    fn mat(raw: u32) -> MaterialHandle {
        MaterialHandle(Handle::from_raw(raw).unwrap())
    }

    // ── depth_bits ────────────────────────────────────────────────────────

    #[test]
    fn depth_bits_preserves_order() {
        let values = [
            f32::NEG_INFINITY,
            -1.0e30,
            -2.5,
            -1.0,
            -f32::MIN_POSITIVE,
            -0.0,
            0.0,
            f32::MIN_POSITIVE,
            0.5,
            1.0,
            2.0,
            1.0e30,
            f32::INFINITY,
        ];
        for pair in values.windows(2) {
            assert!(
                depth_bits(pair[0]) < depth_bits(pair[1]),
                "{} should map below {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn depth_bits_distinguishes_close_values() {
        // A truncating fixed-point conversion would collapse these.
        assert!(depth_bits(1.0001) < depth_bits(1.0002));
    }

    // ── key ordering ──────────────────────────────────────────────────────

    #[test]
    fn opaque_sorts_above_transparent() {
        let o = SortKey::opaque(mat(1), 1.0e30);
        let t = SortKey::transparent(f32::INFINITY);
        assert!(o > t);
        assert!(o.is_opaque());
        assert!(!t.is_opaque());
    }

    #[test]
    fn opaque_same_material_nearer_first() {
        let near = SortKey::opaque(mat(3), 2.0);
        let far = SortKey::opaque(mat(3), 5.0);
        assert!(near > far);
    }

    #[test]
    fn opaque_groups_by_material_before_depth() {
        let a_near = SortKey::opaque(mat(1), 0.1);
        let b_far = SortKey::opaque(mat(2), 100.0);
        assert!(b_far > a_near);
    }

    #[test]
    fn transparent_farther_first() {
        assert!(SortKey::transparent(10.0) > SortKey::transparent(3.0));
        assert!(SortKey::transparent(-1.0) > SortKey::transparent(-3.0));
    }
}
