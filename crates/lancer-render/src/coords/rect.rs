/// Axis-aligned rectangle in physical pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Zero-area rect at the origin. Draws under it are skipped.
    pub const EMPTY: PixelRect = PixelRect::new(0, 0, 0, 0);

    #[inline]
    pub fn right(self) -> i32 {
        self.x + self.width
    }

    #[inline]
    pub fn top(self) -> i32 {
        self.y + self.height
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    #[inline]
    pub fn intersect(self, other: PixelRect) -> Option<PixelRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.top().min(other.top());

        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(PixelRect::new(x0, y0, x1 - x0, y1 - y0))
        }
    }

    /// Mirrors the rect vertically inside a surface of `surface_height` rows.
    ///
    /// Converts between bottom-left and top-left origins; applying it twice is identity.
    #[inline]
    pub fn flip_y(self, surface_height: i32) -> PixelRect {
        PixelRect::new(self.x, surface_height - self.y - self.height, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: i32, y: i32, w: i32, h: i32) -> PixelRect { PixelRect::new(x, y, w, h) }

    // ── intersect ─────────────────────────────────────────────────────────

    #[test]
    fn intersect_overlapping() {
        assert_eq!(r(0, 0, 10, 10).intersect(r(5, 5, 10, 10)), Some(r(5, 5, 5, 5)));
    }

    #[test]
    fn intersect_contained() {
        let inner = r(10, 10, 20, 20);
        assert_eq!(r(0, 0, 100, 100).intersect(inner), Some(inner));
    }

    #[test]
    fn intersect_touching_edge_returns_none() {
        assert!(r(0, 0, 10, 10).intersect(r(10, 0, 10, 10)).is_none());
    }

    #[test]
    fn intersect_disjoint_returns_none() {
        assert!(r(0, 0, 5, 5).intersect(r(20, 20, 5, 5)).is_none());
    }

    // ── flip_y ────────────────────────────────────────────────────────────

    #[test]
    fn flip_y_moves_origin() {
        assert_eq!(r(0, 0, 10, 20).flip_y(600), r(0, 580, 10, 20));
    }

    #[test]
    fn flip_y_twice_is_identity() {
        let rect = r(3, 40, 7, 9);
        assert_eq!(rect.flip_y(480).flip_y(480), rect);
    }

    // ── is_empty ──────────────────────────────────────────────────────────

    #[test]
    fn is_empty_zero_size() {
        assert!(r(0, 0, 0, 5).is_empty());
        assert!(PixelRect::EMPTY.is_empty());
        assert!(!r(0, 0, 1, 1).is_empty());
    }
}
