use glam::Mat4;

use crate::coords::PixelRect;

/// View and projection matrices plus a change counter.
///
/// Programs remember the version they last received; a draw re-uploads the
/// camera only when the versions differ.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    view: Mat4,
    projection: Mat4,
    version: u64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            // Program caches start at 0, so the first draw always uploads.
            version: 1,
        }
    }
}

impl Camera {
    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    #[inline]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    #[inline]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
        self.version += 1;
    }

    /// Uniform layout: view, projection, view-projection.
    pub(crate) fn uniform(&self) -> [Mat4; 3] {
        [self.view, self.projection, self.view_projection()]
    }
}

/// Open/closed flag, frame counter, viewport stack and camera.
#[derive(Debug)]
pub(crate) struct FrameState {
    open: bool,
    number: u64,
    viewports: Vec<PixelRect>,
    max_viewports: usize,
    pub camera: Camera,
}

impl FrameState {
    pub fn new(max_viewports: usize) -> Self {
        Self {
            open: false,
            number: 0,
            viewports: Vec::with_capacity(max_viewports.max(1)),
            max_viewports: max_viewports.max(1),
            camera: Camera::default(),
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[inline]
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Opens a frame with a single full-surface viewport. Returns it.
    pub fn begin(&mut self, width: i32, height: i32) -> PixelRect {
        let base = PixelRect::new(0, 0, width, height);
        self.open = true;
        self.number += 1;
        self.viewports.clear();
        self.viewports.push(base);
        base
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// Active viewport, `EMPTY` outside a frame.
    #[inline]
    pub fn viewport(&self) -> PixelRect {
        self.viewports.last().copied().unwrap_or(PixelRect::EMPTY)
    }

    /// Number of viewports pushed above the base.
    #[inline]
    pub fn pushed(&self) -> usize {
        self.viewports.len().saturating_sub(1)
    }

    /// `false` on overflow.
    pub fn push_viewport(&mut self, rect: PixelRect) -> bool {
        if self.viewports.len() >= self.max_viewports {
            return false;
        }
        self.viewports.push(rect);
        true
    }

    /// Returns the restored viewport, `None` on underflow.
    pub fn pop_viewport(&mut self) -> Option<PixelRect> {
        if self.viewports.len() <= 1 {
            return None;
        }
        self.viewports.pop();
        self.viewports.last().copied()
    }

    /// Drops pushed viewports, keeping the base.
    pub fn unwind_viewports(&mut self) -> PixelRect {
        self.viewports.truncate(1);
        self.viewport()
    }

    /// Converts a scissor rect given relative to the active viewport, origin at
    /// its top-left, into a bottom-left framebuffer rect clipped to the viewport.
    ///
    /// Width and height are clamped to at least 1. No overlap gives `EMPTY`.
    pub fn scissor_rect(&self, x: i32, y: i32, width: i32, height: i32) -> PixelRect {
        let vp = self.viewport();
        let width = width.max(1);
        let height = height.max(1);
        let rect = PixelRect::new(vp.x + x, vp.y + vp.height - y - height, width, height);
        rect.intersect(vp).unwrap_or(PixelRect::EMPTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── viewport stack ────────────────────────────────────────────────────

    #[test]
    fn begin_sets_base_viewport_and_counts_frames() {
        let mut f = FrameState::new(4);
        assert_eq!(f.begin(800, 600), PixelRect::new(0, 0, 800, 600));
        assert_eq!(f.number(), 1);
        f.close();
        f.begin(640, 480);
        assert_eq!(f.number(), 2);
        assert_eq!(f.viewport(), PixelRect::new(0, 0, 640, 480));
    }

    #[test]
    fn stack_is_bounded() {
        let mut f = FrameState::new(3);
        f.begin(100, 100);
        assert!(f.push_viewport(PixelRect::new(0, 0, 50, 50)));
        assert!(f.push_viewport(PixelRect::new(0, 0, 25, 25)));
        assert!(!f.push_viewport(PixelRect::new(0, 0, 10, 10)));
        assert_eq!(f.pushed(), 2);
    }

    #[test]
    fn pop_restores_previous_and_underflows_at_base() {
        let mut f = FrameState::new(4);
        f.begin(100, 100);
        f.push_viewport(PixelRect::new(10, 10, 20, 20));
        assert_eq!(f.pop_viewport(), Some(PixelRect::new(0, 0, 100, 100)));
        assert_eq!(f.pop_viewport(), None);
    }

    // ── scissor ───────────────────────────────────────────────────────────

    #[test]
    fn scissor_flips_against_viewport() {
        let mut f = FrameState::new(4);
        f.begin(800, 600);
        // 100x50 box 10px from the top-left corner.
        assert_eq!(f.scissor_rect(10, 10, 100, 50), PixelRect::new(10, 540, 100, 50));
    }

    #[test]
    fn scissor_is_relative_to_pushed_viewport() {
        let mut f = FrameState::new(4);
        f.begin(800, 600);
        f.push_viewport(PixelRect::new(100, 200, 300, 100));
        assert_eq!(f.scissor_rect(0, 0, 50, 20), PixelRect::new(100, 280, 50, 20));
    }

    #[test]
    fn scissor_clamps_size_and_clips() {
        let mut f = FrameState::new(4);
        f.begin(100, 100);
        assert_eq!(f.scissor_rect(5, 5, 0, -3), PixelRect::new(5, 94, 1, 1));
        assert_eq!(f.scissor_rect(90, 0, 50, 10), PixelRect::new(90, 90, 10, 10));
        assert_eq!(f.scissor_rect(500, 500, 10, 10), PixelRect::EMPTY);
    }

    // ── camera ────────────────────────────────────────────────────────────

    #[test]
    fn camera_version_bumps_on_set() {
        let mut c = Camera::default();
        assert_eq!(c.version(), 1);
        let proj = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0);
        c.set(Mat4::IDENTITY, proj);
        assert_eq!(c.version(), 2);
        assert_eq!(c.uniform()[2], proj);
    }
}
