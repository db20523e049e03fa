/// Where [`Gpu::finish`](super::Gpu::finish) replays a frame.
///
/// Both views must match the formats the backend was created with and share
/// the same size.
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
    pub depth_view: &'a wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(
        encoder: &'a mut wgpu::CommandEncoder,
        color_view: &'a wgpu::TextureView,
        depth_view: &'a wgpu::TextureView,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            encoder,
            color_view,
            depth_view,
            width,
            height,
        }
    }
}

/// Color and depth textures for rendering without a surface.
pub struct OffscreenTarget {
    pub color: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl OffscreenTarget {
    pub(super) fn new(
        device: &wgpu::Device,
        formats: (wgpu::TextureFormat, wgpu::TextureFormat),
        width: u32,
        height: u32,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = |label: &'static str, format, usage| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };

        let color = texture(
            "lancer offscreen color",
            formats.0,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let depth = texture(
            "lancer offscreen depth",
            formats.1,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        Self {
            color_view: color.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            color,
            depth,
            width: size.width,
            height: size.height,
        }
    }

    /// Borrows the target for one replay.
    pub fn target<'a>(&'a self, encoder: &'a mut wgpu::CommandEncoder) -> RenderTarget<'a> {
        RenderTarget::new(
            encoder,
            &self.color_view,
            &self.depth_view,
            self.width,
            self.height,
        )
    }
}
