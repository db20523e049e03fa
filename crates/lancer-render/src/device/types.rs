//! Backend-facing identifiers and fixed-function state values.

/// Linked shader program owned by the backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// GPU buffer owned by the backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Vertex + index buffer pair described by a vertex layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayId(pub u32);

/// Texture owned by the backend. Residency may come and go; the id is stable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Offscreen color and depth attachments owned by the backend.
///
/// Setters take `Option<RenderTargetId>`; `None` is the target the frame is
/// presented from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetId(pub u32);

/// Number of texture units a draw can sample from.
pub const MAX_TEXTURE_UNITS: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
}

/// Face culling. The winding names the faces that are kept.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Cw,
    #[default]
    Ccw,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
    DstColor,
    InvDstColor,
    SrcAlphaSat,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BlendFactors {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFactors {
    #[inline]
    pub const fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        Self { src, dst }
    }

    /// Classic "over" compositing for straight alpha.
    pub const ALPHA: BlendFactors = BlendFactors::new(BlendFactor::SrcAlpha, BlendFactor::InvSrcAlpha);

    pub const ADDITIVE: BlendFactors = BlendFactors::new(BlendFactor::SrcAlpha, BlendFactor::One);
}

/// Depth test/write combination.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum DepthMode {
    /// Test and write.
    #[default]
    All,
    /// Test only.
    NoWrite,
    /// Neither.
    None,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Primitive {
    TriangleList,
    TriangleStrip,
    LineList,
}

/// Uniform block a program exposes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    /// view, projection, view-projection.
    Camera,
    /// world, normal.
    Transform,
    Lighting,
    VertexParams,
    FragmentParams,
}

impl UniformSlot {
    pub const COUNT: usize = 5;

    #[inline]
    pub fn index(self) -> usize {
        match self {
            UniformSlot::Camera => 0,
            UniformSlot::Transform => 1,
            UniformSlot::Lighting => 2,
            UniformSlot::VertexParams => 3,
            UniformSlot::FragmentParams => 4,
        }
    }
}

/// A window into a uniform buffer, bound for one draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformBinding {
    pub buffer: BufferId,
    pub offset: usize,
    pub size: usize,
}
