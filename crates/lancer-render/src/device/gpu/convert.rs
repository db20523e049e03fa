//! Mapping from backend-neutral state values to wgpu descriptors.

use crate::coords::PixelRect;
use crate::device::{BlendFactor, BlendFactors, CullMode, DepthMode, Primitive};
use crate::geometry::{ElementType, VertexElement, VertexLayout};

// ── fixed function ────────────────────────────────────────────────────────

fn blend_factor(f: BlendFactor) -> wgpu::BlendFactor {
    match f {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::InvSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::InvDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::InvDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlphaSat => wgpu::BlendFactor::SrcAlphaSaturated,
    }
}

/// Same factors for color and alpha, additive equation.
pub(super) fn blend_state(blend: Option<BlendFactors>) -> Option<wgpu::BlendState> {
    let factors = blend?;
    let component = wgpu::BlendComponent {
        src_factor: blend_factor(factors.src),
        dst_factor: blend_factor(factors.dst),
        operation: wgpu::BlendOperation::Add,
    };
    Some(wgpu::BlendState {
        color: component,
        alpha: component,
    })
}

/// Front faces wind counter-clockwise; the mode names the winding that is kept.
pub(super) fn cull_face(cull: CullMode) -> Option<wgpu::Face> {
    match cull {
        CullMode::None => None,
        CullMode::Cw => Some(wgpu::Face::Front),
        CullMode::Ccw => Some(wgpu::Face::Back),
    }
}

pub(super) fn depth_state(depth: DepthMode, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
    let (depth_write_enabled, depth_compare) = match depth {
        DepthMode::All => (true, wgpu::CompareFunction::LessEqual),
        DepthMode::NoWrite => (false, wgpu::CompareFunction::LessEqual),
        DepthMode::None => (false, wgpu::CompareFunction::Always),
    };
    wgpu::DepthStencilState {
        format,
        depth_write_enabled,
        depth_compare,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

pub(super) fn primitive_state(primitive: Primitive, cull: CullMode) -> wgpu::PrimitiveState {
    let (topology, strip_index_format) = match primitive {
        Primitive::TriangleList => (wgpu::PrimitiveTopology::TriangleList, None),
        Primitive::TriangleStrip => (
            wgpu::PrimitiveTopology::TriangleStrip,
            Some(wgpu::IndexFormat::Uint16),
        ),
        Primitive::LineList => (wgpu::PrimitiveTopology::LineList, None),
    };
    wgpu::PrimitiveState {
        topology,
        strip_index_format,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: cull_face(cull),
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

// ── vertex input ──────────────────────────────────────────────────────────

/// `None` for combinations wgpu has no vertex format for.
pub(super) fn vertex_format(e: &VertexElement) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    let format = match (e.kind, e.count, e.normalized) {
        (ElementType::Float, 1, _) => F::Float32,
        (ElementType::Float, 2, _) => F::Float32x2,
        (ElementType::Float, 3, _) => F::Float32x3,
        (ElementType::Float, 4, _) => F::Float32x4,
        (ElementType::UByte, 2, true) => F::Unorm8x2,
        (ElementType::UByte, 4, true) => F::Unorm8x4,
        (ElementType::UByte, 2, false) => F::Uint8x2,
        (ElementType::UByte, 4, false) => F::Uint8x4,
        (ElementType::UShort, 2, true) => F::Unorm16x2,
        (ElementType::UShort, 4, true) => F::Unorm16x4,
        (ElementType::UShort, 2, false) => F::Uint16x2,
        (ElementType::UShort, 4, false) => F::Uint16x4,
        _ => return None,
    };
    Some(format)
}

/// Attributes at their slot's shader location. Fails on the first element
/// wgpu cannot express.
pub(super) fn vertex_attributes(
    layout: &VertexLayout,
) -> Result<Vec<wgpu::VertexAttribute>, VertexElement> {
    layout
        .elements()
        .iter()
        .map(|e| {
            vertex_format(e)
                .map(|format| wgpu::VertexAttribute {
                    format,
                    offset: u64::from(e.offset),
                    shader_location: e.slot.location(),
                })
                .ok_or(*e)
        })
        .collect()
}

// ── rects ─────────────────────────────────────────────────────────────────

/// Converts a bottom-left rect to top-left target coordinates and clamps it to
/// the target. `None` if nothing remains.
pub(super) fn target_rect(rect: PixelRect, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    let target = PixelRect::new(0, 0, width as i32, height as i32);
    let clamped = rect.flip_y(height as i32).intersect(target)?;
    Some((
        clamped.x as u32,
        clamped.y as u32,
        clamped.width as u32,
        clamped.height as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ElementSlot;

    // ── fixed function ────────────────────────────────────────────────────

    #[test]
    fn opaque_has_no_blend_state() {
        assert!(blend_state(None).is_none());
    }

    #[test]
    fn alpha_blend_maps_both_components() {
        let state = blend_state(Some(BlendFactors::ALPHA)).unwrap();
        assert_eq!(state.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(state.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert_eq!(state.alpha, state.color);
    }

    #[test]
    fn cull_keeps_named_winding() {
        assert_eq!(cull_face(CullMode::Ccw), Some(wgpu::Face::Back));
        assert_eq!(cull_face(CullMode::Cw), Some(wgpu::Face::Front));
        assert_eq!(cull_face(CullMode::None), None);
    }

    #[test]
    fn transparent_depth_tests_without_writing() {
        let state = depth_state(DepthMode::NoWrite, wgpu::TextureFormat::Depth32Float);
        assert!(!state.depth_write_enabled);
        assert_eq!(state.depth_compare, wgpu::CompareFunction::LessEqual);
    }

    #[test]
    fn strips_carry_index_format() {
        let state = primitive_state(Primitive::TriangleStrip, CullMode::None);
        assert_eq!(state.strip_index_format, Some(wgpu::IndexFormat::Uint16));
        assert_eq!(primitive_state(Primitive::TriangleList, CullMode::None).strip_index_format, None);
    }

    // ── vertex input ──────────────────────────────────────────────────────

    #[test]
    fn normalized_bytes_become_unorm() {
        let color = VertexElement::new(ElementSlot::Color, ElementType::UByte, 4, 12).normalized();
        assert_eq!(vertex_format(&color), Some(wgpu::VertexFormat::Unorm8x4));
    }

    #[test]
    fn unsupported_element_is_reported() {
        let layout = VertexLayout::new(
            16,
            &[
                VertexElement::new(ElementSlot::Position, ElementType::Float, 3, 0),
                VertexElement::new(ElementSlot::Color, ElementType::UByte, 3, 12),
            ],
        );
        let err = vertex_attributes(&layout).unwrap_err();
        assert_eq!(err.slot, ElementSlot::Color);
    }

    #[test]
    fn attributes_use_slot_locations() {
        let layout = VertexLayout::new(
            20,
            &[
                VertexElement::new(ElementSlot::Position, ElementType::Float, 3, 0),
                VertexElement::new(ElementSlot::Texture1, ElementType::Float, 2, 12),
            ],
        );
        let attrs = vertex_attributes(&layout).unwrap();
        assert_eq!(attrs[1].shader_location, 3);
        assert_eq!(attrs[1].offset, 12);
    }

    // ── rects ─────────────────────────────────────────────────────────────

    #[test]
    fn target_rect_flips_and_clamps() {
        assert_eq!(target_rect(PixelRect::new(10, 0, 100, 50), 800, 600), Some((10, 550, 100, 50)));
        assert_eq!(target_rect(PixelRect::new(-10, 0, 20, 600), 800, 600), Some((0, 0, 10, 600)));
        assert_eq!(target_rect(PixelRect::new(900, 0, 20, 20), 800, 600), None);
    }
}
