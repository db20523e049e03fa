use xxhash_rust::xxh3::xxh3_64;

/// Vertex attribute slot. The discriminant is the shader input location.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementSlot {
    Position = 0,
    Color = 1,
    Normal = 2,
    Texture1 = 3,
    Texture2 = 4,
    Dimensions = 5,
    Right = 6,
    Up = 7,
    BoneIds = 8,
    BoneWeights = 9,
    Color2 = 10,
}

impl ElementSlot {
    #[inline]
    pub fn location(self) -> u32 {
        self as u32
    }
}

/// Scalar component type of a vertex attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    Float = 0,
    UShort = 1,
    UByte = 2,
}

impl ElementType {
    /// Component size in bytes.
    #[inline]
    pub fn size(self) -> usize {
        match self {
            ElementType::Float => 4,
            ElementType::UShort => 2,
            ElementType::UByte => 1,
        }
    }
}

/// One attribute inside an interleaved vertex.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct VertexElement {
    pub slot: ElementSlot,
    pub kind: ElementType,
    /// Component count (1..=4).
    pub count: u8,
    /// Integer types are read as `[0, 1]` floats when set.
    pub normalized: bool,
    /// Byte offset inside the vertex.
    pub offset: u32,
}

impl VertexElement {
    #[inline]
    pub const fn new(slot: ElementSlot, kind: ElementType, count: u8, offset: u32) -> Self {
        Self { slot, kind, count, normalized: false, offset }
    }

    #[inline]
    pub const fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }
}

/// Interleaved vertex format with a content-derived hash.
///
/// The hash selects vertex-specific shader variants:
/// `((stride << 16 | element_count) << 32) | fold(xxh3(elements))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    stride: u32,
    elements: Vec<VertexElement>,
    hash: u64,
}

impl VertexLayout {
    pub fn new(stride: u32, elements: &[VertexElement]) -> Self {
        let hash = layout_hash(stride, elements);
        Self {
            stride,
            elements: elements.to_vec(),
            hash,
        }
    }

    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    #[inline]
    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }
}

fn layout_hash(stride: u32, elements: &[VertexElement]) -> u64 {
    let mut bytes = Vec::with_capacity(elements.len() * 8);
    for e in elements {
        bytes.extend_from_slice(&[e.slot as u8, e.kind as u8, e.count, e.normalized as u8]);
        bytes.extend_from_slice(&e.offset.to_le_bytes());
    }
    let h = xxh3_64(&bytes);
    let folded = (h ^ (h >> 32)) as u32;

    let props = (stride << 16) | (elements.len() as u32 & 0xFFFF);
    ((props as u64) << 32) | folded as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos_uv() -> Vec<VertexElement> {
        vec![
            VertexElement::new(ElementSlot::Position, ElementType::Float, 3, 0),
            VertexElement::new(ElementSlot::Texture1, ElementType::Float, 2, 12),
        ]
    }

    #[test]
    fn hash_encodes_stride_and_count_in_high_bits() {
        let layout = VertexLayout::new(20, &pos_uv());
        assert_eq!(layout.hash() >> 32, (20u64 << 16) | 2);
    }

    #[test]
    fn equal_layouts_hash_equal() {
        assert_eq!(
            VertexLayout::new(20, &pos_uv()).hash(),
            VertexLayout::new(20, &pos_uv()).hash()
        );
    }

    #[test]
    fn element_changes_alter_hash() {
        let mut other = pos_uv();
        other[1] = other[1].normalized();
        assert_ne!(
            VertexLayout::new(20, &pos_uv()).hash(),
            VertexLayout::new(20, &other).hash()
        );
    }
}
