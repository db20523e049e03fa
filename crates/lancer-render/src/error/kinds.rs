use std::fmt;

/// Failure from [`BlockStore::allocate`](crate::handle::BlockStore::allocate).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The bump cursor reached the store's address limit. Recoverable by the caller.
    OutOfAddressSpace,
    /// The backing storage could not grow. Existing handles may be unreadable.
    ReallocFailure,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::OutOfAddressSpace => f.write_str("block store address space exhausted"),
            AllocError::ReallocFailure => f.write_str("block store failed to grow its storage"),
        }
    }
}

impl std::error::Error for AllocError {}

/// Failure from a material store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialError {
    /// Handle is stale, freed or was never allocated.
    InvalidHandle(u32),
    /// Parameter block length is not a multiple of 16 bytes.
    Misaligned(usize),
    /// Sampler slot index past the supported count.
    SamplerOutOfRange(usize),
    Alloc(AllocError),
}

impl fmt::Display for MaterialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterialError::InvalidHandle(h) => write!(f, "invalid material handle {h}"),
            MaterialError::Misaligned(len) => {
                write!(f, "parameter block of {len} bytes is not a multiple of 16")
            }
            MaterialError::SamplerOutOfRange(i) => write!(f, "sampler index {i} out of range"),
            MaterialError::Alloc(e) => write!(f, "material allocation failed: {e}"),
        }
    }
}

impl std::error::Error for MaterialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MaterialError::Alloc(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AllocError> for MaterialError {
    fn from(e: AllocError) -> Self {
        MaterialError::Alloc(e)
    }
}

/// Failure from a shader library operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShaderError {
    UnknownCollection(u32),
    UnknownShader(u32),
    /// Collection already holds the maximum number of vertex-specific entries.
    TooManyVertexEntries,
    /// Entry already holds the maximum number of capability variants.
    TooManyVariants,
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::UnknownCollection(id) => write!(f, "unknown shader collection {id}"),
            ShaderError::UnknownShader(id) => write!(f, "unknown shader {id}"),
            ShaderError::TooManyVertexEntries => {
                f.write_str("shader collection vertex entries exhausted")
            }
            ShaderError::TooManyVariants => {
                f.write_str("shader collection capability variants exhausted")
            }
        }
    }
}

impl std::error::Error for ShaderError {}
