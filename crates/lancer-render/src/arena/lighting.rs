use bytemuck::{Pod, Zeroable};
use xxhash_rust::xxh3::xxh3_64;

use crate::handle::Handle;

use super::ByteArena;

const ENTRY_ALIGN: usize = 16;
const HEADER_LEN: usize = std::mem::size_of::<LightingHeader>();

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct LightingHeader {
    size: u32,
    _pad: u32,
    hash: u64,
}

/// Frame-local reference to a lighting blob. Raw value is `offset + 1`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LightingHandle(Handle);

impl LightingHandle {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0.raw()
    }
}

/// Per-frame lighting storage.
///
/// Entries are 16-byte aligned: a 16-byte header (size, hash) followed by the
/// payload. `set` deduplicates against the previous entry only.
#[derive(Debug, Clone, Default)]
pub struct LightingArena {
    bytes: ByteArena,
    last: Option<LightingHandle>,
    entries: usize,
}

impl LightingArena {
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: ByteArena::with_capacity(bytes),
            last: None,
            entries: 0,
        }
    }

    /// Appends a lighting blob, or returns the previous handle if `data` matches
    /// the last entry in size and hash. Empty data means "no lighting".
    pub fn set(&mut self, data: &[u8]) -> Option<LightingHandle> {
        if data.is_empty() {
            return None;
        }
        let size = u32::try_from(data.len()).ok()?;
        let hash = xxh3_64(data);

        if let Some(last) = self.last {
            if let Some(h) = self.header(last) {
                if h.size == size && h.hash == hash {
                    return Some(last);
                }
            }
        }

        let padded = (data.len() + ENTRY_ALIGN - 1) & !(ENTRY_ALIGN - 1);
        let offset = self.bytes.alloc(HEADER_LEN + padded, ENTRY_ALIGN);
        let handle = LightingHandle(Handle::from_index(offset)?);

        let header = LightingHeader { size, _pad: 0, hash };
        self.bytes
            .slice_mut(offset, HEADER_LEN)?
            .copy_from_slice(bytemuck::bytes_of(&header));
        self.bytes
            .slice_mut(offset + HEADER_LEN, data.len())?
            .copy_from_slice(data);

        self.last = Some(handle);
        self.entries += 1;
        Some(handle)
    }

    /// Payload bytes and content hash.
    pub fn get(&self, handle: LightingHandle) -> Option<(&[u8], u64)> {
        let header = self.header(handle)?;
        let data = self
            .bytes
            .slice(handle.0.index() + HEADER_LEN, header.size as usize)?;
        Some((data, header.hash))
    }

    /// Entries appended this frame.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    pub fn reset(&mut self) {
        self.bytes.reset();
        self.last = None;
        self.entries = 0;
    }

    fn header(&self, handle: LightingHandle) -> Option<LightingHeader> {
        let raw = self.bytes.slice(handle.0.index(), HEADER_LEN)?;
        Some(bytemuck::pod_read_unaligned(raw))
    }
}
