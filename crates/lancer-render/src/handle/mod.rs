//! Handle-addressed storage.
//!
//! Handles are small non-zero integers. `0` is never a valid handle, so
//! `Option<Handle>` costs no extra space and doubles as "no value".
//!
//! Frame arenas use the raw value as `index + 1`. [`BlockStore`] gives each
//! slot a span of addresses and keeps the slot generation in the low bits.

mod block_store;

use std::num::NonZeroU32;

pub use block_store::{BlockStore, GENERATION_BITS, SLOT_SPAN};

/// Non-zero reference into a handle-addressed store.
///
/// [`from_index`](Self::from_index) and [`index`](Self::index) treat the raw
/// value as `index + 1`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(NonZeroU32);

impl Handle {
    /// Builds the handle for slot `index`. `None` if the value does not fit.
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index)
            .ok()
            .and_then(|i| i.checked_add(1))
            .and_then(NonZeroU32::new)
            .map(Handle)
    }

    #[inline]
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Handle)
    }

    #[inline]
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0.get()
    }
}
