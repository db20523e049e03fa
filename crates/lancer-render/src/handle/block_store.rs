use crate::error::AllocError;

use super::Handle;

/// Low handle bits holding the slot generation.
pub const GENERATION_BITS: u32 = 8;

/// Addresses owned by one slot, one per generation. Slot `i` owns
/// `[(i + 1) * SLOT_SPAN, (i + 2) * SLOT_SPAN)`; the first span is reserved so
/// no handle is zero.
pub const SLOT_SPAN: u32 = 1 << GENERATION_BITS;

const GENERATION_MASK: u32 = SLOT_SPAN - 1;

/// Minimum slot capacity reserved on first growth.
const MIN_SLOTS: usize = 16;

#[derive(Debug)]
enum Slot<T> {
    Live { generation: u32, value: T },
    /// Freed slot; doubles as a free-list node. `generation` is the one the
    /// next occupant will carry.
    Free { generation: u32, next: Option<usize> },
}

/// Free-list backed slot allocator addressed by [`Handle`].
///
/// - `allocate` pops the free list, or bumps the cursor and grows storage by doubling
/// - `free` bumps the slot's generation and pushes it onto the free list
/// - a handle stays valid across growth; only borrowed references are invalidated
///
/// A handle is the base address of its slot's span plus the slot generation,
/// and always lies in `[1, address_limit)`. Every access compares generations,
/// so a handle to a freed slot stays dead after the slot is reused. Generations
/// wrap after `SLOT_SPAN` reuses of one slot.
#[derive(Debug)]
pub struct BlockStore<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<usize>,
    /// Slots whose span ends strictly below the address limit.
    slot_limit: usize,
    live: usize,
}

impl<T> BlockStore<T> {
    /// Creates an empty store whose handles stay below `address_limit`.
    pub fn new(address_limit: u32) -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            slot_limit: slot_limit(address_limit),
            live: 0,
        }
    }

    /// Number of live records.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Slot capacity of the backing storage.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn allocate(&mut self, value: T) -> Result<Handle, AllocError> {
        self.allocate_with(|| value)
    }

    /// Like [`allocate`](Self::allocate), but builds the record only once a
    /// slot is secured. `make` never runs when allocation fails.
    pub fn allocate_with(&mut self, make: impl FnOnce() -> T) -> Result<Handle, AllocError> {
        if let Some(index) = self.free_head {
            if let Some(&Slot::Free { generation, next }) = self.slots.get(index) {
                let handle = encode(index, generation).ok_or(AllocError::OutOfAddressSpace)?;
                self.free_head = next;
                self.slots[index] = Slot::Live { generation, value: make() };
                self.live += 1;
                return Ok(handle);
            }
            // Head points at a live slot: the list is corrupt. Drop it and bump.
            debug_assert!(false, "block store free list head is not a free slot");
            self.free_head = None;
        }

        let index = self.slots.len();
        if index >= self.slot_limit {
            return Err(AllocError::OutOfAddressSpace);
        }
        let handle = encode(index, 0).ok_or(AllocError::OutOfAddressSpace)?;

        if self.slots.len() == self.slots.capacity() {
            let additional = self.slots.capacity().max(MIN_SLOTS);
            self.slots
                .try_reserve_exact(additional)
                .map_err(|_| AllocError::ReallocFailure)?;
            log::debug!("block store grew to {} slots", self.slots.capacity());
        }

        self.slots.push(Slot::Live { generation: 0, value: make() });
        self.live += 1;
        Ok(handle)
    }

    /// Resolves a handle. `None` if out of bounds, freed, or from an earlier
    /// occupant of the slot.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let (index, expected) = decode(handle)?;
        match self.slots.get(index) {
            Some(Slot::Live { generation, value }) if *generation == expected => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let (index, expected) = decode(handle)?;
        match self.slots.get_mut(index) {
            Some(Slot::Live { generation, value }) if *generation == expected => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Releases a slot and returns its record. `None` for a double free, a
    /// stale handle or an out-of-bounds handle.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let (index, expected) = decode(handle)?;
        let slot = self.slots.get_mut(index)?;
        if !matches!(slot, Slot::Live { generation, .. } if *generation == expected) {
            return None;
        }

        let freed = Slot::Free {
            generation: (expected + 1) & GENERATION_MASK,
            next: self.free_head,
        };
        let Slot::Live { value, .. } = std::mem::replace(slot, freed) else {
            return None;
        };
        self.free_head = Some(index);
        self.live -= 1;
        Some(value)
    }

    /// Releases a slot. Returns `false` for a double free, a stale handle or an
    /// out-of-bounds handle.
    #[inline]
    pub fn free(&mut self, handle: Handle) -> bool {
        self.remove(handle).is_some()
    }

    /// Live records in slot order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|slot| match slot {
            Slot::Live { value, .. } => Some(value),
            Slot::Free { .. } => None,
        })
    }
}

/// Number of slots `i` with `(i + 2) * SLOT_SPAN < address_limit`.
fn slot_limit(address_limit: u32) -> usize {
    u64::from(address_limit)
        .div_ceil(u64::from(SLOT_SPAN))
        .saturating_sub(2) as usize
}

fn encode(index: usize, generation: u32) -> Option<Handle> {
    let base = u32::try_from(index)
        .ok()?
        .checked_add(1)?
        .checked_mul(SLOT_SPAN)?;
    Handle::from_raw(base | (generation & GENERATION_MASK))
}

fn decode(handle: Handle) -> Option<(usize, u32)> {
    let raw = handle.raw();
    let index = (raw >> GENERATION_BITS).checked_sub(1)?;
    Some((index as usize, raw & GENERATION_MASK))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_of(h: Handle) -> u32 {
        (h.raw() >> GENERATION_BITS) - 1
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn allocate_then_resolve() {
        let mut store = BlockStore::new(1 << 16);
        let a = store.allocate("a").unwrap();
        let b = store.allocate("b").unwrap();

        assert_ne!(a, b);
        assert_eq!(store.get(a), Some(&"a"));
        assert_eq!(store.get(b), Some(&"b"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn freed_handle_does_not_resolve() {
        let mut store = BlockStore::new(1 << 16);
        let a = store.allocate(7u32).unwrap();

        assert!(store.free(a));
        assert_eq!(store.get(a), None);
        assert!(store.is_empty());
    }

    #[test]
    fn never_allocated_handle_does_not_resolve() {
        let store: BlockStore<u32> = BlockStore::new(1 << 16);
        assert_eq!(store.get(Handle::from_raw(5 * SLOT_SPAN).unwrap()), None);
    }

    #[test]
    fn reserved_span_does_not_resolve() {
        let mut store = BlockStore::new(1 << 16);
        store.allocate(1u32).unwrap();
        assert_eq!(store.get(Handle::from_raw(1).unwrap()), None);
        assert_eq!(store.get(Handle::from_raw(SLOT_SPAN - 1).unwrap()), None);
    }

    #[test]
    fn remove_returns_the_record() {
        let mut store = BlockStore::new(1 << 16);
        let a = store.allocate(String::from("a")).unwrap();
        assert_eq!(store.remove(a).as_deref(), Some("a"));
        assert_eq!(store.remove(a), None);
    }

    // ── reuse ─────────────────────────────────────────────────────────────

    #[test]
    fn freed_slot_is_reused_under_a_new_handle() {
        let mut store = BlockStore::new(1 << 16);
        let a = store.allocate(1u32).unwrap();
        let _b = store.allocate(2u32).unwrap();
        store.free(a);

        let c = store.allocate(3u32).unwrap();
        assert_eq!(slot_of(c), slot_of(a));
        assert_eq!(c.raw(), a.raw() + 1);
        assert_eq!(store.get(c), Some(&3));
    }

    #[test]
    fn stale_handle_misses_the_new_occupant() {
        let mut store = BlockStore::new(1 << 16);
        let stale = store.allocate(1u32).unwrap();
        store.free(stale);
        let fresh = store.allocate(2u32).unwrap();

        assert_eq!(store.get(stale), None);
        assert_eq!(store.get_mut(stale), None);
        assert!(!store.free(stale));
        assert_eq!(store.get(fresh), Some(&2));
    }

    #[test]
    fn generations_wrap_within_the_slot_span() {
        let mut store = BlockStore::new(4 * SLOT_SPAN);
        let first = store.allocate(0u32).unwrap();
        let mut last = first;
        for i in 1..=SLOT_SPAN {
            assert!(store.free(last));
            last = store.allocate(i).unwrap();
            assert_eq!(slot_of(last), 0);
            assert!(last.raw() < 2 * SLOT_SPAN);
        }
        // A full lap lands back on the first handle.
        assert_eq!(last, first);
        assert_eq!(store.get(last), Some(&SLOT_SPAN));
    }

    // ── double free ───────────────────────────────────────────────────────

    #[test]
    fn double_free_is_rejected() {
        let mut store = BlockStore::new(1 << 16);
        let a = store.allocate(1u32).unwrap();
        let b = store.allocate(2u32).unwrap();

        assert!(store.free(a));
        assert!(store.free(b));
        assert!(!store.free(a));
        assert!(!store.free(b));

        // Free list still intact: both slots come back exactly once.
        let x = store.allocate(3u32).unwrap();
        let y = store.allocate(4u32).unwrap();
        let z = store.allocate(5u32).unwrap();
        assert_eq!(slot_of(x), slot_of(b));
        assert_eq!(slot_of(y), slot_of(a));
        assert_eq!(slot_of(z), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn out_of_bounds_free_fails() {
        let mut store: BlockStore<u32> = BlockStore::new(1 << 16);
        assert!(!store.free(Handle::from_raw(3 * SLOT_SPAN).unwrap()));
    }

    // ── address space ─────────────────────────────────────────────────────

    #[test]
    fn span_must_end_below_the_address_limit() {
        let mut store = BlockStore::new(4 * SLOT_SPAN);
        assert_eq!(store.allocate(()).unwrap().raw(), SLOT_SPAN);
        assert_eq!(store.allocate(()).unwrap().raw(), 2 * SLOT_SPAN);
        assert_eq!(store.allocate(()), Err(AllocError::OutOfAddressSpace));

        let mut wider = BlockStore::new(4 * SLOT_SPAN + 1);
        for _ in 0..3 {
            wider.allocate(()).unwrap();
        }
        assert_eq!(wider.allocate(()), Err(AllocError::OutOfAddressSpace));
    }

    #[test]
    fn tiny_limits_hold_nothing() {
        for limit in [0, 1, SLOT_SPAN, 2 * SLOT_SPAN] {
            let mut store = BlockStore::new(limit);
            assert_eq!(store.allocate(()), Err(AllocError::OutOfAddressSpace));
        }
    }

    #[test]
    fn full_u32_range_is_addressable() {
        let store: BlockStore<()> = BlockStore::new(u32::MAX);
        assert_eq!(store.slot_limit, (1 << 24) - 2);

        let last = encode(store.slot_limit - 1, GENERATION_MASK).unwrap();
        assert!(last.raw() < u32::MAX);
        assert_eq!(decode(last), Some((store.slot_limit - 1, GENERATION_MASK)));
    }

    #[test]
    fn exhausted_store_recovers_after_free() {
        let mut store = BlockStore::new(4 * SLOT_SPAN);
        let a = store.allocate(1u8).unwrap();
        let _b = store.allocate(2u8).unwrap();
        assert_eq!(store.allocate(3u8), Err(AllocError::OutOfAddressSpace));

        store.free(a);
        let c = store.allocate(4u8).unwrap();
        assert_eq!(slot_of(c), slot_of(a));
    }

    #[test]
    fn churn_stays_within_address_range() {
        let limit = 64 * SLOT_SPAN;
        let mut store = BlockStore::new(limit);
        let mut held = Vec::new();

        for round in 0..20_000u32 {
            if round % 3 == 2 {
                if let Some(h) = held.pop() {
                    assert!(store.free(h));
                }
            } else if let Ok(h) = store.allocate(round) {
                assert!(h.raw() >= 1 && h.raw() < limit);
                held.push(h);
            }
        }

        for h in held {
            assert!(store.contains(h));
        }
    }

    // ── growth ────────────────────────────────────────────────────────────

    #[test]
    fn handles_survive_growth() {
        let mut store = BlockStore::new(1 << 20);
        let first = store.allocate(0usize).unwrap();
        let cap_before = store.capacity();

        for i in 1..1_000usize {
            store.allocate(i).unwrap();
        }

        assert!(store.capacity() > cap_before);
        assert_eq!(store.get(first), Some(&0));
    }

    #[test]
    fn values_mut_skips_free_slots() {
        let mut store = BlockStore::new(1 << 16);
        let a = store.allocate(1u32).unwrap();
        store.allocate(2u32).unwrap();
        store.allocate(3u32).unwrap();
        store.free(a);

        for v in store.values_mut() {
            *v *= 10;
        }
        let mut seen: Vec<u32> = store.values_mut().map(|v| *v).collect();
        seen.sort();
        assert_eq!(seen, vec![20, 30]);
    }

    #[test]
    fn allocate_with_skips_construction_when_full() {
        let mut store = BlockStore::new(3 * SLOT_SPAN);
        store.allocate(1u32).unwrap();

        let mut built = false;
        let result = store.allocate_with(|| {
            built = true;
            2u32
        });
        assert_eq!(result, Err(AllocError::OutOfAddressSpace));
        assert!(!built);
    }
}
