/// Growable append-only buffer.
///
/// - `push()` is amortized O(1); capacity doubles when full and never shrinks
/// - `reset()` truncates logically; capacity is kept for the next frame
#[derive(Debug, Clone)]
pub struct Arena<T: Copy> {
    items: Vec<T>,
}

impl<T: Copy> Default for Arena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Copy> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity.max(1)),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Appends one value and returns its index.
    #[inline]
    pub fn push(&mut self, value: T) -> usize {
        self.grow_for(1);
        let index = self.items.len();
        self.items.push(value);
        index
    }

    /// Appends a run of values and returns the index of the first.
    pub fn extend_from_slice(&mut self, values: &[T]) -> usize {
        self.grow_for(values.len());
        let index = self.items.len();
        self.items.extend_from_slice(values);
        index
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Removes `index` by moving the last element into its place.
    #[inline]
    pub fn swap_remove(&mut self, index: usize) -> T {
        self.items.swap_remove(index)
    }

    /// Logical truncation. `T: Copy`, so nothing is dropped.
    #[inline]
    pub fn reset(&mut self) {
        self.items.clear();
    }

    fn grow_for(&mut self, additional: usize) {
        let needed = self.items.len() + additional;
        let capacity = self.items.capacity();
        if needed <= capacity {
            return;
        }

        let mut new_capacity = capacity.max(1);
        while new_capacity < needed {
            new_capacity *= 2;
        }
        self.items.reserve_exact(new_capacity - self.items.len());
    }
}
