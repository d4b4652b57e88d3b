//! Growing-forbidden storage: fixed-capacity element pools (clips, curves,
//! bind-pose matrices) and raw value arenas (keys, samples) addressed by
//! integer offset.

use crate::slice::Slice;

/// A 4x3 matrix, 12 floats: three columns of (x, y, z) rotation/scale
/// followed by one column of translation. Matches the layout
/// [`crate::skin`]'s matrix multiply expects.
pub type Mat4x3 = [f32; 12];

/// A fixed-capacity `Vec`-backed pool. `push` never reallocates past
/// `capacity`; callers must check [`FixedPool::remaining`] first.
pub struct FixedPool<T> {
    capacity: usize,
    items: Vec<T>,
}

impl<T> FixedPool<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        FixedPool { capacity, items: Vec::with_capacity(capacity) }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.items.len()
    }

    /// Appends `value`, returning its index. Panics if called past
    /// capacity; callers validate against [`FixedPool::remaining`] first, as
    /// the manager's create paths do.
    pub fn push(&mut self, value: T) -> usize {
        debug_assert!(self.items.len() < self.capacity, "pool push past capacity");
        let idx = self.items.len();
        self.items.push(value);
        idx
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    #[must_use]
    pub fn slice(&self, s: Slice) -> &[T] {
        &self.items[s.start..s.end()]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    /// Removes `removed` in place, shifting the following elements left.
    pub fn remove_range(&mut self, removed: Slice) {
        if removed.is_empty() {
            return;
        }
        self.items.drain(removed.start..removed.end());
    }
}

/// A contiguous fixed-capacity arena of `T`, tracking only its used prefix
/// (`used`). Unlike [`FixedPool`], elements are written by slice rather than
/// pushed one at a time.
pub struct Arena<T> {
    capacity: usize,
    used: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> Arena<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Arena { capacity, used: 0, data: vec![T::default(); capacity] }
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.used
    }

    /// Reserves `len` elements at the end of the used prefix and returns
    /// their slice. Caller validates capacity beforehand.
    pub fn reserve(&mut self, len: usize) -> Slice {
        debug_assert!(self.used + len <= self.capacity, "arena reserve past capacity");
        let s = Slice::new(self.used, len);
        self.used += len;
        s
    }

    #[must_use]
    pub fn read(&self, s: Slice) -> &[T] {
        &self.data[s.start..s.end()]
    }

    pub fn write(&mut self, s: Slice, values: &[T]) {
        self.data[s.start..s.end()].copy_from_slice(values);
    }

    /// Physically deletes `removed` from the arena, moving the suffix left
    /// and shrinking the used prefix.
    pub fn remove(&mut self, removed: Slice) {
        if removed.is_empty() {
            return;
        }
        let move_len = self.used - removed.end();
        if move_len > 0 {
            self.data.copy_within(removed.end()..removed.end() + move_len, removed.start);
        }
        self.used -= removed.len;
    }

    /// Resets the used prefix to zero without touching capacity or
    /// contents (per-frame reuse, e.g. the sample arena).
    pub fn reset(&mut self) {
        self.used = 0;
    }
}
