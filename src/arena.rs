//! Typed stack arena for allocation-free evaluation.
//!
//! This module provides two key types:
//!
//! - [`Arena`]: a pre-sized, strongly typed linear allocator
//! - [`Span`]: a `(start, len)` handle to a region handed out by an arena
//!
//! # Zero-Allocation Pattern
//!
//! An arena is sized once for the worst-case number of intermediate values
//! of one evaluation, then reused: `reset()` rewinds the cursor, every
//! `allocate` bumps it. Nothing is freed individually and the buffer never
//! grows, so after the first evaluation the hot path performs no heap
//! allocation.
//!
//! ```rust
//! use dualgrad::Arena;
//!
//! let mut arena = Arena::<f64>::new(8);
//!
//! for _ in 0..3 {
//!     arena.reset();
//!     let hidden = arena.allocate(3, true).unwrap();
//!     let output = arena.allocate(2, true).unwrap();
//!     arena.get_mut(hidden)[0] = 1.0;
//!     let (before, out) = arena.split_for_write(output);
//!     out[0] = hidden.slice(before)[0] * 2.0;
//!     assert_eq!(arena.get(output)[0], 2.0);
//! }
//! ```
//!
//! # Preconditions
//!
//! `reset()` must be called once before each independent evaluation.
//! Skipping it does not fail loudly: the next evaluation simply runs
//! further up the buffer and eventually hits [`GradError::ArenaExhausted`].
//! Spans from before a reset must not be used after it.
//!
//! # Thread Safety
//!
//! Arenas are NOT shared between threads. Each worker owns one; see
//! [`Scalar::with_thread_arena`](crate::Scalar::with_thread_arena).

use crate::error::{GradError, GradResult};

/// Handle to a contiguous region of an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    start: usize,
    len: usize,
}

impl Span {
    /// First element index inside the arena buffer.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Is empty?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last element index.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// Resolves the span against a read-only prefix of the arena, as
    /// returned by [`Arena::split_for_write`].
    #[inline]
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.start..self.end()]
    }

    /// The first `len` elements of this span.
    #[inline]
    pub fn prefix(&self, len: usize) -> Span {
        debug_assert!(len <= self.len);
        Span {
            start: self.start,
            len,
        }
    }
}

/// Pre-sized, strongly typed stack allocator.
///
/// # Example
///
/// ```rust
/// use dualgrad::{Arena, GradError};
///
/// let mut arena = Arena::<f64>::new(4);
/// assert!(arena.allocate(3, false).is_ok());
/// assert!(matches!(
///     arena.allocate(2, false),
///     Err(GradError::ArenaExhausted { requested: 2, remaining: 1 })
/// ));
/// assert_eq!(arena.used(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Arena<T> {
    storage: Vec<T>,
    next_free: usize,
}

impl<T: Default> Arena<T> {
    /// Creates an arena holding exactly `capacity` elements.
    ///
    /// Capacity is fixed for the arena's lifetime.
    pub fn new(capacity: usize) -> Self {
        let mut storage = Vec::with_capacity(capacity);
        storage.resize_with(capacity, T::default);
        Self {
            storage,
            next_free: 0,
        }
    }

    /// Hands out the next `count` elements.
    ///
    /// With `initialize` the span is filled with `T::default()`; otherwise
    /// it holds whatever the previous evaluation left there.
    ///
    /// # Errors
    ///
    /// [`GradError::ArenaExhausted`] if fewer than `count` elements remain.
    /// The cursor is not moved in that case.
    #[inline]
    pub fn allocate(&mut self, count: usize, initialize: bool) -> GradResult<Span> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(GradError::arena_exhausted(count, remaining));
        }

        let span = Span {
            start: self.next_free,
            len: count,
        };
        self.next_free += count;

        if initialize {
            self.storage[span.start..span.end()].fill_with(T::default);
        }
        Ok(span)
    }

    /// Same as [`allocate`](Self::allocate) with a compile-time count.
    #[inline]
    pub fn allocate_fixed<const N: usize>(&mut self, initialize: bool) -> GradResult<Span> {
        self.allocate(N, initialize)
    }
}

impl<T> Arena<T> {
    /// Rewinds the cursor. O(1); element storage is kept for reuse.
    #[inline]
    pub fn reset(&mut self) {
        self.next_free = 0;
    }

    /// Total number of elements.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Elements handed out since the last reset.
    #[inline]
    pub fn used(&self) -> usize {
        self.next_free
    }

    /// Elements still available.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.storage.len() - self.next_free
    }

    /// Reads a span.
    #[inline]
    pub fn get(&self, span: Span) -> &[T] {
        &self.storage[span.start..span.end()]
    }

    /// Writes a span.
    #[inline]
    pub fn get_mut(&mut self, span: Span) -> &mut [T] {
        &mut self.storage[span.start..span.end()]
    }

    /// Splits the buffer at `span`: everything allocated before it becomes
    /// readable while `span` itself is writable.
    ///
    /// Resolve earlier spans against the returned prefix with
    /// [`Span::slice`]. Stack discipline guarantees every earlier span lies
    /// entirely inside the prefix.
    #[inline]
    pub fn split_for_write(&mut self, span: Span) -> (&[T], &mut [T]) {
        let (before, rest) = self.storage.split_at_mut(span.start);
        (before, &mut rest[..span.len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_advances_cursor() {
        let mut arena = Arena::<f64>::new(10);
        assert_eq!(arena.capacity(), 10);

        let a = arena.allocate(4, true).unwrap();
        let b = arena.allocate(6, true).unwrap();
        assert_eq!(a.start(), 0);
        assert_eq!(b.start(), 4);
        assert_eq!(b.end(), 10);
        assert_eq!(arena.used(), 10);
        assert_eq!(arena.remaining(), 0);
    }

    #[test]
    fn test_exhaustion_keeps_cursor() {
        let mut arena = Arena::<f64>::new(5);
        arena.allocate(3, false).unwrap();

        let err = arena.allocate(3, false).unwrap_err();
        assert!(matches!(
            err,
            GradError::ArenaExhausted {
                requested: 3,
                remaining: 2
            }
        ));
        assert_eq!(arena.used(), 3);

        // The remaining space is still usable.
        assert!(arena.allocate(2, false).is_ok());
    }

    #[test]
    fn test_reset_reuses_storage() {
        let mut arena = Arena::<f64>::new(3);
        let span = arena.allocate(3, true).unwrap();
        arena.get_mut(span).copy_from_slice(&[1.0, 2.0, 3.0]);

        arena.reset();
        assert_eq!(arena.used(), 0);

        // Without initialization the previous contents are visible.
        let stale = arena.allocate(3, false).unwrap();
        assert_eq!(arena.get(stale), &[1.0, 2.0, 3.0]);

        arena.reset();
        let clean = arena.allocate(3, true).unwrap();
        assert_eq!(arena.get(clean), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_allocate_fixed() {
        let mut arena = Arena::<f64>::new(4);
        let span = arena.allocate_fixed::<4>(true).unwrap();
        assert_eq!(span.len(), 4);
        assert!(arena.allocate_fixed::<1>(true).is_err());
    }

    #[test]
    fn test_split_for_write() {
        let mut arena = Arena::<f64>::new(6);
        let first = arena.allocate(2, true).unwrap();
        let second = arena.allocate(2, true).unwrap();
        let third = arena.allocate(2, true).unwrap();

        arena.get_mut(first).copy_from_slice(&[1.0, 2.0]);
        arena.get_mut(second).copy_from_slice(&[3.0, 4.0]);

        let (before, out) = arena.split_for_write(third);
        let a = first.slice(before);
        let b = second.slice(before);
        out[0] = a[0] + b[0];
        out[1] = a[1] + b[1];

        assert_eq!(arena.get(third), &[4.0, 6.0]);
    }

    #[test]
    fn test_zero_sized_allocation() {
        let mut arena = Arena::<f64>::new(0);
        let span = arena.allocate(0, true).unwrap();
        assert!(span.is_empty());
        assert!(arena.allocate(1, true).is_err());
    }
}
