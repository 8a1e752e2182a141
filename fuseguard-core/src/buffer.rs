//! Fixed-Size History Buffer for Multi-Cycle Readings
//!
//! ## Overview
//!
//! Every smoothing stage keeps the last few per-buffer readings (one reading
//! per mains cycle) in a ring of fixed capacity. When the ring is full the
//! oldest reading is overwritten. The capacity is a const generic so the
//! storage lives inline in the owning smoother, with no heap at all.
//!
//! ## Why Not `heapless::Deque`?
//!
//! The smoothers need two things a deque does not give cheaply:
//!
//! 1. **Automatic Overwrite**: a push on a full ring drops the oldest value
//!    instead of failing.
//! 2. **Contiguous Snapshot**: the median sorting networks operate in place
//!    on a `[T; N]` array. [`HistoryBuffer::snapshot`] copies the raw storage
//!    once; the order of the values does not matter for a median.
//!
//! ### Memory Layout
//!
//! ```text
//! HistoryBuffer<i32, 7>:
//! ┌────┬────┬────┬────┬────┬────┬────┐
//! │ v0 │ v1 │ v2 │ v3 │ v4 │ v5 │ v6 │  ← storage, 4 bytes each
//! └────┴────┴────┴────┴────┴────┴────┘
//!                ↑
//!            write_pos (next slot to overwrite)
//!
//! Total size = 4 * N + 2 * usize
//! ```
//!
//! ## Usage Example
//!
//! ```rust
//! use fuseguard_core::buffer::HistoryBuffer;
//!
//! let mut history: HistoryBuffer<i32, 3> = HistoryBuffer::new();
//! history.push(10);
//! history.push(20);
//! assert!(!history.is_full());
//!
//! history.push(30);
//! history.push(40); // overwrites 10
//! assert_eq!(history.iter().collect::<Vec<_>>(), vec![20, 30, 40]);
//! ```

/// Ring of the last `N` readings of a single metric
///
/// ## Internal Invariants
///
/// - `write_pos < N`
/// - `len <= N`
/// - slots at or beyond `len` (before the first wrap) hold `T::default()`
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T, const N: usize> {
    data: [T; N],
    write_pos: usize,
    len: usize,
}

impl<T: Copy + Default, const N: usize> HistoryBuffer<T, N> {
    /// Creates an empty buffer
    pub fn new() -> Self {
        Self {
            data: [T::default(); N],
            write_pos: 0,
            len: 0,
        }
    }

    /// Adds a reading, overwriting the oldest one when full
    pub fn push(&mut self, value: T) {
        if N == 0 {
            return;
        }

        self.data[self.write_pos] = value;
        self.write_pos = (self.write_pos + 1) % N;

        if self.len < N {
            self.len += 1;
        }
    }

    /// Number of stored readings
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Capacity of the ring
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Most recent reading
    pub fn last(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let idx = if self.write_pos == 0 { N - 1 } else { self.write_pos - 1 };
        Some(self.data[idx])
    }

    /// Reading by logical index (0 = oldest)
    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }

        let actual_index = if self.len < N {
            index
        } else {
            (self.write_pos + index) % N
        };

        Some(self.data[actual_index])
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// Copy of the raw storage, in slot order rather than age order
    ///
    /// Only meaningful as a whole when the buffer is full; the median
    /// networks permute the copy in place.
    pub fn snapshot(&self) -> [T; N] {
        self.data
    }

    /// Forget all readings
    pub fn clear(&mut self) {
        self.data = [T::default(); N];
        self.write_pos = 0;
        self.len = 0;
    }
}

impl<T: Copy + Default, const N: usize> Default for HistoryBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        let buffer: HistoryBuffer<i32, 5> = HistoryBuffer::new();
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.last(), None);
        assert_eq!(buffer.capacity(), 5);
    }

    #[test]
    fn push_and_retrieve() {
        let mut buffer = HistoryBuffer::<i32, 5>::new();
        buffer.push(1500);

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.last(), Some(1500));
        assert_eq!(buffer.get(0), Some(1500));
        assert_eq!(buffer.get(1), None);
    }

    #[test]
    fn circular_overwrite() {
        let mut buffer = HistoryBuffer::<i32, 3>::new();
        for i in 0..5 {
            buffer.push(i);
        }

        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_full());

        let values: Vec<i32> = buffer.iter().collect();
        assert_eq!(values, vec![2, 3, 4]);
        assert_eq!(buffer.last(), Some(4));
    }

    #[test]
    fn snapshot_holds_window_contents() {
        let mut buffer = HistoryBuffer::<i32, 4>::new();
        for v in [7, 3, 9, 1, 5] {
            buffer.push(v);
        }

        let mut snap = buffer.snapshot();
        snap.sort_unstable();
        assert_eq!(snap, [1, 3, 5, 9]);
    }

    #[test]
    fn clear_resets() {
        let mut buffer = HistoryBuffer::<i32, 2>::new();
        buffer.push(1);
        buffer.push(2);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.snapshot(), [0, 0]);
    }
}
