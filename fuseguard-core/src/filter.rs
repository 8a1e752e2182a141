//! Sliding-Median Noise Filter for the Current Channel
//!
//! ## Overview
//!
//! The current signal of a dimmed load carries switching spikes that would
//! otherwise dominate both the RMS value and the zero-reference estimate.
//! Before anything else the pipeline replaces every current sample with the
//! median of the `2 * half + 1` samples around it.
//!
//! ## Edge Handling
//!
//! The input is padded with `half` copies of the first sample in front and
//! copies of the last sample behind (replicate-edge boundary), so the output
//! has exactly as many samples as the input:
//!
//! ```text
//! input:   [x0 x1 ... xn-1]
//! padded:  [x0 x0 x0 | x0 x1 ... xn-1 | xn-1 xn-1 xn-1 ...]
//!           ← half →                    ← half (+ block fill) →
//! output:  [m0 m1 ... mn-1]   mi = median(padded[i .. i + window])
//! ```
//!
//! ## Algorithm
//!
//! A naive sliding median costs O(window) per output sample. Instead the
//! padded input is cut into blocks of exactly one window. Every window then
//! straddles at most two neighbouring blocks `L` and `R`: it is a suffix of
//! `L` plus a prefix of `R`.
//!
//! ```text
//!        block L                 block R
//! ┌─────────────────────┬─────────────────────┐
//! │ l0 l1 │ l2 ... lk-1 │ r0 r1 │ r2 ... rk-1 │
//! └─────────────────────┴─────────────────────┘
//!           └──── window i = 2 ────┘
//! ```
//!
//! Each block is sorted once and its elements are threaded on a doubly linked
//! list in sorted order. Sliding the window one step removes one element from
//! `L`'s list and puts one back into `R`'s list, both O(1). `R` starts out
//! empty: all its elements are unlinked in reverse order up front, so the
//! re-insertions happen in exactly the reverse order of the removals and
//! every element finds its old neighbours still in place.
//!
//! Each list carries a cursor plus the count of list elements in front of
//! it. The median is the smallest cursor once the two counts add up to
//! `half` and nothing in front of one cursor is larger than the other
//! cursor. A step changes each count by at most one, so restoring that
//! condition moves the cursors only a few places per output sample.
//!
//! Cost per buffer: one sort per block plus amortised O(1) per sample,
//! deterministic for a given buffer size. The scratch space is allocated
//! once at construction; [`NoiseFilter::apply`] does not allocate.

use alloc::vec::Vec;

use crate::errors::{SamplingError, SamplingResult};

/// Sort key: sample value, ties broken by position in the padded input
type Key = (i32, u32);

/// Sliding median filter with preallocated scratch space
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    half: usize,
    window: usize,
    capacity: usize,
    padded: Vec<i32>,
    output: Vec<i32>,
    left: Block,
    right: Block,
}

impl NoiseFilter {
    /// Filter with window `2 * half_window + 1` for up to `max_samples`
    /// samples per call
    pub fn new(half_window: usize, max_samples: usize) -> Self {
        let window = 2 * half_window + 1;
        let blocks = block_count(max_samples, half_window, window);

        Self {
            half: half_window,
            window,
            capacity: max_samples,
            padded: Vec::with_capacity(blocks * window),
            output: Vec::with_capacity(max_samples),
            left: Block::new(window),
            right: Block::new(window),
        }
    }

    /// Number of samples on each side of the centre sample
    pub fn half_window(&self) -> usize {
        self.half
    }

    /// Full window length
    pub fn window(&self) -> usize {
        self.window
    }

    /// Largest input accepted by [`NoiseFilter::apply`]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Output of the most recent [`NoiseFilter::apply`]
    pub fn output(&self) -> &[i32] {
        &self.output
    }

    /// Filter one channel's samples, returning a same-length sequence
    pub fn apply<I>(&mut self, samples: I) -> SamplingResult<&[i32]>
    where
        I: IntoIterator<Item = i32>,
    {
        let half = self.half;
        let window = self.window;

        self.padded.clear();
        self.output.clear();

        let mut samples = samples.into_iter();
        let first = samples.next().ok_or(SamplingError::InvalidLayout {
            reason: "no samples to filter",
        })?;

        self.padded.extend(core::iter::repeat(first).take(half + 1));
        let mut last = first;
        let mut count = 1;
        for sample in samples {
            count += 1;
            if count > self.capacity {
                self.padded.clear();
                return Err(SamplingError::InvalidLayout {
                    reason: "more samples than the filter was sized for",
                });
            }
            self.padded.push(sample);
            last = sample;
        }

        let blocks = block_count(count, half, window);
        self.padded.resize(blocks * window, last);

        for j in 0..blocks {
            self.left.load(&self.padded[j * window..(j + 1) * window], j * window);

            if j + 1 == blocks {
                // Last window is exactly the last block
                self.output.push(self.left.kth(half));
                break;
            }

            self.right.load(&self.padded[(j + 1) * window..(j + 2) * window], (j + 1) * window);
            self.right.unlink_all();

            for i in 0..window {
                if i > 0 {
                    self.left.remove(i - 1);
                    self.right.restore(i - 1);
                }
                self.output.push(select_median(&mut self.left, &mut self.right, half));
                if self.output.len() == count {
                    break;
                }
            }

            if self.output.len() == count {
                break;
            }
        }

        Ok(&self.output)
    }
}

/// Blocks needed to cover `samples` plus padding on both sides
fn block_count(samples: usize, half: usize, window: usize) -> usize {
    (samples + 2 * half + window - 1) / window
}

/// Key comparison where a missing cursor sorts after everything
fn cursor_below(x: Option<Key>, y: Option<Key>) -> bool {
    match (x, y) {
        (Some(x), Some(y)) => x < y,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Whether the element in front of one cursor is larger than the other cursor
fn crosses(prev: Option<Key>, cursor: Option<Key>) -> bool {
    match (prev, cursor) {
        (Some(p), Some(c)) => p > c,
        _ => false,
    }
}

/// Move the two cursors until exactly `half` elements lie in front of them
/// and return the median of the union of both lists
fn select_median(left: &mut Block, right: &mut Block, half: usize) -> i32 {
    loop {
        let before = left.before + right.before;

        if before < half {
            if cursor_below(left.cursor_key(), right.cursor_key()) {
                left.advance();
            } else {
                right.advance();
            }
        } else if before > half {
            match (left.prev_key(), right.prev_key()) {
                (Some(l), Some(r)) if l > r => left.retreat(),
                (Some(_), None) => left.retreat(),
                _ => right.retreat(),
            }
        } else if crosses(left.prev_key(), right.cursor_key()) {
            left.retreat();
            right.advance();
        } else if crosses(right.prev_key(), left.cursor_key()) {
            right.retreat();
            left.advance();
        } else {
            break;
        }
    }

    match (left.cursor_key(), right.cursor_key()) {
        (Some(l), Some(r)) => l.min(r).0,
        (Some(l), None) => l.0,
        (None, Some(r)) => r.0,
        // Both lists exhausted cannot happen with half < window
        (None, None) => 0,
    }
}

/// One window-sized block, sorted and threaded on a linked list
///
/// List nodes are sorted positions `0..len`; node `len` is the sentinel.
#[derive(Debug, Clone)]
struct Block {
    len: usize,
    keys: Vec<Key>,
    order: Vec<usize>,
    rank: Vec<usize>,
    prev: Vec<usize>,
    next: Vec<usize>,
    cursor: usize,
    before: usize,
}

impl Block {
    fn new(len: usize) -> Self {
        Self {
            len,
            keys: Vec::with_capacity(len),
            order: Vec::with_capacity(len),
            rank: Vec::with_capacity(len),
            prev: Vec::with_capacity(len + 1),
            next: Vec::with_capacity(len + 1),
            cursor: 0,
            before: 0,
        }
    }

    /// Sort `values` and link all of them, cursor on the smallest
    fn load(&mut self, values: &[i32], base: usize) {
        let len = self.len;

        self.keys.clear();
        self.keys.extend(values.iter().enumerate().map(|(i, &v)| (v, (base + i) as u32)));

        self.order.clear();
        self.order.extend(0..len);
        let keys = &self.keys;
        self.order.sort_unstable_by_key(|&i| keys[i]);

        self.rank.clear();
        self.rank.resize(len, 0);
        for (r, &i) in self.order.iter().enumerate() {
            self.rank[i] = r;
        }

        self.prev.clear();
        self.next.clear();
        for r in 0..=len {
            self.prev.push(if r == 0 { len } else { r - 1 });
            self.next.push(if r == len { 0 } else { r + 1 });
        }

        self.cursor = 0;
        self.before = 0;
    }

    /// Value with sorted position `k` in the fully linked block
    fn kth(&self, k: usize) -> i32 {
        self.keys[self.order[k]].0
    }

    fn key_at(&self, node: usize) -> Option<Key> {
        if node == self.len {
            None
        } else {
            Some(self.keys[self.order[node]])
        }
    }

    fn cursor_key(&self) -> Option<Key> {
        self.key_at(self.cursor)
    }

    fn prev_key(&self) -> Option<Key> {
        self.key_at(self.prev[self.cursor])
    }

    fn precedes_cursor(&self, node: usize) -> bool {
        self.cursor == self.len || node < self.cursor
    }

    fn unlink(&mut self, node: usize) {
        let (p, n) = (self.prev[node], self.next[node]);
        self.next[p] = n;
        self.prev[n] = p;
    }

    fn relink(&mut self, node: usize) {
        let (p, n) = (self.prev[node], self.next[node]);
        self.next[p] = node;
        self.prev[n] = node;
    }

    /// Empty the list; elements must come back in input order via `restore`
    fn unlink_all(&mut self) {
        for i in (0..self.len).rev() {
            let node = self.rank[i];
            self.unlink(node);
        }
        self.cursor = self.len;
        self.before = 0;
    }

    /// Drop the element at input position `i`
    fn remove(&mut self, i: usize) {
        let node = self.rank[i];
        if node == self.cursor {
            self.cursor = self.next[node];
        } else if self.precedes_cursor(node) {
            self.before -= 1;
        }
        self.unlink(node);
    }

    /// Put back the element at input position `i`
    fn restore(&mut self, i: usize) {
        let node = self.rank[i];
        self.relink(node);
        if self.precedes_cursor(node) {
            self.before += 1;
        }
    }

    fn advance(&mut self) {
        self.cursor = self.next[self.cursor];
        self.before += 1;
    }

    fn retreat(&mut self) {
        self.cursor = self.prev[self.cursor];
        self.before -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn naive_median_filter(samples: &[i32], half: usize) -> Vec<i32> {
        let window = 2 * half + 1;
        let mut padded = vec![samples[0]; half];
        padded.extend_from_slice(samples);
        padded.extend(core::iter::repeat(samples[samples.len() - 1]).take(half));

        (0..samples.len())
            .map(|i| {
                let mut w = padded[i..i + window].to_vec();
                w.sort_unstable();
                w[half]
            })
            .collect()
    }

    #[test]
    fn removes_single_spike() {
        let mut filter = NoiseFilter::new(2, 16);
        let samples = [2000, 2000, 2000, 4000, 2000, 2000, 2000, 2000];
        let out = filter.apply(samples.iter().copied()).unwrap();
        assert_eq!(out, &[2000; 8]);
    }

    #[test]
    fn constant_input_unchanged() {
        let mut filter = NoiseFilter::new(16, 100);
        let out = filter.apply(core::iter::repeat(2100).take(100)).unwrap();
        assert_eq!(out.len(), 100);
        assert!(out.iter().all(|&v| v == 2100));
    }

    #[test]
    fn edges_replicate_first_and_last() {
        let mut filter = NoiseFilter::new(1, 8);
        let samples = [1, 5, 9];
        // windows: [1 1 5] [1 5 9] [5 9 9]
        let out = filter.apply(samples.iter().copied()).unwrap();
        assert_eq!(out, &[1, 5, 9]);
    }

    #[test]
    fn matches_naive_filter_on_mains_buffer() {
        // Sawtooth with spikes, one buffer of 100 samples at half window 16
        let samples: Vec<i32> = (0..100)
            .map(|i| if i % 17 == 3 { 4095 } else { 1800 + (i * 37 % 400) })
            .collect();

        let mut filter = NoiseFilter::new(16, 100);
        let out = filter.apply(samples.iter().copied()).unwrap().to_vec();
        assert_eq!(out, naive_median_filter(&samples, 16));
    }

    #[test]
    fn filter_is_reusable() {
        let mut filter = NoiseFilter::new(3, 20);
        let a: Vec<i32> = (0..20).collect();
        let b: Vec<i32> = (0..20).rev().collect();

        filter.apply(a.iter().copied()).unwrap();
        let out = filter.apply(b.iter().copied()).unwrap().to_vec();
        assert_eq!(out, naive_median_filter(&b, 3));
    }

    #[test]
    fn rejects_empty_and_oversized_input() {
        let mut filter = NoiseFilter::new(2, 4);
        assert!(matches!(
            filter.apply(core::iter::empty()),
            Err(SamplingError::InvalidLayout { .. })
        ));
        assert!(matches!(
            filter.apply(0..5),
            Err(SamplingError::InvalidLayout { .. })
        ));
        assert_eq!(filter.apply(0..4).unwrap().len(), 4);
    }

    #[test]
    fn zero_half_window_is_identity() {
        let mut filter = NoiseFilter::new(0, 10);
        let samples = [4, -2, 7, 7, 0];
        let out = filter.apply(samples.iter().copied()).unwrap();
        assert_eq!(out, &samples);
    }

    proptest! {
        #[test]
        fn matches_naive_filter(
            samples in prop::collection::vec(-8i32..8, 1..80),
            half in 0usize..8,
        ) {
            let mut filter = NoiseFilter::new(half, 80);
            let out = filter.apply(samples.iter().copied()).unwrap().to_vec();
            prop_assert_eq!(out, naive_median_filter(&samples, half));
        }

        #[test]
        fn matches_naive_filter_adc_range(
            samples in prop::collection::vec(0i32..4096, 100),
        ) {
            let mut filter = NoiseFilter::new(16, 100);
            let out = filter.apply(samples.iter().copied()).unwrap().to_vec();
            prop_assert_eq!(out, naive_median_filter(&samples, 16));
        }
    }
}
