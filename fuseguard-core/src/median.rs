//! Fixed Median Networks
//!
//! The multi-cycle smoothers take the median of a full window on every
//! buffer. The window size is a compile-time constant, so instead of sorting
//! the window we run a fixed sequence of compare-exchange operations that is
//! just long enough to put the median in the middle slot:
//!
//! | Window | Compare-exchanges | Full sort (insertion, worst case) |
//! |--------|-------------------|-----------------------------------|
//! | 7      | 13                | 21                                |
//! | 9      | 19                | 36                                |
//! | 25     | 99                | 300                               |
//!
//! The networks are data-independent: every call costs the same, which is
//! what the buffer-done deadline needs. Only the middle element is
//! guaranteed to be in its sorted position afterwards; the rest of the
//! array is left partially ordered.
//!
//! Windows without a dedicated network fall back to `sort_unstable`.

/// Compare-exchange: afterwards `p[a] <= p[b]`
macro_rules! sort_pair {
    ($p:ident, $a:expr, $b:expr) => {
        if $p[$a] > $p[$b] {
            $p.swap($a, $b);
        }
    };
}

/// Apply a list of compare-exchanges in order
macro_rules! network {
    ($p:ident; $(($a:expr, $b:expr)),* $(,)?) => {
        $( sort_pair!($p, $a, $b); )*
    };
}

/// Median of 7 values, permutes `p`
pub fn median7<T: PartialOrd + Copy>(p: &mut [T; 7]) -> T {
    network!(p;
        (0, 5), (0, 3), (1, 6), (2, 4), (0, 1), (3, 5), (2, 6),
        (2, 3), (3, 6), (4, 5), (1, 4), (1, 3), (3, 4),
    );
    p[3]
}

/// Median of 9 values, permutes `p`
pub fn median9<T: PartialOrd + Copy>(p: &mut [T; 9]) -> T {
    network!(p;
        (1, 2), (4, 5), (7, 8), (0, 1), (3, 4), (6, 7), (1, 2), (4, 5),
        (7, 8), (0, 3), (5, 8), (4, 7), (3, 6), (1, 4), (2, 5), (4, 7),
        (4, 2), (6, 4), (4, 2),
    );
    p[4]
}

/// Median of 25 values, permutes `p`
pub fn median25<T: PartialOrd + Copy>(p: &mut [T; 25]) -> T {
    network!(p;
        (0, 1), (3, 4), (2, 4), (2, 3), (6, 7), (5, 7), (5, 6), (9, 10),
        (8, 10), (8, 9), (12, 13), (11, 13), (11, 12), (15, 16), (14, 16),
        (14, 15), (18, 19), (17, 19), (17, 18), (21, 22), (20, 22), (20, 21),
        (23, 24), (2, 5), (3, 6), (0, 6), (0, 3), (4, 7), (1, 7), (1, 4),
        (11, 14), (8, 14), (8, 11), (12, 15), (9, 15), (9, 12), (13, 16),
        (10, 16), (10, 13), (20, 23), (17, 23), (17, 20), (21, 24), (18, 24),
        (18, 21), (19, 22), (8, 17), (9, 18), (0, 18), (0, 9), (10, 19),
        (1, 19), (1, 10), (11, 20), (2, 20), (2, 11), (12, 21), (3, 21),
        (3, 12), (13, 22), (4, 22), (4, 13), (14, 23), (5, 23), (5, 14),
        (15, 24), (6, 24), (6, 15), (7, 16), (7, 19), (13, 21), (15, 23),
        (7, 13), (7, 15), (1, 9), (3, 11), (5, 17), (11, 17), (9, 17),
        (4, 10), (6, 12), (7, 14), (4, 6), (4, 7), (12, 14), (10, 14),
        (6, 7), (10, 12), (6, 10), (6, 17), (12, 17), (7, 17), (7, 10),
        (12, 18), (7, 12), (10, 18), (12, 20), (10, 20), (10, 12),
    );
    p[12]
}

/// Median of a window of any size, permutes `window`
///
/// Dispatches to a fixed network for 7, 9 and 25; the match is on a const
/// generic and folds away at compile time. For even `N` this is the upper
/// of the two middle values.
///
/// # Panics
///
/// Panics if `N == 0`.
pub fn window_median<T: Ord + Copy, const N: usize>(window: &mut [T; N]) -> T {
    match N {
        7 => {
            if let Ok(p) = <&mut [T; 7]>::try_from(&mut window[..]) {
                return median7(p);
            }
        }
        9 => {
            if let Ok(p) = <&mut [T; 9]>::try_from(&mut window[..]) {
                return median9(p);
            }
        }
        25 => {
            if let Ok(p) = <&mut [T; 25]>::try_from(&mut window[..]) {
                return median25(p);
            }
        }
        _ => {}
    }

    window.sort_unstable();
    window[N / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference_median(values: &[i32]) -> i32 {
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        sorted[sorted.len() / 2]
    }

    #[test]
    fn median7_simple() {
        let mut p = [7, 1, 6, 2, 5, 3, 4];
        assert_eq!(median7(&mut p), 4);
    }

    #[test]
    fn median9_with_duplicates() {
        let mut p = [5, 5, 1, 1, 9, 9, 5, 2, 8];
        assert_eq!(median9(&mut p), 5);
    }

    #[test]
    fn median25_descending() {
        let mut p = [0i32; 25];
        for (i, v) in p.iter_mut().enumerate() {
            *v = 100 - i as i32;
        }
        assert_eq!(median25(&mut p), 88);
    }

    #[test]
    fn fallback_for_other_sizes() {
        let mut p = [3, 1, 2];
        assert_eq!(window_median(&mut p), 2);

        let mut p = [4, 1, 3, 2];
        assert_eq!(window_median(&mut p), 3);
    }

    #[test]
    fn median7_every_permutation() {
        // All 5040 orderings of seven distinct values
        let mut values = [10, 20, 30, 40, 50, 60, 70];
        let mut count = 0;
        permute(&mut values, 0, &mut |perm: &[i32; 7]| {
            let mut p = *perm;
            assert_eq!(median7(&mut p), 40, "permutation {:?}", perm);
            count += 1;
        });
        assert_eq!(count, 5040);
    }

    fn permute(values: &mut [i32; 7], k: usize, visit: &mut impl FnMut(&[i32; 7])) {
        if k == values.len() {
            visit(values);
            return;
        }
        for i in k..values.len() {
            values.swap(k, i);
            permute(values, k + 1, visit);
            values.swap(k, i);
        }
    }

    proptest! {
        #[test]
        fn median7_matches_sort(values in prop::array::uniform7(-5000i32..5000)) {
            let mut p = values;
            prop_assert_eq!(window_median(&mut p), reference_median(&values));
        }

        #[test]
        fn median9_matches_sort(values in prop::array::uniform9(-5000i32..5000)) {
            let mut p = values;
            prop_assert_eq!(window_median(&mut p), reference_median(&values));
        }

        #[test]
        fn median25_matches_sort(values in prop::array::uniform25(-20i32..20)) {
            let mut p = values;
            prop_assert_eq!(window_median(&mut p), reference_median(&values));
        }
    }
}
