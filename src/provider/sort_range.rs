//! Windowed partial sort.

use std::cmp::Ordering;

/// Sort just enough of `items[left..=right]` that positions
/// `window_left..=window_right` hold what a full sort of that region would put
/// there. Everything before the window compares `<=` and everything after
/// compares `>=` the window's contents; their own order is unspecified.
///
/// The window is clamped into `[left, right]`; an empty region is a no-op.
/// `cmp` must be a total order.
///
/// ## Complexity
/// **O(n + w log w)** for a region of `n` items and a window of `w`.
pub fn sort_range<T, C>(
    items: &mut [T],
    mut cmp: C,
    left: usize,
    right: usize,
    window_left: usize,
    window_right: usize,
) where
    C: FnMut(&T, &T) -> Ordering,
{
    if items.is_empty() || left > right || left >= items.len() {
        return;
    }
    let right = right.min(items.len() - 1);
    let wl = window_left.clamp(left, right) - left;
    let wr = window_right.clamp(left, right).max(wl + left) - left;
    let region = &mut items[left..=right];

    if wl > 0 {
        region.select_nth_unstable_by(wl, &mut cmp);
    }
    let rest = &mut region[wl..];
    let k = wr - wl;
    if k + 1 < rest.len() {
        rest.select_nth_unstable_by(k, &mut cmp);
    }
    rest[..=k].sort_unstable_by(&mut cmp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    #[test]
    fn window_matches_full_sort() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut sorted: Vec<u32> = (0..200).collect();
        let full = sorted.clone();
        for (wl, wr) in [(0, 9), (50, 59), (190, 199), (0, 199), (73, 73)] {
            sorted.shuffle(&mut rng);
            sort_range(&mut sorted, |a, b| a.cmp(b), 0, 199, wl, wr);
            assert_eq!(sorted[wl..=wr], full[wl..=wr]);
        }
    }

    #[test]
    fn outside_the_region_is_untouched() {
        let mut v = vec![9, 8, 7, 6, 5, 4];
        sort_range(&mut v, |a, b| a.cmp(b), 2, 4, 0, 10);
        assert_eq!(v, vec![9, 8, 5, 6, 7, 4]);
    }

    #[test]
    fn empty_and_inverted_regions_are_noops() {
        let mut v: Vec<u32> = Vec::new();
        sort_range(&mut v, |a, b| a.cmp(b), 0, 0, 0, 0);
        let mut w = vec![3, 1, 2];
        sort_range(&mut w, |a, b| a.cmp(b), 2, 1, 0, 2);
        assert_eq!(w, vec![3, 1, 2]);
    }
}
