//! In-place heap sort for per-tile scratch arrays.
//!
//! Runs inside the draw kernel on stack storage, so it never allocates.

use std::cmp::Ordering;

/// Sorts `items` in ascending order of `compare`. Not stable.
pub fn heap_sort_by<T, F>(items: &mut [T], mut compare: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    let len = items.len();
    for root in (0..len / 2).rev() {
        sift_down(items, root, len, &mut compare);
    }
    for end in (1..len).rev() {
        items.swap(0, end);
        sift_down(items, 0, end, &mut compare);
    }
}

fn sift_down<T, F>(items: &mut [T], mut root: usize, end: usize, compare: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    loop {
        let mut child = 2 * root + 1;
        if child >= end {
            return;
        }
        if child + 1 < end && compare(&items[child], &items[child + 1]) == Ordering::Less {
            child += 1;
        }
        if compare(&items[root], &items[child]) != Ordering::Less {
            return;
        }
        items.swap(root, child);
        root = child;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_std_sort() {
        let mut state = 0x2545_f491_u32;
        let mut values: Vec<u32> = (0..300)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state % 50
            })
            .collect();
        let mut expected = values.clone();
        expected.sort_unstable();

        heap_sort_by(&mut values, |a, b| a.cmp(b));
        assert_eq!(values, expected);
    }

    #[test]
    fn handles_short_inputs() {
        let mut empty: [u8; 0] = [];
        heap_sort_by(&mut empty, |a, b| a.cmp(b));

        let mut one = [7];
        heap_sort_by(&mut one, |a, b| a.cmp(b));
        assert_eq!(one, [7]);

        let mut two = [2.5f32, -1.0];
        heap_sort_by(&mut two, |a, b| a.total_cmp(b));
        assert_eq!(two, [-1.0, 2.5]);
    }

    #[test]
    fn sorts_a_permutation_by_key() {
        let depths = [0.3f32, 0.1, 0.9, 0.1];
        let mut order = [0usize, 1, 2, 3];
        heap_sort_by(&mut order, |&a, &b| {
            depths[a].total_cmp(&depths[b]).then(a.cmp(&b))
        });
        assert_eq!(order, [1, 3, 0, 2]);
    }
}
