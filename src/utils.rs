//! Child bit-mask helpers.
//!
//! Children of a node are numbered `0..n` and sets of children are encoded as
//! bit masks. Subset-sum tables are indexed by `mask - 1` since the empty set
//! never needs storage.

/// A set of children, one bit per child index.
pub type ChildMask = u64;

/// Largest number of children a single tree accepts.
///
/// The subset-sum table holds `2^n - 1` entries, so this also caps its size.
pub const MAX_CHILDREN: usize = 24;

/// Mask with only `child` set.
#[inline]
pub fn child_bit(child: usize) -> ChildMask {
    debug_assert!(child < MAX_CHILDREN);
    1 << child
}

/// Mask with the `n` lowest children set.
#[inline]
pub fn full_mask(n: usize) -> ChildMask {
    debug_assert!(n <= MAX_CHILDREN);
    (1 << n) - 1
}

/// Number of non-empty subsets of `n` children.
#[inline]
pub fn subset_count(n: usize) -> usize {
    full_mask(n) as usize
}

/// Index of the highest child in a non-empty mask.
#[inline]
pub fn highest_child(mask: ChildMask) -> usize {
    debug_assert!(mask != 0);
    (ChildMask::BITS - 1 - mask.leading_zeros()) as usize
}

/// Iterate over the children contained in `mask`, lowest first.
pub fn children_in(mask: ChildMask) -> impl Iterator<Item = usize> {
    let mut rest = mask;
    std::iter::from_fn(move || {
        if rest == 0 {
            None
        } else {
            let child = rest.trailing_zeros() as usize;
            rest &= rest - 1;
            Some(child)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mask_and_subset_count() {
        assert_eq!(full_mask(0), 0);
        assert_eq!(full_mask(1), 0b1);
        assert_eq!(full_mask(3), 0b111);
        assert_eq!(subset_count(0), 0);
        assert_eq!(subset_count(4), 15);
        assert_eq!(subset_count(MAX_CHILDREN), (1 << MAX_CHILDREN) - 1);
    }

    #[test]
    fn highest_child_picks_top_bit() {
        assert_eq!(highest_child(0b1), 0);
        assert_eq!(highest_child(0b1010), 3);
        assert_eq!(highest_child(child_bit(17) | 0b11), 17);
    }

    #[test]
    fn children_in_lists_bits_in_order() {
        let got: Vec<usize> = children_in(0b101101).collect();
        assert_eq!(got, vec![0, 2, 3, 5]);
        assert_eq!(children_in(0).count(), 0);
    }
}
