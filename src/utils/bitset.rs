//! A dense bit set keyed by arena index.
//!
//! Used wherever a pass needs a per-node flag: the worklist's pending set, visited marks
//! of graph walks, reachable blocks. Capacity is fixed at construction (the graph's
//! [`node_count`](crate::ir::FunctionGraph::node_count)); membership queries beyond it
//! answer `false` so that nodes created after the set was sized read as "not marked".
//!
//! # Example
//!
//! ```rust
//! use ssaprop::utils::BitSet;
//!
//! let mut set = BitSet::new(100);
//! assert!(set.insert(7));
//! assert!(!set.insert(7));
//! assert!(set.contains(7));
//! assert_eq!(set.iter().collect::<Vec<_>>(), vec![7]);
//! ```

use std::fmt;

/// A fixed-capacity set of small integers stored one bit per element.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitSet {
    words: Vec<u64>,
    len: usize,
}

impl BitSet {
    /// Creates an empty set able to hold `0..capacity`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            len: capacity,
        }
    }

    /// Capacity of the set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no element is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Adds `index`, returning `true` if it was not present before.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn insert(&mut self, index: usize) -> bool {
        assert!(index < self.len, "index {index} out of bounds ({})", self.len);
        let (word, mask) = (index / 64, 1u64 << (index % 64));
        let fresh = self.words[word] & mask == 0;
        self.words[word] |= mask;
        fresh
    }

    /// Removes `index`, returning `true` if it was present.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        let (word, mask) = (index / 64, 1u64 << (index % 64));
        let present = self.words[word] & mask != 0;
        self.words[word] &= !mask;
        present
    }

    /// Returns `true` if `index` is present. Indices beyond the capacity are never present.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        index < self.len && self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Number of elements present.
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Adds every element of `other`, returning `true` if `self` changed.
    ///
    /// # Panics
    ///
    /// Panics if the capacities differ.
    pub fn union_with(&mut self, other: &Self) -> bool {
        assert_eq!(self.len, other.len, "bit sets must have same length");
        let mut changed = false;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            let before = *a;
            *a |= *b;
            changed |= before != *a;
        }
        changed
    }

    /// Iterates over the elements in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(word_index, &word)| {
            let mut remaining = word;
            std::iter::from_fn(move || {
                if remaining == 0 {
                    return None;
                }
                let bit = remaining.trailing_zeros() as usize;
                remaining &= remaining - 1;
                Some(word_index * 64 + bit)
            })
        })
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reports_freshness() {
        let mut set = BitSet::new(130);
        assert!(set.insert(0));
        assert!(set.insert(129));
        assert!(!set.insert(129));
        assert_eq!(set.count(), 2);
    }

    #[test]
    fn test_remove() {
        let mut set = BitSet::new(10);
        set.insert(3);
        assert!(set.remove(3));
        assert!(!set.remove(3));
        assert!(!set.remove(99));
        assert!(set.is_empty());
    }

    #[test]
    fn test_contains_beyond_capacity() {
        let set = BitSet::new(4);
        assert!(!set.contains(4));
        assert!(!set.contains(1000));
    }

    #[test]
    fn test_iter_ascending_across_words() {
        let mut set = BitSet::new(200);
        for i in [199, 64, 5, 63, 128] {
            set.insert(i);
        }
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![5, 63, 64, 128, 199]);
    }

    #[test]
    fn test_union() {
        let mut a = BitSet::new(70);
        let mut b = BitSet::new(70);
        a.insert(1);
        b.insert(1);
        assert!(!a.union_with(&b));
        b.insert(69);
        assert!(a.union_with(&b));
        assert_eq!(a.count(), 2);
        a.clear();
        assert!(a.is_empty());
    }

    #[test]
    fn test_debug() {
        let mut set = BitSet::new(8);
        set.insert(2);
        set.insert(5);
        assert_eq!(format!("{set:?}"), "{2, 5}");
    }
}
