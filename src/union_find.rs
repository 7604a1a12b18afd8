//! Union-find algorithm with entities as key types.
//!
//! Implementation based on <https://en.wikipedia.org/wiki/Disjoint-set_data_structure>

use alloc::vec::Vec;

use crate::entity::EntityRef;

/// A node in the union-find data structure.
struct UnionFindEntry<K> {
    /// The parent of this node. Roots are their own parent.
    parent: K,

    /// Upper bound on the height of the tree rooted at this node.
    rank: u32,
}

/// Disjoint sets over a dense range of entity keys.
///
/// Sets are merged with [`UnionFind::union`]. Once all merges are done,
/// [`UnionFind::compress`] assigns every set a class number in `0..n`; class
/// numbers are only available after that step. Classes are numbered in the
/// order of their smallest key, so the class containing key 0 is always
/// class 0.
pub struct UnionFind<K: EntityRef> {
    table: Vec<UnionFindEntry<K>>,

    /// Class of each key, filled by `compress`.
    classes: Vec<u32>,

    num_classes: usize,
}

impl<K: EntityRef> Default for UnionFind<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef> UnionFind<K> {
    /// Creates an empty structure.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Vec::new(),
            classes: Vec::new(),
            num_classes: 0,
        }
    }

    /// Resets the table so that each of the first `num_keys` keys is in its
    /// own singleton set.
    pub fn reset(&mut self, num_keys: usize) {
        self.table.clear();
        self.table.extend((0..num_keys).map(|i| UnionFindEntry {
            parent: K::new(i),
            rank: 0,
        }));
        self.classes.clear();
        self.num_classes = 0;
    }

    /// Number of keys in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns whether the table has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the leader of the set containing the given key.
    ///
    /// This takes a mutable reference to self because it performs path
    /// compression for improved performance.
    pub fn find(&mut self, mut k: K) -> K {
        // Instead of the usual recursive path compression algorithm, we use
        // path halving which updates every other node to point to its
        // grandparent.
        //
        // Tarjan, Robert E.; van Leeuwen, Jan (1984). "Worst-case analysis of set union algorithms".
        // https://doi.org/10.1145/62.2160
        while self.table[k.index()].parent != k {
            let parent = self.table[k.index()].parent;
            let grand_parent = self.table[parent.index()].parent;
            self.table[k.index()].parent = grand_parent;
            k = grand_parent;
        }
        k
    }

    /// Merges the sets containing `a` and `b` and returns the leader of the
    /// merged set.
    pub fn union(&mut self, a: K, b: K) -> K {
        debug_assert!(self.classes.is_empty(), "union after compress");
        let a = self.find(a);
        let b = self.find(b);
        if a == b {
            return a;
        }

        // Merge into the set with the higher rank.
        let (leader, follower) = if self.table[a.index()].rank >= self.table[b.index()].rank {
            (a, b)
        } else {
            (b, a)
        };
        if self.table[leader.index()].rank == self.table[follower.index()].rank {
            self.table[leader.index()].rank += 1;
        }
        self.table[follower.index()].parent = leader;
        leader
    }

    /// Numbers the sets and returns how many there are.
    ///
    /// No more merges are allowed until the next [`UnionFind::reset`].
    pub fn compress(&mut self) -> usize {
        if !self.classes.is_empty() || self.table.is_empty() {
            return self.num_classes;
        }
        let mut leader_class = Vec::with_capacity(self.table.len());
        leader_class.resize(self.table.len(), u32::MAX);
        let mut classes = Vec::with_capacity(self.table.len());
        let mut num_classes = 0;
        for i in 0..self.table.len() {
            let leader = self.find(K::new(i));
            if leader_class[leader.index()] == u32::MAX {
                leader_class[leader.index()] = num_classes;
                num_classes += 1;
            }
            classes.push(leader_class[leader.index()]);
        }
        self.classes = classes;
        self.num_classes = num_classes as usize;
        self.num_classes
    }

    /// Number of classes found by [`UnionFind::compress`].
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Class of `k`. Only valid after [`UnionFind::compress`].
    #[inline]
    #[track_caller]
    pub fn class(&self, k: K) -> usize {
        debug_assert!(
            self.classes.len() == self.table.len(),
            "class numbers read before compress"
        );
        self.classes[k.index()] as usize
    }
}
