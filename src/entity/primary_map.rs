//! Owning map from densely numbered entities to their definitions.

use alloc::vec::Vec;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Index, IndexMut};

use super::EntityRef;

/// A primary mapping `K -> V` which allocates new entity references.
///
/// This is a `Vec<V>` indexed by `K`: [`PrimaryMap::push`] appends a value and
/// returns the key assigned to it. Keys are never reused until the map is
/// cleared.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrimaryMap<K: EntityRef, V> {
    elems: Vec<V>,
    marker: PhantomData<K>,
}

impl<K: EntityRef, V> PrimaryMap<K, V> {
    /// Creates a new empty map.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            elems: Vec::new(),
            marker: PhantomData,
        }
    }

    /// Returns whether `k` was allocated by this map.
    #[inline]
    pub fn is_valid(&self, k: K) -> bool {
        k.index() < self.elems.len()
    }

    /// Returns the element at `k` if it exists.
    #[inline]
    pub fn get(&self, k: K) -> Option<&V> {
        self.elems.get(k.index())
    }

    /// Returns whether no keys have been allocated.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Number of keys allocated so far.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Returns the key that the next [`PrimaryMap::push`] will return.
    #[inline]
    #[must_use]
    pub fn next_key(&self) -> K {
        K::new(self.elems.len())
    }

    /// Appends `v` and returns its newly allocated key.
    #[inline]
    pub fn push(&mut self, v: V) -> K {
        let k = self.next_key();
        self.elems.push(v);
        k
    }

    /// Iterates over all keys in allocation order.
    #[inline]
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = K> + ExactSizeIterator + use<K, V> {
        (0..self.elems.len()).map(K::new)
    }

    /// Iterates over all keys and values in allocation order.
    #[inline]
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (K, &V)> + ExactSizeIterator {
        self.elems.iter().enumerate().map(|(i, v)| (K::new(i), v))
    }

    /// Iterates over all values in allocation order.
    #[inline]
    pub fn values(&self) -> core::slice::Iter<'_, V> {
        self.elems.iter()
    }

    /// Removes all entries, invalidating every key handed out so far.
    #[inline]
    pub fn clear(&mut self) {
        self.elems.clear();
    }
}

impl<K: EntityRef, V> Default for PrimaryMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: EntityRef, V> Index<K> for PrimaryMap<K, V> {
    type Output = V;

    #[inline]
    #[track_caller]
    fn index(&self, k: K) -> &V {
        &self.elems[k.index()]
    }
}

impl<K: EntityRef, V> IndexMut<K> for PrimaryMap<K, V> {
    #[inline]
    #[track_caller]
    fn index_mut(&mut self, k: K) -> &mut V {
        &mut self.elems[k.index()]
    }
}

impl<K: EntityRef + fmt::Debug, V: fmt::Debug> fmt::Debug for PrimaryMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
