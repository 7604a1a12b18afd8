//! Bitsets of entities.

use alloc::vec::Vec;
use core::fmt;
use core::marker::PhantomData;

use super::EntityRef;

type Word = usize;

/// A set of entities stored as a bit vector.
///
/// The set must be sized before use with [`EntitySet::clear_and_resize`] or
/// [`EntitySet::grow_to`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EntitySet<T: EntityRef> {
    words: Vec<Word>,
    marker: PhantomData<T>,
}

impl<T: EntityRef> EntitySet<T> {
    /// Creates an empty set with no capacity.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: Vec::new(),
            marker: PhantomData,
        }
    }

    /// Creates an empty set able to hold indices below `max_index`.
    #[must_use]
    pub fn with_max_index(max_index: usize) -> Self {
        let mut set = Self::new();
        set.grow_to(max_index);
        set
    }

    #[inline]
    fn split(entity: T) -> (usize, u32) {
        let index = entity.index();
        (index / Word::BITS as usize, (index % Word::BITS as usize) as u32)
    }

    /// Returns whether `entity` is in the set.
    #[inline]
    #[track_caller]
    pub fn contains(&self, entity: T) -> bool {
        let (word, bit) = Self::split(entity);
        self.words[word] & (1 << bit) != 0
    }

    /// Adds `entity` to the set. Returns whether it was newly inserted.
    #[inline]
    #[track_caller]
    pub fn insert(&mut self, entity: T) -> bool {
        let (word, bit) = Self::split(entity);
        let was_set = self.words[word] & (1 << bit) != 0;
        self.words[word] |= 1 << bit;
        !was_set
    }

    /// Removes `entity` from the set.
    #[inline]
    #[track_caller]
    pub fn remove(&mut self, entity: T) {
        let (word, bit) = Self::split(entity);
        self.words[word] &= !(1 << bit);
    }

    /// Empties the set and sizes it for indices below `max_index`.
    #[inline]
    pub fn clear_and_resize(&mut self, max_index: usize) {
        self.words.clear();
        self.grow_to(max_index);
    }

    /// Sizes the set for indices below `max_index`, keeping its contents.
    #[inline]
    pub fn grow_to(&mut self, max_index: usize) {
        let words = max_index.div_ceil(Word::BITS as usize);
        if self.words.len() < words {
            self.words.resize(words, 0);
        }
    }

    /// Returns whether the set contains no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    /// Number of elements in the set.
    #[inline]
    pub fn count(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Iterates over the elements in increasing index order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut bits = word;
            core::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let low = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(T::new(i * Word::BITS as usize + low))
            })
        })
    }
}

impl<T: EntityRef> Default for EntitySet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EntityRef + fmt::Debug> fmt::Debug for EntitySet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
