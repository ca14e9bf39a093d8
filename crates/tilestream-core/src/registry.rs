use slab::Slab;
use static_assertions::const_assert_eq;
use std::{
    mem,
    num::NonZeroU32,
    ops::{Index, IndexMut},
};

/// An opaque number that uniquely identifies a value stored in a given [`Registry32`].
///
/// An `Option<RegistryId>` still only requires 32 bits.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RegistryId(NonZeroU32);

const_assert_eq!(
    mem::size_of::<Option<RegistryId>>(),
    mem::size_of::<RegistryId>()
);

impl RegistryId {
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// Stores up to `u32::MAX - 1` values of type `T`, indexed by [`RegistryId`].
///
/// Ids of removed values are recycled, so callers that hand ids to other owners (event listeners, scene nodes, tile sets)
/// must drop those ids when the value is removed.
pub struct Registry32<T> {
    values: Slab<T>,
}

impl<T> Default for Registry32<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry32<T> {
    pub fn new() -> Self {
        Self { values: Slab::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: RegistryId) -> bool {
        self.values.contains(Self::id_to_index(id))
    }

    #[inline]
    pub fn get(&self, id: RegistryId) -> Option<&T> {
        self.values.get(Self::id_to_index(id))
    }

    #[inline]
    pub fn get_mut(&mut self, id: RegistryId) -> Option<&mut T> {
        self.values.get_mut(Self::id_to_index(id))
    }

    #[inline]
    pub fn insert(&mut self, value: T) -> RegistryId {
        let index = self.values.insert(value);
        Self::index_to_id(index)
    }

    /// Returns `None` if `id` is not (or no longer) occupied.
    #[inline]
    pub fn remove(&mut self, id: RegistryId) -> Option<T> {
        self.values.try_remove(Self::id_to_index(id))
    }

    /// Iterates in slot order, which is deterministic for a given sequence of inserts and removals.
    pub fn iter(&self) -> impl Iterator<Item = (RegistryId, &T)> {
        self.values
            .iter()
            .map(|(index, value)| (Self::index_to_id(index), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (RegistryId, &mut T)> {
        self.values
            .iter_mut()
            .map(|(index, value)| (Self::index_to_id(index), value))
    }

    pub fn ids(&self) -> Vec<RegistryId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Removes every value, yielding them in slot order.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.values.drain()
    }

    const MAX_VALID_INDEX: usize = (u32::MAX - 1) as usize;

    const fn id_to_index(id: RegistryId) -> usize {
        // XOR flips all of the bits so that u32::MAX is mapped to zero (a valid slab index).
        (id.0.get() ^ u32::MAX) as usize
    }

    fn index_to_id(index: usize) -> RegistryId {
        assert!(index <= Self::MAX_VALID_INDEX);
        RegistryId(
            NonZeroU32::new((index as u32) ^ u32::MAX).expect("index is below u32::MAX"),
        )
    }
}

impl<T> Index<RegistryId> for Registry32<T> {
    type Output = T;

    #[inline]
    fn index(&self, id: RegistryId) -> &Self::Output {
        self.values.index(Self::id_to_index(id))
    }
}

impl<T> IndexMut<RegistryId> for Registry32<T> {
    #[inline]
    fn index_mut(&mut self, id: RegistryId) -> &mut Self::Output {
        self.values.index_mut(Self::id_to_index(id))
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn removed_ids_are_vacant() {
        let mut registry = Registry32::new();
        let a = registry.insert("a");
        let b = registry.insert("b");

        assert_eq!(registry.remove(a), Some("a"));
        assert_eq!(registry.remove(a), None);
        assert!(!registry.contains(a));
        assert_eq!(registry[b], "b");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn iteration_follows_slot_order() {
        let mut registry = Registry32::new();
        let ids: Vec<_> = (0..4).map(|i| registry.insert(i)).collect();
        registry.remove(ids[1]);

        let values: Vec<_> = registry.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 2, 3]);
    }
}
