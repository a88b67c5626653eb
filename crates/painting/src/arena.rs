//! Generational arena with typed handles.
//!
//! Slots are reused through an explicit free list. Every insertion draws a
//! fresh generation from an arena-wide counter, so a handle to a reclaimed
//! slot never matches whatever lives there later. A prefix of slots can be
//! pinned: pinned slots are never removed and never move during compaction.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Typed handle into an [`Arena`]
pub struct Id<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Slot index, stable until the next compaction.
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Occupied { generation: u32, value: T },
    Vacant,
}

/// Old-to-new slot mapping produced by [`Arena::compact`]
#[derive(Debug)]
pub struct Remap<T> {
    new_index: Vec<Option<u32>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Remap<T> {
    /// Translate a handle that was live before compaction.
    ///
    /// # Panics
    /// Panics if the handle's slot was vacant at compaction time.
    pub fn apply(&self, id: Id<T>) -> Id<T> {
        match self.new_index.get(id.index()).copied().flatten() {
            Some(index) => Id::new(index, id.generation),
            None => panic!("remapping {id:?}, which was not live at compaction"),
        }
    }

    /// Number of slots that changed position.
    pub fn moved(&self) -> usize {
        self.new_index
            .iter()
            .enumerate()
            .filter(|(old, new)| matches!(new, Some(n) if *n as usize != *old))
            .count()
    }
}

/// Generational arena
#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    pinned: u32,
    next_generation: u32,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            pinned: 0,
            next_generation: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Pin every slot currently in the arena.
    ///
    /// # Panics
    /// Panics if the arena has vacant slots.
    pub fn pin_all(&mut self) {
        assert!(self.free.is_empty(), "cannot pin an arena with vacant slots");
        self.pinned = self.slots.len() as u32;
    }

    pub fn pinned_len(&self) -> usize {
        self.pinned as usize
    }

    /// Insert a value, reusing a vacant slot if there is one.
    pub fn insert(&mut self, value: T) -> Id<T> {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Slot::Occupied { generation, value };
                Id::new(index, generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot::Occupied { generation, value });
                Id::new(index, generation)
            }
        }
    }

    /// Remove a value and put its slot on the free list.
    ///
    /// # Panics
    /// Panics on a stale handle or a pinned slot.
    pub fn remove(&mut self, id: Id<T>) -> T {
        assert!(id.index >= self.pinned, "removing pinned slot {id:?}");
        self.check(id);
        let slot = std::mem::replace(&mut self.slots[id.index()], Slot::Vacant);
        self.free.push(id.index);
        match slot {
            Slot::Occupied { value, .. } => value,
            Slot::Vacant => unreachable!("checked above"),
        }
    }

    pub fn get(&self, id: Id<T>) -> Option<&T> {
        match self.slots.get(id.index()) {
            Some(Slot::Occupied { generation, value }) if *generation == id.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: Id<T>) -> Option<&mut T> {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Occupied { generation, value }) if *generation == id.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn contains(&self, id: Id<T>) -> bool {
        self.get(id).is_some()
    }

    /// Handle of the value currently stored at `index`, if any.
    pub fn id_at(&self, index: usize) -> Option<Id<T>> {
        match self.slots.get(index) {
            Some(Slot::Occupied { generation, .. }) => Some(Id::new(index as u32, *generation)),
            _ => None,
        }
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots, live or vacant.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of vacant slots awaiting reuse or compaction.
    pub fn vacant_count(&self) -> usize {
        self.free.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, value } => {
                    Some((Id::new(index as u32, *generation), value))
                }
                Slot::Vacant => None,
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Id<T>, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, value } => {
                    Some((Id::new(index as u32, *generation), value))
                }
                Slot::Vacant => None,
            })
    }

    /// Drop vacant slots past the pinned prefix, preserving the order of the
    /// remaining values. Handles must be translated through the returned map.
    pub fn compact(&mut self) -> Remap<T> {
        let mut new_index = vec![None; self.slots.len()];
        let old_slots = std::mem::take(&mut self.slots);
        self.slots.reserve(old_slots.len() - self.free.len());
        for (old, slot) in old_slots.into_iter().enumerate() {
            if let Slot::Occupied { .. } = slot {
                new_index[old] = Some(self.slots.len() as u32);
                self.slots.push(slot);
            }
        }
        self.free.clear();
        Remap {
            new_index,
            _marker: PhantomData,
        }
    }

    fn check(&self, id: Id<T>) {
        if self.get(id).is_none() {
            panic!("stale arena handle {id:?}");
        }
    }
}

impl<T> Index<Id<T>> for Arena<T> {
    type Output = T;

    fn index(&self, id: Id<T>) -> &T {
        match self.get(id) {
            Some(value) => value,
            None => panic!("stale arena handle {id:?}"),
        }
    }
}

impl<T> IndexMut<Id<T>> for Arena<T> {
    fn index_mut(&mut self, id: Id<T>) -> &mut T {
        match self.get_mut(id) {
            Some(value) => value,
            None => panic!("stale arena handle {id:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_reuse() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);

        assert_eq!(arena.remove(a), "a");
        assert!(!arena.contains(a));
        assert_eq!(arena.vacant_count(), 1);

        let c = arena.insert("c");
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
        assert_eq!(arena[b], "b");
        assert_eq!(arena[c], "c");
    }

    #[test]
    #[should_panic(expected = "stale arena handle")]
    fn test_stale_handle_panics() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        arena.remove(a);
        arena.insert(2);
        let _ = arena[a];
    }

    #[test]
    #[should_panic(expected = "removing pinned slot")]
    fn test_pinned_slots_cannot_be_removed() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        arena.pin_all();
        arena.remove(a);
    }

    #[test]
    fn test_compact_keeps_pinned_prefix() {
        let mut arena = Arena::new();
        let pinned = arena.insert(0);
        arena.pin_all();
        let ids: Vec<_> = (1..=4).map(|v| arena.insert(v)).collect();
        arena.remove(ids[0]);
        arena.remove(ids[2]);

        let remap = arena.compact();
        assert_eq!(arena.slot_count(), 3);
        assert_eq!(arena.vacant_count(), 0);
        assert_eq!(remap.apply(pinned), pinned);
        assert_eq!(remap.moved(), 2);

        let second = remap.apply(ids[1]);
        let fourth = remap.apply(ids[3]);
        assert_eq!(arena[second], 2);
        assert_eq!(arena[fourth], 4);
        assert_eq!(second.index(), 1);
        assert_eq!(fourth.index(), 2);
    }
}
