//! Generational Arena
//!
//! Dense slot storage with generation-tagged indices. Every session owns its
//! reactive nodes, scopes and event handlers in arenas of this kind instead of
//! process-wide lookup tables.
//!
//! Removing a value bumps the generation of its slot. A stale [`Index`] that
//! still points at a reused slot fails the generation check instead of
//! aliasing the new occupant.

use std::fmt;

/// A generation-tagged index into an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Index {
    slot: u32,
    generation: u32,
}

impl Index {
    /// The slot position inside the arena.
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// The generation the slot had when this index was handed out.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Pack the index into a single integer (generation in the high half).
    pub fn to_bits(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.slot)
    }

    /// Inverse of [`Index::to_bits`].
    pub fn from_bits(bits: u64) -> Self {
        Self {
            slot: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

#[derive(Debug)]
enum Entry<T> {
    Occupied { generation: u32, value: T },
    Free { generation: u32, next_free: Option<u32> },
}

/// Slot storage addressed by [`Index`].
#[derive(Debug)]
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Arena<T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Insert a value, reusing a free slot when one is available.
    pub fn insert(&mut self, value: T) -> Index {
        self.len += 1;

        if let Some(slot) = self.free_head {
            let entry = &mut self.entries[slot as usize];
            if let Entry::Free { generation, next_free } = *entry {
                self.free_head = next_free;
                *entry = Entry::Occupied { generation, value };
                return Index { slot, generation };
            }
        }

        let slot = self.entries.len() as u32;
        self.entries.push(Entry::Occupied {
            generation: 0,
            value,
        });
        Index {
            slot,
            generation: 0,
        }
    }

    /// Remove the value at `index`.
    ///
    /// Returns `None` if the index is stale or was never handed out.
    pub fn remove(&mut self, index: Index) -> Option<T> {
        let entry = self.entries.get_mut(index.slot as usize)?;
        match entry {
            Entry::Occupied { generation, .. } if *generation == index.generation => {}
            _ => return None,
        }

        let freed = Entry::Free {
            generation: index.generation.wrapping_add(1),
            next_free: self.free_head,
        };
        let old = std::mem::replace(entry, freed);
        self.free_head = Some(index.slot);
        self.len -= 1;

        match old {
            Entry::Occupied { value, .. } => Some(value),
            Entry::Free { .. } => None,
        }
    }

    /// Get a reference to the value at `index`.
    pub fn get(&self, index: Index) -> Option<&T> {
        match self.entries.get(index.slot as usize)? {
            Entry::Occupied { generation, value } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    /// Get a mutable reference to the value at `index`.
    pub fn get_mut(&mut self, index: Index) -> Option<&mut T> {
        match self.entries.get_mut(index.slot as usize)? {
            Entry::Occupied { generation, value } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    /// Check whether `index` refers to a live value.
    pub fn contains(&self, index: Index) -> bool {
        self.get(index).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no live values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Index, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| match entry {
                Entry::Occupied { generation, value } => Some((
                    Index {
                        slot: slot as u32,
                        generation: *generation,
                    },
                    value,
                )),
                Entry::Free { .. } => None,
            })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");

        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn removed_slot_is_reused_with_new_generation() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        assert_eq!(arena.remove(a), Some(1));

        let b = arena.insert(2);
        assert_eq!(a.slot(), b.slot());
        assert_ne!(a.generation(), b.generation());

        // The stale index must not alias the new occupant.
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&2));
    }

    #[test]
    fn double_remove_is_noop() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        assert_eq!(arena.remove(a), Some(1));
        assert_eq!(arena.remove(a), None);
        assert!(arena.is_empty());
    }

    #[test]
    fn bits_round_trip() {
        let mut arena = Arena::new();
        let a = arena.insert(());
        arena.remove(a);
        let b = arena.insert(());

        assert_eq!(Index::from_bits(b.to_bits()), b);
        assert_ne!(Index::from_bits(a.to_bits()), b);
    }

    #[test]
    fn iter_skips_free_slots() {
        let mut arena = Arena::new();
        let a = arena.insert('a');
        let _b = arena.insert('b');
        let _c = arena.insert('c');
        arena.remove(a);

        let values: Vec<char> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!['b', 'c']);
    }
}
