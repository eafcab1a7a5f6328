//! Generational arena used for side tables that heap items refer to by id.
//!
//! Ids carry the generation of the slot they were issued for, so an id that outlives its entry
//! never aliases a later entry in the same slot.

use alloc::vec::Vec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArenaId {
    index: u32,
    generation: u32,
}

/// Typed wrapper around an `ArenaId`.
pub trait ArenaIndex: Copy {
    fn from_arena_id(id: ArenaId) -> Self;

    fn arena_id(self) -> ArenaId;
}

/// Declare a newtype id for entries of an `Arena`.
macro_rules! arena_index {
    ($(#[$attr:meta])* $vis:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis struct $name($crate::runtime::arena::ArenaId);

        impl $crate::runtime::arena::ArenaIndex for $name {
            #[inline]
            fn from_arena_id(id: $crate::runtime::arena::ArenaId) -> Self {
                $name(id)
            }

            #[inline]
            fn arena_id(self) -> $crate::runtime::arena::ArenaId {
                self.0
            }
        }
    };
}

pub(crate) use arena_index;

enum Entry<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32 },
}

pub struct Arena<I: ArenaIndex, T> {
    entries: Vec<Entry<T>>,
    free_list: Vec<u32>,
    len: usize,
    phantom: core::marker::PhantomData<I>,
}

impl<I: ArenaIndex, T> Arena<I, T> {
    pub fn new() -> Arena<I, T> {
        Arena {
            entries: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            phantom: core::marker::PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, value: T) -> I {
        self.len += 1;

        if let Some(index) = self.free_list.pop() {
            let entry = &mut self.entries[index as usize];
            let generation = match entry {
                Entry::Vacant { generation } => generation.wrapping_add(1),
                Entry::Occupied { .. } => unreachable!("free list entry is occupied"),
            };
            *entry = Entry::Occupied { generation, value };

            return I::from_arena_id(ArenaId { index, generation });
        }

        let index = self.entries.len() as u32;
        self.entries.push(Entry::Occupied { generation: 0, value });

        I::from_arena_id(ArenaId { index, generation: 0 })
    }

    pub fn get(&self, id: I) -> Option<&T> {
        let id = id.arena_id();
        match self.entries.get(id.index as usize) {
            Some(Entry::Occupied { generation, value }) if *generation == id.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        let id = id.arena_id();
        match self.entries.get_mut(id.index as usize) {
            Some(Entry::Occupied { generation, value }) if *generation == id.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        let id = id.arena_id();
        let entry = self.entries.get_mut(id.index as usize)?;
        match entry {
            Entry::Occupied { generation, .. } if *generation == id.generation => {}
            _ => return None,
        }

        let vacant = Entry::Vacant { generation: id.generation };
        let value = match core::mem::replace(entry, vacant) {
            Entry::Occupied { value, .. } => value,
            Entry::Vacant { .. } => unreachable!(),
        };

        self.free_list.push(id.index);
        self.len -= 1;

        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Entry::Occupied { generation, value } => Some((
                    I::from_arena_id(ArenaId { index: index as u32, generation: *generation }),
                    value,
                )),
                Entry::Vacant { .. } => None,
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> {
        self.entries
            .iter_mut()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Entry::Occupied { generation, value } => Some((
                    I::from_arena_id(ArenaId { index: index as u32, generation: *generation }),
                    value,
                )),
                Entry::Vacant { .. } => None,
            })
    }
}
