// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A generational arena with stable indices.

/// Handle to a value stored in a [`SlotArena`].
///
/// Combines a slot index with the generation of the slot at insertion time.
/// Once the value is removed and the slot recycled, the generation moves on and
/// the old key stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    /// Index of the slot.
    pub index: u32,
    /// Generation of the slot when the key was handed out.
    pub generation: u32,
}

/// Dense storage where removed slots are recycled through a free list.
///
/// Indices never move, so keys stay valid for as long as their value lives.
#[derive(Debug, Clone)]
pub struct SlotArena<T> {
    slots: Vec<(SlotKey, Option<T>)>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotArena<T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value`, reusing a free slot if there is one.
    pub fn insert(&mut self, value: T) -> SlotKey {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let (key, slot) = &mut self.slots[index as usize];
            key.generation = key.generation.wrapping_add(1);
            *slot = Some(value);
            *key
        } else {
            let key = SlotKey {
                index: self.slots.len() as u32,
                generation: 0,
            };
            self.slots.push((key, Some(value)));
            key
        }
    }

    /// Removes and returns the value behind `key`, or `None` if the key is stale.
    pub fn remove(&mut self, key: SlotKey) -> Option<T> {
        let (slot_key, slot) = self.slots.get_mut(key.index as usize)?;
        if *slot_key != key {
            return None;
        }
        let value = slot.take()?;
        self.free.push(key.index);
        self.len -= 1;
        Some(value)
    }

    /// The value behind `key`.
    pub fn get(&self, key: SlotKey) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .and_then(|(slot_key, slot)| if *slot_key == key { slot.as_ref() } else { None })
    }

    /// The value behind `key`, mutably.
    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .and_then(|(slot_key, slot)| if *slot_key == key { slot.as_mut() } else { None })
    }

    /// Returns `true` if `key` resolves to a live value.
    pub fn contains(&self, key: SlotKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no value is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever created, live or free.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Iterates over live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &T)> + '_ {
        self.slots
            .iter()
            .filter_map(|(key, slot)| slot.as_ref().map(|value| (*key, value)))
    }

    /// Removes every value. Slots are kept and recycled, so old keys stay stale.
    pub fn clear(&mut self) {
        for (index, (_, slot)) in self.slots.iter_mut().enumerate() {
            if slot.take().is_some() {
                self.free.push(index as u32);
            }
        }
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recycled_slot_invalidates_old_key() {
        let mut arena = SlotArena::new();
        let a = arena.insert("a");
        assert_eq!(arena.remove(a), Some("a"));

        let b = arena.insert("b");
        assert_eq!(b.index, a.index);
        assert_ne!(b.generation, a.generation);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.slot_count(), 1);
    }

    #[test]
    fn test_clear_keeps_slots() {
        let mut arena = SlotArena::new();
        let keys: Vec<_> = (0..4).map(|i| arena.insert(i)).collect();
        arena.clear();
        assert!(arena.is_empty());
        assert!(keys.iter().all(|key| !arena.contains(*key)));

        arena.insert(10);
        assert_eq!(arena.slot_count(), 4);
        assert_eq!(arena.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![10]);
    }
}
