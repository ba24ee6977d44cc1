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

//! Sub-ranges of a shared buffer, tracked in elements.

use crate::allocators::{SlotArena, SlotKey};
use crate::mesh::MeshHeapError;

/// A contiguous range of elements inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// First element.
    pub start: u32,
    /// Number of elements.
    pub size: u32,
}

impl Chunk {
    /// One past the last element.
    pub fn end(&self) -> u32 {
        self.start + self.size
    }
}

/// Every chunk of one buffer, used and free.
///
/// Chunks live in a [`SlotArena`] so that the keys held by allocations stay
/// valid while other chunks are split and merged around them.
#[derive(Debug, Default)]
pub struct ChunkList {
    chunks: SlotArena<Chunk>,
    free: Vec<SlotKey>,
    capacity: u32,
}

impl ChunkList {
    /// Creates a list covering `capacity` elements with a single free chunk.
    pub fn new(capacity: u32) -> Self {
        let mut list = Self::default();
        list.rebuild(capacity, std::iter::empty());
        list
    }

    /// Number of elements the buffer holds.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// The chunk behind `key`.
    pub fn get(&self, key: SlotKey) -> Option<Chunk> {
        self.chunks.get(key).copied()
    }

    /// Total size of the free chunks.
    pub fn free_elements(&self) -> u32 {
        self.free_chunks().map(|chunk| chunk.size).sum()
    }

    /// Free chunks in free-list order.
    pub fn free_chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        self.free.iter().filter_map(|key| self.get(*key))
    }

    /// Every chunk with whether it is free, in slot order.
    pub fn chunks(&self) -> impl Iterator<Item = (Chunk, bool)> + '_ {
        self.chunks
            .iter()
            .map(|(key, chunk)| (*chunk, self.free.contains(&key)))
    }

    /// Position in the free list of the smallest free chunk holding `size`
    /// elements. Ties go to the first one found.
    fn best_fit(&self, size: u32) -> Option<usize> {
        let mut best: Option<(usize, u32)> = None;
        for (position, key) in self.free.iter().enumerate() {
            let Some(chunk) = self.chunks.get(*key) else {
                continue;
            };
            if chunk.size < size {
                continue;
            }
            if best.map_or(true, |(_, best_size)| chunk.size < best_size) {
                best = Some((position, chunk.size));
            }
        }
        best.map(|(position, _)| position)
    }

    /// Reserves exactly `size` elements out of the best-fitting free chunk.
    ///
    /// The leftover of the chunk stays free. Returns `None` if no free chunk is
    /// large enough.
    pub fn reserve(&mut self, size: u32) -> Option<SlotKey> {
        if size == 0 {
            return Some(self.chunks.insert(Chunk { start: 0, size: 0 }));
        }

        let position = self.best_fit(size)?;
        let key = self.free.remove(position);
        let chunk = self.chunks.get_mut(key)?;
        let leftover = Chunk {
            start: chunk.start + size,
            size: chunk.size - size,
        };
        chunk.size = size;

        if leftover.size > 0 {
            let leftover_key = self.chunks.insert(leftover);
            self.free.push(leftover_key);
        }
        Some(key)
    }

    /// Returns a used chunk to the free list, merging it with the free chunks
    /// directly before and after it.
    ///
    /// ## Errors
    /// * `MeshHeapError::StaleChunk` - If `key` no longer resolves.
    pub fn release(&mut self, key: SlotKey) -> Result<(), MeshHeapError> {
        let mut freed = self
            .get(key)
            .ok_or(MeshHeapError::StaleChunk { index: key.index })?;
        if freed.size == 0 {
            self.chunks.remove(key);
            return Ok(());
        }

        // One pass: free chunks never overlap, so only the two direct
        // neighbours can touch the released range.
        let mut absorbed = Vec::new();
        for candidate_key in &self.free {
            let Some(candidate) = self.chunks.get(*candidate_key) else {
                continue;
            };
            if candidate.start == freed.end() {
                freed.size += candidate.size;
                absorbed.push(*candidate_key);
            } else if candidate.end() == freed.start {
                freed.start = candidate.start;
                freed.size += candidate.size;
                absorbed.push(*candidate_key);
            }
        }
        for absorbed_key in absorbed {
            self.chunks.remove(absorbed_key);
            self.free.retain(|k| *k != absorbed_key);
        }

        if let Some(chunk) = self.chunks.get_mut(key) {
            *chunk = freed;
        }
        self.free.push(key);
        Ok(())
    }

    /// Discards every chunk and packs `sizes` contiguously from element 0, followed
    /// by one free chunk for the rest of `capacity`.
    ///
    /// Returns the keys of the packed chunks, in the order of `sizes`.
    pub fn rebuild(&mut self, capacity: u32, sizes: impl IntoIterator<Item = u32>) -> Vec<SlotKey> {
        self.chunks.clear();
        self.free.clear();
        self.capacity = capacity;

        let mut cursor = 0u32;
        let keys = sizes
            .into_iter()
            .map(|size| {
                let key = self.chunks.insert(Chunk {
                    start: cursor,
                    size,
                });
                cursor += size;
                key
            })
            .collect();

        if cursor < capacity {
            let key = self.chunks.insert(Chunk {
                start: cursor,
                size: capacity - cursor,
            });
            self.free.push(key);
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers_capacity(list: &ChunkList) {
        let mut chunks: Vec<_> = list.chunks().map(|(chunk, _)| chunk).collect();
        chunks.sort_by_key(|chunk| chunk.start);
        let mut cursor = 0;
        for chunk in chunks.iter().filter(|chunk| chunk.size > 0) {
            assert_eq!(chunk.start, cursor, "gap or overlap in {chunks:?}");
            cursor = chunk.end();
        }
        assert_eq!(cursor, list.capacity());
    }

    #[test]
    fn test_reserve_splits_exactly() {
        let mut list = ChunkList::new(100);
        let a = list.reserve(30).unwrap();
        assert_eq!(list.get(a), Some(Chunk { start: 0, size: 30 }));
        assert_eq!(list.free_elements(), 70);
        assert_covers_capacity(&list);
    }

    #[test]
    fn test_best_fit_prefers_smallest_then_first() {
        let mut list = ChunkList::new(100);
        let a = list.reserve(10).unwrap();
        let _b = list.reserve(10).unwrap();
        let c = list.reserve(20).unwrap();
        let _d = list.reserve(10).unwrap();
        let e = list.reserve(10).unwrap();
        // Free: [60, 100) of 40.
        list.release(a).unwrap();
        list.release(c).unwrap();
        list.release(e).unwrap();
        // Free list now holds a (10), c (20), and e merged with the tail (50).

        let f = list.reserve(10).unwrap();
        assert_eq!(list.get(f), Some(Chunk { start: 0, size: 10 }));
        let g = list.reserve(15).unwrap();
        assert_eq!(list.get(g), Some(Chunk { start: 20, size: 15 }));
        assert_covers_capacity(&list);
    }

    #[test]
    fn test_release_merges_both_neighbours() {
        let mut list = ChunkList::new(30);
        let a = list.reserve(10).unwrap();
        let b = list.reserve(10).unwrap();
        let c = list.reserve(10).unwrap();
        list.release(a).unwrap();
        list.release(c).unwrap();
        list.release(b).unwrap();

        let free: Vec<_> = list.free_chunks().collect();
        assert_eq!(free, vec![Chunk { start: 0, size: 30 }]);
        let whole = list.reserve(30).unwrap();
        assert_eq!(list.get(whole), Some(Chunk { start: 0, size: 30 }));
    }

    #[test]
    fn test_release_stale_key() {
        let mut list = ChunkList::new(10);
        let a = list.reserve(5).unwrap();
        list.release(a).unwrap();
        assert!(matches!(
            list.release(a),
            Err(MeshHeapError::StaleChunk { .. })
        ));
    }

    #[test]
    fn test_reserve_fails_when_fragmented() {
        let mut list = ChunkList::new(30);
        let a = list.reserve(10).unwrap();
        let _b = list.reserve(10).unwrap();
        list.release(a).unwrap();
        // 20 elements free, but not contiguous.
        assert_eq!(list.free_elements(), 20);
        assert!(list.reserve(15).is_none());
    }

    #[test]
    fn test_rebuild_packs_and_appends_tail() {
        let mut list = ChunkList::new(10);
        let keys = list.rebuild(20, [4, 6]);
        assert_eq!(list.get(keys[0]), Some(Chunk { start: 0, size: 4 }));
        assert_eq!(list.get(keys[1]), Some(Chunk { start: 4, size: 6 }));
        assert_eq!(
            list.free_chunks().collect::<Vec<_>>(),
            vec![Chunk { start: 10, size: 10 }]
        );
        assert_covers_capacity(&list);
    }
}
