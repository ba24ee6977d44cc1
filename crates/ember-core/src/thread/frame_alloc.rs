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

//! Per-frame scratch memory handed from the simulation side to the core thread.

use crate::thread::error::CoreThreadError;
use crate::utils::lock_unpoisoned;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Upper bound on recycled buffers kept per allocator.
const MAX_RECYCLED_BUFFERS: usize = 64;

#[derive(Debug)]
struct FramePool {
    buffers: Mutex<Vec<Vec<u8>>>,
    live: AtomicUsize,
    frame: AtomicU64,
    bytes_this_frame: AtomicUsize,
}

/// A scratch allocator whose allocations must all be released before it is
/// cleared for the next frame.
///
/// The core thread keeps two of them and alternates between frames, so data
/// allocated during frame `N` stays valid while the core thread consumes it
/// during frame `N + 1`.
pub struct FrameAlloc {
    pool: Arc<FramePool>,
}

impl FrameAlloc {
    /// Creates an allocator with `capacity` bytes reserved up front.
    pub fn new(capacity: usize) -> Self {
        let buffers = if capacity > 0 {
            vec![Vec::with_capacity(capacity)]
        } else {
            Vec::new()
        };
        Self {
            pool: Arc::new(FramePool {
                buffers: Mutex::new(buffers),
                live: AtomicUsize::new(0),
                frame: AtomicU64::new(0),
                bytes_this_frame: AtomicUsize::new(0),
            }),
        }
    }

    /// Allocates `len` zeroed bytes.
    pub fn alloc(&self, len: usize) -> FrameBytes {
        let mut bytes = {
            let mut buffers = lock_unpoisoned(&self.pool.buffers);
            // Prefer a recycled buffer that is already large enough.
            match buffers.iter().position(|buffer| buffer.capacity() >= len) {
                Some(index) => buffers.swap_remove(index),
                None => buffers.pop().unwrap_or_default(),
            }
        };
        bytes.clear();
        bytes.resize(len, 0);

        self.pool.live.fetch_add(1, Ordering::AcqRel);
        self.pool.bytes_this_frame.fetch_add(len, Ordering::Relaxed);
        FrameBytes {
            bytes,
            pool: Arc::clone(&self.pool),
        }
    }

    /// Allocates a copy of `data`.
    pub fn alloc_copy(&self, data: &[u8]) -> FrameBytes {
        let mut bytes = self.alloc(data.len());
        bytes.copy_from_slice(data);
        bytes
    }

    /// Allocates a copy of a slice of plain-old-data values.
    pub fn alloc_pod<T: bytemuck::Pod>(&self, values: &[T]) -> FrameBytes {
        self.alloc_copy(bytemuck::cast_slice(values))
    }

    /// Number of allocations not yet dropped.
    pub fn live_allocations(&self) -> usize {
        self.pool.live.load(Ordering::Acquire)
    }

    /// Bytes handed out since the last [`FrameAlloc::clear`].
    pub fn bytes_allocated(&self) -> usize {
        self.pool.bytes_this_frame.load(Ordering::Relaxed)
    }

    /// Number of times the allocator was cleared.
    pub fn frame(&self) -> u64 {
        self.pool.frame.load(Ordering::Acquire)
    }

    /// Starts a new frame.
    /// ## Errors
    /// * `CoreThreadError::FrameAllocInUse` - If allocations of the previous frame are still alive.
    pub fn clear(&self) -> Result<(), CoreThreadError> {
        let live = self.live_allocations();
        if live > 0 {
            return Err(CoreThreadError::FrameAllocInUse { live });
        }
        self.pool.bytes_this_frame.store(0, Ordering::Relaxed);
        self.pool.frame.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

impl fmt::Debug for FrameAlloc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameAlloc")
            .field("frame", &self.frame())
            .field("live", &self.live_allocations())
            .field("bytes", &self.bytes_allocated())
            .finish()
    }
}

/// Bytes allocated from a [`FrameAlloc`]; returned to it when dropped.
pub struct FrameBytes {
    bytes: Vec<u8>,
    pool: Arc<FramePool>,
}

impl Deref for FrameBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for FrameBytes {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for FrameBytes {
    fn drop(&mut self) {
        let bytes = std::mem::take(&mut self.bytes);
        {
            let mut buffers = lock_unpoisoned(&self.pool.buffers);
            if buffers.len() < MAX_RECYCLED_BUFFERS {
                buffers.push(bytes);
            }
        }
        self.pool.live.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for FrameBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBytes")
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_requires_released_allocations() {
        let alloc = FrameAlloc::new(64);
        let data = alloc.alloc_pod(&[1.0f32, 2.0]);
        assert_eq!(data.len(), 8);
        assert_eq!(alloc.live_allocations(), 1);

        assert!(matches!(
            alloc.clear(),
            Err(CoreThreadError::FrameAllocInUse { live: 1 })
        ));

        drop(data);
        alloc.clear().unwrap();
        assert_eq!(alloc.frame(), 1);
        assert_eq!(alloc.bytes_allocated(), 0);
    }

    #[test]
    fn test_allocations_are_zeroed_after_reuse() {
        let alloc = FrameAlloc::new(0);
        let mut first = alloc.alloc(4);
        first.copy_from_slice(&[9, 9, 9, 9]);
        drop(first);

        let second = alloc.alloc(6);
        assert_eq!(&*second, &[0; 6]);
    }

    #[test]
    fn test_bytes_can_cross_threads() {
        let alloc = FrameAlloc::new(16);
        let bytes = alloc.alloc_copy(b"frame");
        let len = std::thread::spawn(move || bytes.len()).join().unwrap();
        assert_eq!(len, 5);
        assert_eq!(alloc.live_allocations(), 0);
    }
}
