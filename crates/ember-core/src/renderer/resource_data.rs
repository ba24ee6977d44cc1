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

//! CPU-side storage exchanged with subresource reads and writes.

use crate::renderer::error::ResourceError;
use crate::utils::lock_unpoisoned;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A block of bytes uploaded to, or read back from, a GPU subresource.
///
/// While a read or write referencing the data is queued for the core thread the
/// data is locked, and writes from the simulation side fail with
/// [`ResourceError::Locked`].
#[derive(Debug, Default)]
pub struct GpuResourceData {
    bytes: Mutex<Vec<u8>>,
    locks: AtomicU32,
}

impl GpuResourceData {
    /// Wraps an existing byte buffer.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(bytes),
            locks: AtomicU32::new(0),
        }
    }

    /// Creates `len` zeroed bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    /// Copies a slice of plain-old-data values.
    pub fn from_slice<T: bytemuck::Pod>(values: &[T]) -> Self {
        Self::new(bytemuck::cast_slice(values).to_vec())
    }

    /// Number of bytes currently stored.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.bytes).len()
    }

    /// Returns `true` if no bytes are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` while a queued core thread operation references the data.
    pub fn is_locked(&self) -> bool {
        self.locks.load(Ordering::Acquire) > 0
    }

    /// Overwrites `data.len()` bytes starting at `offset`.
    /// ## Errors
    /// * `ResourceError::Locked` - If a queued operation still references the data.
    /// * `ResourceError::OutOfBounds` - If the range exceeds the stored bytes.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<(), ResourceError> {
        if self.is_locked() {
            return Err(ResourceError::Locked);
        }
        let mut bytes = lock_unpoisoned(&self.bytes);
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= bytes.len())
            .ok_or(ResourceError::OutOfBounds {
                offset: offset as u64,
                len: data.len() as u64,
                size: bytes.len() as u64,
            })?;
        bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Copies the stored bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        lock_unpoisoned(&self.bytes).clone()
    }

    /// Reinterprets the stored bytes as `T` values, if the length is a multiple of `T`.
    pub fn to_pod_vec<T: bytemuck::Pod>(&self) -> Option<Vec<T>> {
        let bytes = lock_unpoisoned(&self.bytes);
        let size = std::mem::size_of::<T>();
        if size == 0 || bytes.len() % size != 0 {
            return None;
        }
        Some(
            bytes
                .chunks_exact(size)
                .map(bytemuck::pod_read_unaligned)
                .collect(),
        )
    }

    pub(crate) fn bytes(&self) -> MutexGuard<'_, Vec<u8>> {
        lock_unpoisoned(&self.bytes)
    }

    pub(crate) fn lock(self: &Arc<Self>) -> ResourceDataLock {
        self.locks.fetch_add(1, Ordering::AcqRel);
        ResourceDataLock {
            data: Arc::clone(self),
        }
    }
}

/// Keeps a [`GpuResourceData`] locked until dropped.
#[derive(Debug)]
pub struct ResourceDataLock {
    data: Arc<GpuResourceData>,
}

impl ResourceDataLock {
    /// The locked data.
    pub fn data(&self) -> &Arc<GpuResourceData> {
        &self.data
    }
}

impl Drop for ResourceDataLock {
    fn drop(&mut self) {
        self.data.locks.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_fails_while_locked() {
        let data = Arc::new(GpuResourceData::zeroed(8));
        let lock = data.lock();
        assert!(data.is_locked());
        assert!(matches!(data.write(0, &[1, 2]), Err(ResourceError::Locked)));

        drop(lock);
        assert!(!data.is_locked());
        data.write(2, &[1, 2]).unwrap();
        assert_eq!(data.to_vec(), vec![0, 0, 1, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn test_write_out_of_bounds() {
        let data = GpuResourceData::zeroed(4);
        let err = data.write(3, &[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::OutOfBounds {
                offset: 3,
                len: 2,
                size: 4
            }
        ));
    }

    #[test]
    fn test_pod_round_trip() {
        let data = GpuResourceData::from_slice(&[1u32, 2, 3]);
        assert_eq!(data.len(), 12);
        assert_eq!(data.to_pod_vec::<u32>(), Some(vec![1, 2, 3]));
        assert_eq!(data.to_pod_vec::<[u8; 5]>(), None);
    }
}
