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

use ember_core::renderer::api::{BufferId, BufferUsage, BufferWriteType, IndexType};
use ember_core::renderer::error::ResourceError;
use ember_core::renderer::traits::HardwareBufferManager;
use ember_core::utils::lock_unpoisoned;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// What a buffer was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Vertex data.
    Vertex,
    /// Index data.
    Index,
    /// A block of GPU program parameters.
    ParamBlock,
}

#[derive(Debug)]
struct HeadlessBuffer {
    kind: BufferKind,
    usage: BufferUsage,
    bytes: Vec<u8>,
}

/// A [`HardwareBufferManager`] keeping every buffer in CPU memory.
#[derive(Debug, Default)]
pub struct HeadlessBufferManager {
    buffers: Mutex<HashMap<BufferId, HeadlessBuffer>>,
    next_id: AtomicUsize,
    writes: AtomicUsize,
}

impl HeadlessBufferManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers currently alive.
    pub fn live_buffers(&self) -> usize {
        lock_unpoisoned(&self.buffers).len()
    }

    /// Total size of the live buffers, in bytes.
    pub fn allocated_bytes(&self) -> u64 {
        lock_unpoisoned(&self.buffers)
            .values()
            .map(|buffer| buffer.bytes.len() as u64)
            .sum()
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// The kind and usage a buffer was created with.
    pub fn buffer_info(&self, buffer: BufferId) -> Option<(BufferKind, BufferUsage)> {
        lock_unpoisoned(&self.buffers)
            .get(&buffer)
            .map(|b| (b.kind, b.usage))
    }

    /// A copy of a buffer's contents.
    pub fn contents(&self, buffer: BufferId) -> Option<Vec<u8>> {
        lock_unpoisoned(&self.buffers)
            .get(&buffer)
            .map(|b| b.bytes.clone())
    }

    fn create(&self, kind: BufferKind, size: u64, usage: BufferUsage) -> Result<BufferId, ResourceError> {
        let size = usize::try_from(size)
            .map_err(|_| ResourceError::BackendError(format!("buffer of {size} bytes is too large")))?;
        let id = BufferId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock_unpoisoned(&self.buffers).insert(
            id,
            HeadlessBuffer {
                kind,
                usage,
                bytes: vec![0; size],
            },
        );
        log::trace!("Created {kind:?} buffer {id:?} of {size} bytes");
        Ok(id)
    }
}

fn check_range(offset: u64, len: usize, size: usize) -> Result<std::ops::Range<usize>, ResourceError> {
    let out_of_bounds = || ResourceError::OutOfBounds {
        offset,
        len: len as u64,
        size: size as u64,
    };
    let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
    let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
    if end > size {
        return Err(out_of_bounds());
    }
    Ok(start..end)
}

impl HardwareBufferManager for HeadlessBufferManager {
    fn create_vertex_buffer(
        &self,
        vertex_size: u32,
        num_vertices: u32,
        usage: BufferUsage,
    ) -> Result<BufferId, ResourceError> {
        self.create(
            BufferKind::Vertex,
            u64::from(vertex_size) * u64::from(num_vertices),
            usage,
        )
    }

    fn create_index_buffer(
        &self,
        index_type: IndexType,
        num_indices: u32,
        usage: BufferUsage,
    ) -> Result<BufferId, ResourceError> {
        self.create(
            BufferKind::Index,
            index_type.size() as u64 * u64::from(num_indices),
            usage,
        )
    }

    fn create_gpu_param_block_buffer(
        &self,
        size: u32,
        usage: BufferUsage,
    ) -> Result<BufferId, ResourceError> {
        self.create(BufferKind::ParamBlock, u64::from(size), usage)
    }

    fn write_buffer(
        &self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
        write_type: BufferWriteType,
    ) -> Result<(), ResourceError> {
        let mut buffers = lock_unpoisoned(&self.buffers);
        let target = buffers
            .get_mut(&buffer)
            .ok_or(ResourceError::BufferNotFound(buffer))?;
        let range = check_range(offset, data.len(), target.bytes.len())?;
        if write_type == BufferWriteType::Discard {
            target.bytes.fill(0);
        }
        target.bytes[range].copy_from_slice(data);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn read_buffer(
        &self,
        buffer: BufferId,
        offset: u64,
        out: &mut [u8],
    ) -> Result<(), ResourceError> {
        let buffers = lock_unpoisoned(&self.buffers);
        let source = buffers
            .get(&buffer)
            .ok_or(ResourceError::BufferNotFound(buffer))?;
        let range = check_range(offset, out.len(), source.bytes.len())?;
        out.copy_from_slice(&source.bytes[range]);
        Ok(())
    }

    fn buffer_size(&self, buffer: BufferId) -> Result<u64, ResourceError> {
        lock_unpoisoned(&self.buffers)
            .get(&buffer)
            .map(|b| b.bytes.len() as u64)
            .ok_or(ResourceError::BufferNotFound(buffer))
    }

    fn destroy_buffer(&self, buffer: BufferId) -> Result<(), ResourceError> {
        lock_unpoisoned(&self.buffers)
            .remove(&buffer)
            .map(|_| log::trace!("Destroyed buffer {buffer:?}"))
            .ok_or(ResourceError::BufferNotFound(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sizes() {
        let manager = HeadlessBufferManager::new();
        let vb = manager
            .create_vertex_buffer(12, 4, BufferUsage::Dynamic)
            .unwrap();
        let ib = manager
            .create_index_buffer(IndexType::U16, 6, BufferUsage::Static)
            .unwrap();

        assert_eq!(manager.buffer_size(vb).unwrap(), 48);
        assert_eq!(manager.buffer_size(ib).unwrap(), 12);
        assert_eq!(manager.allocated_bytes(), 60);
        assert_eq!(
            manager.buffer_info(ib),
            Some((BufferKind::Index, BufferUsage::Static))
        );
    }

    #[test]
    fn test_write_and_read() {
        let manager = HeadlessBufferManager::new();
        let buffer = manager
            .create_gpu_param_block_buffer(8, BufferUsage::Dynamic)
            .unwrap();
        manager
            .write_buffer(buffer, 2, &[7, 8], BufferWriteType::NoOverwrite)
            .unwrap();

        let mut out = [0u8; 4];
        manager.read_buffer(buffer, 0, &mut out).unwrap();
        assert_eq!(out, [0, 0, 7, 8]);
        assert_eq!(manager.write_count(), 1);
    }

    #[test]
    fn test_out_of_bounds_write() {
        let manager = HeadlessBufferManager::new();
        let buffer = manager
            .create_gpu_param_block_buffer(4, BufferUsage::Static)
            .unwrap();
        assert!(matches!(
            manager.write_buffer(buffer, 2, &[0; 4], BufferWriteType::Normal),
            Err(ResourceError::OutOfBounds {
                offset: 2,
                len: 4,
                size: 4
            })
        ));
    }

    #[test]
    fn test_destroy() {
        let manager = HeadlessBufferManager::new();
        let buffer = manager
            .create_gpu_param_block_buffer(4, BufferUsage::Static)
            .unwrap();
        manager.destroy_buffer(buffer).unwrap();
        assert_eq!(manager.live_buffers(), 0);
        assert!(matches!(
            manager.destroy_buffer(buffer),
            Err(ResourceError::BufferNotFound(_))
        ));
    }
}
