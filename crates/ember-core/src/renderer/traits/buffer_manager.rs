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

use crate::renderer::api::{BufferId, BufferUsage, BufferWriteType, IndexType};
use crate::renderer::error::ResourceError;
use std::fmt::Debug;

/// Factory and updater for hardware buffers.
///
/// Creation may happen from any thread; writes and reads of buffers that are
/// bound for rendering are expected to run on the core thread.
pub trait HardwareBufferManager: Send + Sync + Debug + 'static {
    /// Creates a vertex buffer.
    /// ## Arguments
    /// * `vertex_size` - Size in bytes of a single vertex.
    /// * `num_vertices` - Number of vertices the buffer can hold.
    /// * `usage` - Expected update pattern.
    /// ## Returns
    /// The ID of the new buffer.
    /// ## Errors
    /// * `ResourceError` - If the backend fails to allocate the buffer.
    fn create_vertex_buffer(
        &self,
        vertex_size: u32,
        num_vertices: u32,
        usage: BufferUsage,
    ) -> Result<BufferId, ResourceError>;

    /// Creates an index buffer.
    /// ## Arguments
    /// * `index_type` - Element type of the buffer.
    /// * `num_indices` - Number of indices the buffer can hold.
    /// * `usage` - Expected update pattern.
    /// ## Returns
    /// The ID of the new buffer.
    fn create_index_buffer(
        &self,
        index_type: IndexType,
        num_indices: u32,
        usage: BufferUsage,
    ) -> Result<BufferId, ResourceError>;

    /// Creates a buffer holding a block of GPU program parameters.
    fn create_gpu_param_block_buffer(
        &self,
        size: u32,
        usage: BufferUsage,
    ) -> Result<BufferId, ResourceError>;

    /// Writes `data` at `offset` bytes into the buffer.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the range does not fit in the buffer.
    fn write_buffer(
        &self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
        write_type: BufferWriteType,
    ) -> Result<(), ResourceError>;

    /// Reads `out.len()` bytes starting at `offset`.
    fn read_buffer(&self, buffer: BufferId, offset: u64, out: &mut [u8])
        -> Result<(), ResourceError>;

    /// Size of the buffer in bytes.
    fn buffer_size(&self, buffer: BufferId) -> Result<u64, ResourceError>;

    /// Releases the buffer.
    fn destroy_buffer(&self, buffer: BufferId) -> Result<(), ResourceError>;
}
