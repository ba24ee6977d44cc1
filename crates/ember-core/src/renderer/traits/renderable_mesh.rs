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

use crate::renderer::api::{BufferId, IndexType};
use crate::renderer::error::RenderError;
use std::fmt::Debug;

/// Where a mesh's data lives, resolved on the core thread right before drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshBinding {
    /// One buffer per vertex stream, bound from slot 0.
    pub vertex_buffers: Vec<BufferId>,
    /// The index buffer.
    pub index_buffer: BufferId,
    /// Element type of the index buffer.
    pub index_type: IndexType,
    /// First vertex of the mesh inside the vertex buffers.
    pub vertex_offset: u32,
    /// Number of vertices of the mesh.
    pub vertex_count: u32,
    /// First index of the mesh inside the index buffer.
    pub index_offset: u32,
    /// Number of indices of the mesh.
    pub index_count: u32,
}

/// A mesh the core thread can draw.
pub trait RenderableMesh: Send + Sync + Debug {
    /// Resolves the buffers and ranges to draw from.
    ///
    /// Called on the core thread, after every command queued before the draw has run.
    fn binding(&self) -> Result<MeshBinding, RenderError>;

    /// Called on the core thread right after a draw using this mesh was issued.
    fn notify_used_on_gpu(&self);
}
