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

use crate::mesh::heap::{HeapShared, MeshId};
use crate::mesh::MeshHeapError;
use ember_core::renderer::api::DrawOperation;
use ember_core::renderer::error::{RenderError, ResourceError};
use ember_core::renderer::traits::{MeshBinding, RenderableMesh};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// A mesh whose data lives inside a [`MeshHeap`](crate::MeshHeap).
///
/// Handed out by `MeshHeap::alloc` and released with `MeshHeap::dealloc`. The
/// mesh does not own its chunks: dropping it without releasing it keeps them
/// reserved until the heap itself is destroyed.
pub struct TransientMesh {
    id: MeshId,
    heap: Weak<HeapShared>,
    num_vertices: u32,
    num_indices: u32,
    draw_op: DrawOperation,
    destroyed: AtomicBool,
}

impl TransientMesh {
    pub(crate) fn new(
        id: MeshId,
        heap: Weak<HeapShared>,
        num_vertices: u32,
        num_indices: u32,
        draw_op: DrawOperation,
    ) -> Self {
        Self {
            id,
            heap,
            num_vertices,
            num_indices,
            draw_op,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Id of the mesh inside its heap.
    pub fn id(&self) -> MeshId {
        self.id
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> u32 {
        self.num_vertices
    }

    /// Number of indices.
    pub fn num_indices(&self) -> u32 {
        self.num_indices
    }

    /// Primitive topology used to draw the mesh.
    pub fn draw_operation(&self) -> DrawOperation {
        self.draw_op
    }

    /// Returns `true` once the mesh was released.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Transient meshes are immutable once allocated.
    pub fn write_data(&self, _data: &[u8]) -> Result<(), MeshHeapError> {
        Err(MeshHeapError::Unsupported("writing to a transient mesh"))
    }

    /// Transient meshes keep no readable CPU copy outside their heap.
    pub fn read_data(&self, _out: &mut [u8]) -> Result<(), MeshHeapError> {
        Err(MeshHeapError::Unsupported("reading from a transient mesh"))
    }

    pub(crate) fn belongs_to(&self, heap: &Arc<HeapShared>) -> bool {
        std::ptr::eq(self.heap.as_ptr(), Arc::as_ptr(heap))
    }

    /// Flags the mesh as released. Returns `false` if it already was.
    pub(crate) fn mark_destroyed(&self) -> bool {
        !self.destroyed.swap(true, Ordering::AcqRel)
    }

    fn heap(&self) -> Result<Arc<HeapShared>, ResourceError> {
        self.heap.upgrade().ok_or(ResourceError::InvalidHandle)
    }
}

impl RenderableMesh for TransientMesh {
    fn binding(&self) -> Result<MeshBinding, RenderError> {
        self.heap()?.binding(self.id)
    }

    fn notify_used_on_gpu(&self) {
        match self.heap() {
            Ok(heap) => heap.notify_used_on_gpu(self.id),
            Err(_) => log::warn!("Mesh {:?} drawn after its heap was destroyed", self.id),
        }
    }
}

impl fmt::Debug for TransientMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientMesh")
            .field("id", &self.id)
            .field("num_vertices", &self.num_vertices)
            .field("num_indices", &self.num_indices)
            .field("draw_op", &self.draw_op)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
