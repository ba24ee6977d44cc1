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

//! Shared vertex and index buffers that serve many short-lived meshes.
//!
//! A [`MeshHeap`] hands out [`TransientMesh`]es whose data lives in chunks of two
//! GPU buffers owned by a [`MeshHeapCore`]. All chunk bookkeeping happens on the
//! core thread. A freed chunk is only reused once an event query confirms the GPU
//! has finished every draw that referenced it.

use crate::allocators::SlotKey;
use crate::mesh::chunks::{Chunk, ChunkList};
use crate::mesh::data::{MeshData, VertexLayout};
use crate::mesh::transient::TransientMesh;
use crate::mesh::MeshHeapError;
use ember_core::object::{CoreObject, CoreObjectBase, CoreObjectPtr};
use ember_core::renderer::api::{BufferId, BufferUsage, BufferWriteType, DrawOperation, IndexType};
use ember_core::renderer::error::{RenderError, ResourceError};
use ember_core::renderer::query::{EventQueryId, EventQueryManager};
use ember_core::renderer::traits::{HardwareBufferManager, MeshBinding};
use ember_core::utils::lock_unpoisoned;
use ember_core::CoreContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Id of a mesh allocated from a [`MeshHeap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// Describes a mesh heap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshHeapDesc {
    /// Layout every mesh of the heap must use.
    pub vertex_layout: VertexLayout,
    /// Vertices the vertex buffer holds before it first grows.
    pub initial_vertices: u32,
    /// Indices the index buffer holds before it first grows.
    pub initial_indices: u32,
    /// Index type every mesh of the heap must use.
    pub index_type: IndexType,
}

impl Default for MeshHeapDesc {
    fn default() -> Self {
        Self {
            vertex_layout: VertexLayout::default(),
            initial_vertices: 1024,
            initial_indices: 3072,
            index_type: IndexType::U32,
        }
    }
}

/// Whether the CPU and the GPU still need an allocation's chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseFlags {
    /// Drawn by the GPU and still owned by the CPU.
    Used,
    /// Released by the CPU, but a draw may still be in flight.
    CpuFree,
    /// Owned by the CPU, no draw in flight.
    GpuFree,
    /// Released. Its chunks can be reused.
    Free,
}

/// A chunk of each buffer, as seen by [`MeshHeapCore::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationSnapshot {
    /// The mesh.
    pub id: MeshId,
    /// Its vertex range, in vertices.
    pub vertices: Chunk,
    /// Its index range, in indices.
    pub indices: Chunk,
    /// Its state.
    pub use_flags: UseFlags,
}

/// A copy of the heap's bookkeeping, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapSnapshot {
    /// Vertices the vertex buffer holds.
    pub vertex_capacity: u32,
    /// Indices the index buffer holds.
    pub index_capacity: u32,
    /// Every vertex chunk and whether it is free.
    pub vertex_chunks: Vec<(Chunk, bool)>,
    /// Every index chunk and whether it is free.
    pub index_chunks: Vec<(Chunk, bool)>,
    /// Live allocations, by id.
    pub allocations: Vec<AllocationSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Vertex,
    Index,
}

#[derive(Debug)]
struct Allocation {
    vertex_chunk: SlotKey,
    index_chunk: SlotKey,
    num_vertices: u32,
    num_indices: u32,
    use_flags: UseFlags,
    query: EventQueryId,
    query_id: u32,
}

impl Allocation {
    fn chunk(&self, stream: Stream) -> SlotKey {
        match stream {
            Stream::Vertex => self.vertex_chunk,
            Stream::Index => self.index_chunk,
        }
    }

    fn chunk_mut(&mut self, stream: Stream) -> &mut SlotKey {
        match stream {
            Stream::Vertex => &mut self.vertex_chunk,
            Stream::Index => &mut self.index_chunk,
        }
    }

    fn count(&self, stream: Stream) -> u32 {
        match stream {
            Stream::Vertex => self.num_vertices,
            Stream::Index => self.num_indices,
        }
    }
}

/// One GPU buffer, its chunks and its CPU shadow copy.
#[derive(Debug, Default)]
struct StreamBuffer {
    buffer: Option<BufferId>,
    chunks: ChunkList,
    shadow: Vec<u8>,
    element_size: u32,
}

impl StreamBuffer {
    fn byte_range(&self, chunk: Chunk) -> std::ops::Range<usize> {
        let element = self.element_size as usize;
        chunk.start as usize * element..chunk.end() as usize * element
    }
}

#[derive(Debug, Default)]
struct HeapState {
    vertices: StreamBuffer,
    indices: StreamBuffer,
    // Ordered so growth repacks allocations by id.
    allocations: BTreeMap<MeshId, Allocation>,
    free_queries: Vec<EventQueryId>,
    next_query_id: u32,
}

impl HeapState {
    fn stream(&self, stream: Stream) -> &StreamBuffer {
        match stream {
            Stream::Vertex => &self.vertices,
            Stream::Index => &self.indices,
        }
    }

    fn split_mut(&mut self, stream: Stream) -> (&mut StreamBuffer, &mut BTreeMap<MeshId, Allocation>) {
        match stream {
            Stream::Vertex => (&mut self.vertices, &mut self.allocations),
            Stream::Index => (&mut self.indices, &mut self.allocations),
        }
    }

    fn chunk_of(&self, stream: Stream, allocation: &Allocation) -> Result<Chunk, MeshHeapError> {
        let key = allocation.chunk(stream);
        self.stream(stream)
            .chunks
            .get(key)
            .ok_or(MeshHeapError::StaleChunk { index: key.index })
    }
}

/// Capacity reached by growing `current` by half, repeatedly, until it holds
/// `requested` more elements.
fn grown_capacity(current: u32, requested: u32) -> Result<u32, MeshHeapError> {
    let needed = u64::from(current) + u64::from(requested);
    let mut capacity = u64::from(current);
    while capacity < needed {
        capacity = ((capacity * 3 + 1) / 2).max(capacity + 1);
    }
    u32::try_from(capacity).map_err(|_| MeshHeapError::CapacityOverflow { requested: needed })
}

/// Everything the heap's meshes and query callbacks need, shared with them.
#[derive(Debug)]
pub(crate) struct HeapShared {
    layout: VertexLayout,
    index_type: IndexType,
    buffers: Arc<dyn HardwareBufferManager>,
    queries: Arc<EventQueryManager>,
    state: Mutex<HeapState>,
}

impl HeapShared {
    fn state(&self) -> MutexGuard<'_, HeapState> {
        lock_unpoisoned(&self.state)
    }

    fn create_buffer(&self, stream: Stream, capacity: u32) -> Result<BufferId, ResourceError> {
        match stream {
            Stream::Vertex => {
                self.buffers
                    .create_vertex_buffer(self.layout.stride(), capacity, BufferUsage::Dynamic)
            }
            Stream::Index => {
                self.buffers
                    .create_index_buffer(self.index_type, capacity, BufferUsage::Dynamic)
            }
        }
    }

    /// Draw parameters of a mesh.
    pub(crate) fn binding(&self, id: MeshId) -> Result<MeshBinding, RenderError> {
        let state = self.state();
        let allocation = state
            .allocations
            .get(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        let (Some(vertex_buffer), Some(index_buffer)) =
            (state.vertices.buffer, state.indices.buffer)
        else {
            return Err(ResourceError::InvalidHandle.into());
        };
        let vertices = state.chunk_of(Stream::Vertex, allocation)?;
        let indices = state.chunk_of(Stream::Index, allocation)?;

        Ok(MeshBinding {
            vertex_buffers: vec![vertex_buffer],
            index_buffer,
            index_type: self.index_type,
            vertex_offset: vertices.start,
            vertex_count: allocation.num_vertices,
            index_offset: indices.start,
            index_count: allocation.num_indices,
        })
    }

    /// Marks a mesh as read by the GPU and (re)starts its event query.
    pub(crate) fn notify_used_on_gpu(self: &Arc<Self>, id: MeshId) {
        let mut state = self.state();
        state.next_query_id = state.next_query_id.wrapping_add(1);
        let query_id = state.next_query_id;

        let Some(allocation) = state.allocations.get_mut(&id) else {
            log::warn!("Mesh {id:?} drawn after it was freed");
            return;
        };
        if allocation.use_flags == UseFlags::GpuFree {
            allocation.use_flags = UseFlags::Used;
        }
        allocation.query_id = query_id;
        let query = allocation.query;

        let heap = Arc::downgrade(self);
        let armed = self.queries.begin(query, move || {
            if let Some(heap) = heap.upgrade() {
                heap.query_triggered(id, query_id);
            }
        });
        if let Err(err) = armed {
            log::error!("Failed to begin the event query of mesh {id:?}: {err}");
        }
    }

    /// Called once the GPU passed the query begun for `query_id`.
    pub(crate) fn query_triggered(&self, id: MeshId, query_id: u32) {
        let mut guard = self.state();
        let state = &mut *guard;
        let Some(allocation) = state.allocations.get_mut(&id) else {
            return;
        };
        // Superseded by a later draw.
        if allocation.query_id != query_id {
            return;
        }

        let use_flags = allocation.use_flags;
        match use_flags {
            UseFlags::CpuFree => {
                if let Err(err) = self.release(state, id) {
                    log::error!("Failed to release mesh {id:?}: {err}");
                }
            }
            UseFlags::Used => allocation.use_flags = UseFlags::GpuFree,
            UseFlags::GpuFree | UseFlags::Free => {}
        }
    }

    /// Removes an allocation and returns its chunks and query to the heap.
    fn release(&self, state: &mut HeapState, id: MeshId) -> Result<(), MeshHeapError> {
        let mut allocation = state
            .allocations
            .remove(&id)
            .ok_or(MeshHeapError::UnknownAllocation(id))?;
        allocation.use_flags = UseFlags::Free;

        self.queries.clear(allocation.query);
        state.free_queries.push(allocation.query);

        state.vertices.chunks.release(allocation.vertex_chunk)?;
        state.indices.chunks.release(allocation.index_chunk)?;
        log::trace!(
            "Released mesh {id:?} ({} vertices, {} indices)",
            allocation.num_vertices,
            allocation.num_indices
        );
        Ok(())
    }

    /// Reserves `count` elements, growing the buffer until they fit.
    fn reserve(&self, state: &mut HeapState, stream: Stream, count: u32) -> Result<SlotKey, MeshHeapError> {
        loop {
            let (buffer, _) = state.split_mut(stream);
            if let Some(key) = buffer.chunks.reserve(count) {
                return Ok(key);
            }
            let capacity = grown_capacity(buffer.chunks.capacity(), count)?;
            self.grow(state, stream, capacity)?;
        }
    }

    /// Moves a stream into a new buffer of `capacity` elements.
    ///
    /// Live allocations are packed from element 0 in id order, their data copied
    /// from the shadow, and the rest of the buffer becomes one free chunk.
    fn grow(&self, state: &mut HeapState, stream: Stream, capacity: u32) -> Result<(), MeshHeapError> {
        let live: Vec<(MeshId, Chunk)> = state
            .allocations
            .iter()
            .map(|(id, allocation)| {
                state
                    .chunk_of(stream, allocation)
                    .map(|chunk| (*id, chunk))
            })
            .collect::<Result<_, _>>()?;

        let old = state.stream(stream);
        let mut shadow = vec![0u8; capacity as usize * old.element_size as usize];
        let mut cursor = 0;
        for (_, chunk) in &live {
            let bytes = &old.shadow[old.byte_range(*chunk)];
            shadow[cursor..cursor + bytes.len()].copy_from_slice(bytes);
            cursor += bytes.len();
        }

        let new_buffer = self.create_buffer(stream, capacity)?;
        if cursor > 0 {
            if let Err(err) =
                self.buffers
                    .write_buffer(new_buffer, 0, &shadow[..cursor], BufferWriteType::Discard)
            {
                let _ = self.buffers.destroy_buffer(new_buffer);
                return Err(err.into());
            }
        }

        let (buffer, allocations) = state.split_mut(stream);
        let old_capacity = buffer.chunks.capacity();
        let keys = buffer
            .chunks
            .rebuild(capacity, live.iter().map(|(_, chunk)| chunk.size));
        for ((id, _), key) in live.iter().zip(keys) {
            if let Some(allocation) = allocations.get_mut(id) {
                *allocation.chunk_mut(stream) = key;
            }
        }
        buffer.shadow = shadow;
        if let Some(old_buffer) = buffer.buffer.replace(new_buffer) {
            if let Err(err) = self.buffers.destroy_buffer(old_buffer) {
                log::warn!("Failed to destroy the old {stream:?} buffer {old_buffer:?}: {err}");
            }
        }

        log::debug!("Mesh heap {stream:?} buffer grown from {old_capacity} to {capacity} elements");
        Ok(())
    }

    /// Copies `data` into a stream's shadow at `key` and uploads it.
    fn upload(&self, state: &mut HeapState, stream: Stream, key: SlotKey, data: &[u8]) -> Result<(), MeshHeapError> {
        if data.is_empty() {
            return Ok(());
        }
        let (buffer, _) = state.split_mut(stream);
        let chunk = buffer
            .chunks
            .get(key)
            .ok_or(MeshHeapError::StaleChunk { index: key.index })?;
        let range = buffer.byte_range(chunk);
        buffer.shadow[range.clone()].copy_from_slice(data);

        let target = buffer.buffer.ok_or(ResourceError::InvalidHandle)?;
        self.buffers.write_buffer(
            target,
            range.start as u64,
            &buffer.shadow[range],
            BufferWriteType::NoOverwrite,
        )?;
        Ok(())
    }
}

/// The core-thread half of a mesh heap: the buffers and their bookkeeping.
///
/// Owned through the [`CoreObjectPtr`] of a [`MeshHeap`]. The `*_internal`
/// operations must run on the core thread.
#[derive(Debug)]
pub struct MeshHeapCore {
    base: CoreObjectBase,
    shared: Arc<HeapShared>,
    initial_vertices: u32,
    initial_indices: u32,
}

impl MeshHeapCore {
    /// Creates an uninitialized heap core.
    pub fn new(context: &CoreContext, desc: MeshHeapDesc) -> Self {
        let state = HeapState {
            vertices: StreamBuffer {
                element_size: desc.vertex_layout.stride(),
                ..Default::default()
            },
            indices: StreamBuffer {
                element_size: desc.index_type.size(),
                ..Default::default()
            },
            ..Default::default()
        };
        Self {
            base: CoreObjectBase::new::<Self>(context, true),
            shared: Arc::new(HeapShared {
                layout: desc.vertex_layout,
                index_type: desc.index_type,
                buffers: Arc::clone(context.buffers()),
                queries: Arc::clone(context.queries()),
                state: Mutex::new(state),
            }),
            initial_vertices: desc.initial_vertices,
            initial_indices: desc.initial_indices,
        }
    }

    pub(crate) fn heap(&self) -> &Arc<HeapShared> {
        &self.shared
    }

    /// Reserves chunks for a mesh and uploads its data.
    ///
    /// Grows either buffer if no free chunk is large enough.
    /// ## Errors
    /// * `MeshHeapError::CoreThread` - If thread checks are on and this is not the core thread.
    /// * `MeshHeapError::Resource` - If the backend rejected an upload or a new buffer.
    pub fn alloc_internal(&self, id: MeshId, data: &MeshData) -> Result<(), MeshHeapError> {
        self.base
            .core_thread()
            .ensure_core_thread("MeshHeapCore::alloc_internal")?;
        let shared = &self.shared;
        let mut state = shared.state();
        if state.allocations.contains_key(&id) {
            return Err(MeshHeapError::Unsupported("mesh id allocated twice"));
        }

        let vertex_chunk = shared.reserve(&mut state, Stream::Vertex, data.num_vertices())?;
        let index_chunk = match shared.reserve(&mut state, Stream::Index, data.num_indices()) {
            Ok(key) => key,
            Err(err) => {
                let _ = state.vertices.chunks.release(vertex_chunk);
                return Err(err);
            }
        };

        let query = match state.free_queries.pop() {
            Some(query) => query,
            None => match shared.queries.create() {
                Ok(query) => query,
                Err(err) => {
                    let _ = state.vertices.chunks.release(vertex_chunk);
                    let _ = state.indices.chunks.release(index_chunk);
                    return Err(err.into());
                }
            },
        };
        state.allocations.insert(
            id,
            Allocation {
                vertex_chunk,
                index_chunk,
                num_vertices: data.num_vertices(),
                num_indices: data.num_indices(),
                use_flags: UseFlags::GpuFree,
                query,
                query_id: 0,
            },
        );

        let uploaded = shared
            .upload(&mut state, Stream::Vertex, vertex_chunk, data.vertex_bytes())
            .and_then(|()| shared.upload(&mut state, Stream::Index, index_chunk, data.index_bytes()));
        if let Err(err) = uploaded {
            if let Err(release_err) = shared.release(&mut state, id) {
                log::error!("Failed to release mesh {id:?} after a failed upload: {release_err}");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Releases a mesh, right away if the GPU is done with it, otherwise once
    /// its event query fires.
    pub fn dealloc_internal(&self, id: MeshId) -> Result<(), MeshHeapError> {
        self.base
            .core_thread()
            .ensure_core_thread("MeshHeapCore::dealloc_internal")?;
        let mut guard = self.shared.state();
        let state = &mut *guard;
        let allocation = state
            .allocations
            .get_mut(&id)
            .ok_or(MeshHeapError::UnknownAllocation(id))?;

        let use_flags = allocation.use_flags;
        match use_flags {
            UseFlags::GpuFree => self.shared.release(state, id),
            UseFlags::Used => {
                allocation.use_flags = UseFlags::CpuFree;
                Ok(())
            }
            UseFlags::CpuFree | UseFlags::Free => Err(MeshHeapError::UnknownAllocation(id)),
        }
    }

    /// Marks a mesh as drawn. See [`TransientMesh`]'s `notify_used_on_gpu`.
    pub fn notify_used_on_gpu(&self, id: MeshId) {
        self.shared.notify_used_on_gpu(id);
    }

    /// Handles a fired event query. Stale `query_id`s are ignored.
    pub fn query_triggered(&self, id: MeshId, query_id: u32) {
        self.shared.query_triggered(id, query_id);
    }

    /// First vertex of a mesh inside the vertex buffer.
    pub fn vertex_offset(&self, id: MeshId) -> Option<u32> {
        self.offset(Stream::Vertex, id)
    }

    /// First index of a mesh inside the index buffer.
    pub fn index_offset(&self, id: MeshId) -> Option<u32> {
        self.offset(Stream::Index, id)
    }

    fn offset(&self, stream: Stream, id: MeshId) -> Option<u32> {
        let state = self.shared.state();
        let allocation = state.allocations.get(&id)?;
        state.chunk_of(stream, allocation).ok().map(|chunk| chunk.start)
    }

    /// State of a mesh. Ids that are not allocated are [`UseFlags::Free`].
    pub fn use_flags(&self, id: MeshId) -> UseFlags {
        self.shared
            .state()
            .allocations
            .get(&id)
            .map_or(UseFlags::Free, |allocation| allocation.use_flags)
    }

    /// The shared vertex buffer, once initialized.
    pub fn vertex_buffer(&self) -> Option<BufferId> {
        self.shared.state().vertices.buffer
    }

    /// The shared index buffer, once initialized.
    pub fn index_buffer(&self) -> Option<BufferId> {
        self.shared.state().indices.buffer
    }

    /// Layout of every vertex in the heap.
    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.shared.layout
    }

    /// Index type of the heap.
    pub fn index_type(&self) -> IndexType {
        self.shared.index_type
    }

    /// The vertex bytes of a mesh, read from the CPU shadow.
    pub fn vertex_data(&self, id: MeshId) -> Option<Vec<u8>> {
        self.stream_data(Stream::Vertex, id)
    }

    /// The index bytes of a mesh, read from the CPU shadow.
    pub fn index_data(&self, id: MeshId) -> Option<Vec<u8>> {
        self.stream_data(Stream::Index, id)
    }

    fn stream_data(&self, stream: Stream, id: MeshId) -> Option<Vec<u8>> {
        let state = self.shared.state();
        let allocation = state.allocations.get(&id)?;
        let chunk = state.chunk_of(stream, allocation).ok()?;
        let buffer = state.stream(stream);
        Some(buffer.shadow[buffer.byte_range(chunk)].to_vec())
    }

    /// A copy of the bookkeeping.
    pub fn snapshot(&self) -> HeapSnapshot {
        let state = self.shared.state();
        let allocations = state
            .allocations
            .iter()
            .filter_map(|(id, allocation)| {
                Some(AllocationSnapshot {
                    id: *id,
                    vertices: state.chunk_of(Stream::Vertex, allocation).ok()?,
                    indices: state.chunk_of(Stream::Index, allocation).ok()?,
                    use_flags: allocation.use_flags,
                })
            })
            .collect();
        HeapSnapshot {
            vertex_capacity: state.vertices.chunks.capacity(),
            index_capacity: state.indices.chunks.capacity(),
            vertex_chunks: state.vertices.chunks.chunks().collect(),
            index_chunks: state.indices.chunks.chunks().collect(),
            allocations,
        }
    }
}

impl CoreObject for MeshHeapCore {
    fn base(&self) -> &CoreObjectBase {
        &self.base
    }

    fn initialize_internal(&self) -> Result<(), RenderError> {
        let shared = &self.shared;
        let vertex_buffer = shared.create_buffer(Stream::Vertex, self.initial_vertices)?;
        let index_buffer = match shared.create_buffer(Stream::Index, self.initial_indices) {
            Ok(buffer) => buffer,
            Err(err) => {
                let _ = shared.buffers.destroy_buffer(vertex_buffer);
                return Err(err.into());
            }
        };

        let mut guard = shared.state();
        let state = &mut *guard;
        for (buffer, id, capacity) in [
            (&mut state.vertices, vertex_buffer, self.initial_vertices),
            (&mut state.indices, index_buffer, self.initial_indices),
        ] {
            buffer.buffer = Some(id);
            buffer.chunks = ChunkList::new(capacity);
            buffer.shadow = vec![0; capacity as usize * buffer.element_size as usize];
        }
        log::debug!(
            "Mesh heap {} created with {} vertices and {} indices",
            self.base.id(),
            self.initial_vertices,
            self.initial_indices
        );
        Ok(())
    }

    fn destroy_internal(&self) {
        let shared = &self.shared;
        let mut guard = shared.state();
        let state = &mut *guard;
        if !state.allocations.is_empty() {
            log::warn!(
                "Mesh heap {} destroyed with {} live meshes",
                self.base.id(),
                state.allocations.len()
            );
        }

        let queries: Vec<_> = state
            .allocations
            .values()
            .map(|allocation| allocation.query)
            .chain(state.free_queries.drain(..))
            .collect();
        for query in queries {
            shared.queries.release(query);
        }
        state.allocations.clear();

        for buffer in [state.vertices.buffer.take(), state.indices.buffer.take()]
            .into_iter()
            .flatten()
        {
            if let Err(err) = shared.buffers.destroy_buffer(buffer) {
                log::warn!("Failed to destroy mesh heap buffer {buffer:?}: {err}");
            }
        }
    }
}

/// Serves [`TransientMesh`]es out of shared GPU buffers.
///
/// Allocation and release are queued on the core thread and return at once;
/// a mesh can be drawn by any command queued after its allocation.
#[derive(Debug)]
pub struct MeshHeap {
    core: CoreObjectPtr<MeshHeapCore>,
    next_id: AtomicU32,
}

impl MeshHeap {
    /// Creates a heap and queues its initialization.
    ///
    /// ## Errors
    /// Returns an error if initialization could not be queued.
    pub fn create(context: &CoreContext, desc: MeshHeapDesc) -> Result<Self, MeshHeapError> {
        let core = CoreObjectPtr::create(MeshHeapCore::new(context, desc))?;
        Ok(Self {
            core,
            next_id: AtomicU32::new(0),
        })
    }

    /// The core-thread half of the heap.
    pub fn core(&self) -> &CoreObjectPtr<MeshHeapCore> {
        &self.core
    }

    /// Allocates a mesh and queues the upload of `data`.
    ///
    /// The returned mesh can be queued for drawing right away; its data is not
    /// necessarily on the GPU yet.
    /// ## Errors
    /// * `MeshHeapError::VertexStrideMismatch` - If `data` uses another vertex stride.
    /// * `MeshHeapError::IndexTypeMismatch` - If `data` uses another index type.
    pub fn alloc(
        &self,
        data: MeshData,
        draw_op: DrawOperation,
    ) -> Result<Arc<TransientMesh>, MeshHeapError> {
        let expected = self.core.vertex_layout().stride();
        let actual = data.layout().stride();
        if expected != actual {
            return Err(MeshHeapError::VertexStrideMismatch { expected, actual });
        }
        if data.index_type() != self.core.index_type() {
            return Err(MeshHeapError::IndexTypeMismatch {
                expected: self.core.index_type(),
                actual: data.index_type(),
            });
        }

        let id = MeshId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mesh = Arc::new(TransientMesh::new(
            id,
            Arc::downgrade(self.core.heap()),
            data.num_vertices(),
            data.num_indices(),
            draw_op,
        ));

        self.core.queue_gpu_command(move |core| {
            if let Err(err) = core.alloc_internal(id, &data) {
                log::error!("Failed to allocate mesh {id:?}: {err}");
            }
        })?;
        Ok(mesh)
    }

    /// Releases a mesh. Its chunks are reused once the GPU is done with them.
    ///
    /// ## Errors
    /// * `MeshHeapError::UnknownAllocation` - If the mesh was already released or
    ///   belongs to another heap.
    pub fn dealloc(&self, mesh: &TransientMesh) -> Result<(), MeshHeapError> {
        if !mesh.belongs_to(self.core.heap()) || !mesh.mark_destroyed() {
            return Err(MeshHeapError::UnknownAllocation(mesh.id()));
        }

        let id = mesh.id();
        self.core.queue_gpu_command(move |core| {
            if let Err(err) = core.dealloc_internal(id) {
                log::error!("Failed to release mesh {id:?}: {err}");
            }
        })?;
        Ok(())
    }
}
