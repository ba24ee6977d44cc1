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

//! Recording doubles for the render system, shared by the unit tests.

use crate::renderer::api::*;
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::{
    EventQuery, HardwareBufferManager, MeshBinding, RenderSystem, RenderableMesh,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records every call as a formatted string, in execution order.
#[derive(Debug, Default)]
pub struct RecordingRenderSystem {
    calls: Mutex<Vec<String>>,
    fail_next: Mutex<Option<RenderError>>,
    subresources: Mutex<HashMap<(GpuResourceId, u32), Vec<u8>>>,
    queries_ready: Arc<AtomicBool>,
}

impl RecordingRenderSystem {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Makes the next call fail with `err` without being recorded.
    pub fn fail_next(&self, err: RenderError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    pub fn subresource(&self, resource: GpuResourceId, subresource: u32) -> Option<Vec<u8>> {
        self.subresources
            .lock()
            .unwrap()
            .get(&(resource, subresource))
            .cloned()
    }

    /// Every query created by this system reports ready while this is set.
    pub fn set_queries_ready(&self, ready: bool) {
        self.queries_ready.store(ready, Ordering::SeqCst);
    }

    fn record(&self, call: String) -> Result<(), RenderError> {
        if let Some(err) = self.fail_next.lock().unwrap().take() {
            return Err(err);
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl RenderSystem for RecordingRenderSystem {
    fn set_viewport(&self, viewport: &Viewport) -> Result<(), RenderError> {
        self.record(format!("set_viewport({:?})", viewport.target))
    }

    fn set_sampler_state(
        &self,
        stage: GpuProgramType,
        unit: u32,
        state: SamplerStateId,
    ) -> Result<(), RenderError> {
        self.record(format!("set_sampler_state({stage:?}, {unit}, {state:?})"))
    }

    fn set_blend_state(&self, state: BlendStateId) -> Result<(), RenderError> {
        self.record(format!("set_blend_state({state:?})"))
    }

    fn set_rasterizer_state(&self, state: RasterizerStateId) -> Result<(), RenderError> {
        self.record(format!("set_rasterizer_state({state:?})"))
    }

    fn set_depth_stencil_state(
        &self,
        state: DepthStencilStateId,
        stencil_ref: u32,
    ) -> Result<(), RenderError> {
        self.record(format!("set_depth_stencil_state({state:?}, {stencil_ref})"))
    }

    fn set_texture(
        &self,
        stage: GpuProgramType,
        unit: u32,
        enabled: bool,
        texture: TextureId,
    ) -> Result<(), RenderError> {
        self.record(format!(
            "set_texture({stage:?}, {unit}, {enabled}, {texture:?})"
        ))
    }

    fn disable_texture_unit(&self, stage: GpuProgramType, unit: u32) -> Result<(), RenderError> {
        self.record(format!("disable_texture_unit({stage:?}, {unit})"))
    }

    fn set_render_target(&self, target: RenderTargetId) -> Result<(), RenderError> {
        self.record(format!("set_render_target({target:?})"))
    }

    fn set_vertex_buffers(
        &self,
        start_slot: u32,
        buffers: &[BufferId],
    ) -> Result<(), RenderError> {
        self.record(format!("set_vertex_buffers({start_slot}, {buffers:?})"))
    }

    fn set_index_buffer(
        &self,
        buffer: BufferId,
        index_type: IndexType,
    ) -> Result<(), RenderError> {
        self.record(format!("set_index_buffer({buffer:?}, {index_type:?})"))
    }

    fn set_vertex_declaration(&self, declaration: VertexDeclarationId) -> Result<(), RenderError> {
        self.record(format!("set_vertex_declaration({declaration:?})"))
    }

    fn set_draw_operation(&self, operation: DrawOperation) -> Result<(), RenderError> {
        self.record(format!("set_draw_operation({operation:?})"))
    }

    fn set_scissor_rect(&self, rect: ScissorRect) -> Result<(), RenderError> {
        self.record(format!("set_scissor_rect({rect:?})"))
    }

    fn clear_render_target(
        &self,
        flags: ClearFlags,
        _color: Color,
        depth: f32,
        stencil: u16,
    ) -> Result<(), RenderError> {
        self.record(format!("clear_render_target({flags:?}, {depth}, {stencil})"))
    }

    fn clear_viewport(
        &self,
        flags: ClearFlags,
        _color: Color,
        depth: f32,
        stencil: u16,
    ) -> Result<(), RenderError> {
        self.record(format!("clear_viewport({flags:?}, {depth}, {stencil})"))
    }

    fn bind_gpu_program(&self, program: GpuProgramId) -> Result<(), RenderError> {
        self.record(format!("bind_gpu_program({program:?})"))
    }

    fn unbind_gpu_program(&self, stage: GpuProgramType) -> Result<(), RenderError> {
        self.record(format!("unbind_gpu_program({stage:?})"))
    }

    fn bind_gpu_params(
        &self,
        stage: GpuProgramType,
        params: GpuParamsId,
    ) -> Result<(), RenderError> {
        self.record(format!("bind_gpu_params({stage:?}, {params:?})"))
    }

    fn begin_frame(&self) -> Result<(), RenderError> {
        self.record("begin_frame".to_string())
    }

    fn end_frame(&self) -> Result<(), RenderError> {
        self.record("end_frame".to_string())
    }

    fn draw(&self, vertex_offset: u32, vertex_count: u32) -> Result<(), RenderError> {
        self.record(format!("draw({vertex_offset}, {vertex_count})"))
    }

    fn draw_indexed(
        &self,
        start_index: u32,
        index_count: u32,
        vertex_offset: u32,
        vertex_count: u32,
    ) -> Result<(), RenderError> {
        self.record(format!(
            "draw_indexed({start_index}, {index_count}, {vertex_offset}, {vertex_count})"
        ))
    }

    fn swap_buffers(&self, target: RenderTargetId) -> Result<(), RenderError> {
        self.record(format!("swap_buffers({target:?})"))
    }

    fn write_subresource(
        &self,
        resource: GpuResourceId,
        subresource: u32,
        data: &[u8],
        _discard: bool,
    ) -> Result<(), RenderError> {
        self.record(format!("write_subresource({resource:?}, {subresource})"))?;
        self.subresources
            .lock()
            .unwrap()
            .insert((resource, subresource), data.to_vec());
        Ok(())
    }

    fn read_subresource(
        &self,
        resource: GpuResourceId,
        subresource: u32,
        out: &mut Vec<u8>,
    ) -> Result<(), RenderError> {
        self.record(format!("read_subresource({resource:?}, {subresource})"))?;
        let subresources = self.subresources.lock().unwrap();
        let data = subresources.get(&(resource, subresource)).ok_or(
            ResourceError::SubresourceNotFound {
                resource,
                subresource,
            },
        )?;
        out.clear();
        out.extend_from_slice(data);
        Ok(())
    }

    fn resize_window(
        &self,
        window: RenderWindowId,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        self.record(format!("resize_window({window:?}, {width}, {height})"))
    }

    fn move_window(&self, window: RenderWindowId, left: i32, top: i32) -> Result<(), RenderError> {
        self.record(format!("move_window({window:?}, {left}, {top})"))
    }

    fn show_window(&self, window: RenderWindowId) -> Result<(), RenderError> {
        self.record(format!("show_window({window:?})"))
    }

    fn hide_window(&self, window: RenderWindowId) -> Result<(), RenderError> {
        self.record(format!("hide_window({window:?})"))
    }

    fn create_event_query(&self) -> Result<Box<dyn EventQuery>, RenderError> {
        Ok(Box::new(FlagQuery {
            ready: Arc::clone(&self.queries_ready),
        }))
    }
}

/// A query that is ready whenever a shared flag is set.
#[derive(Debug)]
pub struct FlagQuery {
    ready: Arc<AtomicBool>,
}

impl EventQuery for FlagQuery {
    fn begin(&self) {}

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// A mesh with fixed buffers that counts how often it was drawn.
#[derive(Debug, Default)]
pub struct TestMesh {
    used: AtomicUsize,
}

impl TestMesh {
    pub fn used_on_gpu(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }
}

impl RenderableMesh for TestMesh {
    fn binding(&self) -> Result<MeshBinding, RenderError> {
        Ok(MeshBinding {
            vertex_buffers: vec![BufferId(10)],
            index_buffer: BufferId(11),
            index_type: IndexType::U32,
            vertex_offset: 4,
            vertex_count: 4,
            index_offset: 6,
            index_count: 6,
        })
    }

    fn notify_used_on_gpu(&self) {
        self.used.fetch_add(1, Ordering::SeqCst);
    }
}

/// CPU-memory buffers, enough for object lifecycle tests.
#[derive(Debug, Default)]
pub struct MemoryBufferManager {
    buffers: Mutex<HashMap<BufferId, Vec<u8>>>,
    next_id: AtomicUsize,
}

impl MemoryBufferManager {
    pub fn live_buffers(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }

    fn create(&self, size: usize) -> BufferId {
        let id = BufferId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.buffers.lock().unwrap().insert(id, vec![0; size]);
        id
    }
}

impl HardwareBufferManager for MemoryBufferManager {
    fn create_vertex_buffer(
        &self,
        vertex_size: u32,
        num_vertices: u32,
        _usage: BufferUsage,
    ) -> Result<BufferId, ResourceError> {
        Ok(self.create(vertex_size as usize * num_vertices as usize))
    }

    fn create_index_buffer(
        &self,
        index_type: IndexType,
        num_indices: u32,
        _usage: BufferUsage,
    ) -> Result<BufferId, ResourceError> {
        Ok(self.create(index_type.size() as usize * num_indices as usize))
    }

    fn create_gpu_param_block_buffer(
        &self,
        size: u32,
        _usage: BufferUsage,
    ) -> Result<BufferId, ResourceError> {
        Ok(self.create(size as usize))
    }

    fn write_buffer(
        &self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
        _write_type: BufferWriteType,
    ) -> Result<(), ResourceError> {
        let mut buffers = self.buffers.lock().unwrap();
        let bytes = buffers
            .get_mut(&buffer)
            .ok_or(ResourceError::BufferNotFound(buffer))?;
        let start = offset as usize;
        bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(
        &self,
        buffer: BufferId,
        offset: u64,
        out: &mut [u8],
    ) -> Result<(), ResourceError> {
        let buffers = self.buffers.lock().unwrap();
        let bytes = buffers
            .get(&buffer)
            .ok_or(ResourceError::BufferNotFound(buffer))?;
        let start = offset as usize;
        out.copy_from_slice(&bytes[start..start + out.len()]);
        Ok(())
    }

    fn buffer_size(&self, buffer: BufferId) -> Result<u64, ResourceError> {
        let buffers = self.buffers.lock().unwrap();
        buffers
            .get(&buffer)
            .map(|bytes| bytes.len() as u64)
            .ok_or(ResourceError::BufferNotFound(buffer))
    }

    fn destroy_buffer(&self, buffer: BufferId) -> Result<(), ResourceError> {
        self.buffers
            .lock()
            .unwrap()
            .remove(&buffer)
            .map(|_| ())
            .ok_or(ResourceError::BufferNotFound(buffer))
    }
}
