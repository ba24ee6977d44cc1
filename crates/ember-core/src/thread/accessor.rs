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

//! Buffered access to the render system from simulation threads.

use crate::renderer::api::*;
use crate::renderer::command::RenderCommand;
use crate::renderer::resource_data::GpuResourceData;
use crate::renderer::traits::{RenderSystem, RenderableMesh};
use crate::thread::async_op::AsyncOp;
use crate::thread::command_queue::{CommandQueue, QueueSync, Synced, Unsynced};
use crate::thread::core_thread::CoreThreadHandle;
use crate::thread::error::CoreThreadError;
use std::fmt;
use std::sync::Arc;

/// A thread-bound accessor; obtained from [`CoreThread::accessor`](crate::thread::CoreThread::accessor).
pub type CoreAccessor = CoreThreadAccessor<Unsynced>;

/// The accessor shared between every thread; obtained from
/// [`CoreThread::synced_accessor`](crate::thread::CoreThread::synced_accessor).
pub type SyncedCoreAccessor = CoreThreadAccessor<Synced>;

/// Records render system calls into a private queue and submits them to the
/// core thread as a single command.
///
/// No method does any work immediately: each binds its arguments into a
/// [`RenderCommand`] and queues it. [`CoreThreadAccessor::submit_to_core_thread`]
/// then hands the whole buffer to the core thread, where the commands run in
/// the order they were recorded, with no other submission interleaved.
pub struct CoreThreadAccessor<S: QueueSync> {
    queue: CommandQueue<S>,
    core_thread: CoreThreadHandle,
    render_system: Arc<dyn RenderSystem>,
}

impl<S: QueueSync> CoreThreadAccessor<S> {
    /// Creates an accessor owned by the calling thread.
    pub fn new(core_thread: CoreThreadHandle, render_system: Arc<dyn RenderSystem>) -> Self {
        Self {
            queue: CommandQueue::new(core_thread.checks_enabled()),
            core_thread,
            render_system,
        }
    }

    /// The core thread this accessor submits to.
    pub(crate) fn core_thread(&self) -> &CoreThreadHandle {
        &self.core_thread
    }

    /// Index of the private queue, as reported in command debug ids.
    pub fn queue_idx(&self) -> u32 {
        self.queue.queue_idx()
    }

    #[track_caller]
    fn queue_render(&self, command: RenderCommand) {
        let render_system = Arc::clone(&self.render_system);
        self.queue.queue(move || {
            let name = command.name();
            if let Err(err) = command.execute(&*render_system) {
                log::error!("Render command '{name}' failed: {err}");
            }
        });
    }

    #[track_caller]
    fn queue_render_return(&self, command: RenderCommand) -> AsyncOp {
        let render_system = Arc::clone(&self.render_system);
        self.queue.queue_return(move |op| {
            let name = command.name();
            match command.execute(&*render_system) {
                Ok(()) => {
                    op.complete_operation_empty();
                }
                Err(err) => {
                    log::error!("Render command '{name}' failed: {err}");
                    op.fail_operation(err.to_string());
                }
            }
        })
    }

    /// Queues [`RenderSystem::set_viewport`].
    #[track_caller]
    pub fn set_viewport(&self, viewport: Viewport) {
        self.queue_render(RenderCommand::SetViewport(viewport));
    }

    /// Queues [`RenderSystem::set_sampler_state`].
    #[track_caller]
    pub fn set_sampler_state(&self, stage: GpuProgramType, unit: u32, state: SamplerStateId) {
        self.queue_render(RenderCommand::SetSamplerState { stage, unit, state });
    }

    /// Queues [`RenderSystem::set_blend_state`].
    #[track_caller]
    pub fn set_blend_state(&self, state: BlendStateId) {
        self.queue_render(RenderCommand::SetBlendState(state));
    }

    /// Queues [`RenderSystem::set_rasterizer_state`].
    #[track_caller]
    pub fn set_rasterizer_state(&self, state: RasterizerStateId) {
        self.queue_render(RenderCommand::SetRasterizerState(state));
    }

    /// Queues [`RenderSystem::set_depth_stencil_state`].
    #[track_caller]
    pub fn set_depth_stencil_state(&self, state: DepthStencilStateId, stencil_ref: u32) {
        self.queue_render(RenderCommand::SetDepthStencilState { state, stencil_ref });
    }

    /// Queues [`RenderSystem::set_texture`].
    #[track_caller]
    pub fn set_texture(&self, stage: GpuProgramType, unit: u32, enabled: bool, texture: TextureId) {
        self.queue_render(RenderCommand::SetTexture {
            stage,
            unit,
            enabled,
            texture,
        });
    }

    /// Queues [`RenderSystem::disable_texture_unit`].
    #[track_caller]
    pub fn disable_texture_unit(&self, stage: GpuProgramType, unit: u32) {
        self.queue_render(RenderCommand::DisableTextureUnit { stage, unit });
    }

    /// Queues [`RenderSystem::set_render_target`].
    #[track_caller]
    pub fn set_render_target(&self, target: RenderTargetId) {
        self.queue_render(RenderCommand::SetRenderTarget(target));
    }

    /// Queues [`RenderSystem::set_vertex_buffers`].
    #[track_caller]
    pub fn set_vertex_buffers(&self, start_slot: u32, buffers: &[BufferId]) {
        self.queue_render(RenderCommand::SetVertexBuffers {
            start_slot,
            buffers: buffers.to_vec(),
        });
    }

    /// Queues [`RenderSystem::set_index_buffer`].
    #[track_caller]
    pub fn set_index_buffer(&self, buffer: BufferId, index_type: IndexType) {
        self.queue_render(RenderCommand::SetIndexBuffer { buffer, index_type });
    }

    /// Queues [`RenderSystem::set_vertex_declaration`].
    #[track_caller]
    pub fn set_vertex_declaration(&self, declaration: VertexDeclarationId) {
        self.queue_render(RenderCommand::SetVertexDeclaration(declaration));
    }

    /// Queues [`RenderSystem::set_draw_operation`].
    #[track_caller]
    pub fn set_draw_operation(&self, operation: DrawOperation) {
        self.queue_render(RenderCommand::SetDrawOperation(operation));
    }

    /// Queues [`RenderSystem::set_scissor_rect`].
    #[track_caller]
    pub fn set_scissor_rect(&self, rect: ScissorRect) {
        self.queue_render(RenderCommand::SetScissorRect(rect));
    }

    /// Queues [`RenderSystem::clear_render_target`].
    #[track_caller]
    pub fn clear_render_target(&self, flags: ClearFlags, color: Color, depth: f32, stencil: u16) {
        self.queue_render(RenderCommand::ClearRenderTarget {
            flags,
            color,
            depth,
            stencil,
        });
    }

    /// Queues [`RenderSystem::clear_viewport`].
    #[track_caller]
    pub fn clear_viewport(&self, flags: ClearFlags, color: Color, depth: f32, stencil: u16) {
        self.queue_render(RenderCommand::ClearViewport {
            flags,
            color,
            depth,
            stencil,
        });
    }

    /// Queues [`RenderSystem::bind_gpu_program`].
    #[track_caller]
    pub fn bind_gpu_program(&self, program: GpuProgramId) {
        self.queue_render(RenderCommand::BindGpuProgram(program));
    }

    /// Queues [`RenderSystem::unbind_gpu_program`].
    #[track_caller]
    pub fn unbind_gpu_program(&self, stage: GpuProgramType) {
        self.queue_render(RenderCommand::UnbindGpuProgram(stage));
    }

    /// Queues [`RenderSystem::bind_gpu_params`].
    #[track_caller]
    pub fn bind_gpu_params(&self, stage: GpuProgramType, params: GpuParamsId) {
        self.queue_render(RenderCommand::BindGpuParams { stage, params });
    }

    /// Queues [`RenderSystem::begin_frame`].
    #[track_caller]
    pub fn begin_frame(&self) {
        self.queue_render(RenderCommand::BeginFrame);
    }

    /// Queues [`RenderSystem::end_frame`].
    #[track_caller]
    pub fn end_frame(&self) {
        self.queue_render(RenderCommand::EndFrame);
    }

    /// Queues [`RenderSystem::draw`].
    #[track_caller]
    pub fn draw(&self, vertex_offset: u32, vertex_count: u32) {
        self.queue_render(RenderCommand::Draw {
            vertex_offset,
            vertex_count,
        });
    }

    /// Queues [`RenderSystem::draw_indexed`].
    #[track_caller]
    pub fn draw_indexed(
        &self,
        start_index: u32,
        index_count: u32,
        vertex_offset: u32,
        vertex_count: u32,
    ) {
        self.queue_render(RenderCommand::DrawIndexed {
            start_index,
            index_count,
            vertex_offset,
            vertex_count,
        });
    }

    /// Queues a draw of `mesh`.
    ///
    /// The mesh's buffers are resolved on the core thread when the command runs,
    /// and the mesh is told it is in use by the GPU right after the draw.
    /// ## Arguments
    /// * `mesh` - The mesh to draw. It stays alive until the command has run.
    /// * `index_offset` - Offset added to the mesh's first index.
    /// * `index_count` - Number of indices to draw, `0` for the rest of the mesh.
    /// * `use_indices` - Draw with the index buffer.
    /// * `draw_op` - Topology to draw with.
    #[track_caller]
    pub fn render(
        &self,
        mesh: Arc<dyn RenderableMesh>,
        index_offset: u32,
        index_count: u32,
        use_indices: bool,
        draw_op: DrawOperation,
    ) {
        self.queue_render(RenderCommand::Render {
            mesh,
            index_offset,
            index_count,
            use_indices,
            draw_op,
        });
    }

    /// Queues [`RenderSystem::swap_buffers`].
    #[track_caller]
    pub fn swap_buffers(&self, target: RenderTargetId) {
        self.queue_render(RenderCommand::SwapBuffers(target));
    }

    /// Queues an upload of `data` into a subresource.
    ///
    /// `data` is locked until the upload has run, and writes to it fail in the
    /// meantime. The returned op resolves once the upload is done, or as failed
    /// if the backend rejected it.
    #[track_caller]
    pub fn write_subresource(
        &self,
        resource: GpuResourceId,
        subresource: u32,
        data: &Arc<GpuResourceData>,
        discard: bool,
    ) -> AsyncOp {
        self.queue_render_return(RenderCommand::WriteSubresource {
            resource,
            subresource,
            data: data.lock(),
            discard,
        })
    }

    /// Queues a read of a subresource into `data`.
    ///
    /// `data` is locked until the read has run. Read it once the returned op is
    /// resolved.
    #[track_caller]
    pub fn read_subresource(
        &self,
        resource: GpuResourceId,
        subresource: u32,
        data: &Arc<GpuResourceData>,
    ) -> AsyncOp {
        self.queue_render_return(RenderCommand::ReadSubresource {
            resource,
            subresource,
            data: data.lock(),
        })
    }

    /// Queues [`RenderSystem::resize_window`].
    #[track_caller]
    pub fn resize_window(&self, window: RenderWindowId, width: u32, height: u32) {
        self.queue_render(RenderCommand::ResizeWindow {
            window,
            width,
            height,
        });
    }

    /// Queues [`RenderSystem::move_window`].
    #[track_caller]
    pub fn move_window(&self, window: RenderWindowId, left: i32, top: i32) {
        self.queue_render(RenderCommand::MoveWindow { window, left, top });
    }

    /// Queues [`RenderSystem::show_window`].
    #[track_caller]
    pub fn show_window(&self, window: RenderWindowId) {
        self.queue_render(RenderCommand::ShowWindow(window));
    }

    /// Queues [`RenderSystem::hide_window`].
    #[track_caller]
    pub fn hide_window(&self, window: RenderWindowId) {
        self.queue_render(RenderCommand::HideWindow(window));
    }

    /// Hands every recorded command to the core thread as one queue entry.
    ///
    /// With `block_until_complete`, returns once they have all run. A blocking
    /// submission with nothing recorded still waits for earlier submissions; a
    /// non-blocking one queues nothing.
    #[track_caller]
    pub fn submit_to_core_thread(&self, block_until_complete: bool) -> Result<(), CoreThreadError> {
        let batch = self.queue.flush();
        if batch.is_empty() && !block_until_complete {
            if self.core_thread.is_shut_down() {
                return Err(CoreThreadError::ShutDown);
            }
            return Ok(());
        }
        self.core_thread.queue_command(
            move || {
                batch.playback();
            },
            block_until_complete,
        )
    }

    /// Discards every command recorded since the last submission.
    #[track_caller]
    pub fn cancel_all(&self) {
        self.queue.cancel_all();
    }

    /// Returns `true` if nothing was recorded since the last submission.
    #[track_caller]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<S: QueueSync> fmt::Debug for CoreThreadAccessor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreThreadAccessor")
            .field("queue", &self.queue)
            .finish()
    }
}
