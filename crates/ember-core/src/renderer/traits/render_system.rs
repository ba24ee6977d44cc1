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

use crate::renderer::api::*;
use crate::renderer::error::RenderError;
use crate::renderer::traits::EventQuery;
use std::fmt::Debug;

/// The graphics API surface driven by the core thread.
///
/// Every method is only ever called from the core thread, in the order the
/// commands were queued. Implementations still take `&self` and keep their
/// mutable state behind interior locks so a single instance can be shared
/// between the core thread and the objects that queue work for it.
pub trait RenderSystem: Send + Sync + Debug + 'static {
    /// Sets the active viewport.
    fn set_viewport(&self, viewport: &Viewport) -> Result<(), RenderError>;

    /// Binds a sampler state to a texture unit of a program stage.
    fn set_sampler_state(
        &self,
        stage: GpuProgramType,
        unit: u32,
        state: SamplerStateId,
    ) -> Result<(), RenderError>;

    /// Sets the active blend state.
    fn set_blend_state(&self, state: BlendStateId) -> Result<(), RenderError>;

    /// Sets the active rasterizer state.
    fn set_rasterizer_state(&self, state: RasterizerStateId) -> Result<(), RenderError>;

    /// Sets the active depth/stencil state and the stencil reference value.
    fn set_depth_stencil_state(
        &self,
        state: DepthStencilStateId,
        stencil_ref: u32,
    ) -> Result<(), RenderError>;

    /// Binds a texture to a texture unit.
    /// ## Arguments
    /// * `stage` - The program stage the unit belongs to.
    /// * `unit` - The texture unit index.
    /// * `enabled` - When `false` the unit is unbound and `texture` is ignored.
    /// * `texture` - The texture to bind.
    fn set_texture(
        &self,
        stage: GpuProgramType,
        unit: u32,
        enabled: bool,
        texture: TextureId,
    ) -> Result<(), RenderError>;

    /// Unbinds whatever texture is bound to the unit.
    fn disable_texture_unit(&self, stage: GpuProgramType, unit: u32) -> Result<(), RenderError>;

    /// Makes `target` the active render target.
    fn set_render_target(&self, target: RenderTargetId) -> Result<(), RenderError>;

    /// Binds vertex buffers starting at `start_slot`.
    fn set_vertex_buffers(&self, start_slot: u32, buffers: &[BufferId])
        -> Result<(), RenderError>;

    /// Binds the index buffer used by indexed draws.
    fn set_index_buffer(&self, buffer: BufferId, index_type: IndexType)
        -> Result<(), RenderError>;

    /// Sets the vertex declaration used by subsequent draws.
    fn set_vertex_declaration(&self, declaration: VertexDeclarationId) -> Result<(), RenderError>;

    /// Sets the primitive topology used by subsequent draws.
    fn set_draw_operation(&self, operation: DrawOperation) -> Result<(), RenderError>;

    /// Sets the scissor rectangle.
    fn set_scissor_rect(&self, rect: ScissorRect) -> Result<(), RenderError>;

    /// Clears the whole active render target.
    fn clear_render_target(
        &self,
        flags: ClearFlags,
        color: Color,
        depth: f32,
        stencil: u16,
    ) -> Result<(), RenderError>;

    /// Clears only the area covered by the active viewport.
    fn clear_viewport(
        &self,
        flags: ClearFlags,
        color: Color,
        depth: f32,
        stencil: u16,
    ) -> Result<(), RenderError>;

    /// Binds a GPU program to its stage.
    fn bind_gpu_program(&self, program: GpuProgramId) -> Result<(), RenderError>;

    /// Unbinds the program of the given stage.
    fn unbind_gpu_program(&self, stage: GpuProgramType) -> Result<(), RenderError>;

    /// Binds a set of program parameters to a stage.
    fn bind_gpu_params(&self, stage: GpuProgramType, params: GpuParamsId)
        -> Result<(), RenderError>;

    /// Starts a new frame.
    fn begin_frame(&self) -> Result<(), RenderError>;

    /// Ends the current frame.
    fn end_frame(&self) -> Result<(), RenderError>;

    /// Draws non-indexed primitives.
    fn draw(&self, vertex_offset: u32, vertex_count: u32) -> Result<(), RenderError>;

    /// Draws indexed primitives.
    /// ## Arguments
    /// * `start_index` - First index read from the bound index buffer.
    /// * `index_count` - Number of indices to draw.
    /// * `vertex_offset` - Value added to every index before fetching the vertex.
    /// * `vertex_count` - Number of vertices the indices may reference.
    fn draw_indexed(
        &self,
        start_index: u32,
        index_count: u32,
        vertex_offset: u32,
        vertex_count: u32,
    ) -> Result<(), RenderError>;

    /// Presents the back buffer of a render target.
    fn swap_buffers(&self, target: RenderTargetId) -> Result<(), RenderError>;

    /// Uploads `data` into one subresource of a texture or buffer.
    fn write_subresource(
        &self,
        resource: GpuResourceId,
        subresource: u32,
        data: &[u8],
        discard: bool,
    ) -> Result<(), RenderError>;

    /// Reads one subresource back into `out`, replacing its contents.
    ///
    /// This usually stalls until the GPU is done with the resource.
    fn read_subresource(
        &self,
        resource: GpuResourceId,
        subresource: u32,
        out: &mut Vec<u8>,
    ) -> Result<(), RenderError>;

    /// Resizes a render window.
    fn resize_window(
        &self,
        window: RenderWindowId,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError>;

    /// Moves a render window.
    fn move_window(&self, window: RenderWindowId, left: i32, top: i32) -> Result<(), RenderError>;

    /// Makes a render window visible.
    fn show_window(&self, window: RenderWindowId) -> Result<(), RenderError>;

    /// Hides a render window.
    fn hide_window(&self, window: RenderWindowId) -> Result<(), RenderError>;

    /// Creates a new, not yet started, event query.
    fn create_event_query(&self) -> Result<Box<dyn EventQuery>, RenderError>;
}
