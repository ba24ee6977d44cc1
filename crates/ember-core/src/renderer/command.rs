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

//! The closed set of rendering operations an accessor can defer to the core thread.

use crate::renderer::api::*;
use crate::renderer::error::RenderError;
use crate::renderer::resource_data::ResourceDataLock;
use crate::renderer::traits::{RenderSystem, RenderableMesh};
use std::fmt;
use std::sync::Arc;

/// One deferred call into the [`RenderSystem`].
///
/// Accessors bind their arguments into a variant and queue it; the core thread
/// later runs [`RenderCommand::execute`] against the real render system.
pub enum RenderCommand {
    /// See [`RenderSystem::set_viewport`].
    SetViewport(Viewport),
    /// See [`RenderSystem::set_sampler_state`].
    SetSamplerState {
        /// Program stage.
        stage: GpuProgramType,
        /// Texture unit.
        unit: u32,
        /// Sampler to bind.
        state: SamplerStateId,
    },
    /// See [`RenderSystem::set_blend_state`].
    SetBlendState(BlendStateId),
    /// See [`RenderSystem::set_rasterizer_state`].
    SetRasterizerState(RasterizerStateId),
    /// See [`RenderSystem::set_depth_stencil_state`].
    SetDepthStencilState {
        /// State to bind.
        state: DepthStencilStateId,
        /// Stencil reference value.
        stencil_ref: u32,
    },
    /// See [`RenderSystem::set_texture`].
    SetTexture {
        /// Program stage.
        stage: GpuProgramType,
        /// Texture unit.
        unit: u32,
        /// Whether the unit is enabled.
        enabled: bool,
        /// Texture to bind.
        texture: TextureId,
    },
    /// See [`RenderSystem::disable_texture_unit`].
    DisableTextureUnit {
        /// Program stage.
        stage: GpuProgramType,
        /// Texture unit.
        unit: u32,
    },
    /// See [`RenderSystem::set_render_target`].
    SetRenderTarget(RenderTargetId),
    /// See [`RenderSystem::set_vertex_buffers`].
    SetVertexBuffers {
        /// First slot to bind.
        start_slot: u32,
        /// Buffers, one per slot.
        buffers: Vec<BufferId>,
    },
    /// See [`RenderSystem::set_index_buffer`].
    SetIndexBuffer {
        /// Buffer to bind.
        buffer: BufferId,
        /// Element type.
        index_type: IndexType,
    },
    /// See [`RenderSystem::set_vertex_declaration`].
    SetVertexDeclaration(VertexDeclarationId),
    /// See [`RenderSystem::set_draw_operation`].
    SetDrawOperation(DrawOperation),
    /// See [`RenderSystem::set_scissor_rect`].
    SetScissorRect(ScissorRect),
    /// See [`RenderSystem::clear_render_target`].
    ClearRenderTarget {
        /// Buffers to clear.
        flags: ClearFlags,
        /// Clear color.
        color: Color,
        /// Clear depth.
        depth: f32,
        /// Clear stencil.
        stencil: u16,
    },
    /// See [`RenderSystem::clear_viewport`].
    ClearViewport {
        /// Buffers to clear.
        flags: ClearFlags,
        /// Clear color.
        color: Color,
        /// Clear depth.
        depth: f32,
        /// Clear stencil.
        stencil: u16,
    },
    /// See [`RenderSystem::bind_gpu_program`].
    BindGpuProgram(GpuProgramId),
    /// See [`RenderSystem::unbind_gpu_program`].
    UnbindGpuProgram(GpuProgramType),
    /// See [`RenderSystem::bind_gpu_params`].
    BindGpuParams {
        /// Program stage.
        stage: GpuProgramType,
        /// Parameters to bind.
        params: GpuParamsId,
    },
    /// See [`RenderSystem::begin_frame`].
    BeginFrame,
    /// See [`RenderSystem::end_frame`].
    EndFrame,
    /// See [`RenderSystem::draw`].
    Draw {
        /// First vertex.
        vertex_offset: u32,
        /// Number of vertices.
        vertex_count: u32,
    },
    /// See [`RenderSystem::draw_indexed`].
    DrawIndexed {
        /// First index.
        start_index: u32,
        /// Number of indices.
        index_count: u32,
        /// Base vertex.
        vertex_offset: u32,
        /// Number of referenced vertices.
        vertex_count: u32,
    },
    /// Binds a mesh's buffers and draws it.
    Render {
        /// Mesh to draw.
        mesh: Arc<dyn RenderableMesh>,
        /// Offset added to the mesh's first index.
        index_offset: u32,
        /// Number of indices, `0` for the whole mesh.
        index_count: u32,
        /// Whether to draw with the index buffer.
        use_indices: bool,
        /// Topology to draw with.
        draw_op: DrawOperation,
    },
    /// See [`RenderSystem::swap_buffers`].
    SwapBuffers(RenderTargetId),
    /// Uploads locked resource data into a subresource.
    WriteSubresource {
        /// Destination resource.
        resource: GpuResourceId,
        /// Destination subresource.
        subresource: u32,
        /// Source data, locked until the command is dropped.
        data: ResourceDataLock,
        /// Whether the previous contents may be discarded.
        discard: bool,
    },
    /// Reads a subresource back into locked resource data.
    ReadSubresource {
        /// Source resource.
        resource: GpuResourceId,
        /// Source subresource.
        subresource: u32,
        /// Destination data, locked until the command is dropped.
        data: ResourceDataLock,
    },
    /// See [`RenderSystem::resize_window`].
    ResizeWindow {
        /// Window to resize.
        window: RenderWindowId,
        /// New width.
        width: u32,
        /// New height.
        height: u32,
    },
    /// See [`RenderSystem::move_window`].
    MoveWindow {
        /// Window to move.
        window: RenderWindowId,
        /// New left edge.
        left: i32,
        /// New top edge.
        top: i32,
    },
    /// See [`RenderSystem::show_window`].
    ShowWindow(RenderWindowId),
    /// See [`RenderSystem::hide_window`].
    HideWindow(RenderWindowId),
}

impl RenderCommand {
    /// Short name of the operation, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            RenderCommand::SetViewport(_) => "set_viewport",
            RenderCommand::SetSamplerState { .. } => "set_sampler_state",
            RenderCommand::SetBlendState(_) => "set_blend_state",
            RenderCommand::SetRasterizerState(_) => "set_rasterizer_state",
            RenderCommand::SetDepthStencilState { .. } => "set_depth_stencil_state",
            RenderCommand::SetTexture { .. } => "set_texture",
            RenderCommand::DisableTextureUnit { .. } => "disable_texture_unit",
            RenderCommand::SetRenderTarget(_) => "set_render_target",
            RenderCommand::SetVertexBuffers { .. } => "set_vertex_buffers",
            RenderCommand::SetIndexBuffer { .. } => "set_index_buffer",
            RenderCommand::SetVertexDeclaration(_) => "set_vertex_declaration",
            RenderCommand::SetDrawOperation(_) => "set_draw_operation",
            RenderCommand::SetScissorRect(_) => "set_scissor_rect",
            RenderCommand::ClearRenderTarget { .. } => "clear_render_target",
            RenderCommand::ClearViewport { .. } => "clear_viewport",
            RenderCommand::BindGpuProgram(_) => "bind_gpu_program",
            RenderCommand::UnbindGpuProgram(_) => "unbind_gpu_program",
            RenderCommand::BindGpuParams { .. } => "bind_gpu_params",
            RenderCommand::BeginFrame => "begin_frame",
            RenderCommand::EndFrame => "end_frame",
            RenderCommand::Draw { .. } => "draw",
            RenderCommand::DrawIndexed { .. } => "draw_indexed",
            RenderCommand::Render { .. } => "render",
            RenderCommand::SwapBuffers(_) => "swap_buffers",
            RenderCommand::WriteSubresource { .. } => "write_subresource",
            RenderCommand::ReadSubresource { .. } => "read_subresource",
            RenderCommand::ResizeWindow { .. } => "resize_window",
            RenderCommand::MoveWindow { .. } => "move_window",
            RenderCommand::ShowWindow(_) => "show_window",
            RenderCommand::HideWindow(_) => "hide_window",
        }
    }

    /// Runs the command against `rs`. Must be called on the core thread.
    ///
    /// Resource data locked by subresource commands is released when `self` is dropped
    /// at the end of this call.
    pub fn execute(self, rs: &dyn RenderSystem) -> Result<(), RenderError> {
        match self {
            RenderCommand::SetViewport(viewport) => rs.set_viewport(&viewport),
            RenderCommand::SetSamplerState { stage, unit, state } => {
                rs.set_sampler_state(stage, unit, state)
            }
            RenderCommand::SetBlendState(state) => rs.set_blend_state(state),
            RenderCommand::SetRasterizerState(state) => rs.set_rasterizer_state(state),
            RenderCommand::SetDepthStencilState { state, stencil_ref } => {
                rs.set_depth_stencil_state(state, stencil_ref)
            }
            RenderCommand::SetTexture {
                stage,
                unit,
                enabled,
                texture,
            } => rs.set_texture(stage, unit, enabled, texture),
            RenderCommand::DisableTextureUnit { stage, unit } => {
                rs.disable_texture_unit(stage, unit)
            }
            RenderCommand::SetRenderTarget(target) => rs.set_render_target(target),
            RenderCommand::SetVertexBuffers {
                start_slot,
                buffers,
            } => rs.set_vertex_buffers(start_slot, &buffers),
            RenderCommand::SetIndexBuffer { buffer, index_type } => {
                rs.set_index_buffer(buffer, index_type)
            }
            RenderCommand::SetVertexDeclaration(declaration) => {
                rs.set_vertex_declaration(declaration)
            }
            RenderCommand::SetDrawOperation(op) => rs.set_draw_operation(op),
            RenderCommand::SetScissorRect(rect) => rs.set_scissor_rect(rect),
            RenderCommand::ClearRenderTarget {
                flags,
                color,
                depth,
                stencil,
            } => rs.clear_render_target(flags, color, depth, stencil),
            RenderCommand::ClearViewport {
                flags,
                color,
                depth,
                stencil,
            } => rs.clear_viewport(flags, color, depth, stencil),
            RenderCommand::BindGpuProgram(program) => rs.bind_gpu_program(program),
            RenderCommand::UnbindGpuProgram(stage) => rs.unbind_gpu_program(stage),
            RenderCommand::BindGpuParams { stage, params } => rs.bind_gpu_params(stage, params),
            RenderCommand::BeginFrame => rs.begin_frame(),
            RenderCommand::EndFrame => rs.end_frame(),
            RenderCommand::Draw {
                vertex_offset,
                vertex_count,
            } => rs.draw(vertex_offset, vertex_count),
            RenderCommand::DrawIndexed {
                start_index,
                index_count,
                vertex_offset,
                vertex_count,
            } => rs.draw_indexed(start_index, index_count, vertex_offset, vertex_count),
            RenderCommand::Render {
                mesh,
                index_offset,
                index_count,
                use_indices,
                draw_op,
            } => render_mesh(rs, &*mesh, index_offset, index_count, use_indices, draw_op),
            RenderCommand::SwapBuffers(target) => rs.swap_buffers(target),
            RenderCommand::WriteSubresource {
                resource,
                subresource,
                data,
                discard,
            } => {
                let bytes = data.data().bytes();
                rs.write_subresource(resource, subresource, &bytes, discard)
            }
            RenderCommand::ReadSubresource {
                resource,
                subresource,
                data,
            } => {
                let mut bytes = data.data().bytes();
                rs.read_subresource(resource, subresource, &mut bytes)
            }
            RenderCommand::ResizeWindow {
                window,
                width,
                height,
            } => rs.resize_window(window, width, height),
            RenderCommand::MoveWindow { window, left, top } => rs.move_window(window, left, top),
            RenderCommand::ShowWindow(window) => rs.show_window(window),
            RenderCommand::HideWindow(window) => rs.hide_window(window),
        }
    }
}

impl fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RenderCommand::{}", self.name())
    }
}

/// Binds the mesh's buffers, draws it, then tells the mesh it is in use by the GPU.
fn render_mesh(
    rs: &dyn RenderSystem,
    mesh: &dyn RenderableMesh,
    index_offset: u32,
    index_count: u32,
    use_indices: bool,
    draw_op: DrawOperation,
) -> Result<(), RenderError> {
    let binding = mesh.binding()?;

    rs.set_vertex_buffers(0, &binding.vertex_buffers)?;
    rs.set_draw_operation(draw_op)?;

    if use_indices {
        let available = binding.index_count.checked_sub(index_offset).ok_or_else(|| {
            RenderError::RenderingFailed(format!(
                "index offset {index_offset} is past the mesh's {} indices",
                binding.index_count
            ))
        })?;
        let count = match index_count {
            0 => available,
            n if n <= available => n,
            n => {
                return Err(RenderError::RenderingFailed(format!(
                    "{n} indices requested from offset {index_offset}, the mesh has {available} left"
                )))
            }
        };
        let first_index = binding.index_offset.checked_add(index_offset).ok_or_else(|| {
            RenderError::RenderingFailed(format!(
                "first index {} + {index_offset} overflows",
                binding.index_offset
            ))
        })?;
        rs.set_index_buffer(binding.index_buffer, binding.index_type)?;
        rs.draw_indexed(
            first_index,
            count,
            binding.vertex_offset,
            binding.vertex_count,
        )?;
    } else {
        rs.draw(binding.vertex_offset, binding.vertex_count)?;
    }

    mesh.notify_used_on_gpu();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingRenderSystem, TestMesh};

    fn render(mesh: &Arc<TestMesh>, index_offset: u32, index_count: u32) -> RenderCommand {
        RenderCommand::Render {
            mesh: mesh.clone(),
            index_offset,
            index_count,
            use_indices: true,
            draw_op: DrawOperation::TriangleList,
        }
    }

    #[test]
    fn test_render_sub_range_of_indices() {
        let rs = RecordingRenderSystem::default();
        let mesh = Arc::new(TestMesh::default());

        render(&mesh, 2, 3).execute(&rs).unwrap();

        assert_eq!(rs.calls().last().unwrap(), "draw_indexed(8, 3, 4, 4)");
        assert_eq!(mesh.used_on_gpu(), 1);
    }

    #[test]
    fn test_render_rejects_range_past_mesh_indices() {
        let rs = RecordingRenderSystem::default();
        let mesh = Arc::new(TestMesh::default());

        let too_many = render(&mesh, 2, 5).execute(&rs);
        let past_end = render(&mesh, 7, 0).execute(&rs);
        let overflow = render(&mesh, u32::MAX, 1).execute(&rs);

        for result in [too_many, past_end, overflow] {
            assert!(matches!(result, Err(RenderError::RenderingFailed(_))));
        }
        assert!(!rs.calls().iter().any(|c| c.starts_with("draw_indexed")));
        assert_eq!(mesh.used_on_gpu(), 0);
    }

    #[test]
    fn test_render_whole_mesh_from_offset() {
        let rs = RecordingRenderSystem::default();
        let mesh = Arc::new(TestMesh::default());

        render(&mesh, 6, 0).execute(&rs).unwrap();

        assert_eq!(rs.calls().last().unwrap(), "draw_indexed(12, 0, 4, 4)");
    }
}
