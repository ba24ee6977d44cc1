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

//! The headless implementation of the `RenderSystem` trait.

use super::fence::{GpuFence, HeadlessEventQuery};
use ember_core::renderer::api::*;
use ember_core::renderer::error::{RenderError, ResourceError};
use ember_core::renderer::traits::{EventQuery, RenderSystem};
use ember_core::utils::lock_unpoisoned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One call observed by [`HeadlessRenderSystem`], with its arguments.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum RecordedCall {
    SetViewport(Viewport),
    SetSamplerState {
        stage: GpuProgramType,
        unit: u32,
        state: SamplerStateId,
    },
    SetBlendState(BlendStateId),
    SetRasterizerState(RasterizerStateId),
    SetDepthStencilState {
        state: DepthStencilStateId,
        stencil_ref: u32,
    },
    SetTexture {
        stage: GpuProgramType,
        unit: u32,
        enabled: bool,
        texture: TextureId,
    },
    DisableTextureUnit {
        stage: GpuProgramType,
        unit: u32,
    },
    SetRenderTarget(RenderTargetId),
    SetVertexBuffers {
        start_slot: u32,
        buffers: Vec<BufferId>,
    },
    SetIndexBuffer {
        buffer: BufferId,
        index_type: IndexType,
    },
    SetVertexDeclaration(VertexDeclarationId),
    SetDrawOperation(DrawOperation),
    SetScissorRect(ScissorRect),
    ClearRenderTarget {
        flags: ClearFlags,
        color: Color,
        depth: f32,
        stencil: u16,
    },
    ClearViewport {
        flags: ClearFlags,
        color: Color,
        depth: f32,
        stencil: u16,
    },
    BindGpuProgram(GpuProgramId),
    UnbindGpuProgram(GpuProgramType),
    BindGpuParams {
        stage: GpuProgramType,
        params: GpuParamsId,
    },
    BeginFrame,
    EndFrame,
    Draw {
        vertex_offset: u32,
        vertex_count: u32,
    },
    DrawIndexed {
        start_index: u32,
        index_count: u32,
        vertex_offset: u32,
        vertex_count: u32,
    },
    SwapBuffers(RenderTargetId),
    WriteSubresource {
        resource: GpuResourceId,
        subresource: u32,
        len: usize,
        discard: bool,
    },
    ReadSubresource {
        resource: GpuResourceId,
        subresource: u32,
    },
    ResizeWindow {
        window: RenderWindowId,
        width: u32,
        height: u32,
    },
    MoveWindow {
        window: RenderWindowId,
        left: i32,
        top: i32,
    },
    ShowWindow(RenderWindowId),
    HideWindow(RenderWindowId),
}

/// Last known state of a window driven through the headless backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowState {
    /// Client width in pixels.
    pub width: u32,
    /// Client height in pixels.
    pub height: u32,
    /// Left edge in screen pixels.
    pub left: i32,
    /// Top edge in screen pixels.
    pub top: i32,
    /// Whether the window is shown.
    pub visible: bool,
}

/// A [`RenderSystem`] that executes nothing and records everything.
///
/// Subresource writes are kept in memory so reads return what was written.
/// Ending a frame or swapping buffers counts as one GPU submission on the
/// backend's [`GpuFence`].
#[derive(Debug)]
pub struct HeadlessRenderSystem {
    calls: Mutex<Vec<RecordedCall>>,
    subresources: Mutex<HashMap<(GpuResourceId, u32), Vec<u8>>>,
    windows: Mutex<HashMap<RenderWindowId, WindowState>>,
    pending_failure: Mutex<Option<RenderError>>,
    fence: Arc<GpuFence>,
}

impl Default for HeadlessRenderSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessRenderSystem {
    /// Creates a backend whose GPU finishes every submission immediately.
    pub fn new() -> Self {
        Self::with_fence(Arc::new(GpuFence::new(true)))
    }

    /// Creates a backend whose GPU only makes progress through
    /// [`GpuFence::complete_all`].
    pub fn with_manual_fence() -> Self {
        Self::with_fence(Arc::new(GpuFence::new(false)))
    }

    fn with_fence(fence: Arc<GpuFence>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            subresources: Mutex::new(HashMap::new()),
            windows: Mutex::new(HashMap::new()),
            pending_failure: Mutex::new(None),
            fence,
        }
    }

    /// The simulated GPU fence.
    pub fn fence(&self) -> &Arc<GpuFence> {
        &self.fence
    }

    /// Every call recorded so far, in execution order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock_unpoisoned(&self.calls).clone()
    }

    /// Returns and forgets the recorded calls.
    pub fn take_calls(&self) -> Vec<RecordedCall> {
        std::mem::take(&mut *lock_unpoisoned(&self.calls))
    }

    /// Number of calls recorded so far.
    pub fn call_count(&self) -> usize {
        lock_unpoisoned(&self.calls).len()
    }

    /// Makes the next call fail with `err`. The failed call is not recorded.
    pub fn fail_next_call(&self, err: RenderError) {
        *lock_unpoisoned(&self.pending_failure) = Some(err);
    }

    /// The bytes last written to a subresource.
    pub fn subresource(&self, resource: GpuResourceId, subresource: u32) -> Option<Vec<u8>> {
        lock_unpoisoned(&self.subresources)
            .get(&(resource, subresource))
            .cloned()
    }

    /// The state of a window, once any call touched it.
    pub fn window(&self, window: RenderWindowId) -> Option<WindowState> {
        lock_unpoisoned(&self.windows).get(&window).copied()
    }

    fn record(&self, call: RecordedCall) -> Result<(), RenderError> {
        if let Some(err) = lock_unpoisoned(&self.pending_failure).take() {
            log::debug!("Headless backend failing {call:?} on request: {err}");
            return Err(err);
        }
        log::trace!("Headless backend: {call:?}");
        lock_unpoisoned(&self.calls).push(call);
        Ok(())
    }

    fn update_window(&self, window: RenderWindowId, update: impl FnOnce(&mut WindowState)) {
        update(lock_unpoisoned(&self.windows).entry(window).or_default());
    }
}

impl RenderSystem for HeadlessRenderSystem {
    fn set_viewport(&self, viewport: &Viewport) -> Result<(), RenderError> {
        self.record(RecordedCall::SetViewport(*viewport))
    }

    fn set_sampler_state(
        &self,
        stage: GpuProgramType,
        unit: u32,
        state: SamplerStateId,
    ) -> Result<(), RenderError> {
        self.record(RecordedCall::SetSamplerState { stage, unit, state })
    }

    fn set_blend_state(&self, state: BlendStateId) -> Result<(), RenderError> {
        self.record(RecordedCall::SetBlendState(state))
    }

    fn set_rasterizer_state(&self, state: RasterizerStateId) -> Result<(), RenderError> {
        self.record(RecordedCall::SetRasterizerState(state))
    }

    fn set_depth_stencil_state(
        &self,
        state: DepthStencilStateId,
        stencil_ref: u32,
    ) -> Result<(), RenderError> {
        self.record(RecordedCall::SetDepthStencilState { state, stencil_ref })
    }

    fn set_texture(
        &self,
        stage: GpuProgramType,
        unit: u32,
        enabled: bool,
        texture: TextureId,
    ) -> Result<(), RenderError> {
        self.record(RecordedCall::SetTexture {
            stage,
            unit,
            enabled,
            texture,
        })
    }

    fn disable_texture_unit(&self, stage: GpuProgramType, unit: u32) -> Result<(), RenderError> {
        self.record(RecordedCall::DisableTextureUnit { stage, unit })
    }

    fn set_render_target(&self, target: RenderTargetId) -> Result<(), RenderError> {
        self.record(RecordedCall::SetRenderTarget(target))
    }

    fn set_vertex_buffers(
        &self,
        start_slot: u32,
        buffers: &[BufferId],
    ) -> Result<(), RenderError> {
        self.record(RecordedCall::SetVertexBuffers {
            start_slot,
            buffers: buffers.to_vec(),
        })
    }

    fn set_index_buffer(
        &self,
        buffer: BufferId,
        index_type: IndexType,
    ) -> Result<(), RenderError> {
        self.record(RecordedCall::SetIndexBuffer { buffer, index_type })
    }

    fn set_vertex_declaration(&self, declaration: VertexDeclarationId) -> Result<(), RenderError> {
        self.record(RecordedCall::SetVertexDeclaration(declaration))
    }

    fn set_draw_operation(&self, operation: DrawOperation) -> Result<(), RenderError> {
        self.record(RecordedCall::SetDrawOperation(operation))
    }

    fn set_scissor_rect(&self, rect: ScissorRect) -> Result<(), RenderError> {
        self.record(RecordedCall::SetScissorRect(rect))
    }

    fn clear_render_target(
        &self,
        flags: ClearFlags,
        color: Color,
        depth: f32,
        stencil: u16,
    ) -> Result<(), RenderError> {
        self.record(RecordedCall::ClearRenderTarget {
            flags,
            color,
            depth,
            stencil,
        })
    }

    fn clear_viewport(
        &self,
        flags: ClearFlags,
        color: Color,
        depth: f32,
        stencil: u16,
    ) -> Result<(), RenderError> {
        self.record(RecordedCall::ClearViewport {
            flags,
            color,
            depth,
            stencil,
        })
    }

    fn bind_gpu_program(&self, program: GpuProgramId) -> Result<(), RenderError> {
        self.record(RecordedCall::BindGpuProgram(program))
    }

    fn unbind_gpu_program(&self, stage: GpuProgramType) -> Result<(), RenderError> {
        self.record(RecordedCall::UnbindGpuProgram(stage))
    }

    fn bind_gpu_params(
        &self,
        stage: GpuProgramType,
        params: GpuParamsId,
    ) -> Result<(), RenderError> {
        self.record(RecordedCall::BindGpuParams { stage, params })
    }

    fn begin_frame(&self) -> Result<(), RenderError> {
        self.record(RecordedCall::BeginFrame)
    }

    fn end_frame(&self) -> Result<(), RenderError> {
        self.record(RecordedCall::EndFrame)?;
        self.fence.submit();
        Ok(())
    }

    fn draw(&self, vertex_offset: u32, vertex_count: u32) -> Result<(), RenderError> {
        self.record(RecordedCall::Draw {
            vertex_offset,
            vertex_count,
        })
    }

    fn draw_indexed(
        &self,
        start_index: u32,
        index_count: u32,
        vertex_offset: u32,
        vertex_count: u32,
    ) -> Result<(), RenderError> {
        self.record(RecordedCall::DrawIndexed {
            start_index,
            index_count,
            vertex_offset,
            vertex_count,
        })
    }

    fn swap_buffers(&self, target: RenderTargetId) -> Result<(), RenderError> {
        self.record(RecordedCall::SwapBuffers(target))?;
        self.fence.submit();
        Ok(())
    }

    fn write_subresource(
        &self,
        resource: GpuResourceId,
        subresource: u32,
        data: &[u8],
        discard: bool,
    ) -> Result<(), RenderError> {
        self.record(RecordedCall::WriteSubresource {
            resource,
            subresource,
            len: data.len(),
            discard,
        })?;
        lock_unpoisoned(&self.subresources).insert((resource, subresource), data.to_vec());
        Ok(())
    }

    fn read_subresource(
        &self,
        resource: GpuResourceId,
        subresource: u32,
        out: &mut Vec<u8>,
    ) -> Result<(), RenderError> {
        self.record(RecordedCall::ReadSubresource {
            resource,
            subresource,
        })?;
        let subresources = lock_unpoisoned(&self.subresources);
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
        self.record(RecordedCall::ResizeWindow {
            window,
            width,
            height,
        })?;
        self.update_window(window, |state| {
            state.width = width;
            state.height = height;
        });
        Ok(())
    }

    fn move_window(&self, window: RenderWindowId, left: i32, top: i32) -> Result<(), RenderError> {
        self.record(RecordedCall::MoveWindow { window, left, top })?;
        self.update_window(window, |state| {
            state.left = left;
            state.top = top;
        });
        Ok(())
    }

    fn show_window(&self, window: RenderWindowId) -> Result<(), RenderError> {
        self.record(RecordedCall::ShowWindow(window))?;
        self.update_window(window, |state| state.visible = true);
        Ok(())
    }

    fn hide_window(&self, window: RenderWindowId) -> Result<(), RenderError> {
        self.record(RecordedCall::HideWindow(window))?;
        self.update_window(window, |state| state.visible = false);
        Ok(())
    }

    fn create_event_query(&self) -> Result<Box<dyn EventQuery>, RenderError> {
        if let Some(err) = lock_unpoisoned(&self.pending_failure).take() {
            log::debug!("Headless backend failing event query creation on request: {err}");
            return Err(err);
        }
        Ok(Box::new(HeadlessEventQuery::new(Arc::clone(&self.fence))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_calls_in_order() {
        let rs = HeadlessRenderSystem::new();
        rs.begin_frame().unwrap();
        rs.draw(0, 3).unwrap();
        rs.end_frame().unwrap();

        assert_eq!(
            rs.take_calls(),
            vec![
                RecordedCall::BeginFrame,
                RecordedCall::Draw {
                    vertex_offset: 0,
                    vertex_count: 3
                },
                RecordedCall::EndFrame,
            ]
        );
        assert_eq!(rs.call_count(), 0);
        assert_eq!(rs.fence().submitted(), 1);
    }

    #[test]
    fn test_subresource_round_trip() {
        let rs = HeadlessRenderSystem::new();
        let texture = GpuResourceId::Texture(TextureId(3));
        let mut out = Vec::new();

        assert!(matches!(
            rs.read_subresource(texture, 0, &mut out),
            Err(RenderError::ResourceError(ResourceError::SubresourceNotFound { .. }))
        ));
        rs.write_subresource(texture, 0, &[1, 2, 3], false).unwrap();
        rs.read_subresource(texture, 0, &mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn test_injected_failure_is_not_recorded() {
        let rs = HeadlessRenderSystem::new();
        rs.fail_next_call(RenderError::DeviceLost);
        assert!(rs.end_frame().is_err());
        assert_eq!(rs.call_count(), 0);
        assert_eq!(rs.fence().submitted(), 0);
        rs.end_frame().unwrap();
        assert_eq!(rs.call_count(), 1);
    }

    #[test]
    fn test_injected_failure_applies_to_event_query_creation() {
        let rs = HeadlessRenderSystem::new();
        rs.fail_next_call(RenderError::DeviceLost);
        assert!(matches!(rs.create_event_query(), Err(RenderError::DeviceLost)));
        assert!(rs.create_event_query().is_ok());
        assert_eq!(rs.call_count(), 0);
    }

    #[test]
    fn test_window_state_tracks_calls() {
        let rs = HeadlessRenderSystem::new();
        let window = RenderWindowId(1);
        rs.resize_window(window, 800, 600).unwrap();
        rs.move_window(window, -10, 20).unwrap();
        rs.show_window(window).unwrap();

        assert_eq!(
            rs.window(window),
            Some(WindowState {
                width: 800,
                height: 600,
                left: -10,
                top: 20,
                visible: true,
            })
        );
        rs.hide_window(window).unwrap();
        assert_eq!(rs.window(window).map(|w| w.visible), Some(false));
    }

    #[test]
    fn test_manual_fence_holds_queries() {
        let rs = HeadlessRenderSystem::with_manual_fence();
        let query = rs.create_event_query().unwrap();
        query.begin();
        rs.swap_buffers(RenderTargetId(0)).unwrap();
        assert!(!query.is_ready());

        rs.fence().complete_all();
        assert!(query.is_ready());
    }
}
