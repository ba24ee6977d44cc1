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

//! End-to-end tests of the command pipeline over the headless backend.

use ember_core::object::{CoreObject, CoreObjectBase, CoreObjectPtr};
use ember_core::renderer::api::*;
use ember_core::renderer::error::RenderError;
use ember_core::renderer::traits::HardwareBufferManager;
use ember_core::renderer::GpuResourceData;
use ember_core::{CoreContext, CoreThreadSettings, ThreadingMode};
use ember_infra::{HeadlessBufferManager, HeadlessRenderSystem, RecordedCall};
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;

fn headless(
    threading: ThreadingMode,
) -> (CoreContext, Arc<HeadlessRenderSystem>, Arc<HeadlessBufferManager>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let rs = Arc::new(HeadlessRenderSystem::new());
    let buffers = Arc::new(HeadlessBufferManager::new());
    let settings = CoreThreadSettings {
        threading,
        enforce_thread_checks: true,
        ..Default::default()
    };
    let ctx = CoreContext::new(settings, rs.clone(), buffers.clone()).unwrap();
    (ctx, rs, buffers)
}

#[test]
fn test_accessor_submission_is_one_contiguous_batch() {
    let (ctx, rs, _) = headless(ThreadingMode::Dedicated);
    let before = ctx.core_thread().stats();
    let barrier = Arc::new(Barrier::new(2));

    let core = Arc::clone(ctx.core_thread());
    let gate = Arc::clone(&barrier);
    let a = thread::spawn(move || {
        let accessor = core.accessor();
        accessor.set_texture(GpuProgramType::Vertex, 0, true, TextureId(1));
        accessor.draw(0, 6);
        gate.wait();
        accessor.submit_to_core_thread(true).unwrap();
    });

    let core = Arc::clone(ctx.core_thread());
    let gate = Arc::clone(&barrier);
    let b = thread::spawn(move || {
        let accessor = core.accessor();
        for i in 0..20 {
            accessor.draw(100 + i, 3);
        }
        gate.wait();
        accessor.submit_to_core_thread(true).unwrap();
    });
    a.join().unwrap();
    b.join().unwrap();

    // One global entry per submission, not per command.
    let after = ctx.core_thread().stats();
    assert_eq!(after.commands - before.commands, 2);

    let calls = rs.calls();
    assert_eq!(calls.len(), 22);
    let texture = calls
        .iter()
        .position(|call| {
            *call
                == RecordedCall::SetTexture {
                    stage: GpuProgramType::Vertex,
                    unit: 0,
                    enabled: true,
                    texture: TextureId(1),
                }
        })
        .unwrap();
    assert_eq!(
        calls[texture + 1],
        RecordedCall::Draw {
            vertex_offset: 0,
            vertex_count: 6
        }
    );

    // The other thread's draws form one uninterrupted run, in queue order.
    let first_b = calls
        .iter()
        .position(|call| matches!(call, RecordedCall::Draw { vertex_offset: 100, .. }))
        .unwrap();
    for i in 0..20u32 {
        assert_eq!(
            calls[first_b + i as usize],
            RecordedCall::Draw {
                vertex_offset: 100 + i,
                vertex_count: 3
            }
        );
    }
}

#[test]
fn test_synced_accessor_is_shared_between_threads() {
    let (ctx, rs, _) = headless(ThreadingMode::Dedicated);
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let accessor = Arc::clone(ctx.core_thread().synced_accessor());
            thread::spawn(move || {
                for i in 0..10 {
                    accessor.draw(t * 100 + i, 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    ctx.core_thread()
        .synced_accessor()
        .submit_to_core_thread(true)
        .unwrap();
    assert_eq!(rs.call_count(), 40);
}

#[test]
fn test_subresource_round_trip_through_accessor() {
    let (ctx, _, _) = headless(ThreadingMode::Dedicated);
    let accessor = ctx.core_thread().accessor();
    let texture = GpuResourceId::Texture(TextureId(4));

    let upload = Arc::new(GpuResourceData::from_slice(&[1u32, 2, 3, 4]));
    let written = accessor.write_subresource(texture, 0, &upload, false);
    assert!(upload.is_locked());
    assert!(matches!(
        upload.write(0, &[9]),
        Err(ember_core::renderer::ResourceError::Locked)
    ));

    let download = Arc::new(GpuResourceData::default());
    let read = accessor.read_subresource(texture, 0, &download);
    accessor.submit_to_core_thread(true).unwrap();

    assert!(written.is_resolved() && !written.is_failed());
    assert!(read.is_resolved() && !read.is_failed());
    assert!(!upload.is_locked());
    assert_eq!(download.to_pod_vec::<u32>(), Some(vec![1, 2, 3, 4]));
}

#[test]
fn test_failed_backend_call_fails_the_op() {
    let (ctx, _, _) = headless(ThreadingMode::Dedicated);
    let accessor = ctx.core_thread().accessor();
    let data = Arc::new(GpuResourceData::default());

    let op = accessor.read_subresource(GpuResourceId::Buffer(BufferId(99)), 0, &data);
    accessor.submit_to_core_thread(true).unwrap();

    assert!(op.is_failed());
    assert!(op.failure().is_some_and(|reason| reason.contains("99")));
}

#[test]
fn test_event_query_fires_after_frame_ends() {
    let (ctx, rs, _) = headless(ThreadingMode::Dedicated);
    let queries = Arc::clone(ctx.queries());
    let (tx, rx) = mpsc::channel();

    let query = queries.create().unwrap();
    let armed = Arc::clone(&queries);
    ctx.core_thread()
        .queue_command(
            move || {
                armed
                    .begin(query, move || tx.send(()).unwrap())
                    .unwrap();
            },
            true,
        )
        .unwrap();

    // Nothing has been submitted since the query began.
    ctx.core_thread().update().unwrap();
    ctx.core_thread().queue_command(|| {}, true).unwrap();
    assert!(rx.try_recv().is_err());

    let accessor = ctx.core_thread().accessor();
    accessor.begin_frame();
    accessor.end_frame();
    accessor.submit_to_core_thread(true).unwrap();
    assert_eq!(rs.fence().submitted(), 1);

    ctx.core_thread().update().unwrap();
    ctx.core_thread().queue_command(|| {}, true).unwrap();
    assert!(rx.try_recv().is_ok());
    assert_eq!(queries.pending(), 0);
}

#[test]
fn test_inline_mode_executes_on_the_calling_thread() {
    let (ctx, rs, _) = headless(ThreadingMode::Inline);
    let accessor = ctx.core_thread().accessor();
    accessor.show_window(RenderWindowId(2));
    accessor.resize_window(RenderWindowId(2), 640, 480);
    accessor.submit_to_core_thread(false).unwrap();

    let window = rs.window(RenderWindowId(2)).unwrap();
    assert!(window.visible);
    assert_eq!((window.width, window.height), (640, 480));
}

/// A vertex buffer owned through the core object lifecycle.
struct VertexBuffer {
    base: CoreObjectBase,
    buffers: Arc<dyn HardwareBufferManager>,
    id: Mutex<Option<BufferId>>,
}

impl CoreObject for VertexBuffer {
    fn base(&self) -> &CoreObjectBase {
        &self.base
    }

    fn initialize_internal(&self) -> Result<(), RenderError> {
        let id = self
            .buffers
            .create_vertex_buffer(16, 64, BufferUsage::Static)?;
        *self.id.lock().unwrap() = Some(id);
        Ok(())
    }

    fn destroy_internal(&self) {
        if let Some(id) = self.id.lock().unwrap().take() {
            self.buffers.destroy_buffer(id).unwrap();
        }
    }
}

#[test]
fn test_core_object_releases_backend_buffer() {
    let (ctx, _, buffers) = headless(ThreadingMode::Dedicated);
    let vb = CoreObjectPtr::create(VertexBuffer {
        base: CoreObjectBase::new::<VertexBuffer>(&ctx, true),
        buffers: Arc::clone(ctx.buffers()),
        id: Mutex::new(None),
    })
    .unwrap();
    vb.synchronize().unwrap();
    assert_eq!(buffers.live_buffers(), 1);
    assert_eq!(buffers.allocated_bytes(), 1024);

    drop(vb);
    ctx.shutdown().unwrap();
    assert_eq!(buffers.live_buffers(), 0);
}
