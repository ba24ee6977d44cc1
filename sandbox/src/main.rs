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

// Ember Sandbox
// Drives the core thread and a mesh heap over the headless backend.

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use ember_core::renderer::api::{DrawOperation, GpuProgramType, RenderTargetId, TextureId};
use ember_core::{CoreContext, CoreThreadSettings};
use ember_data::mesh::{Indices, UseFlags};
use ember_data::{MeshData, MeshHeap, MeshHeapDesc, VertexLayout};
use ember_infra::{HeadlessBufferManager, HeadlessRenderSystem};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
}

const QUAD: &[Vertex] = &[
    Vertex {
        position: [-0.5, -0.5, 0.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
    },
    Vertex {
        position: [0.5, 0.5, 0.0],
    },
    Vertex {
        position: [-0.5, 0.5, 0.0],
    },
];

const QUAD_INDICES: &[u32] = &[0, 1, 2, 2, 3, 0];

/// Settings come from the JSON file given as the first argument, if any.
fn load_settings() -> Result<CoreThreadSettings> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading core thread settings from {path}"))?;
            CoreThreadSettings::from_json_str(&json)
                .with_context(|| format!("parsing core thread settings from {path}"))
        }
        None => Ok(CoreThreadSettings::default()),
    }
}

/// Two threads record into their own accessors and submit concurrently.
fn run_accessors(ctx: &CoreContext) -> Result<()> {
    let workers: Vec<_> = (0..2u32)
        .map(|worker| {
            let core = Arc::clone(ctx.core_thread());
            thread::spawn(move || -> Result<()> {
                let accessor = core.accessor();
                accessor.set_texture(GpuProgramType::Vertex, 0, true, TextureId(worker as usize));
                accessor.draw(worker * 6, 6);
                accessor.submit_to_core_thread(true)?;
                Ok(())
            })
        })
        .collect();

    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("accessor thread panicked"))??;
    }
    Ok(())
}

/// Allocates a few quads, draws them and releases them once the GPU caught up.
fn run_mesh_heap(ctx: &CoreContext, rs: &HeadlessRenderSystem) -> Result<()> {
    let heap = MeshHeap::create(
        ctx,
        MeshHeapDesc {
            initial_vertices: 8,
            initial_indices: 12,
            ..Default::default()
        },
    )?;

    let accessor = ctx.core_thread().accessor();
    let mut meshes = Vec::new();
    for _ in 0..4 {
        let data = MeshData::from_vertices(
            VertexLayout::position(),
            QUAD,
            Indices::U32(QUAD_INDICES.to_vec()),
        )?;
        let mesh = heap.alloc(data, DrawOperation::TriangleList)?;
        accessor.render(mesh.clone(), 0, 0, true, mesh.draw_operation());
        meshes.push(mesh);
    }
    accessor.end_frame();
    accessor.swap_buffers(RenderTargetId(0));
    accessor.submit_to_core_thread(true)?;

    for mesh in &meshes {
        heap.dealloc(mesh)?;
    }
    ctx.core_thread().update()?;
    ctx.core_thread().queue_command(|| {}, true)?;

    let snapshot = heap.core().snapshot();
    log::info!(
        "Mesh heap holds {} vertices and {} indices after {} allocations",
        snapshot.vertex_capacity,
        snapshot.index_capacity,
        meshes.len()
    );
    let released = meshes
        .iter()
        .filter(|mesh| heap.core().use_flags(mesh.id()) == UseFlags::Free)
        .count();
    log::info!("{released} of {} meshes released, {} calls recorded", meshes.len(), rs.call_count());
    Ok(())
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings = load_settings()?;
    let rs = Arc::new(HeadlessRenderSystem::new());
    let buffers = Arc::new(HeadlessBufferManager::new());
    let ctx = CoreContext::new(settings, rs.clone(), buffers.clone())?;

    run_accessors(&ctx)?;
    run_mesh_heap(&ctx, &rs)?;

    let stats = ctx.core_thread().stats();
    log::info!(
        "Played back {} commands in {} batches; {} buffers still alive",
        stats.commands,
        stats.batches,
        buffers.live_buffers()
    );
    ctx.shutdown()?;
    Ok(())
}
