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

//! Handles, enums and small descriptors shared between the command pipeline
//! and the render system backends.
//!
//! The actual resources live inside the backend. The pipeline only moves these
//! opaque handles from the simulation side to the core thread.

use crate::ember_bitflags;
use serde::{Deserialize, Serialize};

macro_rules! resource_id {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);
    };
}

resource_id!(
    /// An opaque handle to a texture owned by the render backend.
    TextureId
);
resource_id!(
    /// An opaque handle to a sampler state object.
    SamplerStateId
);
resource_id!(
    /// An opaque handle to a blend state object.
    BlendStateId
);
resource_id!(
    /// An opaque handle to a rasterizer state object.
    RasterizerStateId
);
resource_id!(
    /// An opaque handle to a depth/stencil state object.
    DepthStencilStateId
);
resource_id!(
    /// An opaque handle to a render target (window or texture target).
    RenderTargetId
);
resource_id!(
    /// An opaque handle to a render window.
    RenderWindowId
);
resource_id!(
    /// An opaque handle to a GPU buffer (vertex, index or parameter block).
    BufferId
);
resource_id!(
    /// An opaque handle to a vertex declaration.
    VertexDeclarationId
);
resource_id!(
    /// An opaque handle to a compiled GPU program.
    GpuProgramId
);
resource_id!(
    /// An opaque handle to a set of GPU program parameters.
    GpuParamsId
);

/// A resource that supports subresource reads and writes (textures, buffers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuResourceId {
    /// A texture; subresources are face/mip pairs flattened by the backend.
    Texture(TextureId),
    /// A buffer; it has a single subresource.
    Buffer(BufferId),
}

/// The pipeline stage a GPU program, texture or sampler is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuProgramType {
    /// Vertex stage.
    Vertex,
    /// Fragment (pixel) stage.
    Fragment,
    /// Geometry stage.
    Geometry,
    /// Hull (tessellation control) stage.
    Hull,
    /// Domain (tessellation evaluation) stage.
    Domain,
    /// Compute stage.
    Compute,
}

/// The primitive topology used by a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawOperation {
    /// A list of points.
    PointList,
    /// A list of lines.
    LineList,
    /// A strip of connected lines.
    LineStrip,
    /// A list of triangles.
    #[default]
    TriangleList,
    /// A strip of triangles.
    TriangleStrip,
    /// A fan of triangles.
    TriangleFan,
}

/// The element type stored in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    /// 16-bit indices.
    U16,
    /// 32-bit indices.
    #[default]
    U32,
}

impl IndexType {
    /// Size of one index in bytes.
    pub const fn size(self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// How a hardware buffer is expected to be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Written once, read many times.
    #[default]
    Static,
    /// Updated frequently from the CPU.
    Dynamic,
}

/// Synchronization hint for buffer writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferWriteType {
    /// The backend may stall until the GPU stops using the buffer.
    #[default]
    Normal,
    /// The previous contents may be discarded.
    Discard,
    /// The caller guarantees the written range is not in use by the GPU.
    NoOverwrite,
}

ember_bitflags! {
    /// Which buffers of a render target a clear operation touches.
    pub struct ClearFlags: u32 {
        /// Clear the color buffer.
        const COLOR = 1 << 0;
        /// Clear the depth buffer.
        const DEPTH = 1 << 1;
        /// Clear the stencil buffer.
        const STENCIL = 1 << 2;
    }
}

/// A normalized RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
    /// Alpha channel.
    pub a: f32,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);

    /// Creates a color from its four channels.
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

/// A viewport in normalized coordinates of a render target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// The target the viewport renders into.
    pub target: RenderTargetId,
    /// Left edge, `[0, 1]`.
    pub x: f32,
    /// Top edge, `[0, 1]`.
    pub y: f32,
    /// Width, `[0, 1]`.
    pub width: f32,
    /// Height, `[0, 1]`.
    pub height: f32,
}

/// A scissor rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScissorRect {
    /// Left edge.
    pub left: u32,
    /// Top edge.
    pub top: u32,
    /// Right edge.
    pub right: u32,
    /// Bottom edge.
    pub bottom: u32,
}
