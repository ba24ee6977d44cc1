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

use crate::mesh::MeshId;
use ember_core::object::CoreObjectError;
use ember_core::renderer::api::IndexType;
use ember_core::renderer::error::{RenderError, ResourceError};
use ember_core::thread::CoreThreadError;
use thiserror::Error;

/// Errors raised by mesh data validation and the mesh heap.
#[derive(Debug, Error)]
pub enum MeshHeapError {
    /// The mesh was built for a different vertex layout than the heap's.
    #[error("vertex stride mismatch: heap expects {expected} bytes per vertex, mesh has {actual}")]
    VertexStrideMismatch {
        /// Stride of the heap's layout.
        expected: u32,
        /// Stride of the mesh's layout.
        actual: u32,
    },

    /// The mesh uses a different index type than the heap.
    #[error("index type mismatch: heap expects {expected:?}, mesh has {actual:?}")]
    IndexTypeMismatch {
        /// Index type of the heap.
        expected: IndexType,
        /// Index type of the mesh.
        actual: IndexType,
    },

    /// A vertex or index stream has an invalid length.
    #[error("{stream} stream of {len} bytes is empty or not a multiple of its {element_size}-byte element")]
    InvalidStreamData {
        /// `"vertex"` or `"index"`.
        stream: &'static str,
        /// Length of the stream in bytes.
        len: usize,
        /// Size of one element in bytes.
        element_size: usize,
    },

    /// No allocation exists under this id.
    #[error("unknown mesh allocation {0:?}")]
    UnknownAllocation(MeshId),

    /// A chunk key no longer resolves to a chunk.
    #[error("stale chunk at slot {index}")]
    StaleChunk {
        /// Slot index of the key.
        index: u32,
    },

    /// A buffer would need more elements than fit in a `u32`.
    #[error("cannot grow a buffer to hold {requested} elements")]
    CapacityOverflow {
        /// Number of elements that were needed.
        requested: u64,
    },

    /// The operation is not available on this object.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The backend rejected a buffer operation.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The render system failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The heap's lifecycle failed.
    #[error(transparent)]
    CoreObject(#[from] CoreObjectError),

    /// The core thread rejected the call.
    #[error(transparent)]
    CoreThread(#[from] CoreThreadError),
}

impl From<MeshHeapError> for RenderError {
    fn from(err: MeshHeapError) -> Self {
        match err {
            MeshHeapError::Resource(err) => RenderError::ResourceError(err),
            MeshHeapError::Render(err) => err,
            MeshHeapError::Unsupported(what) => RenderError::Unsupported(what.to_string()),
            other => RenderError::RenderingFailed(other.to_string()),
        }
    }
}
