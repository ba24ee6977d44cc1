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

//! Defines the error types reported by render system backends.

use crate::renderer::api::{BufferId, GpuResourceId};
use std::fmt;

/// An error related to the creation or use of a GPU resource (buffers, textures, queries).
#[derive(Debug)]
pub enum ResourceError {
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// The buffer does not exist in the backend.
    BufferNotFound(BufferId),
    /// The subresource does not exist on the resource.
    SubresourceNotFound {
        /// The resource that was addressed.
        resource: GpuResourceId,
        /// The requested subresource index.
        subresource: u32,
    },
    /// An access was made outside the bounds of a resource.
    OutOfBounds {
        /// First byte of the access.
        offset: u64,
        /// Length of the access in bytes.
        len: u64,
        /// Size of the resource in bytes.
        size: u64,
    },
    /// The resource data is locked by an in-flight core thread operation.
    Locked,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::BufferNotFound(id) => write!(f, "Buffer not found: {id:?}"),
            ResourceError::SubresourceNotFound {
                resource,
                subresource,
            } => {
                write!(f, "Subresource {subresource} not found on {resource:?}")
            }
            ResourceError::OutOfBounds { offset, len, size } => {
                write!(
                    f,
                    "Resource access out of bounds: range [{offset}, {}) exceeds size {size}",
                    offset + len
                )
            }
            ResourceError::Locked => {
                write!(f, "Resource data is locked by a pending core thread operation.")
            }
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// A high-level error raised by a render system call.
#[derive(Debug)]
pub enum RenderError {
    /// A critical rendering operation failed.
    RenderingFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// The operation is not supported by this object or backend.
    Unsupported(String),
    /// The graphics device was lost.
    DeviceLost,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::RenderingFailed(msg) => {
                write!(f, "A critical rendering operation failed: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::Unsupported(msg) => write!(f, "Unsupported operation: {msg}"),
            RenderError::DeviceLost => write!(
                f,
                "The graphics device was lost and needs to be reinitialized."
            ),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}
