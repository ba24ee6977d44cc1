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

//! Contracts the core thread calls into.
//!
//! - [`RenderSystem`]: the graphics API surface, called only from the core thread.
//! - [`HardwareBufferManager`]: creation and update of vertex, index and parameter buffers.
//! - [`EventQuery`]: a GPU marker that reports when prior work has completed.
//! - [`RenderableMesh`]: anything the accessor's `render` call can draw.

mod buffer_manager;
mod event_query;
mod render_system;
mod renderable_mesh;

pub use self::buffer_manager::HardwareBufferManager;
pub use self::event_query::EventQuery;
pub use self::render_system::RenderSystem;
pub use self::renderable_mesh::{MeshBinding, RenderableMesh};
