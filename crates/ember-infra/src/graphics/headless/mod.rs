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

//! A backend without a GPU.
//!
//! Useful for tests, servers and tools: every render call is recorded, buffers
//! live in CPU memory and event queries complete when the simulated GPU fence
//! passes them.

mod buffers;
mod fence;
mod system;

pub use self::buffers::{BufferKind, HeadlessBufferManager};
pub use self::fence::{GpuFence, HeadlessEventQuery};
pub use self::system::{HeadlessRenderSystem, RecordedCall, WindowState};
