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

//! The deferred command pipeline between simulation threads and the core thread.
//!
//! Simulation code records render calls on a [`CoreThreadAccessor`], which buffers
//! them in a private [`CommandQueue`]. Submitting the accessor pushes the whole
//! buffer as a single entry onto the [`CoreThread`]'s global queue, where the
//! worker plays it back. Results come back through [`AsyncOp`]s.

mod accessor;
mod async_op;
pub mod breakpoint;
mod command_queue;
mod core_thread;
mod error;
mod frame_alloc;

pub use self::accessor::{CoreAccessor, CoreThreadAccessor, SyncedCoreAccessor};
pub use self::async_op::AsyncOp;
pub use self::command_queue::{
    CommandBatch, CommandQueue, QueueState, QueueSync, QueuedCommand, Synced, Unsynced,
};
pub use self::core_thread::{CoreThread, CoreThreadHandle, CoreThreadStats};
pub use self::error::CoreThreadError;
pub use self::frame_alloc::{FrameAlloc, FrameBytes};
