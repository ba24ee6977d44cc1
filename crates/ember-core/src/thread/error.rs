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

use thiserror::Error;

/// Errors raised by the core thread and its accessors.
#[derive(Debug, Error)]
pub enum CoreThreadError {
    /// A thread-restricted operation was called from the wrong thread.
    #[error("{operation} must {expectation}")]
    WrongThread {
        /// The operation that was called.
        operation: &'static str,
        /// What the calling thread was expected to be.
        expectation: &'static str,
    },

    /// The core thread has been shut down and no longer accepts commands.
    #[error("the core thread has been shut down")]
    ShutDown,

    /// The worker thread could not be spawned.
    #[error("failed to spawn the core thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The worker thread exited before reporting that it started.
    #[error("the core thread exited during startup")]
    StartupFailed,

    /// The worker thread panicked outside of command playback.
    #[error("the core thread panicked")]
    WorkerPanicked,

    /// A frame allocator was recycled while allocations from its frame were still alive.
    #[error("frame allocator still has {live} live allocations and cannot be cleared")]
    FrameAllocInUse {
        /// Number of allocations still alive.
        live: usize,
    },
}

impl CoreThreadError {
    pub(crate) fn not_core_thread(operation: &'static str) -> Self {
        CoreThreadError::WrongThread {
            operation,
            expectation: "not be called from the core thread",
        }
    }

    pub(crate) fn requires_core_thread(operation: &'static str) -> Self {
        CoreThreadError::WrongThread {
            operation,
            expectation: "be called from the core thread",
        }
    }
}
