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

use ember_core::renderer::traits::EventQuery;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Simulated progress of the GPU.
///
/// Every frame the backend ends is one *submission*. The fence records how many
/// submissions were made and how many the "GPU" has finished. With automatic
/// completion, a submission is finished as soon as it is made.
#[derive(Debug)]
pub struct GpuFence {
    submitted: AtomicU64,
    completed: AtomicU64,
    auto_complete: bool,
}

impl GpuFence {
    /// Creates a fence. With `auto_complete`, every submission completes at once.
    pub fn new(auto_complete: bool) -> Self {
        Self {
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            auto_complete,
        }
    }

    /// Number of submissions made so far.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Acquire)
    }

    /// Number of submissions the GPU has finished.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Records a submission and returns its value.
    pub fn submit(&self) -> u64 {
        let value = self.submitted.fetch_add(1, Ordering::AcqRel) + 1;
        if self.auto_complete {
            self.completed.fetch_max(value, Ordering::AcqRel);
        }
        value
    }

    /// Finishes every submission made so far.
    pub fn complete_all(&self) {
        self.completed.fetch_max(self.submitted(), Ordering::AcqRel);
    }

    /// Returns `true` once submission `value` has finished.
    pub fn is_complete(&self, value: u64) -> bool {
        self.completed() >= value
    }
}

/// An event query that becomes ready when the fence passes the submission that
/// was open when it began.
#[derive(Debug)]
pub struct HeadlessEventQuery {
    fence: Arc<GpuFence>,
    // 0 until begun.
    target: AtomicU64,
}

impl HeadlessEventQuery {
    /// Creates a query that has not begun yet.
    pub fn new(fence: Arc<GpuFence>) -> Self {
        Self {
            fence,
            target: AtomicU64::new(0),
        }
    }
}

impl EventQuery for HeadlessEventQuery {
    fn begin(&self) {
        self.target
            .store(self.fence.submitted() + 1, Ordering::Release);
    }

    fn is_ready(&self) -> bool {
        let target = self.target.load(Ordering::Acquire);
        target != 0 && self.fence.is_complete(target)
    }
}
