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

//! A single-slot result handle filled in by the core thread.

use crate::utils::lock_unpoisoned;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};

enum AsyncOpOutcome {
    Value(Box<dyn Any + Send + Sync>),
    Defaulted,
    Failed(String),
}

#[derive(Default)]
struct AsyncOpState {
    outcome: OnceLock<AsyncOpOutcome>,
    // Guards the wait on `resolved`; the outcome itself lives in the OnceLock.
    waiters: Mutex<()>,
    resolved: Condvar,
}

impl AsyncOpState {
    fn resolve(&self, outcome: AsyncOpOutcome) -> bool {
        if self.outcome.set(outcome).is_err() {
            return false;
        }
        let _waiters = lock_unpoisoned(&self.waiters);
        self.resolved.notify_all();
        true
    }
}

/// The result of a command queued with a return value.
///
/// An `AsyncOp` is returned unresolved when the command is queued, and resolved
/// exactly once by the command's callback on the core thread. Clones share the
/// same slot, so the caller can poll any copy. Once resolved, the stored value
/// never changes.
#[derive(Clone, Default)]
pub struct AsyncOp {
    state: Arc<AsyncOpState>,
}

impl AsyncOp {
    /// Creates an unresolved operation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the operation has completed, successfully or not.
    pub fn is_resolved(&self) -> bool {
        self.state.outcome.get().is_some()
    }

    /// Returns `true` if the command producing the result failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.state.outcome.get(), Some(AsyncOpOutcome::Failed(_)))
    }

    /// The failure reason, if the operation failed.
    pub fn failure(&self) -> Option<&str> {
        match self.state.outcome.get() {
            Some(AsyncOpOutcome::Failed(reason)) => Some(reason),
            _ => None,
        }
    }

    /// The value the command produced.
    ///
    /// Returns `None` while unresolved, if the command completed without a
    /// value, if it failed, or if the value is not a `T`.
    pub fn return_value<T: Clone + 'static>(&self) -> Option<T> {
        match self.state.outcome.get() {
            Some(AsyncOpOutcome::Value(value)) => value.downcast_ref::<T>().cloned(),
            _ => None,
        }
    }

    /// Resolves the operation with `value`.
    ///
    /// Returns `false` and leaves the stored value untouched if the operation
    /// was already resolved.
    pub fn complete_operation<T: Any + Send + Sync>(&self, value: T) -> bool {
        self.state.resolve(AsyncOpOutcome::Value(Box::new(value)))
    }

    /// Resolves the operation without a value.
    pub fn complete_operation_empty(&self) -> bool {
        self.state.resolve(AsyncOpOutcome::Defaulted)
    }

    /// Resolves the operation as failed.
    pub fn fail_operation(&self, reason: impl Into<String>) -> bool {
        self.state.resolve(AsyncOpOutcome::Failed(reason.into()))
    }

    /// Parks the calling thread until the operation is resolved.
    ///
    /// Only use this from a thread other than the core thread, and only after the
    /// command was submitted, otherwise nothing will ever resolve it.
    pub fn block_until_complete(&self) {
        let mut waiters = lock_unpoisoned(&self.state.waiters);
        while !self.is_resolved() {
            waiters = self
                .state
                .resolved
                .wait(waiters)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl fmt::Debug for AsyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.outcome.get() {
            None => "pending",
            Some(AsyncOpOutcome::Value(_)) => "resolved",
            Some(AsyncOpOutcome::Defaulted) => "resolved (empty)",
            Some(AsyncOpOutcome::Failed(_)) => "failed",
        };
        f.debug_struct("AsyncOp").field("state", &state).finish()
    }
}
