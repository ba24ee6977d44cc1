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

//! # Ember Core
//!
//! The core-thread command pipeline: simulation threads record render work on
//! accessors, submit it to a single core thread that owns the GPU, and collect
//! results through async operations. Also home to the lifecycle of GPU-backed
//! core objects and the backend traits those objects talk to.

#![warn(missing_docs)]

pub mod context;
pub mod object;
pub mod renderer;
pub mod settings;
pub mod thread;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use context::CoreContext;
pub use object::{CoreObject, CoreObjectBase, CoreObjectError, CoreObjectPtr};
pub use settings::{CoreThreadSettings, ThreadingMode};
pub use thread::{
    AsyncOp, CoreAccessor, CoreThread, CoreThreadAccessor, CoreThreadError, SyncedCoreAccessor,
};
