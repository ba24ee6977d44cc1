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

//! Backend-agnostic rendering contracts consumed by the core thread.
//!
//! This module defines the handles and commands the simulation side queues, the
//! traits a graphics backend implements ([`RenderSystem`], [`HardwareBufferManager`],
//! [`EventQuery`]) and the error types those backends report. Concrete backends
//! live in the `ember-infra` crate.

pub mod api;
pub mod command;
pub mod error;
pub mod query;
pub mod resource_data;
pub mod traits;

pub use self::api::*;
pub use self::command::RenderCommand;
pub use self::error::{RenderError, ResourceError};
pub use self::query::{EventQueryId, EventQueryManager};
pub use self::resource_data::{GpuResourceData, ResourceDataLock};
pub use self::traits::{EventQuery, HardwareBufferManager, MeshBinding, RenderSystem, RenderableMesh};
