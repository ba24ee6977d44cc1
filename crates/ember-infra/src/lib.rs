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

//! # Ember Infra
//!
//! Concrete implementations of the collaborator traits declared in `ember-core`.
//! The only backend so far is the headless one, which keeps every resource in
//! CPU memory and simulates GPU progress with a fence counter.

#![warn(missing_docs)]

pub mod graphics;

#[cfg(feature = "headless")]
pub use graphics::headless::{
    BufferKind, GpuFence, HeadlessBufferManager, HeadlessEventQuery, HeadlessRenderSystem,
    RecordedCall, WindowState,
};
