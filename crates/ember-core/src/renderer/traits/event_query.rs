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

use std::fmt::Debug;

/// A marker inserted into the GPU command stream.
///
/// Once the GPU has processed every command submitted before [`EventQuery::begin`],
/// [`EventQuery::is_ready`] returns `true`. Beginning the query again restarts it.
pub trait EventQuery: Send + Sync + Debug {
    /// Inserts the marker after all work submitted so far.
    fn begin(&self);

    /// Returns `true` once the GPU has passed the marker.
    fn is_ready(&self) -> bool;
}
