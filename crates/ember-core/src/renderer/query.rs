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

//! Polling of GPU event queries and dispatch of their completion callbacks.

use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::{EventQuery, RenderSystem};
use crate::utils::lock_unpoisoned;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Identifies a query owned by an [`EventQueryManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventQueryId(pub usize);

type QueryCallback = Box<dyn FnOnce() + Send>;

struct QuerySlot {
    query: Box<dyn EventQuery>,
    callback: Option<QueryCallback>,
}

#[derive(Default)]
struct QueryState {
    slots: Vec<Option<QuerySlot>>,
    free: Vec<usize>,
}

/// Owns the event queries created through the render system and fires their
/// callbacks once the GPU passes them.
///
/// [`EventQueryManager::update`] is queued once per frame by
/// [`CoreThread::update`](crate::thread::CoreThread::update), so callbacks run on the core thread.
pub struct EventQueryManager {
    render_system: Arc<dyn RenderSystem>,
    state: Mutex<QueryState>,
}

impl EventQueryManager {
    /// Creates an empty manager creating its queries through `render_system`.
    pub fn new(render_system: Arc<dyn RenderSystem>) -> Self {
        Self {
            render_system,
            state: Mutex::new(QueryState::default()),
        }
    }

    /// Creates a query, reusing a released slot when possible.
    pub fn create(&self) -> Result<EventQueryId, RenderError> {
        let query = self.render_system.create_event_query()?;
        let mut state = lock_unpoisoned(&self.state);
        let slot = QuerySlot {
            query,
            callback: None,
        };
        let index = match state.free.pop() {
            Some(index) => {
                state.slots[index] = Some(slot);
                index
            }
            None => {
                state.slots.push(Some(slot));
                state.slots.len() - 1
            }
        };
        Ok(EventQueryId(index))
    }

    /// Starts (or restarts) the query and arms `callback` to fire once it completes.
    ///
    /// A callback armed by a previous `begin` that has not fired yet is dropped.
    pub fn begin<F>(&self, id: EventQueryId, callback: F) -> Result<(), ResourceError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock_unpoisoned(&self.state);
        let slot = state
            .slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ResourceError::InvalidHandle)?;
        slot.query.begin();
        slot.callback = Some(Box::new(callback));
        Ok(())
    }

    /// Disarms the query without firing its callback.
    pub fn clear(&self, id: EventQueryId) {
        let mut state = lock_unpoisoned(&self.state);
        if let Some(Some(slot)) = state.slots.get_mut(id.0) {
            slot.callback = None;
        }
    }

    /// Destroys the query; its slot may be handed out again by [`EventQueryManager::create`].
    pub fn release(&self, id: EventQueryId) {
        let mut state = lock_unpoisoned(&self.state);
        if let Some(slot) = state.slots.get_mut(id.0) {
            if slot.take().is_some() {
                state.free.push(id.0);
            }
        }
    }

    /// Number of armed queries that have not fired yet.
    pub fn pending(&self) -> usize {
        lock_unpoisoned(&self.state)
            .slots
            .iter()
            .flatten()
            .filter(|slot| slot.callback.is_some())
            .count()
    }

    /// Polls every armed query and runs the callbacks of those that completed.
    ///
    /// Callbacks run after the internal lock is released, so they may call back
    /// into the manager. Returns the number of callbacks fired.
    pub fn update(&self) -> usize {
        let ready: Vec<QueryCallback> = {
            let mut state = lock_unpoisoned(&self.state);
            state
                .slots
                .iter_mut()
                .flatten()
                .filter(|slot| slot.callback.is_some() && slot.query.is_ready())
                .filter_map(|slot| slot.callback.take())
                .collect()
        };

        let fired = ready.len();
        for callback in ready {
            callback();
        }
        if fired > 0 {
            log::trace!("{fired} event queries completed");
        }
        fired
    }
}

impl fmt::Debug for EventQueryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_unpoisoned(&self.state);
        f.debug_struct("EventQueryManager")
            .field("live", &state.slots.iter().flatten().count())
            .field("free", &state.free.len())
            .finish()
    }
}
