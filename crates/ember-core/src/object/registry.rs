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

use crate::object::CoreObjectError;
use crate::utils::lock_unpoisoned;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Unique id of a core object. `0` is never assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoreObjectId(pub u64);

impl fmt::Display for CoreObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tracks every live core object of a context.
///
/// Objects register themselves on construction and unregister when dropped.
/// The registry must be empty once the context shuts down; anything left is a
/// leaked GPU object.
#[derive(Debug)]
pub struct CoreObjectRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<CoreObjectId, &'static str>>,
}

impl Default for CoreObjectRegistry {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
        }
    }
}

impl CoreObjectRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, type_name: &'static str) -> CoreObjectId {
        let id = CoreObjectId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock_unpoisoned(&self.live).insert(id, type_name);
        id
    }

    pub(crate) fn unregister(&self, id: CoreObjectId) {
        lock_unpoisoned(&self.live).remove(&id);
    }

    /// Number of objects currently alive.
    pub fn live_count(&self) -> usize {
        lock_unpoisoned(&self.live).len()
    }

    /// Returns `true` if `id` belongs to a live object.
    pub fn contains(&self, id: CoreObjectId) -> bool {
        lock_unpoisoned(&self.live).contains_key(&id)
    }

    /// Fails if any object is still alive, logging each of them.
    pub fn ensure_empty(&self) -> Result<(), CoreObjectError> {
        let live = lock_unpoisoned(&self.live);
        if live.is_empty() {
            return Ok(());
        }

        let mut leaked: Vec<_> = live.iter().collect();
        leaked.sort_by_key(|(id, _)| **id);
        for (id, type_name) in leaked {
            log::error!("Leaked core object {type_name} {id}");
        }
        Err(CoreObjectError::LeakedObjects { count: live.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_non_zero() {
        let registry = CoreObjectRegistry::new();
        let a = registry.register("A");
        let b = registry.register("B");
        assert_ne!(a, b);
        assert_ne!(a.0, 0);
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn test_ensure_empty_reports_leaks() {
        let registry = CoreObjectRegistry::new();
        let id = registry.register("Leaky");
        assert!(matches!(
            registry.ensure_empty(),
            Err(CoreObjectError::LeakedObjects { count: 1 })
        ));

        registry.unregister(id);
        assert!(registry.ensure_empty().is_ok());
    }
}
