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

//! Startup configuration of the core thread.

use serde::{Deserialize, Serialize};

/// Where core thread commands execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadingMode {
    /// A dedicated worker thread owns every graphics call.
    #[default]
    Dedicated,
    /// The thread that starts the core thread is the core thread; commands
    /// run when they are submitted.
    Inline,
}

/// Settings used by [`CoreThread::start`](crate::thread::CoreThread::start).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreThreadSettings {
    /// Whether to spawn a worker thread.
    pub threading: ThreadingMode,
    /// Name given to the worker thread.
    pub thread_name: String,
    /// Enables the thread-affinity and lifecycle checks.
    pub enforce_thread_checks: bool,
    /// Bytes reserved up front by each of the two frame allocators.
    pub frame_alloc_capacity: usize,
}

impl Default for CoreThreadSettings {
    fn default() -> Self {
        Self {
            threading: ThreadingMode::Dedicated,
            thread_name: "ember-core".to_string(),
            enforce_thread_checks: cfg!(debug_assertions),
            frame_alloc_capacity: 1024 * 1024,
        }
    }
}

impl CoreThreadSettings {
    /// Parses settings from JSON. Missing fields take their default value.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the settings as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings =
            CoreThreadSettings::from_json_str(r#"{ "threading": "inline", "thread_name": "gpu" }"#)
                .unwrap();
        assert_eq!(settings.threading, ThreadingMode::Inline);
        assert_eq!(settings.thread_name, "gpu");
        assert_eq!(
            settings.frame_alloc_capacity,
            CoreThreadSettings::default().frame_alloc_capacity
        );
    }

    #[test]
    fn test_unknown_threading_mode_is_rejected() {
        assert!(CoreThreadSettings::from_json_str(r#"{ "threading": "fibers" }"#).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let settings = CoreThreadSettings {
            enforce_thread_checks: true,
            ..Default::default()
        };
        let json = settings.to_json_string().unwrap();
        assert_eq!(CoreThreadSettings::from_json_str(&json).unwrap(), settings);
    }
}
