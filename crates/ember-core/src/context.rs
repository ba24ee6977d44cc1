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

use crate::object::{CoreObjectError, CoreObjectRegistry};
use crate::renderer::query::EventQueryManager;
use crate::renderer::traits::{HardwareBufferManager, RenderSystem};
use crate::settings::CoreThreadSettings;
use crate::thread::{CoreThread, CoreThreadError, CoreThreadHandle};
use std::sync::Arc;

/// Everything a core object needs to reach the GPU: the core thread, the
/// backend's managers and the registry of live objects.
///
/// Passed explicitly to constructors instead of living in a global.
#[derive(Debug)]
pub struct CoreContext {
    core_thread: Arc<CoreThread>,
    objects: Arc<CoreObjectRegistry>,
    buffers: Arc<dyn HardwareBufferManager>,
}

impl CoreContext {
    /// Starts the core thread over the given backend.
    ///
    /// ## Arguments
    /// * `settings` - How the core thread runs.
    /// * `render_system` - The backend commands are executed against.
    /// * `buffers` - The backend's buffer manager.
    ///
    /// ## Errors
    /// Returns an error if the core thread could not be started.
    pub fn new(
        settings: CoreThreadSettings,
        render_system: Arc<dyn RenderSystem>,
        buffers: Arc<dyn HardwareBufferManager>,
    ) -> Result<Self, CoreThreadError> {
        let core_thread = Arc::new(CoreThread::start(settings, render_system)?);
        Ok(Self {
            core_thread,
            objects: Arc::new(CoreObjectRegistry::new()),
            buffers,
        })
    }

    /// The core thread.
    pub fn core_thread(&self) -> &Arc<CoreThread> {
        &self.core_thread
    }

    /// Shortcut for `core_thread().handle()`.
    pub fn handle(&self) -> &CoreThreadHandle {
        self.core_thread.handle()
    }

    /// Registry of live core objects.
    pub fn objects(&self) -> &Arc<CoreObjectRegistry> {
        &self.objects
    }

    /// The backend's buffer manager.
    pub fn buffers(&self) -> &Arc<dyn HardwareBufferManager> {
        &self.buffers
    }

    /// The backend's render system.
    pub fn render_system(&self) -> &Arc<dyn RenderSystem> {
        self.core_thread.render_system()
    }

    /// Event queries polled every frame.
    pub fn queries(&self) -> &Arc<EventQueryManager> {
        self.core_thread.queries()
    }

    /// Shuts the core thread down, running everything still queued, then checks
    /// that no core object outlived it.
    ///
    /// ## Errors
    /// * `CoreObjectError::CoreThread` - If the core thread failed to stop.
    /// * `CoreObjectError::LeakedObjects` - If objects are still alive.
    pub fn shutdown(self) -> Result<(), CoreObjectError> {
        self.core_thread.shutdown()?;
        self.objects.ensure_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{CoreObject, CoreObjectBase, CoreObjectPtr};
    use crate::test_support::{MemoryBufferManager, RecordingRenderSystem};

    struct Plain {
        base: CoreObjectBase,
    }

    impl CoreObject for Plain {
        fn base(&self) -> &CoreObjectBase {
            &self.base
        }
    }

    fn context() -> CoreContext {
        CoreContext::new(
            CoreThreadSettings::default(),
            Arc::new(RecordingRenderSystem::default()),
            Arc::new(MemoryBufferManager::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_clean_shutdown() {
        let ctx = context();
        let ptr = CoreObjectPtr::create(Plain {
            base: CoreObjectBase::new::<Plain>(&ctx, true),
        })
        .unwrap();
        ptr.synchronize().unwrap();
        drop(ptr);

        ctx.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_reports_leaked_objects() {
        let ctx = context();
        let leaked = CoreObjectPtr::new(Plain {
            base: CoreObjectBase::new::<Plain>(&ctx, false),
        });

        assert!(matches!(
            ctx.shutdown(),
            Err(CoreObjectError::LeakedObjects { count: 1 })
        ));
        drop(leaked);
    }
}
