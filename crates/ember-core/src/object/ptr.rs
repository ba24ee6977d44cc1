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

//! Owning handles to core objects.

use crate::object::base::{run_destroy, run_initialize, CoreObject, CoreObjectState};
use crate::object::{CoreObjectError, CoreObjectId};
use crate::thread::{AsyncOp, CoreThreadError};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

struct Owner<T: CoreObject> {
    object: Arc<T>,
}

impl<T: CoreObject> Drop for Owner<T> {
    fn drop(&mut self) {
        // The last owner is gone. If the object still holds GPU resources, queue
        // its destruction; the queued command keeps it alive until it has run.
        if !self.object.base().needs_delayed_destroy() {
            return;
        }
        if let Err(err) = destroy_object(&self.object) {
            log::warn!(
                "Delayed destruction of {} {} failed: {err}",
                self.object.base().type_name(),
                self.object.base().id()
            );
        }
    }
}

/// Destroys `object`, on the core thread if it requires it.
///
/// Falls back to destroying inline if the core thread has already shut down.
fn destroy_object<T: CoreObject>(object: &Arc<T>) -> Result<(), CoreObjectError> {
    let base = object.base();
    if !base.begin_destroy()? {
        run_destroy(&**object);
        return Ok(());
    }

    let queued = Arc::clone(object);
    match base
        .core_thread()
        .queue_command(move || run_destroy(&*queued), false)
    {
        Ok(()) => Ok(()),
        Err(CoreThreadError::ShutDown) => {
            log::warn!(
                "Core thread is shut down; destroying {} {} on the calling thread",
                base.type_name(),
                base.id()
            );
            run_destroy(&**object);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// The owning handle of a [`CoreObject`].
///
/// Clones share ownership. When the last handle is dropped, an object that was
/// initialized is destroyed through the core thread: the destroy command holds
/// its own strong reference, so the object outlives every command queued before
/// it. Commands queued through [`CoreObjectPtr::queue_gpu_command`] also hold one.
pub struct CoreObjectPtr<T: CoreObject> {
    owner: Arc<Owner<T>>,
}

impl<T: CoreObject> CoreObjectPtr<T> {
    /// Takes ownership of a constructed, not yet initialized object.
    pub fn new(object: T) -> Self {
        Self {
            owner: Arc::new(Owner {
                object: Arc::new(object),
            }),
        }
    }

    /// Takes ownership of `object` and initializes it.
    pub fn create(object: T) -> Result<Self, CoreObjectError> {
        let ptr = Self::new(object);
        ptr.initialize()?;
        Ok(ptr)
    }

    /// Initializes the object.
    ///
    /// When the object requires the core thread and the caller is not on it,
    /// initialization is queued and this returns right away; use
    /// [`CoreObjectPtr::synchronize`] to wait for it. Otherwise initialization
    /// runs now and its failure is returned.
    /// ## Errors
    /// * `CoreObjectError::AlreadyInitialized` - If called a second time.
    /// * `CoreObjectError::InitializationFailed` - If synchronous initialization failed.
    #[track_caller]
    pub fn initialize(&self) -> Result<(), CoreObjectError> {
        let object = &self.owner.object;
        let base = object.base();
        if !base.begin_initialize()? {
            return run_initialize(&**object);
        }

        let queued = Arc::clone(object);
        let result = base.core_thread().queue_command(
            move || {
                // Failures are logged and published to waiters by `run_initialize`.
                let _ = run_initialize(&*queued);
            },
            false,
        );
        if let Err(err) = result {
            base.cancel_initialize();
            return Err(err.into());
        }
        Ok(())
    }

    /// Destroys the object.
    ///
    /// The destruction is queued on the core thread when the object requires it.
    /// ## Errors
    /// * `CoreObjectError::NotInitialized` - If `initialize` was never called.
    /// * `CoreObjectError::Destroyed` - If already destroyed or scheduled for it.
    pub fn destroy(&self) -> Result<(), CoreObjectError> {
        destroy_object(&self.owner.object)
    }

    /// Blocks until the object is initialized.
    /// ## Errors
    /// * `CoreObjectError::NotScheduled` - If nothing will ever initialize it.
    /// * `CoreObjectError::WaitOnCoreThread` - If called from the core thread.
    /// * `CoreObjectError::InitializationFailed` - If initialization failed.
    pub fn synchronize(&self) -> Result<(), CoreObjectError> {
        self.owner.object.base().wait_until_initialized()
    }

    /// Same as [`CoreObjectPtr::synchronize`].
    pub fn wait_until_initialized(&self) -> Result<(), CoreObjectError> {
        self.synchronize()
    }

    /// Returns `true` once initialization completed successfully.
    pub fn is_initialized(&self) -> bool {
        self.owner.object.base().is_initialized()
    }

    /// The current lifecycle state.
    pub fn state(&self) -> CoreObjectState {
        self.owner.object.base().state()
    }

    /// The object's id.
    pub fn id(&self) -> CoreObjectId {
        self.owner.object.base().id()
    }

    /// A strong reference to the object that does not count as an owner.
    ///
    /// Holding it keeps the memory alive but does not delay destruction when
    /// the last [`CoreObjectPtr`] is dropped.
    pub fn shared(&self) -> Arc<T> {
        Arc::clone(&self.owner.object)
    }

    /// Returns `true` if both handles own the same object.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.owner, &b.owner)
    }

    /// Queues `callback` on the core thread with a reference to the object.
    ///
    /// The object stays alive until the callback has run.
    #[track_caller]
    pub fn queue_gpu_command<F>(&self, callback: F) -> Result<(), CoreObjectError>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let object = self.shared();
        self.owner
            .object
            .base()
            .core_thread()
            .queue_command(move || callback(&object), false)
            .map_err(Into::into)
    }

    /// Queues `callback` on the core thread and returns the op it resolves.
    #[track_caller]
    pub fn queue_return_gpu_command<F>(&self, callback: F) -> Result<AsyncOp, CoreObjectError>
    where
        F: FnOnce(&T, &AsyncOp) + Send + 'static,
    {
        let object = self.shared();
        self.owner
            .object
            .base()
            .core_thread()
            .queue_return_command(move |op| callback(&object, op), false)
            .map_err(Into::into)
    }
}

impl<T: CoreObject> Clone for CoreObjectPtr<T> {
    fn clone(&self) -> Self {
        Self {
            owner: Arc::clone(&self.owner),
        }
    }
}

impl<T: CoreObject> Deref for CoreObjectPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.owner.object
    }
}

impl<T: CoreObject> fmt::Debug for CoreObjectPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CoreObjectPtr")
            .field(self.owner.object.base())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CoreContext;
    use crate::object::CoreObjectBase;
    use crate::renderer::error::RenderError;
    use crate::settings::CoreThreadSettings;
    use crate::test_support::{MemoryBufferManager, RecordingRenderSystem};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[derive(Default)]
    struct Counters {
        initialized: AtomicUsize,
        destroyed: AtomicUsize,
    }

    struct GpuCounter {
        base: CoreObjectBase,
        counters: Arc<Counters>,
        fail: bool,
    }

    impl CoreObject for GpuCounter {
        fn base(&self) -> &CoreObjectBase {
            &self.base
        }

        fn initialize_internal(&self) -> Result<(), RenderError> {
            if self.fail {
                return Err(RenderError::Unsupported("no device".to_string()));
            }
            self.counters.initialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn destroy_internal(&self) {
            self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
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

    fn counter(ctx: &CoreContext, requires_core_thread: bool) -> (GpuCounter, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let object = GpuCounter {
            base: CoreObjectBase::new::<GpuCounter>(ctx, requires_core_thread),
            counters: Arc::clone(&counters),
            fail: false,
        };
        (object, counters)
    }

    fn flush(ctx: &CoreContext) {
        ctx.core_thread().queue_command(|| {}, true).unwrap();
    }

    #[test]
    fn test_initialization_is_queued_on_core_thread() {
        let ctx = context();
        let (object, counters) = counter(&ctx, true);
        let ptr = CoreObjectPtr::create(object).unwrap();

        ptr.synchronize().unwrap();
        assert!(ptr.is_initialized());
        assert_eq!(ptr.state(), CoreObjectState::Initialized);
        assert_eq!(counters.initialized.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_initialization_without_core_thread_runs_now() {
        let ctx = context();
        let (object, _) = counter(&ctx, false);
        let ptr = CoreObjectPtr::create(object).unwrap();
        assert!(ptr.is_initialized());
    }

    #[test]
    fn test_double_initialize_fails() {
        let ctx = context();
        let (object, _) = counter(&ctx, true);
        let ptr = CoreObjectPtr::create(object).unwrap();
        ptr.synchronize().unwrap();

        assert!(matches!(
            ptr.initialize(),
            Err(CoreObjectError::AlreadyInitialized { .. })
        ));
    }

    #[test]
    fn test_destroy_before_initialize_fails() {
        let ctx = context();
        let (object, _) = counter(&ctx, true);
        let ptr = CoreObjectPtr::new(object);

        assert!(matches!(
            ptr.destroy(),
            Err(CoreObjectError::NotInitialized { .. })
        ));
        assert!(matches!(
            ptr.synchronize(),
            Err(CoreObjectError::NotScheduled { .. })
        ));
    }

    #[test]
    fn test_destroy_runs_once() {
        let ctx = context();
        let (object, counters) = counter(&ctx, true);
        let ptr = CoreObjectPtr::create(object).unwrap();
        ptr.synchronize().unwrap();

        ptr.destroy().unwrap();
        assert!(matches!(
            ptr.destroy(),
            Err(CoreObjectError::Destroyed { .. })
        ));
        flush(&ctx);

        assert!(!ptr.is_initialized());
        assert_eq!(ptr.state(), CoreObjectState::Destroyed);
        drop(ptr);
        flush(&ctx);
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_waits_for_queued_commands() {
        let ctx = context();
        let (object, counters) = counter(&ctx, true);
        let ptr = CoreObjectPtr::create(object).unwrap();
        ptr.synchronize().unwrap();

        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (seen_tx, seen_rx) = mpsc::channel();
        ptr.queue_gpu_command(move |object| {
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
            seen_tx.send(object.base().is_initialized()).unwrap();
        })
        .unwrap();

        drop(ptr);
        // The worker is still parked in the command above.
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.objects().live_count(), 1);

        release_tx.send(()).unwrap();
        flush(&ctx);
        assert!(seen_rx.recv().unwrap());
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.objects().live_count(), 0);
    }

    #[test]
    fn test_drop_while_scheduled_for_init_destroys_after_init() {
        let ctx = context();
        let (object, counters) = counter(&ctx, true);

        let (release_tx, release_rx) = mpsc::channel::<()>();
        ctx.core_thread()
            .queue_command(
                move || {
                    let _ = release_rx.recv_timeout(Duration::from_secs(5));
                },
                false,
            )
            .unwrap();

        let ptr = CoreObjectPtr::create(object).unwrap();
        assert_eq!(ptr.state(), CoreObjectState::ScheduledForInit);
        drop(ptr);

        release_tx.send(()).unwrap();
        flush(&ctx);
        assert_eq!(counters.initialized.load(Ordering::SeqCst), 1);
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.objects().live_count(), 0);
    }

    #[test]
    fn test_synchronize_from_core_thread_fails() {
        let ctx = context();
        let (object, _) = counter(&ctx, true);
        let ptr = CoreObjectPtr::new(object);

        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (result_tx, result_rx) = mpsc::channel();
        let remote = ptr.clone();
        ctx.core_thread()
            .queue_command(
                move || {
                    let _ = release_rx.recv_timeout(Duration::from_secs(5));
                    let waited = remote.synchronize();
                    result_tx
                        .send(matches!(waited, Err(CoreObjectError::WaitOnCoreThread { .. })))
                        .unwrap();
                },
                false,
            )
            .unwrap();

        // Queued behind the parked command.
        ptr.initialize().unwrap();
        release_tx.send(()).unwrap();

        assert!(result_rx.recv().unwrap());
        ptr.synchronize().unwrap();
    }

    #[test]
    fn test_failed_initialization_reaches_waiters() {
        let ctx = context();
        let (mut object, counters) = counter(&ctx, true);
        object.fail = true;
        let ptr = CoreObjectPtr::create(object).unwrap();

        let err = ptr.synchronize().unwrap_err();
        assert!(matches!(
            &err,
            CoreObjectError::InitializationFailed { reason, .. } if reason.contains("no device")
        ));
        assert_eq!(ptr.state(), CoreObjectState::InitFailed);

        drop(ptr);
        flush(&ctx);
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.objects().live_count(), 0);
    }

    #[test]
    fn test_return_command_sees_object() {
        let ctx = context();
        let (object, _) = counter(&ctx, true);
        let ptr = CoreObjectPtr::create(object).unwrap();
        let id = ptr.id();

        let op = ptr
            .queue_return_gpu_command(|object, op| {
                op.complete_operation(object.base().id());
            })
            .unwrap();
        op.block_until_complete();
        assert_eq!(op.return_value::<CoreObjectId>(), Some(id));
    }

    #[test]
    fn test_clones_share_ownership() {
        let ctx = context();
        let (object, counters) = counter(&ctx, true);
        let ptr = CoreObjectPtr::create(object).unwrap();
        let other = ptr.clone();
        assert!(CoreObjectPtr::ptr_eq(&ptr, &other));

        drop(ptr);
        flush(&ctx);
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 0);
        assert!(other.is_initialized());

        drop(other);
        flush(&ctx);
        assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
    }
}
