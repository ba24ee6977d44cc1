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

//! The lifecycle state shared by every core object.

use crate::context::CoreContext;
use crate::ember_bitflags;
use crate::object::{CoreObjectError, CoreObjectId, CoreObjectRegistry};
use crate::renderer::error::RenderError;
use crate::thread::CoreThreadHandle;
use crate::utils::{lock_unpoisoned, panic_message};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

ember_bitflags! {
    /// Lifecycle bits of a core object.
    pub struct CoreObjectFlags: u8 {
        /// `initialize_internal` has run successfully.
        const INITIALIZED = 1 << 0;
        /// Initialization is queued on the core thread.
        const SCHEDULED_FOR_INIT = 1 << 1;
        /// Destruction is queued on the core thread.
        const SCHEDULED_FOR_DELETE = 1 << 2;
        /// Initialization and destruction must run on the core thread.
        const REQUIRES_INIT_ON_CORE_THREAD = 1 << 3;
        /// `initialize_internal` ran and failed.
        const INIT_FAILED = 1 << 4;
        /// The object has been destroyed.
        const DESTROYED = 1 << 5;
    }
}

/// A simplified view of [`CoreObjectFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreObjectState {
    /// Constructed, `initialize` not called yet.
    Uninitialized,
    /// Initialization is queued on the core thread.
    ScheduledForInit,
    /// Ready for use.
    Initialized,
    /// Initialization failed.
    InitFailed,
    /// Destruction is queued on the core thread.
    ScheduledForDelete,
    /// Destroyed.
    Destroyed,
}

#[derive(Debug)]
struct ObjectStatus {
    flags: CoreObjectFlags,
    failure: Option<String>,
}

/// State embedded in every [`CoreObject`]: its id, lifecycle flags and the core
/// thread its GPU work is routed to.
pub struct CoreObjectBase {
    id: CoreObjectId,
    type_name: &'static str,
    status: Mutex<ObjectStatus>,
    status_changed: Condvar,
    core_thread: CoreThreadHandle,
    registry: Arc<CoreObjectRegistry>,
}

impl CoreObjectBase {
    /// Registers a new object of type `T` with the context.
    ///
    /// When `requires_core_thread` is set, initialization and destruction are
    /// queued on the core thread unless already called from it.
    pub fn new<T: ?Sized>(context: &CoreContext, requires_core_thread: bool) -> Self {
        Self::with_parts(
            std::any::type_name::<T>(),
            context.core_thread().handle().clone(),
            Arc::clone(context.objects()),
            requires_core_thread,
        )
    }

    /// Registers a new object with an explicit core thread and registry.
    pub fn with_parts(
        type_name: &'static str,
        core_thread: CoreThreadHandle,
        registry: Arc<CoreObjectRegistry>,
        requires_core_thread: bool,
    ) -> Self {
        let mut flags = CoreObjectFlags::EMPTY;
        flags.set(
            CoreObjectFlags::REQUIRES_INIT_ON_CORE_THREAD,
            requires_core_thread,
        );
        Self {
            id: registry.register(type_name),
            type_name,
            status: Mutex::new(ObjectStatus {
                flags,
                failure: None,
            }),
            status_changed: Condvar::new(),
            core_thread,
            registry,
        }
    }

    /// The object's unique id.
    pub fn id(&self) -> CoreObjectId {
        self.id
    }

    /// Name of the concrete object type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The core thread this object's GPU work runs on.
    pub fn core_thread(&self) -> &CoreThreadHandle {
        &self.core_thread
    }

    /// A snapshot of the lifecycle flags.
    pub fn flags(&self) -> CoreObjectFlags {
        self.status().flags
    }

    /// Returns `true` if initialization and destruction run on the core thread.
    pub fn requires_core_thread(&self) -> bool {
        self.flags()
            .contains(CoreObjectFlags::REQUIRES_INIT_ON_CORE_THREAD)
    }

    /// Returns `true` once initialization has completed successfully.
    pub fn is_initialized(&self) -> bool {
        self.flags().contains(CoreObjectFlags::INITIALIZED)
    }

    /// The current lifecycle state.
    pub fn state(&self) -> CoreObjectState {
        let flags = self.flags();
        if flags.contains(CoreObjectFlags::DESTROYED) {
            CoreObjectState::Destroyed
        } else if flags.contains(CoreObjectFlags::SCHEDULED_FOR_DELETE) {
            CoreObjectState::ScheduledForDelete
        } else if flags.contains(CoreObjectFlags::INITIALIZED) {
            CoreObjectState::Initialized
        } else if flags.contains(CoreObjectFlags::INIT_FAILED) {
            CoreObjectState::InitFailed
        } else if flags.contains(CoreObjectFlags::SCHEDULED_FOR_INIT) {
            CoreObjectState::ScheduledForInit
        } else {
            CoreObjectState::Uninitialized
        }
    }

    fn status(&self) -> MutexGuard<'_, ObjectStatus> {
        lock_unpoisoned(&self.status)
    }

    /// Marks the object as scheduled for initialization.
    ///
    /// Returns `true` if initialization has to be queued on the core thread.
    pub(crate) fn begin_initialize(&self) -> Result<bool, CoreObjectError> {
        let mut status = self.status();
        if status
            .flags
            .intersects(CoreObjectFlags::SCHEDULED_FOR_DELETE | CoreObjectFlags::DESTROYED)
        {
            return Err(self.destroyed_error());
        }
        if status.flags.intersects(
            CoreObjectFlags::INITIALIZED
                | CoreObjectFlags::SCHEDULED_FOR_INIT
                | CoreObjectFlags::INIT_FAILED,
        ) {
            return Err(CoreObjectError::AlreadyInitialized {
                type_name: self.type_name,
                id: self.id,
            });
        }

        let queued = status
            .flags
            .contains(CoreObjectFlags::REQUIRES_INIT_ON_CORE_THREAD)
            && !self.core_thread.is_core_thread();
        status.flags.insert(CoreObjectFlags::SCHEDULED_FOR_INIT);
        Ok(queued)
    }

    /// Undoes [`CoreObjectBase::begin_initialize`] when the command could not be queued.
    pub(crate) fn cancel_initialize(&self) {
        self.status()
            .flags
            .remove(CoreObjectFlags::SCHEDULED_FOR_INIT);
        self.status_changed.notify_all();
    }

    /// Marks the object as scheduled for destruction.
    ///
    /// Returns `true` if destruction has to be queued on the core thread.
    pub(crate) fn begin_destroy(&self) -> Result<bool, CoreObjectError> {
        let mut status = self.status();
        if status
            .flags
            .intersects(CoreObjectFlags::SCHEDULED_FOR_DELETE | CoreObjectFlags::DESTROYED)
        {
            return Err(self.destroyed_error());
        }
        if !status.flags.intersects(
            CoreObjectFlags::INITIALIZED
                | CoreObjectFlags::SCHEDULED_FOR_INIT
                | CoreObjectFlags::INIT_FAILED,
        ) {
            return Err(CoreObjectError::NotInitialized {
                type_name: self.type_name,
                id: self.id,
            });
        }

        status.flags.insert(CoreObjectFlags::SCHEDULED_FOR_DELETE);
        Ok(status
            .flags
            .contains(CoreObjectFlags::REQUIRES_INIT_ON_CORE_THREAD)
            && !self.core_thread.is_core_thread())
    }

    /// Returns `true` if dropping the last owner has to destroy the object.
    pub(crate) fn needs_delayed_destroy(&self) -> bool {
        let flags = self.flags();
        flags.intersects(CoreObjectFlags::INITIALIZED | CoreObjectFlags::SCHEDULED_FOR_INIT)
            && !flags
                .intersects(CoreObjectFlags::SCHEDULED_FOR_DELETE | CoreObjectFlags::DESTROYED)
    }

    /// Blocks until the object is initialized.
    pub(crate) fn wait_until_initialized(&self) -> Result<(), CoreObjectError> {
        let mut status = self.status();
        loop {
            let flags = status.flags;
            if flags.contains(CoreObjectFlags::INITIALIZED) {
                return Ok(());
            }
            if flags.contains(CoreObjectFlags::INIT_FAILED) {
                return Err(CoreObjectError::InitializationFailed {
                    type_name: self.type_name,
                    id: self.id,
                    reason: status.failure.clone().unwrap_or_default(),
                });
            }
            if flags.contains(CoreObjectFlags::DESTROYED) {
                return Err(self.destroyed_error());
            }
            if !flags.contains(CoreObjectFlags::SCHEDULED_FOR_INIT) {
                return Err(CoreObjectError::NotScheduled {
                    type_name: self.type_name,
                    id: self.id,
                });
            }
            if self.core_thread.is_core_thread() {
                return Err(CoreObjectError::WaitOnCoreThread {
                    type_name: self.type_name,
                    id: self.id,
                });
            }
            status = self
                .status_changed
                .wait(status)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn destroyed_error(&self) -> CoreObjectError {
        CoreObjectError::Destroyed {
            type_name: self.type_name,
            id: self.id,
        }
    }
}

impl Drop for CoreObjectBase {
    fn drop(&mut self) {
        let flags = lock_unpoisoned(&self.status).flags;
        if flags.contains(CoreObjectFlags::INITIALIZED) {
            log::error!(
                "{} {} freed while still initialized; its GPU resources leak",
                self.type_name,
                self.id
            );
        }
        self.registry.unregister(self.id);
    }
}

impl fmt::Debug for CoreObjectBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreObjectBase")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("flags", &self.flags())
            .finish()
    }
}

/// A resource whose creation and destruction have to happen on the core thread.
///
/// Implementors embed a [`CoreObjectBase`] and are owned through a
/// [`CoreObjectPtr`](crate::object::CoreObjectPtr), which routes
/// [`CoreObject::initialize_internal`] and [`CoreObject::destroy_internal`]
/// through the core thread and keeps the object alive until every command
/// referencing it has run.
pub trait CoreObject: Send + Sync + 'static {
    /// The embedded lifecycle state.
    fn base(&self) -> &CoreObjectBase;

    /// Creates the GPU-side resources. Runs on the core thread when the object
    /// requires it.
    fn initialize_internal(&self) -> Result<(), RenderError> {
        Ok(())
    }

    /// Releases the GPU-side resources. Only called on an initialized object.
    fn destroy_internal(&self) {}
}

/// Runs the object's initialization and publishes the outcome to waiters.
pub(crate) fn run_initialize<T: CoreObject + ?Sized>(object: &T) -> Result<(), CoreObjectError> {
    let base = object.base();
    // Destroyed from the core thread before the queued initialization got to run.
    if base.flags().contains(CoreObjectFlags::DESTROYED) {
        return Err(base.destroyed_error());
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| object.initialize_internal()))
        .unwrap_or_else(|payload| {
            Err(RenderError::RenderingFailed(format!(
                "initialization panicked: {}",
                panic_message(&*payload)
            )))
        });

    let outcome = {
        let mut status = base.status();
        status.flags.remove(CoreObjectFlags::SCHEDULED_FOR_INIT);
        match result {
            Ok(()) => {
                status.flags.insert(CoreObjectFlags::INITIALIZED);
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                log::error!(
                    "{} {} failed to initialize: {reason}",
                    base.type_name,
                    base.id
                );
                status.flags.insert(CoreObjectFlags::INIT_FAILED);
                status.failure = Some(reason.clone());
                Err(CoreObjectError::InitializationFailed {
                    type_name: base.type_name,
                    id: base.id,
                    reason,
                })
            }
        }
    };
    base.status_changed.notify_all();
    outcome
}

/// Runs the object's destruction, if it was ever initialized, and marks it destroyed.
pub(crate) fn run_destroy<T: CoreObject + ?Sized>(object: &T) {
    let base = object.base();
    if base.is_initialized() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| object.destroy_internal())) {
            log::error!(
                "{} {} panicked while being destroyed: {}",
                base.type_name,
                base.id,
                panic_message(&*payload)
            );
        }
    }

    {
        let mut status = base.status();
        status.flags.remove(
            CoreObjectFlags::INITIALIZED
                | CoreObjectFlags::SCHEDULED_FOR_INIT
                | CoreObjectFlags::SCHEDULED_FOR_DELETE,
        );
        status.flags.insert(CoreObjectFlags::DESTROYED);
    }
    base.status_changed.notify_all();
    log::trace!("{} {} destroyed", base.type_name, base.id);
}
