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

//! The core thread: the single thread allowed to talk to the graphics API.
//!
//! Other threads hand work to it through a global synchronized [`CommandQueue`].
//! The worker sleeps on a condition variable while the queue is empty, flushes it
//! when woken and plays the batch back, reporting the completion of commands that
//! a caller is blocked on through a second condition variable.

use crate::renderer::query::EventQueryManager;
use crate::renderer::traits::RenderSystem;
use crate::settings::{CoreThreadSettings, ThreadingMode};
use crate::thread::accessor::{CoreAccessor, SyncedCoreAccessor};
use crate::thread::async_op::AsyncOp;
use crate::thread::command_queue::{CommandBatch, CommandQueue, Synced};
use crate::thread::error::CoreThreadError;
use crate::thread::frame_alloc::FrameAlloc;
use crate::utils::lock_unpoisoned;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACCESSORS: RefCell<HashMap<u64, Rc<CoreAccessor>>> = RefCell::new(HashMap::new());
}

/// Counters describing the work played back by the core thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreThreadStats {
    /// Batches flushed from the global queue and played back.
    pub batches: u64,
    /// Global queue entries played back. An accessor submission counts as one.
    pub commands: u64,
}

struct CoreThreadShared {
    queue: CommandQueue<Synced>,
    command_ready: Condvar,
    // Only written while the queue lock is held.
    shutdown: AtomicBool,
    completed: Mutex<Vec<u32>>,
    command_completed: Condvar,
    // Set when queued commands were discarded; blocked callers stop waiting.
    abandoned: AtomicBool,
    core_thread_id: OnceLock<ThreadId>,
    instance_id: u64,
    checks: bool,
    batches: AtomicU64,
    commands: AtomicU64,
}

impl CoreThreadShared {
    fn command_completed_notify(&self, callback_id: u32) {
        lock_unpoisoned(&self.completed).push(callback_id);
        self.command_completed.notify_all();
    }

    /// Wakes every blocked caller and tells them their command will never run.
    fn abandon_waiters(&self) {
        let _completed = lock_unpoisoned(&self.completed);
        self.abandoned.store(true, Ordering::Release);
        self.command_completed.notify_all();
    }

    fn wait_for_completion(&self, callback_id: u32) -> Result<(), CoreThreadError> {
        let mut completed = lock_unpoisoned(&self.completed);
        loop {
            if let Some(position) = completed.iter().position(|id| *id == callback_id) {
                completed.swap_remove(position);
                return Ok(());
            }
            if self.abandoned.load(Ordering::Acquire) {
                return Err(CoreThreadError::ShutDown);
            }
            completed = self
                .command_completed
                .wait(completed)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Flushes the global queue and plays it back until it stays empty.
    fn drain(&self) -> usize {
        let mut played = 0;
        loop {
            let batch = self.queue.lock().flush();
            if batch.is_empty() {
                return played;
            }
            played += self.play(batch);
        }
    }

    fn play(&self, batch: CommandBatch) -> usize {
        log::trace!("Core thread playing back {} commands", batch.len());
        let played = batch.playback_with_notify(|id| self.command_completed_notify(id));
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.commands.fetch_add(played as u64, Ordering::Relaxed);
        played
    }
}

/// A cheap, cloneable reference to a running core thread.
///
/// Core objects and accessors keep one to queue their work.
#[derive(Clone)]
pub struct CoreThreadHandle {
    shared: Arc<CoreThreadShared>,
}

impl CoreThreadHandle {
    /// Returns `true` if the calling thread is the core thread.
    pub fn is_core_thread(&self) -> bool {
        self.shared.core_thread_id.get() == Some(&thread::current().id())
    }

    /// Returns `true` when thread-affinity and lifecycle checks are enabled.
    pub fn checks_enabled(&self) -> bool {
        self.shared.checks
    }

    /// Returns `true` once shutdown has started.
    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Fails if checks are enabled and the caller is not the core thread.
    pub fn ensure_core_thread(&self, operation: &'static str) -> Result<(), CoreThreadError> {
        if self.shared.checks && !self.is_core_thread() {
            return Err(CoreThreadError::requires_core_thread(operation));
        }
        Ok(())
    }

    /// Fails if checks are enabled and the caller is the core thread.
    pub fn ensure_not_core_thread(&self, operation: &'static str) -> Result<(), CoreThreadError> {
        if self.shared.checks && self.is_core_thread() {
            return Err(CoreThreadError::not_core_thread(operation));
        }
        Ok(())
    }

    /// Queues `callback` on the core thread.
    ///
    /// Called from the core thread itself, the callback runs immediately.
    /// Otherwise it is appended to the global queue and, when
    /// `block_until_complete` is set, this call returns only after the callback
    /// has been played back.
    /// ## Errors
    /// * `CoreThreadError::ShutDown` - If the core thread no longer accepts commands.
    #[track_caller]
    pub fn queue_command<F>(&self, callback: F, block_until_complete: bool) -> Result<(), CoreThreadError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_core_thread() {
            callback();
            return Ok(());
        }

        let location = Location::caller();
        let notify_id = {
            let mut state = self.shared.queue.lock();
            if self.shared.shutdown.load(Ordering::Acquire) {
                return Err(CoreThreadError::ShutDown);
            }
            let notify_id = block_until_complete.then(|| state.next_notify_id());
            state.queue(callback, notify_id, location);
            notify_id
        };
        self.shared.command_ready.notify_one();

        if let Some(notify_id) = notify_id {
            self.shared.wait_for_completion(notify_id)?;
        }
        Ok(())
    }

    /// Queues a callback that resolves an [`AsyncOp`] on the core thread.
    ///
    /// The returned op is resolved once the callback has run. From the core
    /// thread, the callback runs immediately and the op comes back resolved.
    #[track_caller]
    pub fn queue_return_command<F>(
        &self,
        callback: F,
        block_until_complete: bool,
    ) -> Result<AsyncOp, CoreThreadError>
    where
        F: FnOnce(&AsyncOp) + Send + 'static,
    {
        if self.is_core_thread() {
            let op = AsyncOp::new();
            callback(&op);
            if !op.is_resolved() {
                op.complete_operation_empty();
            }
            return Ok(op);
        }

        let location = Location::caller();
        let (op, notify_id) = {
            let mut state = self.shared.queue.lock();
            if self.shared.shutdown.load(Ordering::Acquire) {
                return Err(CoreThreadError::ShutDown);
            }
            let notify_id = block_until_complete.then(|| state.next_notify_id());
            (state.queue_return(callback, notify_id, location), notify_id)
        };
        self.shared.command_ready.notify_one();

        if let Some(notify_id) = notify_id {
            if let Err(err) = self.shared.wait_for_completion(notify_id) {
                op.fail_operation("core thread shut down before the command ran");
                return Err(err);
            }
        }
        Ok(op)
    }

    /// Counters of the work played back so far.
    pub fn stats(&self) -> CoreThreadStats {
        CoreThreadStats {
            batches: self.shared.batches.load(Ordering::Relaxed),
            commands: self.shared.commands.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for CoreThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreThreadHandle")
            .field("instance_id", &self.shared.instance_id)
            .field("core_thread", &self.shared.core_thread_id.get())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn run_core_thread(shared: Arc<CoreThreadShared>) {
    log::info!(
        "Core thread started on {:?}",
        thread::current().name().unwrap_or("<unnamed>")
    );

    loop {
        let batch = {
            let mut state = shared.queue.lock();
            while state.is_empty() && !shared.shutdown.load(Ordering::Acquire) {
                state = shared
                    .command_ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if state.is_empty() {
                // Shut down and fully drained.
                break;
            }
            state.flush()
        };
        shared.play(batch);
    }

    let stats = CoreThreadStats {
        batches: shared.batches.load(Ordering::Relaxed),
        commands: shared.commands.load(Ordering::Relaxed),
    };
    log::info!(
        "Core thread stopped after {} batches ({} commands)",
        stats.batches,
        stats.commands
    );
}

/// Owns the core thread, its global queue and the per-frame state shared with it.
pub struct CoreThread {
    handle: CoreThreadHandle,
    settings: CoreThreadSettings,
    worker: Mutex<Option<JoinHandle<()>>>,
    render_system: Arc<dyn RenderSystem>,
    queries: Arc<EventQueryManager>,
    synced_accessor: Arc<SyncedCoreAccessor>,
    frame_allocs: [FrameAlloc; 2],
    active_frame_alloc: AtomicUsize,
}

impl CoreThread {
    /// Starts the core thread.
    ///
    /// In [`ThreadingMode::Dedicated`] a worker thread is spawned and this call
    /// returns once it is running. In [`ThreadingMode::Inline`] the calling thread
    /// becomes the core thread.
    /// ## Errors
    /// * `CoreThreadError::Spawn` - If the worker thread could not be created.
    pub fn start(
        settings: CoreThreadSettings,
        render_system: Arc<dyn RenderSystem>,
    ) -> Result<Self, CoreThreadError> {
        let shared = Arc::new(CoreThreadShared {
            queue: CommandQueue::new(settings.enforce_thread_checks),
            command_ready: Condvar::new(),
            shutdown: AtomicBool::new(false),
            completed: Mutex::new(Vec::new()),
            command_completed: Condvar::new(),
            abandoned: AtomicBool::new(false),
            core_thread_id: OnceLock::new(),
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            checks: settings.enforce_thread_checks,
            batches: AtomicU64::new(0),
            commands: AtomicU64::new(0),
        });

        let worker = match settings.threading {
            ThreadingMode::Inline => {
                let _ = shared.core_thread_id.set(thread::current().id());
                log::info!("Core thread running inline on the calling thread");
                None
            }
            ThreadingMode::Dedicated => {
                let (ready_tx, ready_rx) = flume::bounded(1);
                let worker_shared = Arc::clone(&shared);
                let join = thread::Builder::new()
                    .name(settings.thread_name.clone())
                    .spawn(move || {
                        let _ = worker_shared.core_thread_id.set(thread::current().id());
                        let _ = ready_tx.send(());
                        run_core_thread(worker_shared);
                    })?;
                ready_rx
                    .recv()
                    .map_err(|_| CoreThreadError::StartupFailed)?;
                Some(join)
            }
        };

        let handle = CoreThreadHandle { shared };
        let queries = Arc::new(EventQueryManager::new(Arc::clone(&render_system)));
        let synced_accessor = Arc::new(SyncedCoreAccessor::new(
            handle.clone(),
            Arc::clone(&render_system),
        ));

        Ok(Self {
            handle,
            frame_allocs: [
                FrameAlloc::new(settings.frame_alloc_capacity),
                FrameAlloc::new(settings.frame_alloc_capacity),
            ],
            settings,
            worker: Mutex::new(worker),
            render_system,
            queries,
            synced_accessor,
            active_frame_alloc: AtomicUsize::new(0),
        })
    }

    /// A handle for queuing work from other objects.
    pub fn handle(&self) -> &CoreThreadHandle {
        &self.handle
    }

    /// The settings the core thread was started with.
    pub fn settings(&self) -> &CoreThreadSettings {
        &self.settings
    }

    /// The render system commands are executed against.
    pub fn render_system(&self) -> &Arc<dyn RenderSystem> {
        &self.render_system
    }

    /// The event queries polled by [`CoreThread::update`].
    pub fn queries(&self) -> &Arc<EventQueryManager> {
        &self.queries
    }

    /// Returns `true` if the calling thread is the core thread.
    pub fn is_core_thread(&self) -> bool {
        self.handle.is_core_thread()
    }

    /// The non-synced accessor of the calling thread, created on first use.
    ///
    /// The accessor is cached per thread and keeps this core thread's shared
    /// state alive. Entries of core threads that have shut down are dropped on
    /// the next call from the same thread. Threads that outlive their core
    /// thread without calling this again should call
    /// [`CoreThread::release_accessor`].
    pub fn accessor(&self) -> Rc<CoreAccessor> {
        let instance_id = self.handle.shared.instance_id;
        ACCESSORS.with(|accessors| {
            let mut accessors = accessors.borrow_mut();
            accessors.retain(|_, accessor| !accessor.core_thread().is_shut_down());
            let accessor = accessors.entry(instance_id).or_insert_with(|| {
                Rc::new(CoreAccessor::new(
                    self.handle.clone(),
                    Arc::clone(&self.render_system),
                ))
            });
            Rc::clone(accessor)
        })
    }

    /// Drops the calling thread's accessor, discarding anything it had not submitted.
    ///
    /// [`CoreThread::shutdown`] only releases the accessor of the thread it runs
    /// on. Other threads holding one should call this once they are done.
    pub fn release_accessor(&self) {
        let instance_id = self.handle.shared.instance_id;
        // The thread-local may already be gone during thread teardown.
        let _ = ACCESSORS.try_with(|accessors| accessors.borrow_mut().remove(&instance_id));
    }

    /// The accessor shared by every thread.
    pub fn synced_accessor(&self) -> &Arc<SyncedCoreAccessor> {
        &self.synced_accessor
    }

    /// Submits the calling thread's accessor.
    #[track_caller]
    pub fn submit_accessors(&self, block_until_complete: bool) -> Result<(), CoreThreadError> {
        self.accessor().submit_to_core_thread(block_until_complete)
    }

    /// See [`CoreThreadHandle::queue_command`].
    #[track_caller]
    pub fn queue_command<F>(&self, callback: F, block_until_complete: bool) -> Result<(), CoreThreadError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.queue_command(callback, block_until_complete)
    }

    /// See [`CoreThreadHandle::queue_return_command`].
    #[track_caller]
    pub fn queue_return_command<F>(
        &self,
        callback: F,
        block_until_complete: bool,
    ) -> Result<AsyncOp, CoreThreadError>
    where
        F: FnOnce(&AsyncOp) + Send + 'static,
    {
        self.handle.queue_return_command(callback, block_until_complete)
    }

    /// Starts a new simulation frame.
    ///
    /// Swaps the frame allocators and queues a poll of the event queries. With
    /// [`ThreadingMode::Inline`], commands queued from other threads are also
    /// played back here.
    /// ## Errors
    /// * `CoreThreadError::FrameAllocInUse` - If data allocated two frames ago is still alive.
    pub fn update(&self) -> Result<(), CoreThreadError> {
        let next = 1 - self.active_frame_alloc.load(Ordering::Acquire);
        self.frame_allocs[next].clear()?;
        self.active_frame_alloc.store(next, Ordering::Release);

        let queries = Arc::clone(&self.queries);
        self.handle.queue_command(
            move || {
                queries.update();
            },
            false,
        )?;

        if self.settings.threading == ThreadingMode::Inline && self.is_core_thread() {
            self.handle.shared.drain();
        }
        Ok(())
    }

    /// Plays back everything waiting in the global queue. Only valid in
    /// [`ThreadingMode::Inline`], from the core thread.
    pub fn pump(&self) -> Result<usize, CoreThreadError> {
        if self.settings.threading != ThreadingMode::Inline || !self.is_core_thread() {
            return Err(CoreThreadError::requires_core_thread("CoreThread::pump"));
        }
        Ok(self.handle.shared.drain())
    }

    /// The frame allocator of the current frame.
    pub fn frame_alloc(&self) -> &FrameAlloc {
        &self.frame_allocs[self.active_frame_alloc.load(Ordering::Acquire)]
    }

    /// Counters of the work played back so far.
    pub fn stats(&self) -> CoreThreadStats {
        self.handle.stats()
    }

    /// Stops accepting commands, plays back everything already queued and joins
    /// the worker. Calling it again does nothing.
    /// ## Errors
    /// * `CoreThreadError::WrongThread` - If called from the worker thread itself.
    /// * `CoreThreadError::WorkerPanicked` - If the worker died outside playback.
    pub fn shutdown(&self) -> Result<(), CoreThreadError> {
        let has_worker = lock_unpoisoned(&self.worker).is_some();
        if has_worker && self.is_core_thread() {
            return Err(CoreThreadError::not_core_thread("CoreThread::shutdown"));
        }

        let first = {
            let _state = self.handle.shared.queue.lock();
            !self.handle.shared.shutdown.swap(true, Ordering::AcqRel)
        };
        self.handle.shared.command_ready.notify_all();
        self.release_accessor();

        let worker = lock_unpoisoned(&self.worker).take();
        if let Some(worker) = worker {
            worker
                .join()
                .map_err(|_| CoreThreadError::WorkerPanicked)?;
        } else if first && self.settings.threading == ThreadingMode::Inline {
            if self.is_core_thread() {
                let drained = self.handle.shared.drain();
                log::debug!("Drained {drained} commands on inline core thread shutdown");
            } else {
                {
                    let mut state = self.handle.shared.queue.lock();
                    if !state.is_empty() {
                        log::warn!(
                            "Inline core thread shut down from another thread, discarding {} commands",
                            state.len()
                        );
                        state.cancel_all();
                    }
                }
                self.handle.shared.abandon_waiters();
            }
        }

        if first {
            log::info!("Core thread shut down");
        }
        Ok(())
    }
}

impl Drop for CoreThread {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("Failed to shut down the core thread: {err}");
        }
    }
}

impl fmt::Debug for CoreThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreThread")
            .field("handle", &self.handle)
            .field("threading", &self.settings.threading)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingRenderSystem;
    use std::sync::mpsc;
    use std::time::Duration;

    fn start(threading: ThreadingMode) -> CoreThread {
        let settings = CoreThreadSettings {
            threading,
            enforce_thread_checks: true,
            ..Default::default()
        };
        CoreThread::start(settings, Arc::new(RecordingRenderSystem::default())).unwrap()
    }

    #[test]
    fn test_blocking_command_runs_before_return() {
        let core = start(ThreadingMode::Dedicated);
        let (tx, rx) = mpsc::channel();
        core.queue_command(
            move || {
                std::thread::sleep(Duration::from_millis(20));
                tx.send(std::thread::current().name().map(str::to_owned))
                    .unwrap();
            },
            true,
        )
        .unwrap();

        // The command already ran, on the named worker.
        assert_eq!(rx.try_recv().unwrap().as_deref(), Some("ember-core"));
        core.shutdown().unwrap();
    }

    #[test]
    fn test_command_from_core_thread_runs_inline() {
        let core = Arc::new(start(ThreadingMode::Dedicated));
        let handle = core.handle().clone();
        let (tx, rx) = mpsc::channel();

        core.queue_command(
            move || {
                let before = handle.stats();
                let (inner_tx, inner_rx) = mpsc::channel();
                handle
                    .queue_command(move || inner_tx.send(()).unwrap(), true)
                    .unwrap();
                // Ran synchronously and never reached the global queue.
                let ran = inner_rx.try_recv().is_ok();
                tx.send((ran, handle.stats() == before)).unwrap();
            },
            true,
        )
        .unwrap();

        assert_eq!(rx.recv().unwrap(), (true, true));
    }

    #[test]
    fn test_async_op_resolves_after_playback() {
        let core = start(ThreadingMode::Dedicated);
        let (release_tx, release_rx) = mpsc::channel::<()>();

        core.queue_command(
            move || {
                let _ = release_rx.recv_timeout(Duration::from_secs(5));
            },
            false,
        )
        .unwrap();
        let op = core
            .queue_return_command(|op| {
                op.complete_operation(7u64);
            }, false)
            .unwrap();

        // The worker is parked on the first command.
        assert!(!op.is_resolved());
        release_tx.send(()).unwrap();

        op.block_until_complete();
        assert_eq!(op.return_value::<u64>(), Some(7));
    }

    #[test]
    fn test_shutdown_drains_pending_commands() {
        let core = start(ThreadingMode::Dedicated);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            core.queue_command(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                false,
            )
            .unwrap();
        }
        core.shutdown().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 100);

        assert!(matches!(
            core.queue_command(|| {}, false),
            Err(CoreThreadError::ShutDown)
        ));
        // Idempotent.
        core.shutdown().unwrap();
    }

    #[test]
    fn test_panicking_command_still_notifies_blocked_caller() {
        let core = start(ThreadingMode::Dedicated);
        core.queue_command(|| panic!("backend exploded"), true)
            .unwrap();

        let op = core
            .queue_return_command(|_| panic!("read failed"), true)
            .unwrap();
        assert!(op.is_failed());

        // The worker survived.
        let op = core
            .queue_return_command(|op| {
                op.complete_operation(1u8);
            }, true)
            .unwrap();
        assert_eq!(op.return_value::<u8>(), Some(1));
    }

    #[test]
    fn test_inline_mode_runs_commands_immediately() {
        let core = start(ThreadingMode::Inline);
        assert!(core.is_core_thread());

        let op = core
            .queue_return_command(|op| {
                op.complete_operation("inline");
            }, false)
            .unwrap();
        assert_eq!(op.return_value::<&str>(), Some("inline"));

        assert!(matches!(
            core.handle().ensure_not_core_thread("test"),
            Err(CoreThreadError::WrongThread { .. })
        ));
        core.shutdown().unwrap();
    }

    #[test]
    fn test_inline_shutdown_from_other_thread_wakes_blocked_callers() {
        let core = Arc::new(start(ThreadingMode::Inline));

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let core = Arc::clone(&core);
            std::thread::spawn(move || {
                let ran = core.queue_command(|| {}, true);
                let op = core.queue_return_command(|op| {
                    op.complete_operation(1u8);
                }, true);
                tx.send((ran, op.map(|op| op.is_failed()))).unwrap();
            })
        };
        while core.handle().shared.queue.lock().is_empty() {
            std::thread::sleep(Duration::from_millis(1));
        }

        let stopper = Arc::clone(&core);
        std::thread::spawn(move || stopper.shutdown().unwrap())
            .join()
            .unwrap();

        let (ran, op) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(ran, Err(CoreThreadError::ShutDown)));
        // Queued after shutdown started, so rejected up front.
        assert!(matches!(op, Err(CoreThreadError::ShutDown)));
        waiter.join().unwrap();
    }

    #[test]
    fn test_inline_mode_plays_foreign_commands_on_update() {
        let core = start(ThreadingMode::Inline);
        let handle = core.handle().clone();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            handle
                .queue_command(move || tx.send(()).unwrap(), false)
                .unwrap();
        })
        .join()
        .unwrap();

        assert!(rx.try_recv().is_err());
        core.update().unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_frame_allocs_alternate() {
        let core = start(ThreadingMode::Dedicated);
        let first = core.frame_alloc().alloc(8);
        core.update().unwrap();
        let second = core.frame_alloc().alloc(8);

        // Recycling the first allocator while its data is alive fails.
        assert!(matches!(
            core.update(),
            Err(CoreThreadError::FrameAllocInUse { live: 1 })
        ));
        drop(first);
        core.update().unwrap();
        drop(second);
    }

    #[test]
    fn test_accessor_is_per_thread() {
        let core = Arc::new(start(ThreadingMode::Dedicated));
        let a = core.accessor();
        let b = core.accessor();
        assert!(Rc::ptr_eq(&a, &b));

        let remote = Arc::clone(&core);
        let other_queue = std::thread::spawn(move || remote.accessor().queue_idx())
            .join()
            .unwrap();
        assert_ne!(other_queue, a.queue_idx());
    }

    #[test]
    fn test_accessor_drops_entries_of_shut_down_cores() {
        let first = Arc::new(start(ThreadingMode::Dedicated));
        let second = start(ThreadingMode::Dedicated);
        let stale = first.accessor();

        let remote = Arc::clone(&first);
        std::thread::spawn(move || remote.shutdown().unwrap())
            .join()
            .unwrap();
        drop(stale);

        let live = second.accessor();
        let cached: Vec<u64> = ACCESSORS.with(|a| a.borrow().keys().copied().collect());
        assert_eq!(cached, vec![second.handle.shared.instance_id]);
        assert!(Rc::ptr_eq(&live, &second.accessor()));
    }
}
