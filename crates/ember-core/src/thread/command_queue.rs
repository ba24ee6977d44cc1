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

//! Ordered queues of deferred callbacks.
//!
//! A [`CommandQueue`] buffers callbacks until [`CommandQueue::flush`] hands the whole
//! buffer over as a [`CommandBatch`], which is later played back in FIFO order,
//! usually on the core thread. The queue is parameterized by a [`QueueSync`]
//! policy:
//!
//! - [`Unsynced`] queues are bound to the thread that created them and take no lock.
//! - [`Synced`] queues are protected by a mutex and can be shared between threads.

use crate::thread::async_op::AsyncOp;
use crate::thread::breakpoint::{self, CommandDebugId};
use crate::utils::{lock_unpoisoned, panic_message};
use std::cell::{RefCell, RefMut};
use std::fmt;
use std::ops::DerefMut;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, ThreadId};

/// Empty buffers kept around per queue for reuse by [`CommandQueue::flush`].
const MAX_POOLED_BUFFERS: usize = 8;

static NEXT_QUEUE_IDX: AtomicU32 = AtomicU32::new(0);

type PlainCallback = Box<dyn FnOnce() + Send>;
type ReturnCallback = Box<dyn FnOnce(&AsyncOp) + Send>;
type BufferPool = Arc<Mutex<Vec<Vec<QueuedCommand>>>>;

enum CommandKind {
    Plain(PlainCallback),
    Returning { callback: ReturnCallback, op: AsyncOp },
}

/// A callback waiting in a queue, with its playback options.
pub struct QueuedCommand {
    kind: Option<CommandKind>,
    notify_when_complete: bool,
    callback_id: u32,
    debug_id: CommandDebugId,
    location: &'static Location<'static>,
}

impl QueuedCommand {
    /// Debug identifier of the command, usable with [`breakpoint::add_breakpoint`].
    pub fn debug_id(&self) -> CommandDebugId {
        self.debug_id
    }

    /// Where the command was queued from.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Runs the callback, catching panics.
    ///
    /// A returning callback that completes without resolving its [`AsyncOp`] gets it
    /// resolved empty; one that panics gets it resolved as failed.
    fn execute(&mut self) {
        breakpoint::check(self.debug_id, self.location);

        let Some(kind) = self.kind.take() else {
            return;
        };
        match kind {
            CommandKind::Plain(callback) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(callback)) {
                    log::error!(
                        "Command {}:{} queued at {} panicked: {}",
                        self.debug_id.queue_idx,
                        self.debug_id.command_idx,
                        self.location,
                        panic_message(&*payload)
                    );
                }
            }
            CommandKind::Returning { callback, op } => {
                match panic::catch_unwind(AssertUnwindSafe(|| callback(&op))) {
                    Ok(()) => {
                        if !op.is_resolved() {
                            op.complete_operation_empty();
                        }
                    }
                    Err(payload) => {
                        let message = panic_message(&*payload);
                        log::error!(
                            "Command {}:{} queued at {} panicked: {message}",
                            self.debug_id.queue_idx,
                            self.debug_id.command_idx,
                            self.location
                        );
                        op.fail_operation(format!("command panicked: {message}"));
                    }
                }
            }
        }
    }
}

impl Drop for QueuedCommand {
    fn drop(&mut self) {
        if let Some(CommandKind::Returning { op, .. }) = self.kind.take() {
            op.fail_operation("command dropped before execution");
        }
    }
}

impl fmt::Debug for QueuedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedCommand")
            .field("debug_id", &self.debug_id)
            .field("returns", &matches!(self.kind, Some(CommandKind::Returning { .. })))
            .field("notify_when_complete", &self.notify_when_complete)
            .field("callback_id", &self.callback_id)
            .field("location", &format_args!("{}", self.location))
            .finish()
    }
}

/// The mutable contents of a [`CommandQueue`], reachable through its sync policy.
pub struct QueueState {
    commands: Vec<QueuedCommand>,
    pool: BufferPool,
    queue_idx: u32,
    next_command_idx: u32,
    next_notify_id: u32,
}

impl QueueState {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
            pool: Arc::new(Mutex::new(Vec::new())),
            queue_idx: NEXT_QUEUE_IDX.fetch_add(1, Ordering::Relaxed),
            next_command_idx: 0,
            next_notify_id: 0,
        }
    }

    fn push(
        &mut self,
        kind: CommandKind,
        notify: Option<u32>,
        location: &'static Location<'static>,
    ) {
        let debug_id = CommandDebugId {
            queue_idx: self.queue_idx,
            command_idx: self.next_command_idx,
        };
        self.next_command_idx = self.next_command_idx.wrapping_add(1);
        self.commands.push(QueuedCommand {
            kind: Some(kind),
            notify_when_complete: notify.is_some(),
            callback_id: notify.unwrap_or(0),
            debug_id,
            location,
        });
    }

    /// Appends a fire-and-forget callback.
    ///
    /// When `notify` is `Some(id)`, playback reports `id` to its notify callback
    /// once the command has run.
    pub fn queue<F>(&mut self, callback: F, notify: Option<u32>, location: &'static Location<'static>)
    where
        F: FnOnce() + Send + 'static,
    {
        self.push(CommandKind::Plain(Box::new(callback)), notify, location);
    }

    /// Appends a callback that resolves an [`AsyncOp`], and returns that op unresolved.
    pub fn queue_return<F>(
        &mut self,
        callback: F,
        notify: Option<u32>,
        location: &'static Location<'static>,
    ) -> AsyncOp
    where
        F: FnOnce(&AsyncOp) + Send + 'static,
    {
        let op = AsyncOp::new();
        self.push(
            CommandKind::Returning {
                callback: Box::new(callback),
                op: op.clone(),
            },
            notify,
            location,
        );
        op
    }

    /// Swaps the pending commands for an empty buffer and returns them as a batch.
    pub fn flush(&mut self) -> CommandBatch {
        let fresh = lock_unpoisoned(&self.pool).pop().unwrap_or_default();
        let commands = std::mem::replace(&mut self.commands, fresh);
        CommandBatch {
            commands,
            pool: Arc::downgrade(&self.pool),
        }
    }

    /// Drops every pending command without running it.
    pub fn cancel_all(&mut self) {
        self.commands.clear();
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of pending commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns a new notification id, never `0`.
    pub fn next_notify_id(&mut self) -> u32 {
        self.next_notify_id = self.next_notify_id.wrapping_add(1);
        if self.next_notify_id == 0 {
            self.next_notify_id = 1;
        }
        self.next_notify_id
    }
}

/// How a [`CommandQueue`] protects its state.
pub trait QueueSync: Send + 'static {
    /// Exclusive access to the queue state.
    type Guard<'a>: DerefMut<Target = QueueState>
    where
        Self: 'a;

    /// `true` if the policy takes a real lock and may be used from any thread.
    const SYNCED: bool;

    /// Wraps `state`.
    fn new(state: QueueState) -> Self;

    /// Grants exclusive access to the state.
    fn lock(&self) -> Self::Guard<'_>;
}

/// No locking; the queue may only be touched by the thread that created it.
pub struct Unsynced(RefCell<QueueState>);

impl QueueSync for Unsynced {
    type Guard<'a>
        = RefMut<'a, QueueState>
    where
        Self: 'a;
    const SYNCED: bool = false;

    fn new(state: QueueState) -> Self {
        Self(RefCell::new(state))
    }

    fn lock(&self) -> Self::Guard<'_> {
        self.0.borrow_mut()
    }
}

/// A mutex around the state; the queue may be shared between threads.
pub struct Synced(Mutex<QueueState>);

impl QueueSync for Synced {
    type Guard<'a>
        = MutexGuard<'a, QueueState>
    where
        Self: 'a;
    const SYNCED: bool = true;

    fn new(state: QueueState) -> Self {
        Self(Mutex::new(state))
    }

    fn lock(&self) -> Self::Guard<'_> {
        lock_unpoisoned(&self.0)
    }
}

/// An ordered queue of callbacks, protected according to `S`.
pub struct CommandQueue<S: QueueSync> {
    sync: S,
    queue_idx: u32,
    owner: ThreadId,
    check_thread: bool,
}

impl<S: QueueSync> CommandQueue<S> {
    /// Creates a queue owned by the calling thread.
    ///
    /// When `check_thread` is set, every operation on an [`Unsynced`] queue
    /// panics if it is made from another thread.
    pub fn new(check_thread: bool) -> Self {
        let state = QueueState::new();
        Self {
            queue_idx: state.queue_idx,
            sync: S::new(state),
            owner: thread::current().id(),
            check_thread,
        }
    }

    /// Index of the queue in command debug ids.
    pub fn queue_idx(&self) -> u32 {
        self.queue_idx
    }

    /// Locks the queue for several operations at once.
    #[track_caller]
    pub fn lock(&self) -> S::Guard<'_> {
        if !S::SYNCED && self.check_thread {
            let current = thread::current().id();
            assert!(
                current == self.owner,
                "command queue {} used from {current:?} but is owned by {:?}",
                self.queue_idx,
                self.owner
            );
        }
        self.sync.lock()
    }

    /// Appends a fire-and-forget callback.
    #[track_caller]
    pub fn queue<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let location = Location::caller();
        self.lock().queue(callback, None, location);
    }

    /// Appends a callback whose completion is reported to the notify callback of
    /// [`CommandBatch::playback_with_notify`] as `callback_id`.
    #[track_caller]
    pub fn queue_notify<F>(&self, callback: F, callback_id: u32)
    where
        F: FnOnce() + Send + 'static,
    {
        let location = Location::caller();
        self.lock().queue(callback, Some(callback_id), location);
    }

    /// Appends a callback that must resolve the [`AsyncOp`] it receives.
    ///
    /// The op is returned unresolved. If the callback returns without resolving
    /// it, playback resolves it empty.
    #[track_caller]
    pub fn queue_return<F>(&self, callback: F) -> AsyncOp
    where
        F: FnOnce(&AsyncOp) + Send + 'static,
    {
        let location = Location::caller();
        self.lock().queue_return(callback, None, location)
    }

    /// Like [`CommandQueue::queue_return`], reporting completion as `callback_id`.
    #[track_caller]
    pub fn queue_return_notify<F>(&self, callback: F, callback_id: u32) -> AsyncOp
    where
        F: FnOnce(&AsyncOp) + Send + 'static,
    {
        let location = Location::caller();
        self.lock()
            .queue_return(callback, Some(callback_id), location)
    }

    /// Takes every pending command out of the queue.
    #[track_caller]
    pub fn flush(&self) -> CommandBatch {
        self.lock().flush()
    }

    /// Drops every pending command without running it.
    #[track_caller]
    pub fn cancel_all(&self) {
        self.lock().cancel_all();
    }

    /// Returns `true` if nothing is pending.
    #[track_caller]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<S: QueueSync> fmt::Debug for CommandQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("queue_idx", &self.queue_idx)
            .field("synced", &S::SYNCED)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Commands taken out of a queue by a flush, waiting to be played back.
///
/// Dropping a batch without playing it back discards its commands; their
/// [`AsyncOp`]s resolve as failed.
pub struct CommandBatch {
    commands: Vec<QueuedCommand>,
    pool: Weak<Mutex<Vec<Vec<QueuedCommand>>>>,
}

impl CommandBatch {
    /// Number of commands in the batch.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if the batch holds no command.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Runs every command in queue order. Returns the number of commands run.
    pub fn playback(self) -> usize {
        self.playback_with_notify(|_| {})
    }

    /// Runs every command in queue order, calling `notify` with the callback id
    /// of each command queued with a notification, right after it ran.
    pub fn playback_with_notify(mut self, mut notify: impl FnMut(u32)) -> usize {
        let mut commands = std::mem::take(&mut self.commands);
        let count = commands.len();
        for mut command in commands.drain(..) {
            command.execute();
            if command.notify_when_complete {
                notify(command.callback_id);
            }
        }
        self.commands = commands;
        count
    }
}

impl Drop for CommandBatch {
    fn drop(&mut self) {
        let mut commands = std::mem::take(&mut self.commands);
        commands.clear();
        if let Some(pool) = self.pool.upgrade() {
            let mut pool = lock_unpoisoned(&pool);
            if pool.len() < MAX_POOLED_BUFFERS {
                pool.push(commands);
            }
        }
    }
}

impl fmt::Debug for CommandBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBatch")
            .field("commands", &self.commands.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> Box<dyn FnOnce() + Send>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |value: u32| -> Box<dyn FnOnce() + Send> {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().unwrap().push(value))
        };
        (log, make)
    }

    #[test]
    fn test_playback_is_fifo() {
        let queue = CommandQueue::<Unsynced>::new(true);
        let (log, make) = recorder();

        queue.queue(make(1));
        let op = queue.queue_return({
            let entry = make(2);
            move |op: &AsyncOp| {
                entry();
                op.complete_operation(2u32);
            }
        });
        queue.queue(make(3));
        assert!(!op.is_resolved());

        let batch = queue.flush();
        assert!(queue.is_empty());
        assert_eq!(batch.playback(), 3);

        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(op.return_value::<u32>(), Some(2));
    }

    #[test]
    fn test_unresolved_op_is_defaulted() {
        let queue = CommandQueue::<Synced>::new(true);
        let op = queue.queue_return(|_| {});
        queue.flush().playback();
        assert!(op.is_resolved());
        assert!(!op.is_failed());
        assert_eq!(op.return_value::<u32>(), None);
    }

    #[test]
    fn test_notify_after_each_command() {
        let queue = CommandQueue::<Synced>::new(false);
        let (log, make) = recorder();

        queue.queue_notify(make(10), 7);
        queue.queue(make(20));
        queue.queue_return_notify(|op| {
            op.complete_operation(());
        }, 9);

        let mut notified = Vec::new();
        queue.flush().playback_with_notify(|id| {
            notified.push((id, log.lock().unwrap().len()));
        });
        // Notification for 7 arrives after command 10 ran but before 20 did.
        assert_eq!(notified, vec![(7, 1), (9, 2)]);
    }

    #[test]
    fn test_cancel_all_discards_pending_commands() {
        let queue = CommandQueue::<Unsynced>::new(true);
        let (log, make) = recorder();

        queue.queue(make(1));
        let op = queue.queue_return(|op| {
            op.complete_operation(1u8);
        });
        queue.cancel_all();
        assert!(queue.is_empty());
        assert_eq!(queue.flush().playback(), 0);

        assert!(log.lock().unwrap().is_empty());
        assert!(op.is_failed());
    }

    #[test]
    fn test_flushed_batch_is_independent_of_later_commands() {
        let queue = CommandQueue::<Unsynced>::new(true);
        let (log, make) = recorder();

        queue.queue(make(1));
        let batch = queue.flush();
        queue.queue(make(2));
        queue.cancel_all();

        assert_eq!(batch.len(), 1);
        batch.playback();
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_panicking_command_does_not_stop_playback() {
        let queue = CommandQueue::<Unsynced>::new(true);
        let (log, make) = recorder();

        queue.queue(|| panic!("boom"));
        let failing = queue.queue_return(|_| panic!("bad read"));
        queue.queue(make(2));

        assert_eq!(queue.flush().playback(), 3);
        assert_eq!(*log.lock().unwrap(), vec![2]);
        assert!(failing.is_failed());
        assert_eq!(failing.failure(), Some("command panicked: bad read"));
    }

    #[test]
    fn test_unsynced_queue_rejects_other_threads() {
        let queue = Arc::new(Mutex::new(CommandQueue::<Unsynced>::new(true)));
        let (tx, rx) = mpsc::channel();
        let shared = Arc::clone(&queue);
        let result = thread::spawn(move || {
            let guard = shared.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| guard.queue(|| {})));
            tx.send(outcome.is_err()).unwrap();
        })
        .join();
        assert!(result.is_ok());
        assert!(rx.recv().unwrap());
    }

    #[test]
    fn test_notify_ids_skip_zero() {
        let queue = CommandQueue::<Synced>::new(false);
        let mut state = queue.lock();
        state.next_notify_id = u32::MAX;
        assert_eq!(state.next_notify_id(), 1);
        assert_eq!(state.next_notify_id(), 2);
    }

    #[test]
    fn test_debug_ids_follow_queue_order() {
        let queue = CommandQueue::<Unsynced>::new(true);
        queue.queue(|| {});
        queue.queue(|| {});
        let batch = queue.flush();
        let ids: Vec<_> = batch.commands.iter().map(QueuedCommand::debug_id).collect();
        assert_eq!(ids[0].queue_idx, queue.queue_idx());
        assert_eq!(ids[0].command_idx, 0);
        assert_eq!(ids[1].command_idx, 1);
    }
}
