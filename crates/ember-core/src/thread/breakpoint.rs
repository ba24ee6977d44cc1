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

//! Command breakpoints.
//!
//! Every queued command gets a [`CommandDebugId`] made of the index of its queue
//! and its position in that queue. Registering that pair here makes playback
//! report where the command was queued from when it is about to run, which
//! helps trace a misbehaving core thread command back to its call site.

use crate::utils::lock_unpoisoned;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Identifies one command across every queue of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandDebugId {
    /// Index of the queue the command was pushed to.
    pub queue_idx: u32,
    /// Position of the command in its queue, counted across flushes.
    pub command_idx: u32,
}

/// Called when a command with a registered breakpoint is played back.
pub type BreakpointHook = fn(CommandDebugId, &'static Location<'static>);

static ARMED: AtomicBool = AtomicBool::new(false);
static BREAKPOINTS: Mutex<Vec<CommandDebugId>> = Mutex::new(Vec::new());
static HOOK: Mutex<Option<BreakpointHook>> = Mutex::new(None);

/// Registers a breakpoint on the given command.
pub fn add_breakpoint(queue_idx: u32, command_idx: u32) {
    let mut breakpoints = lock_unpoisoned(&BREAKPOINTS);
    breakpoints.push(CommandDebugId {
        queue_idx,
        command_idx,
    });
    ARMED.store(true, Ordering::Release);
}

/// Removes a breakpoint. Returns `false` if it was not registered.
pub fn remove_breakpoint(queue_idx: u32, command_idx: u32) -> bool {
    let mut breakpoints = lock_unpoisoned(&BREAKPOINTS);
    let id = CommandDebugId {
        queue_idx,
        command_idx,
    };
    let Some(position) = breakpoints.iter().position(|bp| *bp == id) else {
        return false;
    };
    breakpoints.swap_remove(position);
    ARMED.store(!breakpoints.is_empty(), Ordering::Release);
    true
}

/// Removes every breakpoint.
pub fn clear_breakpoints() {
    lock_unpoisoned(&BREAKPOINTS).clear();
    ARMED.store(false, Ordering::Release);
}

/// Installs a hook run on every breakpoint hit, replacing the previous one.
pub fn set_breakpoint_hook(hook: Option<BreakpointHook>) {
    *lock_unpoisoned(&HOOK) = hook;
}

pub(crate) fn check(id: CommandDebugId, location: &'static Location<'static>) {
    if !ARMED.load(Ordering::Acquire) {
        return;
    }
    if !lock_unpoisoned(&BREAKPOINTS).contains(&id) {
        return;
    }

    log::warn!(
        "Breakpoint hit on command {}:{} queued at {location}",
        id.queue_idx,
        id.command_idx
    );
    let hook = *lock_unpoisoned(&HOOK);
    if let Some(hook) = hook {
        hook(id, location);
    }
}
