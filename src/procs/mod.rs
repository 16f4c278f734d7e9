// Copyright 2019 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod completion;
pub mod launcher;
pub mod logger;
mod shutdown;
mod supervisor;

pub use completion::{Completion, CompletionToken};
pub use logger::Stream;
pub use shutdown::{interrupted, ShutdownCoordinator};
pub use supervisor::Supervisor;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::label::{self, Label};

/// Observable lifecycle of an [`Instance`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Pending,
    Running,
    SpawnFailed,
    ExitedOk,
    ExitedError,
}

#[derive(Debug)]
enum State {
    Pending { terminate_requested: bool },
    Running { pid: Option<Pid>, signalled: bool },
    SpawnFailed,
    Exited { success: bool },
}

/// One requested replica of the command
///
/// The pid is only known while the child runs, so terminating is a noop before the child starts
/// and after it has been waited on.
#[derive(Debug)]
pub struct Instance {
    label: Label,
    state: Mutex<State>,
}

impl Instance {
    pub fn new(label: Label) -> Self {
        Self {
            label,
            state: Mutex::new(State::Pending {
                terminate_requested: false,
            }),
        }
    }

    pub fn id(&self) -> usize {
        self.label.id()
    }

    pub fn label(&self) -> &Label {
        &self.label
    }

    pub fn status(&self) -> Status {
        match *self.state() {
            State::Pending { .. } => Status::Pending,
            State::Running { .. } => Status::Running,
            State::SpawnFailed => Status::SpawnFailed,
            State::Exited { success: true } => Status::ExitedOk,
            State::Exited { success: false } => Status::ExitedError,
        }
    }

    /// Ask the child to stop with SIGTERM
    ///
    /// Each child is signalled at most once. A request made while the instance is still pending is
    /// delivered as soon as the child starts. Returns true if a signal was sent by this call.
    pub fn terminate(&self) -> bool {
        let mut state = self.state();
        match &mut *state {
            State::Pending {
                terminate_requested,
            } => {
                *terminate_requested = true;
                false
            }
            State::Running {
                pid: Some(pid),
                signalled,
            } if !*signalled => {
                *signalled = true;
                self.signal(*pid)
            }
            _ => false,
        }
    }

    pub(crate) fn mark_running(&self, pid: Option<Pid>) {
        let mut state = self.state();
        let requested = matches!(
            *state,
            State::Pending {
                terminate_requested: true
            }
        );

        *state = State::Running {
            pid,
            signalled: requested,
        };

        if let (true, Some(pid)) = (requested, pid) {
            debug!("delivering deferred terminate to instance {}", self.id());
            self.signal(pid);
        }
    }

    pub(crate) fn mark_spawn_failed(&self) {
        *self.state() = State::SpawnFailed;
    }

    pub(crate) fn mark_exited(&self, success: bool) {
        *self.state() = State::Exited { success };
    }

    fn signal(&self, pid: Pid) -> bool {
        match kill(pid, Signal::SIGTERM) {
            Ok(()) => {
                debug!("sent SIGTERM to instance {} ({})", self.id(), pid);
                true
            }
            Err(err) => {
                warn!("failed to signal instance {} ({}): {}", self.id(), pid, err);
                false
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Every instance of a run, built before any task starts and never appended to afterwards
#[derive(Debug)]
pub struct Registry {
    instances: Vec<Arc<Instance>>,
}

impl Registry {
    /// `count` pending instances labeled for display
    pub fn new(count: usize, template: Option<&str>, color: bool) -> Self {
        let instances = (0..count)
            .map(|index| Arc::new(Instance::new(label::assign(index, count, template, color))))
            .collect();

        Self { instances }
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Instance by its 1-based id
    pub fn get(&self, id: usize) -> Option<&Arc<Instance>> {
        id.checked_sub(1).and_then(|index| self.instances.get(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Instance>> {
        self.instances.iter()
    }

    /// Terminates every instance, returns how many were signalled
    pub fn terminate_all(&self) -> usize {
        self.instances
            .iter()
            .filter(|instance| instance.terminate())
            .count()
    }
}
