// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ffi::{OsStr, OsString};
use std::sync::Arc;

use tokio::process;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::fork::{self, Child};
use crate::procs::logger::{self, Stream};
use crate::procs::{Completion, Instance};
use crate::sink::{SinkHandle, Sinks};
use crate::Error;

/// Launch and monitor one instance
///
/// Rules:
///   - a failed start is reported and only affects this instance
///   - stdout and stderr are each streamed by their own task
///   - exit is watched independently of the output streams
#[derive(Debug)]
pub struct Supervisor {
    instance: Arc<Instance>,
    wait: JoinHandle<()>,
}

impl Supervisor {
    /// Starts the child for `instance` and attaches its streamers and exit watcher
    ///
    /// On failure the error has already been reported to the operator and no streamers exist.
    pub async fn launch(
        instance: Arc<Instance>,
        command: &OsStr,
        args: &[OsString],
        sinks: &Sinks,
        completion: &Completion,
    ) -> Result<Self, Error> {
        let child = match fork::new_process(instance.id(), command, args) {
            Ok(child) => child,
            Err(err) => {
                instance.mark_spawn_failed();
                warn!("instance {} failed to start", instance.id());
                sinks.stderr().send_line(err.to_string()).await;
                return Err(err);
            }
        };

        let pid = child.pid();
        instance.mark_running(pid);
        debug!("started instance {} as {:?}", instance.id(), pid);

        let Child {
            child,
            stdout,
            stderr,
        } = child;

        logger::spawn(
            instance.label().clone(),
            stdout,
            Stream::Stdout,
            sinks.stdout().clone(),
            sinks.stderr().clone(),
            completion.token(),
        );
        logger::spawn(
            instance.label().clone(),
            stderr,
            Stream::Stderr,
            sinks.stderr().clone(),
            sinks.stderr().clone(),
            completion.token(),
        );

        let wait = tokio::spawn(wait_for_exit(
            Arc::clone(&instance),
            child,
            sinks.stderr().clone(),
        ));

        Ok(Self { instance, wait })
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Resolves once the child has exited and its exit has been reported
    pub async fn wait(self) -> Result<(), Error> {
        let id = self.instance.id();
        self.wait.await.map_err(|err| {
            Error::from(format!("exit watcher for instance {} failed: {}", id, err))
        })
    }
}

async fn wait_for_exit(instance: Arc<Instance>, mut child: process::Child, errors: SinkHandle) {
    let report = match child.wait().await {
        Ok(status) if status.success() => {
            instance.mark_exited(true);
            debug!("instance {} exited cleanly", instance.id());
            return;
        }
        Ok(status) => status.to_string(),
        Err(err) => err.to_string(),
    };

    instance.mark_exited(false);
    errors
        .send_line(format!(
            "{} Command exited with error: {}",
            instance.label().tag(),
            report
        ))
        .await;
}
