// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::ffi::{OsStr, OsString};
use std::process::Stdio;

use nix::unistd::Pid;
use tokio::process::{ChildStderr, ChildStdout, Command};

use crate::error::ErrorKind;
use crate::Error;

pub struct StdIoConf {
    pub stdin: Stdio,
    pub stderr: Stdio,
    pub stdout: Stdio,
}

impl StdIoConf {
    /// Both outputs are captured for streaming, stdin is never read or written
    pub fn piped_output() -> Self {
        Self {
            stdin: Stdio::null(),
            stderr: Stdio::piped(),
            stdout: Stdio::piped(),
        }
    }
}

/// A started child with both of its output pipes taken
#[derive(Debug)]
pub struct Child {
    pub child: tokio::process::Child,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

impl Child {
    pub fn pid(&self) -> Option<Pid> {
        self.child.id().map(|id| Pid::from_raw(id as i32))
    }
}

/// Starts `command` for instance `id` with the parent's environment
pub fn new_process(id: usize, command: &OsStr, args: &[OsString]) -> Result<Child, Error> {
    let stdio = StdIoConf::piped_output();

    let mut child = Command::new(command)
        .args(args)
        .stdin(stdio.stdin)
        .stdout(stdio.stdout)
        .stderr(stdio.stderr)
        .spawn()
        .map_err(|source| ErrorKind::Spawn { id, source })?;

    let stdout = child.stdout.take().ok_or(ErrorKind::MissingPipe {
        id,
        stream: "stdout",
    })?;
    let stderr = child.stderr.take().ok_or(ErrorKind::MissingPipe {
        id,
        stream: "stderr",
    })?;

    Ok(Child {
        child,
        stdout,
        stderr,
    })
}
