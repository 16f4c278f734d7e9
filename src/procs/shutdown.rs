// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::FutureExt;
use futures::select;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::procs::Registry;
use crate::sink::SinkHandle;
use crate::Error;

pub const NOTICE: &str = "\nReceived interrupt signal, stopping all instances...";

/// Forwards one external interrupt to every instance of the run
///
/// Fires at most once. Firing only requests termination, it neither waits for the children nor
/// ends this process.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    registry: Arc<Registry>,
    errors: SinkHandle,
    fired: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(registry: Arc<Registry>, errors: SinkHandle) -> Self {
        Self {
            registry,
            errors,
            fired: AtomicBool::new(false),
        }
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Terminates every instance known to the registry, returns how many were signalled
    ///
    /// Only the first call does anything.
    pub async fn fire(&self) -> usize {
        if self.fired.swap(true, Ordering::SeqCst) {
            debug!("shutdown already requested");
            return 0;
        }

        self.errors.send_line(NOTICE.to_string()).await;
        let signalled = self.registry.terminate_all();
        debug!(
            "signalled {} of {} instances",
            signalled,
            self.registry.len()
        );
        signalled
    }

    /// Fires once `interrupt` resolves
    ///
    /// If the interrupt can't be listened for, the coordinator stays armed forever.
    pub fn spawn<F>(self: Arc<Self>, interrupt: F) -> JoinHandle<usize>
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        tokio::spawn(async move {
            match interrupt.await {
                Ok(()) => self.fire().await,
                Err(err) => {
                    warn!("not listening for interrupts: {}", err);
                    0
                }
            }
        })
    }
}

/// Installs the SIGINT and SIGTERM handlers, the returned future resolves on the first of either
///
/// From this call on, neither signal ends the process by default.
pub fn interrupted() -> Result<impl Future<Output = Result<(), Error>> + Send + 'static, Error> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        select! {
            _ = interrupt.recv().fuse() => debug!("received SIGINT"),
            _ = terminate.recv().fuse() => debug!("received SIGTERM"),
        }

        Ok(())
    })
}
