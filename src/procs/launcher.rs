// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::config::Options;
use crate::error::ErrorKind;
use crate::procs::{Completion, Registry, ShutdownCoordinator, Supervisor};
use crate::sink::Sinks;
use crate::Error;

/// How long exit reports are waited for once all output is drained
///
/// Children that keep running after closing their output don't hold up the run past this.
pub const EXIT_GRACE: Duration = Duration::from_millis(500);

/// What happened to the instances of a finished run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Instances whose child was started
    pub spawned: usize,
    /// Instances that never started
    pub failed: usize,
    /// Streamers that ran to completion, always twice `spawned`
    pub streamers: usize,
    /// Whether the interrupt fired during the run
    pub interrupted: bool,
}

pub fn validate_count(count: i64) -> Result<usize, Error> {
    if count < 1 {
        return Err(ErrorKind::InvalidCount(count).into());
    }

    Ok(count as usize)
}

/// Launch programs
///
/// Rules:
///   - the count is validated before anything is started
///   - every instance is started right away, in id order
///   - a failed start only affects that instance
///   - returns once all output of the started instances has been drained, the exits of children
///     that already ended have been reported, and both sinks are flushed
pub async fn run<F>(options: &Options, sinks: &Sinks, interrupt: F) -> Result<RunSummary, Error>
where
    F: Future<Output = Result<(), Error>> + Send + 'static,
{
    let count = validate_count(options.count)?;

    let registry = Arc::new(Registry::new(
        count,
        options.prefix.as_deref(),
        options.color,
    ));
    let coordinator = Arc::new(ShutdownCoordinator::new(
        Arc::clone(&registry),
        sinks.stderr().clone(),
    ));
    let listener = Arc::clone(&coordinator).spawn(interrupt);

    let completion = Completion::new();
    let mut summary = RunSummary::default();
    let mut supervisors = Vec::with_capacity(count);

    for instance in registry.iter() {
        match Supervisor::launch(
            Arc::clone(instance),
            &options.command,
            &options.args,
            sinks,
            &completion,
        )
        .await
        {
            Ok(supervisor) => {
                summary.spawned += 1;
                supervisors.push(supervisor);
            }
            Err(err) => {
                debug!("{}", err);
                summary.failed += 1;
            }
        }
    }

    debug!(
        "{} instances started, {} failed, waiting on {} streamers",
        summary.spawned,
        summary.failed,
        completion.issued()
    );
    completion.wait().await;

    let exits = join_all(supervisors.into_iter().map(Supervisor::wait));
    match tokio::time::timeout(EXIT_GRACE, exits).await {
        Ok(results) => {
            for err in results.into_iter().filter_map(Result::err) {
                warn!("{}", err);
            }
        }
        Err(_) => debug!("some instances are still running after their output closed"),
    }

    listener.abort();
    summary.streamers = completion.completed();
    summary.interrupted = coordinator.is_fired();

    sinks.flush().await?;
    Ok(summary)
}
