// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Counts {
    issued: AtomicUsize,
    outstanding: AtomicUsize,
    notify: Notify,
}

/// Counting barrier over every streamer of a run
///
/// Each streamer owns a [`CompletionToken`], dropping it is the streamer's single completion
/// signal. [`Completion::wait`] returns once every token handed out has been dropped.
#[derive(Debug, Default)]
pub struct Completion {
    counts: Arc<Counts>,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CompletionToken {
        self.counts.issued.fetch_add(1, Ordering::SeqCst);
        self.counts.outstanding.fetch_add(1, Ordering::SeqCst);

        CompletionToken {
            counts: Arc::clone(&self.counts),
        }
    }

    /// Number of tokens handed out so far
    pub fn issued(&self) -> usize {
        self.counts.issued.load(Ordering::SeqCst)
    }

    /// Number of tokens already dropped
    ///
    /// A token issued between the two loads can make `outstanding` the larger one.
    pub fn completed(&self) -> usize {
        self.issued().saturating_sub(self.outstanding())
    }

    fn outstanding(&self) -> usize {
        self.counts.outstanding.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        loop {
            // registered before the check so a concurrent final drop can't be missed
            let notified = self.counts.notify.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Held by one streamer for as long as it runs
#[derive(Debug)]
pub struct CompletionToken {
    counts: Arc<Counts>,
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if self.counts.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.counts.notify.notify_waiters();
        }
    }
}
