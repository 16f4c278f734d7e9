// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Shared output destinations.
//!
//! Every destination is owned by one writer task. Streamers only ever hand it complete lines,
//! so lines from different instances interleave but are never torn. The queue in front of a
//! writer is bounded: a stalled destination stalls the streamers, and through their pipes the
//! children.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::Error;

/// Lines queued per destination before senders have to wait
pub const QUEUE_DEPTH: usize = 256;

#[derive(Debug)]
enum Output {
    Line(String),
    Flush(oneshot::Sender<()>),
}

/// A cloneable handle feeding one destination's writer task
#[derive(Clone, Debug)]
pub struct SinkHandle {
    name: &'static str,
    tx: mpsc::Sender<Output>,
}

impl SinkHandle {
    /// Spawns the writer task for `writer` and returns the handle that feeds it
    pub fn spawn<W>(name: &'static str, writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(write_lines(name, writer, rx));

        Self { name, tx }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queue a line, the newline is appended by the writer
    ///
    /// Waits while the queue is full.
    pub async fn send_line(&self, line: String) {
        if self.tx.send(Output::Line(line)).await.is_err() {
            debug!("{} sink is closed, dropping line", self.name);
        }
    }

    /// Resolves once everything queued before this call has been written
    pub async fn flush(&self) -> Result<(), Error> {
        let (done, wait) = oneshot::channel();
        self.tx
            .send(Output::Flush(done))
            .await
            .map_err(|_| Error::from(format!("{} sink is closed", self.name)))?;

        wait.await
            .map_err(|_| Error::from(format!("{} sink stopped before flushing", self.name)))
    }
}

async fn write_lines<W>(name: &'static str, mut writer: W, mut rx: mpsc::Receiver<Output>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(output) = rx.recv().await {
        let result = match output {
            Output::Line(mut line) => {
                line.push('\n');
                match writer.write_all(line.as_bytes()).await {
                    Ok(()) => writer.flush().await,
                    Err(err) => Err(err),
                }
            }
            Output::Flush(done) => {
                let result = writer.flush().await;
                // the caller may have given up waiting
                let _ = done.send(());
                result
            }
        };

        if let Err(err) = result {
            warn!("failed writing to {}: {}", name, err);
            return;
        }
    }

    debug!("{} sink closed", name);
}

/// The two shared destinations, stdout and stderr
#[derive(Clone, Debug)]
pub struct Sinks {
    stdout: SinkHandle,
    stderr: SinkHandle,
}

impl Sinks {
    /// Sinks writing to this process's own stdout and stderr
    pub fn stdio() -> Self {
        Self::from_writers(tokio::io::stdout(), tokio::io::stderr())
    }

    pub fn from_writers<O, E>(stdout: O, stderr: E) -> Self
    where
        O: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            stdout: SinkHandle::spawn("stdout", stdout),
            stderr: SinkHandle::spawn("stderr", stderr),
        }
    }

    pub fn stdout(&self) -> &SinkHandle {
        &self.stdout
    }

    /// Also the destination of all reports about instances
    pub fn stderr(&self) -> &SinkHandle {
        &self.stderr
    }

    pub async fn flush(&self) -> Result<(), Error> {
        self.stdout.flush().await?;
        self.stderr.flush().await
    }
}

/// An in memory destination, clones share the same buffer
#[derive(Clone, Debug, Default)]
pub struct MemoryWriter(Arc<Mutex<Vec<u8>>>);

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// The written lines, without their newlines
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl AsyncWrite for MemoryWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
