// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::label::Label;
use crate::procs::CompletionToken;
use crate::sink::SinkHandle;

/// Which output of the child a streamer reads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decorates every line read from `reader` and hands it to `sink`, in order
///
/// Lines end at `\n`, a preceding `\r` is dropped. A trailing fragment without a newline is still
/// a line. No more is read while the sink's queue is full. Returns the number of lines forwarded
/// once the reader is exhausted.
pub async fn stream_lines<R>(label: &Label, reader: R, sink: &SinkHandle) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(1024);
    let mut lines = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(lines);
        }

        trim_newline(&mut buf);
        sink.send_line(label.decorate(&String::from_utf8_lossy(&buf)))
            .await;
        lines += 1;
    }
}

/// Runs [`stream_lines`] as its own task
///
/// A read error is reported on `errors` and ends only this streamer. The completion token is
/// released when the task ends, however it ends.
pub fn spawn<R>(
    label: Label,
    reader: R,
    stream: Stream,
    sink: SinkHandle,
    errors: SinkHandle,
    token: CompletionToken,
) -> JoinHandle<usize>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let _token = token;

        match stream_lines(&label, reader, &sink).await {
            Ok(lines) => {
                debug!(
                    "instance {} {} closed after {} lines",
                    label.id(),
                    stream,
                    lines
                );
                lines
            }
            Err(err) => {
                errors
                    .send_line(format!(
                        "Error reading output from instance {}: {}",
                        label.id(),
                        err
                    ))
                    .await;
                0
            }
        }
    })
}

fn trim_newline(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncWriteExt, ReadBuf};

    use super::*;
    use crate::procs::Completion;
    use crate::sink::{MemoryWriter, Sinks, QUEUE_DEPTH};

    fn red_one() -> Label {
        Label::new(1, Some("\x1b[31m"), "[1]".to_string())
    }

    async fn stream(label: Label, input: &'static [u8]) -> Vec<String> {
        let out = MemoryWriter::new();
        let sinks = Sinks::from_writers(out.clone(), MemoryWriter::new());

        stream_lines(&label, input, sinks.stdout())
            .await
            .expect("read failed");
        sinks.flush().await.expect("flush failed");
        out.lines()
    }

    #[tokio::test]
    async fn test_single_line_with_color() {
        let lines = stream(red_one(), b"hello world\n").await;
        assert_eq!(lines, vec!["\x1b[31m[1] hello world\x1b[0m"]);
    }

    #[tokio::test]
    async fn test_multiple_lines() {
        let label = Label::new(2, Some("\x1b[32m"), "[2]".to_string());
        let lines = stream(label, b"line one\nline two\n").await;
        assert_eq!(
            lines,
            vec!["\x1b[32m[2] line one\x1b[0m", "\x1b[32m[2] line two\x1b[0m"]
        );
    }

    #[tokio::test]
    async fn test_no_color_keeps_reset() {
        let label = Label::new(1, None, "[1]".to_string());
        let lines = stream(label, b"plain text\n").await;
        assert_eq!(lines, vec!["[1] plain text\x1b[0m"]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        assert!(stream(red_one(), b"").await.is_empty());
    }

    #[tokio::test]
    async fn test_unterminated_and_blank_lines() {
        let label = Label::new(1, None, "[1]".to_string());
        let lines = stream(label, b"first\r\n\nlast").await;
        assert_eq!(lines, vec!["[1] first\x1b[0m", "[1] \x1b[0m", "[1] last\x1b[0m"]);
    }

    #[tokio::test]
    async fn test_lines_split_across_reads() {
        let out = MemoryWriter::new();
        let sinks = Sinks::from_writers(out.clone(), MemoryWriter::new());
        let (mut writer, reader) = tokio::io::duplex(8);

        let label = red_one();
        let sink = sinks.stdout().clone();
        let task = tokio::spawn(async move { stream_lines(&label, reader, &sink).await });

        writer.write_all(b"a long line that spans several reads\nsecond").await.expect("write");
        drop(writer);

        assert_eq!(task.await.expect("join").expect("read"), 2);
        sinks.flush().await.expect("flush failed");
        assert_eq!(
            out.lines(),
            vec![
                "\x1b[31m[1] a long line that spans several reads\x1b[0m",
                "\x1b[31m[1] second\x1b[0m"
            ]
        );
    }

    struct Paused;

    impl tokio::io::AsyncWrite for Paused {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Pending
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Pending
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    #[tokio::test]
    async fn test_paused_destination_stops_reading() {
        let sinks = Sinks::from_writers(Paused, MemoryWriter::new());
        let input = "some output from a busy child\n".repeat(QUEUE_DEPTH * 20);

        let label = red_one();
        let streaming = stream_lines(&label, input.as_bytes(), sinks.stdout());
        assert!(
            tokio::time::timeout(Duration::from_millis(200), streaming)
                .await
                .is_err(),
            "all output was queued for a destination that accepted nothing"
        );
    }

    struct Broken;

    impl AsyncRead for Broken {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "pipe exploded")))
        }
    }

    #[tokio::test]
    async fn test_read_error_is_reported() {
        let err = MemoryWriter::new();
        let sinks = Sinks::from_writers(MemoryWriter::new(), err.clone());
        let completion = Completion::new();

        let task = spawn(
            red_one(),
            Broken,
            Stream::Stdout,
            sinks.stdout().clone(),
            sinks.stderr().clone(),
            completion.token(),
        );

        assert_eq!(task.await.expect("streamer panicked"), 0);
        completion.wait().await;
        assert_eq!(completion.completed(), 1);

        sinks.flush().await.expect("flush failed");
        assert_eq!(
            err.lines(),
            vec!["Error reading output from instance 1: pipe exploded"]
        );
    }
}
