//! Concurrent draining of child stdout/stderr
//!
//! A single task multiplexes readiness across both pipes: each loop iteration
//! races one bounded read per not-yet-finished stream under a shared stall
//! timer. Fine-grained reads keep the loop responsive to interleaved
//! output/error activity; a naive blocking read on one pipe can deadlock once
//! the other fills its OS buffer.

use std::io;
use std::mem;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::error;

use crate::error::RunnerError;

/// Bytes read per readiness wakeup. Bounded so one busy stream cannot starve
/// the other while it drains a backlog.
const READ_CHUNK: usize = 8192;

/// Per-stream drain state: the open pipe, the bytes accumulated by the
/// current drain call, and whether end-of-stream was reached.
///
/// Generic over the reader so the drain loop can be exercised against
/// in-memory streams.
#[derive(Debug)]
pub(crate) struct StreamState<R> {
    pipe: Option<R>,
    buf: Vec<u8>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> StreamState<R> {
    pub(crate) fn new(pipe: R) -> Self {
        Self {
            pipe: Some(pipe),
            buf: Vec::new(),
            eof: false,
        }
    }

    /// One bounded read, appended to the buffer. A zero-length read marks
    /// end-of-stream.
    async fn read_chunk(&mut self, scratch: &mut [u8]) -> io::Result<usize> {
        let Some(pipe) = self.pipe.as_mut() else {
            self.eof = true;
            return Ok(0);
        };
        let n = pipe.read(scratch).await?;
        if n == 0 {
            self.eof = true;
        } else {
            self.buf.extend_from_slice(&scratch[..n]);
        }
        Ok(n)
    }

    /// Take the bytes accumulated since the last take.
    fn take_buf(&mut self) -> Vec<u8> {
        mem::take(&mut self.buf)
    }

    /// Drop the pipe. Idempotent; a closed pipe counts as end-of-stream.
    pub(crate) fn close(&mut self) {
        self.pipe = None;
        self.eof = true;
    }
}

/// Outcome of one drain call: the bytes each stream contributed, and whether
/// both streams reached end-of-stream. `completed == false` is a stall — no
/// pipe became readable within the timeout while at least one was still open.
#[derive(Debug)]
pub(crate) struct DrainResult {
    pub(crate) stdout: Vec<u8>,
    pub(crate) stderr: Vec<u8>,
    pub(crate) completed: bool,
}

/// Read from both streams until both hit end-of-stream or a readiness wait
/// times out.
///
/// Buffers are appended in the order each read completes, so each stream's
/// bytes keep their write order. Pipes are never closed here; a stalled
/// stream keeps its state so a later drain call can pick up where this one
/// stopped.
pub(crate) async fn drain_streams<O, E>(
    stdout: &mut StreamState<O>,
    stderr: &mut StreamState<E>,
    read_timeout: Duration,
) -> Result<DrainResult, RunnerError>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_scratch = vec![0u8; READ_CHUNK];
    let mut err_scratch = vec![0u8; READ_CHUNK];

    let completed = loop {
        if stdout.eof && stderr.eof {
            break true;
        }

        let stdout_open = !stdout.eof;
        let stderr_open = !stderr.eof;
        let step = timeout(read_timeout, async {
            tokio::select! {
                result = stdout.read_chunk(&mut out_scratch), if stdout_open => ("stdout", result),
                result = stderr.read_chunk(&mut err_scratch), if stderr_open => ("stderr", result),
            }
        })
        .await;

        match step {
            Err(_) => {
                error!(?read_timeout, "process hung up: no readable output within timeout");
                break false;
            }
            Ok((stream, Err(e))) => {
                return Err(RunnerError::ReadFailed {
                    stream,
                    reason: e.to_string(),
                });
            }
            Ok((_, Ok(_))) => {}
        }
    };

    Ok(DrainResult {
        stdout: stdout.take_buf(),
        stderr: stderr.take_buf(),
        completed,
    })
}

/// Unconditional read-to-completion on both pipes.
///
/// Used after a forced kill: the pipes of a killed process close promptly,
/// so no stall timer applies.
pub(crate) async fn drain_to_eof<O, E>(
    stdout: &mut StreamState<O>,
    stderr: &mut StreamState<E>,
) -> Result<DrainResult, RunnerError>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    read_to_eof(stdout, "stdout").await?;
    read_to_eof(stderr, "stderr").await?;
    Ok(DrainResult {
        stdout: stdout.take_buf(),
        stderr: stderr.take_buf(),
        completed: true,
    })
}

async fn read_to_eof<R: AsyncRead + Unpin>(
    state: &mut StreamState<R>,
    stream: &'static str,
) -> Result<(), RunnerError> {
    if !state.eof {
        if let Some(pipe) = state.pipe.as_mut() {
            pipe.read_to_end(&mut state.buf)
                .await
                .map_err(|e| RunnerError::ReadFailed {
                    stream,
                    reason: e.to_string(),
                })?;
        }
        state.eof = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn drains_both_streams_to_eof() {
        let mut out = StreamState::new(&b"hello\n"[..]);
        let mut err = StreamState::new(&b"oops\n"[..]);

        let result = drain_streams(&mut out, &mut err, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(result.completed);
        assert_eq!(result.stdout, b"hello\n");
        assert_eq!(result.stderr, b"oops\n");
    }

    #[tokio::test]
    async fn empty_streams_complete_immediately() {
        let mut out = StreamState::new(&b""[..]);
        let mut err = StreamState::new(&b""[..]);

        let result = drain_streams(&mut out, &mut err, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(result.completed);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_streams_stall() {
        // Keep the write halves alive so neither pipe reaches EOF.
        let (_out_tx, out_rx) = tokio::io::duplex(64);
        let (_err_tx, err_rx) = tokio::io::duplex(64);
        let mut out = StreamState::new(out_rx);
        let mut err = StreamState::new(err_rx);

        let result = drain_streams(&mut out, &mut err, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!result.completed);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stall_keeps_partial_output() {
        let (mut out_tx, out_rx) = tokio::io::duplex(64);
        let (_err_tx, err_rx) = tokio::io::duplex(64);
        out_tx.write_all(b"partial").await.unwrap();

        let mut out = StreamState::new(out_rx);
        let mut err = StreamState::new(err_rx);

        let result = drain_streams(&mut out, &mut err, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!result.completed);
        assert_eq!(result.stdout, b"partial");
    }

    #[tokio::test(start_paused = true)]
    async fn one_finished_stream_does_not_mask_a_stall_on_the_other() {
        let (_out_tx, out_rx) = tokio::io::duplex(64);
        let mut out = StreamState::new(out_rx);
        let mut err = StreamState::new(&b"done\n"[..]);

        let result = drain_streams(&mut out, &mut err, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!result.completed);
        assert_eq!(result.stderr, b"done\n");
    }

    #[tokio::test(start_paused = true)]
    async fn later_drain_call_continues_from_prior_state() {
        let (mut out_tx, out_rx) = tokio::io::duplex(64);
        out_tx.write_all(b"first").await.unwrap();
        let mut out = StreamState::new(out_rx);
        let mut err = StreamState::new(&b""[..]);

        let first = drain_streams(&mut out, &mut err, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!first.completed);
        assert_eq!(first.stdout, b"first");

        out_tx.write_all(b" second").await.unwrap();
        drop(out_tx);

        let second = drain_streams(&mut out, &mut err, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(second.completed);
        assert_eq!(second.stdout, b" second");
    }

    #[tokio::test]
    async fn buffer_preserves_write_order() {
        let (mut out_tx, out_rx) = tokio::io::duplex(16);
        let mut out = StreamState::new(out_rx);
        let mut err = StreamState::new(&b""[..]);

        let writer = tokio::spawn(async move {
            for chunk in [&b"one "[..], b"two ", b"three"] {
                out_tx.write_all(chunk).await.unwrap();
            }
        });

        let result = drain_streams(&mut out, &mut err, Duration::from_secs(5))
            .await
            .unwrap();
        writer.await.unwrap();

        assert!(result.completed);
        assert_eq!(result.stdout, b"one two three");
    }

    #[tokio::test]
    async fn drain_to_eof_flushes_remaining_bytes() {
        let mut out = StreamState::new(&b"tail"[..]);
        let mut err = StreamState::new(&b""[..]);

        let result = drain_to_eof(&mut out, &mut err).await.unwrap();

        assert!(result.completed);
        assert_eq!(result.stdout, b"tail");
        assert!(result.stderr.is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut state = StreamState::new(&b"unread"[..]);
        state.close();
        state.close();
        assert!(state.eof);

        // A closed stream reads as end-of-stream, not an error.
        let mut err = StreamState::new(&b""[..]);
        let result = drain_streams(&mut state, &mut err, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(result.completed);
        assert!(result.stdout.is_empty());
    }
}
