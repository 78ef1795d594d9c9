//! Streaming deltas: the bounded delta queue and the background-call helper.
//!
//! A streaming completion pushes deltas through a bounded
//! `tokio::sync::mpsc` channel. The sending half is a [`DeltaSink`] carried
//! in [`CompleteOptions::stream`]; the receiving half is drained by the
//! caller. When the consumer falls behind, the producer waits on the full
//! channel rather than buffering without bound.
//!
//! The channel is closed when every clone of the sink has been dropped.
//! Because options are passed by value, that happens as soon as the
//! completer returns, so a draining loop always terminates.
//!
//! [`spawn_completion`] runs a call on a background task and hands back a
//! [`CompletionStream`] for the foreground to drain.

mod normalize;

pub use normalize::{Fragment, Normalizer, VendorEvent, resolve_reason};

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use pin_project_lite::pin_project;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::providers::Completer;
use crate::types::{CompleteOptions, Completion, Message};
use crate::{Result, SwitchyardError};

/// Default number of deltas buffered between producer and consumer.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// Sending half of a delta queue.
///
/// Clones share the same channel and the same bookkeeping: once any clone
/// sends a terminal delta (one with a finish reason) the sink accepts no
/// further deltas.
#[derive(Debug, Clone)]
pub struct DeltaSink {
    tx: mpsc::Sender<Completion>,
    state: Arc<SinkState>,
}

#[derive(Debug, Default)]
struct SinkState {
    sent: AtomicUsize,
    finished: AtomicBool,
}

impl DeltaSink {
    /// Send one delta, waiting while the queue is full.
    ///
    /// Deltas offered after the terminal one are dropped. A receiver that
    /// has gone away yields [`SwitchyardError::Cancelled`].
    pub async fn send(&self, delta: Completion) -> Result<()> {
        if self.state.finished.load(Ordering::Acquire) {
            debug!(id = %delta.id, "dropping delta after terminal delta");
            return Ok(());
        }

        let terminal = delta.is_terminal();
        self.tx
            .send(delta)
            .await
            .map_err(|_| SwitchyardError::Cancelled)?;

        self.state.sent.fetch_add(1, Ordering::AcqRel);
        if terminal {
            self.state.finished.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Number of deltas delivered so far.
    pub fn sent(&self) -> usize {
        self.state.sent.load(Ordering::Acquire)
    }

    /// Whether the terminal delta has been delivered.
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }

    /// Whether the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a bounded delta queue holding at most `buffer` pending deltas.
pub fn delta_channel(buffer: usize) -> (DeltaSink, mpsc::Receiver<Completion>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (
        DeltaSink {
            tx,
            state: Arc::new(SinkState::default()),
        },
        rx,
    )
}

pin_project! {
    /// Deltas of a completion running on a background task.
    ///
    /// Yields deltas in emission order and ends when the call returns.
    /// [`finish`](Self::finish) then yields the call's result.
    pub struct CompletionStream {
        #[pin]
        deltas: ReceiverStream<Completion>,
        handle: JoinHandle<Result<Completion>>,
    }
}

impl CompletionStream {
    /// Drain any deltas not yet consumed and return the call's result.
    pub async fn finish(self) -> Result<Completion> {
        let CompletionStream { mut deltas, handle } = self;
        while deltas.next().await.is_some() {}

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(SwitchyardError::Stream(format!(
                "completion task failed: {e}"
            ))),
        }
    }
}

impl Stream for CompletionStream {
    type Item = Completion;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().deltas.poll_next(cx)
    }
}

/// Run `completer` on a background task with a fresh delta queue.
///
/// Any sink already present in `options` is replaced. Cancelling
/// `options.cancel` makes the call end with
/// [`SwitchyardError::Cancelled`] and closes the stream.
///
/// # Panics
///
/// Requires a tokio runtime context.
pub fn spawn_completion(
    completer: Arc<dyn Completer>,
    messages: Vec<Message>,
    options: CompleteOptions,
    buffer: usize,
) -> CompletionStream {
    let (sink, rx) = delta_channel(buffer);
    let options = options.stream(sink);

    let handle = tokio::spawn(async move { completer.complete(&messages, options).await });

    CompletionStream {
        deltas: ReceiverStream::new(rx),
        handle,
    }
}
