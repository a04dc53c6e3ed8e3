//! Lazy, cancellable decoding of streamed response bodies.
//!
//! A [`DecodedStream`] pulls bytes from a response body only when the caller
//! asks for the next item, decodes at most one unit per poll, and stops as soon
//! as its [`CancellationToken`] fires or its session deadline passes. Once the
//! stream ends for any reason the body reader is dropped, which hands the
//! connection back to the pool (or closes it).

mod frames;
mod json_seq;

#[cfg(test)]
mod tests;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::BytesMut;
use futures_util::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio::time::Sleep;
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, info, warn};

pub use self::frames::{Frame, FrameCodec, FrameMode, StreamType};
pub use self::json_seq::JsonSeqCodec;
use crate::error::{DecodeError, WireError};

/// Byte source feeding a decoded stream.
pub type BodyReader = Pin<Box<dyn AsyncRead + Send>>;

/// Lazy sequence of output frames.
pub type FrameStream = DecodedStream<FrameCodec>;

/// Lazy sequence of JSON values decoded into `T`.
pub type JsonStream<T> = DecodedStream<JsonSeqCodec<T>>;

/// Lifecycle of a decoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// At a unit boundary, nothing buffered.
    Ready,
    /// Part of a frame header is buffered.
    ReadingHeader,
    /// Part of a unit's payload is buffered.
    ReadingPayload,
    /// The body ended cleanly.
    Exhausted,
    /// The caller cancelled or the session deadline passed.
    Cancelled,
    /// Decoding failed; the error has been yielded.
    Errored,
}

impl StreamState {
    /// Whether the stream can yield no further items.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exhausted | Self::Cancelled | Self::Errored)
    }
}

/// Reports how far a codec is through its current unit.
pub trait UnitProgress {
    /// State implied by the bytes still buffered after a decode attempt.
    fn progress(&self, buffered: &BytesMut) -> StreamState;
}

/// Largest frame, line or JSON value a stream buffers by default (64 MiB).
pub const DEFAULT_MAX_UNIT_LEN: usize = 64 * 1024 * 1024;

/// Per-call knobs for streaming responses.
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Token that ends the stream when cancelled.
    pub cancel: CancellationToken,
    /// Upper bound on the whole streaming session. `None` uses the client
    /// default.
    pub timeout: Option<Duration>,
    /// Largest unit the client's codec will buffer. `None` uses
    /// [`DEFAULT_MAX_UNIT_LEN`].
    pub max_unit_len: Option<usize>,
}

impl StreamOptions {
    /// Options bound to an existing cancellation token.
    #[must_use]
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..Self::default()
        }
    }

    /// Set the session timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cap the size of a single decoded unit.
    #[must_use]
    pub fn max_unit_len(mut self, limit: usize) -> Self {
        self.max_unit_len = Some(limit);
        self
    }

    /// Effective unit size limit.
    #[must_use]
    pub fn unit_limit(&self) -> usize {
        self.max_unit_len.unwrap_or(DEFAULT_MAX_UNIT_LEN)
    }
}

/// Items decoded lazily from a response body.
pub struct DecodedStream<D> {
    inner: Option<FramedRead<BodyReader, D>>,
    token: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    deadline: Option<Pin<Box<Sleep>>>,
    state: StreamState,
}

impl<D> DecodedStream<D> {
    /// Wrap a byte source with a codec.
    ///
    /// The session deadline starts now. Must be called within a tokio runtime
    /// when `timeout` is set.
    pub fn new<R>(reader: R, decoder: D, options: StreamOptions) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        let body: BodyReader = Box::pin(reader);
        let StreamOptions { cancel, timeout, .. } = options;
        Self {
            inner: Some(FramedRead::new(body, decoder)),
            cancelled: Box::pin(cancel.clone().cancelled_owned()),
            token: cancel,
            deadline: timeout.map(|duration| Box::pin(tokio::time::sleep(duration))),
            state: StreamState::Ready,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> StreamState {
        self.state
    }

    /// Token that cancels this stream.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stop decoding and release the body.
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.terminate(StreamState::Cancelled);
    }

    fn terminate(&mut self, state: StreamState) {
        if self.state.is_terminal() {
            return;
        }
        self.state = state;
        if let Some(reader) = self.inner.take() {
            let unread = reader.read_buffer().len();
            debug!(?state, unread, "stream terminated, releasing body");
        }
    }

    fn should_stop(&mut self, cx: &mut Context<'_>) -> bool {
        if self.token.is_cancelled() || self.cancelled.as_mut().poll(cx).is_ready() {
            return true;
        }
        self.deadline
            .as_mut()
            .is_some_and(|deadline| deadline.as_mut().poll(cx).is_ready())
    }
}

impl<D> fmt::Debug for DecodedStream<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedStream")
            .field("state", &self.state)
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<D> Stream for DecodedStream<D>
where
    D: Decoder<Error = DecodeError> + UnitProgress + Unpin,
{
    type Item = Result<D::Item, DecodeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.inner.is_none() {
            return Poll::Ready(None);
        }
        if this.should_stop(cx) {
            this.terminate(StreamState::Cancelled);
            return Poll::Ready(None);
        }
        let Some(reader) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match reader.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(item))) => {
                this.state = StreamState::Ready;
                Poll::Ready(Some(Ok(item)))
            }
            Poll::Ready(Some(Err(error))) => {
                this.terminate(StreamState::Errored);
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                this.terminate(StreamState::Exhausted);
                Poll::Ready(None)
            }
            Poll::Pending => {
                this.state = reader.decoder().progress(reader.read_buffer());
                Poll::Pending
            }
        }
    }
}

/// Receives the items of a stream as they are decoded.
///
/// All methods except [`StreamCallback::on_next`] have no-op defaults.
pub trait StreamCallback<T> {
    /// Called once before the first item, with the token that cancels the
    /// stream.
    fn on_starting(&mut self, _cancel: &CancellationToken) {}

    /// Called for every decoded item, in order.
    fn on_next(&mut self, item: T);

    /// Called once if decoding fails. No further calls follow.
    fn on_failed(&mut self, _error: &WireError) {}

    /// Called once when the stream ends without error, including after
    /// cancellation.
    fn on_finished(&mut self) {}
}

/// Feed every item of `stream` to `callback`.
///
/// # Errors
///
/// Returns the decode error that ended the stream, after passing it to
/// [`StreamCallback::on_failed`].
pub async fn drive<D, C>(mut stream: DecodedStream<D>, callback: &mut C) -> Result<(), WireError>
where
    D: Decoder<Error = DecodeError> + UnitProgress + Unpin,
    C: StreamCallback<D::Item> + ?Sized,
{
    callback.on_starting(stream.cancellation_token());
    while let Some(item) = stream.next().await {
        match item {
            Ok(value) => callback.on_next(value),
            Err(error) => {
                let wire_error = WireError::from(error);
                callback.on_failed(&wire_error);
                return Err(wire_error);
            }
        }
    }
    callback.on_finished();
    Ok(())
}

/// Callback that logs every item at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCallback {
    received: u64,
}

impl LoggingCallback {
    /// Number of items seen so far.
    #[must_use]
    pub const fn received(&self) -> u64 {
        self.received
    }
}

impl<T: fmt::Debug> StreamCallback<T> for LoggingCallback {
    fn on_next(&mut self, item: T) {
        self.received = self.received.saturating_add(1);
        info!(sequence = self.received, ?item, "stream item");
    }

    fn on_failed(&mut self, error: &WireError) {
        warn!(%error, received = self.received, "stream failed");
    }

    fn on_finished(&mut self) {
        info!(received = self.received, "stream finished");
    }
}
