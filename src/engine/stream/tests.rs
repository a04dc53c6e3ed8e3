//! Unit tests for lazy stream decoding, cancellation and callbacks.

use std::io;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use rstest::rstest;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use super::{
    DecodedStream, Frame, FrameCodec, FrameStream, JsonSeqCodec, JsonStream, LoggingCallback,
    StreamCallback, StreamOptions, StreamState, StreamType, drive,
};
use crate::error::{DecodeError, WireError};

/// Byte source that yields `chunks` one read at a time.
fn chunked(
    chunks: &[&'static str],
) -> StreamReader<futures_util::stream::Iter<std::vec::IntoIter<io::Result<Bytes>>>, Bytes> {
    let items: Vec<io::Result<Bytes>> = chunks
        .iter()
        .copied()
        .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
        .collect();
    StreamReader::new(futures_util::stream::iter(items))
}

#[derive(Default)]
struct Recorder {
    started: bool,
    items: Vec<Value>,
    failed: Option<String>,
    finished: bool,
}

impl StreamCallback<Value> for Recorder {
    fn on_starting(&mut self, _cancel: &CancellationToken) {
        self.started = true;
    }

    fn on_next(&mut self, item: Value) {
        self.items.push(item);
    }

    fn on_failed(&mut self, error: &WireError) {
        self.failed = Some(error.to_string());
    }

    fn on_finished(&mut self) {
        self.finished = true;
    }
}

#[tokio::test]
async fn frames_split_across_reads_are_reassembled() {
    let reader = chunked(&[
        "\x01\x00\x00",
        "\x00\x00\x00\x00\x05hel",
        "lo\x02\x00\x00\x00\x00\x00\x00\x03err",
    ]);
    let stream: FrameStream =
        DecodedStream::new(reader, FrameCodec::multiplexed(), StreamOptions::default());

    let frames: Vec<Result<Frame, DecodeError>> = stream.collect().await;
    let frames: Vec<Frame> = frames.into_iter().filter_map(Result::ok).collect();
    assert_eq!(
        frames,
        vec![
            Frame::new(StreamType::Stdout, &b"hello"[..]),
            Frame::new(StreamType::Stderr, &b"err"[..]),
        ]
    );
}

#[tokio::test]
async fn exhausted_stream_reports_state_and_stays_ended() {
    let reader = chunked(&["one\ntwo"]);
    let mut stream = DecodedStream::new(reader, FrameCodec::lines(), StreamOptions::default());

    assert_eq!(stream.state(), StreamState::Ready);
    let mut lines = Vec::new();
    while let Some(frame) = stream.next().await {
        let Ok(frame) = frame else {
            panic!("unexpected decode failure");
        };
        lines.push(frame.payload);
    }
    assert_eq!(lines, vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);
    assert_eq!(stream.state(), StreamState::Exhausted);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn decode_error_is_yielded_once_then_the_stream_ends() {
    let reader = chunked(&["\x01\x00\x00\x00\x00\x00\x00\x01a\x07\x00\x00\x00\x00\x00\x00\x01b"]);
    let mut stream = DecodedStream::new(reader, FrameCodec::multiplexed(), StreamOptions::default());

    assert!(matches!(stream.next().await, Some(Ok(_))));
    assert!(matches!(
        stream.next().await,
        Some(Err(DecodeError::UnknownStreamType { byte: 7 }))
    ));
    assert_eq!(stream.state(), StreamState::Errored);
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn cancelling_ends_a_stalled_stream_without_partial_items() {
    let (mut writer, reader) = tokio::io::duplex(64);
    let cancel = CancellationToken::new();
    let mut stream = DecodedStream::new(
        reader,
        FrameCodec::multiplexed(),
        StreamOptions::with_cancel(cancel.clone()),
    );

    let Ok(()) = writer.write_all(b"\x01\x00\x00\x00\x00\x00\x00\x02o").await else {
        panic!("write failed");
    };
    let waiter = tokio::spawn(async move {
        let item = stream.next().await;
        (item.is_none(), stream.state())
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let Ok((ended, state)) = waiter.await else {
        panic!("stream task panicked");
    };
    assert!(ended, "a cancelled stream must not yield the partial frame");
    assert_eq!(state, StreamState::Cancelled);
}

#[tokio::test]
async fn cancel_before_first_poll_yields_nothing() {
    let reader = chunked(&["{\"a\":1}"]);
    let mut stream: JsonStream<Value> =
        DecodedStream::new(reader, JsonSeqCodec::new(), StreamOptions::default());

    stream.cancel();
    assert!(stream.cancellation_token().is_cancelled());
    assert!(stream.next().await.is_none());
    assert_eq!(stream.state(), StreamState::Cancelled);
}

#[tokio::test]
async fn session_deadline_cancels_quietly() {
    let (_writer, reader) = tokio::io::duplex(64);
    let mut stream = DecodedStream::new(
        reader,
        FrameCodec::lines(),
        StreamOptions::default().timeout(Duration::from_millis(50)),
    );

    assert!(stream.next().await.is_none());
    assert_eq!(stream.state(), StreamState::Cancelled);
}

#[tokio::test]
async fn drive_delivers_items_then_finishes() {
    let reader = chunked(&["{\"n\":1}\n{\"n\"", ":2}"]);
    let stream = DecodedStream::new(reader, JsonSeqCodec::<Value>::new(), StreamOptions::default());
    let mut recorder = Recorder::default();

    let result = drive(stream, &mut recorder).await;

    assert!(result.is_ok());
    assert!(recorder.started);
    assert!(recorder.finished);
    assert!(recorder.failed.is_none());
    assert_eq!(
        recorder.items,
        vec![serde_json::json!({"n": 1}), serde_json::json!({"n": 2})]
    );
}

#[tokio::test]
async fn drive_reports_failure_and_skips_finish() {
    let reader = chunked(&["{\"n\":1} nonsense"]);
    let stream = DecodedStream::new(reader, JsonSeqCodec::<Value>::new(), StreamOptions::default());
    let mut recorder = Recorder::default();

    let result = drive(stream, &mut recorder).await;

    assert!(matches!(
        result,
        Err(WireError::Decode(DecodeError::MalformedJson { .. }))
    ));
    assert_eq!(recorder.items.len(), 1);
    assert!(recorder.failed.is_some());
    assert!(!recorder.finished);
}

#[tokio::test]
async fn logging_callback_counts_items() {
    let reader = chunked(&["a\nb\nc\n"]);
    let stream = DecodedStream::new(reader, FrameCodec::lines(), StreamOptions::default());
    let mut callback = LoggingCallback::default();

    let Ok(()) = drive(stream, &mut callback).await else {
        panic!("expected the stream to finish");
    };
    assert_eq!(callback.received(), 3);
}

#[rstest]
#[case(StreamState::Ready, false)]
#[case(StreamState::ReadingHeader, false)]
#[case(StreamState::ReadingPayload, false)]
#[case(StreamState::Exhausted, true)]
#[case(StreamState::Cancelled, true)]
#[case(StreamState::Errored, true)]
fn terminal_states_are_identified(#[case] state: StreamState, #[case] terminal: bool) {
    assert_eq!(state.is_terminal(), terminal);
}
