//! Given/When steps for frame decoding scenarios.

use futures_util::StreamExt;
use podwire::engine::{DecodedStream, Frame, FrameCodec, StreamOptions};
use rstest_bdd_macros::{given, when};

use super::state::{DecodingOutcome, FrameDecodingState};

pub type StepResult<T> = Result<T, String>;

fn append(state: &FrameDecodingState, bytes: &[u8]) {
    let mut input = state.input.get().unwrap_or_default();
    input.extend_from_slice(bytes);
    state.input.set(input);
}

fn header(stream_type: u8, length: u32) -> Vec<u8> {
    let mut bytes = vec![stream_type, 0, 0, 0];
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes
}

fn stream_byte(name: &str) -> StepResult<u8> {
    match name {
        "stdin" => Ok(0),
        "stdout" => Ok(1),
        "stderr" => Ok(2),
        other => Err(format!("unknown stream name {other}")),
    }
}

fn multiplexed_frame(state: &FrameDecodingState, stream: &str, payload: &[u8]) -> StepResult<()> {
    let length = u32::try_from(payload.len()).map_err(|error| error.to_string())?;
    let mut bytes = header(stream_byte(stream)?, length);
    bytes.extend_from_slice(payload);
    state.multiplexed.set(true);
    append(state, &bytes);
    Ok(())
}

#[given("a multiplexed frame on {stream} carrying {payload}")]
fn multiplexed_frame_carrying(
    frame_decoding_state: &FrameDecodingState,
    stream: String,
    payload: String,
) -> StepResult<()> {
    let bytes: &[u8] = if payload == "nothing" {
        b""
    } else {
        payload.as_bytes()
    };
    multiplexed_frame(frame_decoding_state, &stream, bytes)
}

#[given("a raw stream line {line}")]
fn raw_stream_line(frame_decoding_state: &FrameDecodingState, line: String) {
    frame_decoding_state.multiplexed.set(false);
    append(frame_decoding_state, format!("{line}\n").as_bytes());
}

#[given("a multiplexed header with stream type {byte}")]
fn multiplexed_header_with_stream_type(frame_decoding_state: &FrameDecodingState, byte: u8) {
    frame_decoding_state.multiplexed.set(true);
    append(frame_decoding_state, &header(byte, 0));
}

#[given("a multiplexed header declaring {declared} bytes followed by {actual} bytes")]
fn truncated_multiplexed_frame(
    frame_decoding_state: &FrameDecodingState,
    declared: u32,
    actual: usize,
) {
    frame_decoding_state.multiplexed.set(true);
    let mut bytes = header(1, declared);
    bytes.extend(std::iter::repeat_n(b'x', actual));
    append(frame_decoding_state, &bytes);
}

#[when("the stream is decoded")]
fn the_stream_is_decoded(frame_decoding_state: &FrameDecodingState) -> StepResult<()> {
    let input = frame_decoding_state.input.get().unwrap_or_default();
    let multiplexed = frame_decoding_state.multiplexed.get().unwrap_or(true);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|error| format!("failed to create runtime: {error}"))?;
    let outcome = runtime.block_on(async move {
        let mut stream = DecodedStream::new(
            std::io::Cursor::new(input),
            FrameCodec::new(multiplexed),
            StreamOptions::default(),
        );
        let mut frames: Vec<Frame> = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(frame) => frames.push(frame),
                Err(error) => {
                    return DecodingOutcome::Failure {
                        message: error.to_string(),
                    };
                }
            }
        }
        DecodingOutcome::Frames(frames)
    });

    frame_decoding_state.outcome.set(outcome);
    Ok(())
}
