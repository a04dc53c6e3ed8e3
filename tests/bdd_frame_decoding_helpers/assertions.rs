//! Then-step assertions for frame decoding scenarios.

use podwire::engine::{Frame, StreamType};
use rstest_bdd_macros::then;

use super::state::{DecodingOutcome, FrameDecodingState};
use super::steps::StepResult;

fn decoded_frames(state: &FrameDecodingState) -> StepResult<Vec<Frame>> {
    match state.outcome.get() {
        Some(DecodingOutcome::Frames(frames)) => Ok(frames),
        Some(DecodingOutcome::Failure { message }) => {
            Err(format!("expected frames, decoding failed: {message}"))
        }
        None => Err(String::from("decoding outcome should be recorded")),
    }
}

fn failure_message(state: &FrameDecodingState) -> StepResult<String> {
    match state.outcome.get() {
        Some(DecodingOutcome::Failure { message }) => Ok(message),
        Some(DecodingOutcome::Frames(frames)) => Err(format!(
            "expected decoding to fail, got {} frames",
            frames.len()
        )),
        None => Err(String::from("decoding outcome should be recorded")),
    }
}

fn frame_at(state: &FrameDecodingState, position: usize) -> StepResult<Frame> {
    let frames = decoded_frames(state)?;
    position
        .checked_sub(1)
        .and_then(|index| frames.get(index).cloned())
        .ok_or_else(|| format!("no frame at position {position}"))
}

fn stream_type(name: &str) -> StepResult<StreamType> {
    match name {
        "stdin" => Ok(StreamType::Stdin),
        "stdout" => Ok(StreamType::Stdout),
        "stderr" => Ok(StreamType::Stderr),
        "raw" => Ok(StreamType::Raw),
        other => Err(format!("unknown stream name {other}")),
    }
}

#[then("{count} frames are produced")]
fn frames_are_produced(frame_decoding_state: &FrameDecodingState, count: usize) -> StepResult<()> {
    let frames = decoded_frames(frame_decoding_state)?;
    if frames.len() == count {
        Ok(())
    } else {
        Err(format!("expected {count} frames, got {}", frames.len()))
    }
}

#[then("frame {position} is {stream} with an empty payload")]
fn frame_has_empty_payload(
    frame_decoding_state: &FrameDecodingState,
    position: usize,
    stream: String,
) -> StepResult<()> {
    let frame = frame_at(frame_decoding_state, position)?;
    if frame.stream_type != stream_type(&stream)? {
        return Err(format!("expected {stream}, got {:?}", frame.stream_type));
    }
    if frame.payload.is_empty() {
        Ok(())
    } else {
        Err(format!("expected empty payload, got {:?}", frame.payload))
    }
}

#[then("frame {position} is {stream} with payload {payload}")]
fn frame_has_payload(
    frame_decoding_state: &FrameDecodingState,
    position: usize,
    stream: String,
    payload: String,
) -> StepResult<()> {
    let frame = frame_at(frame_decoding_state, position)?;
    if frame.stream_type != stream_type(&stream)? {
        return Err(format!("expected {stream}, got {:?}", frame.stream_type));
    }
    if frame.payload.as_ref() == payload.as_bytes() {
        Ok(())
    } else {
        Err(format!("expected payload {payload}, got {:?}", frame.payload))
    }
}

#[then("decoding fails with an unknown stream type error")]
fn decoding_fails_with_unknown_stream_type(
    frame_decoding_state: &FrameDecodingState,
) -> StepResult<()> {
    let message = failure_message(frame_decoding_state)?;
    if message.contains("unknown stream type") {
        Ok(())
    } else {
        Err(format!("unexpected failure: {message}"))
    }
}

#[then("decoding fails with a truncated frame error")]
fn decoding_fails_with_truncated_frame(
    frame_decoding_state: &FrameDecodingState,
) -> StepResult<()> {
    let message = failure_message(frame_decoding_state)?;
    if message.contains("stream ended inside frame payload") {
        Ok(())
    } else {
        Err(format!("unexpected failure: {message}"))
    }
}
