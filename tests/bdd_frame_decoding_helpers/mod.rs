//! Behavioural step helpers for frame decoding scenarios.

mod assertions;
mod state;
mod steps;

pub use state::{FrameDecodingState, frame_decoding_state};
