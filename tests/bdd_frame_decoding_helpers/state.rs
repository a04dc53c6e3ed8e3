//! Scenario state for frame decoding behavioural tests.

use podwire::engine::Frame;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

#[derive(Debug, Clone)]
pub(crate) enum DecodingOutcome {
    Frames(Vec<Frame>),
    Failure { message: String },
}

/// Shared state threaded through frame decoding scenario steps.
#[derive(Default, ScenarioState)]
pub struct FrameDecodingState {
    pub(crate) input: Slot<Vec<u8>>,
    pub(crate) multiplexed: Slot<bool>,
    pub(crate) outcome: Slot<DecodingOutcome>,
}

/// Provides a fresh scenario state with multiplexed decoding enabled.
#[fixture]
pub fn frame_decoding_state() -> FrameDecodingState {
    let state = FrameDecodingState::default();
    state.input.set(Vec::new());
    state.multiplexed.set(true);
    state
}
