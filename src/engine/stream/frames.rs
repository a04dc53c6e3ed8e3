//! Frame codec for container process output.
//!
//! Multiplexed output prefixes every chunk with an 8-byte header:
//! `[stream type, 0, 0, 0, length (u32, big-endian)]`. Unframed output (a
//! container with a TTY) is split into lines instead.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{DEFAULT_MAX_UNIT_LEN, StreamState, UnitProgress};
use crate::error::DecodeError;

const HEADER_LEN: usize = 8;

/// Origin of a frame's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// Standard input echoed back by the daemon.
    Stdin,
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
    /// Unframed output with no stream distinction.
    Raw,
}

impl StreamType {
    /// Map a multiplexed header byte to a stream type.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::UnknownStreamType` for any byte other than 0, 1
    /// or 2.
    pub const fn from_header_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0 => Ok(Self::Stdin),
            1 => Ok(Self::Stdout),
            2 => Ok(Self::Stderr),
            _ => Err(DecodeError::UnknownStreamType { byte }),
        }
    }

    /// Header byte for this stream type, `None` for [`StreamType::Raw`].
    #[must_use]
    pub const fn header_byte(self) -> Option<u8> {
        match self {
            Self::Stdin => Some(0),
            Self::Stdout => Some(1),
            Self::Stderr => Some(2),
            Self::Raw => None,
        }
    }
}

/// One unit of process output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Which stream the payload belongs to.
    pub stream_type: StreamType,
    /// Payload bytes, possibly empty.
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame from a stream type and payload.
    pub fn new(stream_type: StreamType, payload: impl Into<Bytes>) -> Self {
        Self {
            stream_type,
            payload: payload.into(),
        }
    }
}

/// Framing used by a daemon output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// 8-byte header framing with stdin/stdout/stderr separation.
    Multiplexed,
    /// Newline-delimited lines, each emitted as a [`StreamType::Raw`] frame.
    Lines,
}

/// Decoder for daemon output streams.
///
/// No frame payload or line longer than the unit limit is ever buffered; a
/// larger one fails with [`DecodeError::UnitTooLarge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCodec {
    mode: FrameMode,
    max_unit_len: usize,
    // Bytes of the pending line already searched for a newline.
    scanned: usize,
}

impl FrameCodec {
    /// Pick the codec for a response.
    #[must_use]
    pub const fn new(multiplexed: bool) -> Self {
        if multiplexed {
            Self::multiplexed()
        } else {
            Self::lines()
        }
    }

    /// Codec for the 8-byte header format.
    #[must_use]
    pub const fn multiplexed() -> Self {
        Self::with_mode(FrameMode::Multiplexed)
    }

    /// Codec splitting unframed output into lines.
    #[must_use]
    pub const fn lines() -> Self {
        Self::with_mode(FrameMode::Lines)
    }

    const fn with_mode(mode: FrameMode) -> Self {
        Self {
            mode,
            max_unit_len: DEFAULT_MAX_UNIT_LEN,
            scanned: 0,
        }
    }

    /// Cap the payload or line length this codec accepts.
    #[must_use]
    pub const fn with_max_unit_len(mut self, limit: usize) -> Self {
        self.max_unit_len = limit;
        self
    }

    /// Framing this codec decodes.
    #[must_use]
    pub const fn mode(&self) -> FrameMode {
        self.mode
    }

    const fn too_large(&self, unit: &'static str, size: usize) -> DecodeError {
        DecodeError::UnitTooLarge {
            unit,
            size,
            limit: self.max_unit_len,
        }
    }

    fn decode_multiplexed(&self, src: &mut BytesMut) -> Result<Option<Frame>, DecodeError> {
        let Some(mut header) = src.get(..HEADER_LEN) else {
            return Ok(None);
        };
        let stream_type = StreamType::from_header_byte(header.get_u8())?;
        header.advance(3);
        let length = payload_len(header.get_u32())?;
        if length > self.max_unit_len {
            return Err(self.too_large("frame payload", length));
        }

        if src.len() < HEADER_LEN.saturating_add(length) {
            return Ok(None);
        }
        src.advance(HEADER_LEN);
        let payload = src.split_to(length).freeze();
        Ok(Some(Frame::new(stream_type, payload)))
    }

    fn decode_line(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, DecodeError> {
        let found = src
            .iter()
            .skip(self.scanned)
            .position(|byte| *byte == b'\n')
            .map(|offset| offset.saturating_add(self.scanned));
        let Some(newline) = found else {
            self.scanned = src.len();
            if src.len() > self.max_unit_len {
                return Err(self.too_large("line", src.len()));
            }
            return Ok(None);
        };
        self.scanned = 0;
        if newline > self.max_unit_len {
            return Err(self.too_large("line", newline));
        }
        let mut line = src.split_to(newline.saturating_add(1));
        line.truncate(newline);
        if line.last() == Some(&b'\r') {
            line.truncate(newline.saturating_sub(1));
        }
        Ok(Some(Frame::new(StreamType::Raw, line.freeze())))
    }

    fn truncation(src: &BytesMut) -> DecodeError {
        let received = src.len();
        let declared = src
            .get(..HEADER_LEN)
            .map(|mut header| {
                header.advance(4);
                header.get_u32()
            })
            .and_then(|length| usize::try_from(length).ok());
        match declared {
            None => DecodeError::Truncated {
                unit: "frame header",
                expected: HEADER_LEN,
                received,
            },
            Some(length) => DecodeError::Truncated {
                unit: "frame payload",
                expected: length,
                received: received.saturating_sub(HEADER_LEN),
            },
        }
    }
}

fn payload_len(length: u32) -> Result<usize, DecodeError> {
    usize::try_from(length).map_err(|_| DecodeError::Truncated {
        unit: "frame payload",
        expected: usize::MAX,
        received: 0,
    })
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, DecodeError> {
        match self.mode {
            FrameMode::Multiplexed => self.decode_multiplexed(src),
            FrameMode::Lines => self.decode_line(src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, DecodeError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        match self.mode {
            FrameMode::Multiplexed => Err(Self::truncation(src)),
            FrameMode::Lines => {
                self.scanned = 0;
                let rest = src.split().freeze();
                Ok(Some(Frame::new(StreamType::Raw, rest)))
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = DecodeError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), DecodeError> {
        match self.mode {
            FrameMode::Multiplexed => {
                let type_byte = frame.stream_type.header_byte().ok_or_else(|| {
                    DecodeError::Encode {
                        message: String::from("raw frames have no multiplexed stream type"),
                    }
                })?;
                let length =
                    u32::try_from(frame.payload.len()).map_err(|_| DecodeError::Encode {
                        message: format!("frame payload of {} bytes", frame.payload.len()),
                    })?;
                dst.reserve(HEADER_LEN.saturating_add(frame.payload.len()));
                dst.put_u8(type_byte);
                dst.put_bytes(0, 3);
                dst.put_u32(length);
                dst.put_slice(&frame.payload);
            }
            FrameMode::Lines => {
                dst.reserve(frame.payload.len().saturating_add(1));
                dst.put_slice(&frame.payload);
                dst.put_u8(b'\n');
            }
        }
        Ok(())
    }
}

impl UnitProgress for FrameCodec {
    fn progress(&self, buffered: &BytesMut) -> StreamState {
        match self.mode {
            _ if buffered.is_empty() => StreamState::Ready,
            FrameMode::Multiplexed if buffered.len() >= HEADER_LEN => StreamState::ReadingPayload,
            FrameMode::Multiplexed => StreamState::ReadingHeader,
            FrameMode::Lines => StreamState::ReadingPayload,
        }
    }
}
