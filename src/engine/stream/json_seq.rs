//! Codec for back-to-back JSON values with no delimiter.
//!
//! Progress and event endpoints write one JSON document after another, with
//! optional whitespace between them. Each value is parsed as soon as its last
//! byte arrives and converted into the caller's type.

use std::fmt;
use std::marker::PhantomData;

use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::codec::Decoder;

use super::{DEFAULT_MAX_UNIT_LEN, StreamState, UnitProgress};
use crate::error::DecodeError;
use crate::serialization::{from_value, malformed};

/// Decodes a sequence of JSON values into `T`.
///
/// Each buffered byte is scanned once to find where the current value ends;
/// only the complete value is handed to the parser.
pub struct JsonSeqCodec<T> {
    scan: Scan,
    max_unit_len: usize,
    _item: PhantomData<fn() -> T>,
}

impl<T> JsonSeqCodec<T> {
    /// Create a codec for values of type `T`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            scan: Scan::new(),
            max_unit_len: DEFAULT_MAX_UNIT_LEN,
            _item: PhantomData,
        }
    }

    /// Cap the encoded size of a single value.
    #[must_use]
    pub const fn with_max_unit_len(mut self, limit: usize) -> Self {
        self.max_unit_len = limit;
        self
    }
}

impl<T> Default for JsonSeqCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonSeqCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSeqCodec")
            .field("max_unit_len", &self.max_unit_len)
            .finish_non_exhaustive()
    }
}

/// Where the scan for the end of the value at the head of the buffer stopped.
#[derive(Debug, Clone, Copy)]
struct Scan {
    offset: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Scan {
    const fn new() -> Self {
        Self {
            offset: 0,
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    /// Length of the value starting at `src[0]`, if its last byte is buffered.
    fn value_end(&mut self, src: &[u8], at_eof: bool) -> Option<usize> {
        let first = *src.first()?;
        let end = if matches!(first, b'{' | b'[' | b'"') {
            self.structured_end(src)
        } else {
            self.scalar_end(src, at_eof)
        };
        if end.is_none() {
            self.offset = src.len();
        }
        end
    }

    fn structured_end(&mut self, src: &[u8]) -> Option<usize> {
        for (index, &byte) in src.iter().enumerate().skip(self.offset) {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        return Some(index.saturating_add(1));
                    }
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth = self.depth.saturating_add(1),
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(index.saturating_add(1));
                    }
                }
                _ => {}
            }
        }
        None
    }

    // A number at the buffer edge may still be growing, so a bare scalar ends
    // only at a delimiter or at the end of the stream.
    fn scalar_end(&self, src: &[u8], at_eof: bool) -> Option<usize> {
        src.iter()
            .enumerate()
            .skip(self.offset.max(1))
            .find(|(_, byte)| ends_scalar(**byte))
            .map(|(index, _)| index)
            .or_else(|| at_eof.then_some(src.len()))
    }
}

const fn ends_scalar(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'{' | b'[' | b'"' | b'}' | b']' | b',' | b':')
}

fn skip_whitespace(src: &mut BytesMut) {
    let leading = src
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(src.len());
    src.advance(leading);
}

impl<T: DeserializeOwned> JsonSeqCodec<T> {
    fn decode_head(
        &mut self,
        src: &mut BytesMut,
        at_eof: bool,
    ) -> Result<Option<T>, DecodeError> {
        if self.scan.offset == 0 {
            skip_whitespace(src);
        }
        let Some(end) = self.scan.value_end(src, at_eof) else {
            if src.len() > self.max_unit_len {
                return Err(self.too_large(src.len()));
            }
            return Ok(None);
        };
        self.scan = Scan::new();
        if end > self.max_unit_len {
            return Err(self.too_large(end));
        }

        let unit = src.split_to(end);
        let value = serde_json::from_slice::<Value>(&unit).map_err(|error| {
            if error.is_eof() {
                DecodeError::IncompleteJson {
                    received: unit.len(),
                }
            } else {
                malformed(&error)
            }
        })?;
        from_value(value).map(Some)
    }

    const fn too_large(&self, size: usize) -> DecodeError {
        DecodeError::UnitTooLarge {
            unit: "JSON value",
            size,
            limit: self.max_unit_len,
        }
    }
}

impl<T: DeserializeOwned> Decoder for JsonSeqCodec<T> {
    type Item = T;
    type Error = DecodeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<T>, DecodeError> {
        self.decode_head(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<T>, DecodeError> {
        if let Some(item) = self.decode_head(src, true)? {
            return Ok(Some(item));
        }
        if src.is_empty() {
            Ok(None)
        } else {
            Err(DecodeError::IncompleteJson {
                received: src.len(),
            })
        }
    }
}

impl<T> UnitProgress for JsonSeqCodec<T> {
    fn progress(&self, buffered: &BytesMut) -> StreamState {
        if buffered.iter().all(u8::is_ascii_whitespace) {
            StreamState::Ready
        } else {
            StreamState::ReadingPayload
        }
    }
}
