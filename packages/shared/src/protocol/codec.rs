//! `tokio_util` codec turning newline-delimited JSON into [`Message`]s.
//!
//! Framing errors (I/O failures, over-length lines) are codec errors and end
//! the stream. Content errors (bad JSON, unknown action) are yielded as
//! `Err` items so the connection can answer them and keep reading.

use bytes::BytesMut;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use super::message::{DecodeError, Message, decode_line, encode_line};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line exceeds the maximum length")]
    LineTooLong,

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<LinesCodecError> for CodecError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => CodecError::LineTooLong,
            LinesCodecError::Io(e) => CodecError::Io(e),
        }
    }
}

/// Newline-delimited JSON codec.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    lines: LinesCodec,
}

impl MessageCodec {
    /// Codec without a line length limit.
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new(),
        }
    }

    /// Codec rejecting lines longer than `max_length` bytes.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
        }
    }

    /// Codec with an optional limit, as read from configuration.
    pub fn with_limit(max_length: Option<usize>) -> Self {
        match max_length {
            Some(max) => Self::with_max_length(max),
            None => Self::new(),
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Result<Message, DecodeError>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(line) = self.lines.decode(src)? {
            // blank keep-alive lines carry nothing
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(decode_line(&line)));
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(line) = self.lines.decode_eof(src)? {
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(decode_line(&line)));
        }
        Ok(None)
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = encode_line(&item)?;
        self.lines.encode(line, dst)?;
        Ok(())
    }
}
