//! Line-delimited JSON wire protocol.
//!
//! Every frame is a single JSON object terminated by `\n`, discriminated by
//! its `action` field. See [`message::Message`] for the variants and
//! [`codec::MessageCodec`] for the `tokio_util` codec used on both ends.

pub mod codec;
pub mod message;

pub use codec::{CodecError, MessageCodec};
pub use message::{
    Action, DecodeError, DecodeErrorKind, Message, NotificationKind, ResponseStatus, decode_line,
    encode_line,
};

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8888;
