//! Wire codec error types.

/// Errors that can occur while decoding a wire message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    /// Frame ended before a field was complete.
    #[error("truncated frame: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// Frame does not start with the protocol signature.
    #[error("invalid signature {0:#06x}")]
    InvalidSignature(u16),

    /// Command byte does not name a known command.
    #[error("unknown command {0:#04x}")]
    UnknownCommand(u8),

    /// A string field is not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// Bytes left over after the last field.
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    /// A field is too long to be framed.
    #[error("field length {len} exceeds maximum {max}")]
    FieldTooLong { len: usize, max: usize },
}
