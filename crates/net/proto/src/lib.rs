//! zsync wire protocol.
//!
//! Every message exchanged between nodes over whisper or shout is one
//! [`Message`] framed by [`encode`] and parsed by [`decode`]:
//!
//! ```text
//! 0xAA 0x55 | command (u8) | fields...
//! ```
//!
//! Integers are big-endian `u64`, strings are a `u16` length followed by UTF-8,
//! sequences are a `u32` count followed by their items and binary blobs are a
//! `u32` length followed by the raw bytes.

mod codec;
mod error;
mod message;

pub use codec::{decode, encode, SIGNATURE};
pub use error::ProtoError;
pub use message::{Command, Message};
