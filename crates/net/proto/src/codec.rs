//! Binary framing for [`Message`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use zsync_primitives::{FileMeta, NODE_ID_LEN, NodeId};

use crate::error::ProtoError;
use crate::message::{Command, Message};

/// Two-byte signature that opens every frame.
pub const SIGNATURE: u16 = 0xAA55;

const MAX_STRING_LEN: usize = u16::MAX as usize;
const MAX_SEQUENCE_LEN: usize = u32::MAX as usize;

/// Encode a message into a single frame.
pub fn encode(message: &Message) -> Result<Bytes, ProtoError> {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_u16(SIGNATURE);
    buf.put_u8(message.command() as u8);

    match message {
        Message::Greet { node_id, state } => {
            buf.put_slice(node_id.as_bytes());
            buf.put_u64(*state);
        }
        Message::LastState { state } => buf.put_u64(*state),
        Message::Update { state, files } => {
            buf.put_u64(*state);
            put_len_u32(&mut buf, files.len())?;
            for file in files {
                put_string(&mut buf, &file.path)?;
                buf.put_u64(file.size);
                buf.put_u64(file.timestamp);
            }
        }
        Message::RequestFiles { paths } => {
            put_len_u32(&mut buf, paths.len())?;
            for path in paths {
                put_string(&mut buf, path)?;
            }
        }
        Message::GiveCredit { amount } => buf.put_u64(*amount),
        Message::SendChunk {
            sequence,
            path,
            offset,
            data,
        } => {
            buf.put_u64(*sequence);
            put_string(&mut buf, path)?;
            buf.put_u64(*offset);
            put_len_u32(&mut buf, data.len())?;
            buf.put_slice(data);
        }
        Message::Abort => {}
    }

    Ok(buf.freeze())
}

/// Decode a single frame. The whole input must be consumed.
pub fn decode(frame: &[u8]) -> Result<Message, ProtoError> {
    let mut buf = frame;

    ensure(buf, 3)?;
    let signature = buf.get_u16();
    if signature != SIGNATURE {
        return Err(ProtoError::InvalidSignature(signature));
    }
    let id = buf.get_u8();
    let command = Command::from_repr(id).ok_or(ProtoError::UnknownCommand(id))?;

    let message = match command {
        Command::Greet => {
            ensure(buf, NODE_ID_LEN)?;
            let mut id = [0u8; NODE_ID_LEN];
            buf.copy_to_slice(&mut id);
            Message::Greet {
                node_id: NodeId::new(id),
                state: get_u64(&mut buf)?,
            }
        }
        Command::LastState => Message::LastState {
            state: get_u64(&mut buf)?,
        },
        Command::Update => {
            let state = get_u64(&mut buf)?;
            let count = get_len_u32(&mut buf)?;
            let mut files = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                let path = get_string(&mut buf)?;
                let size = get_u64(&mut buf)?;
                let timestamp = get_u64(&mut buf)?;
                files.push(FileMeta {
                    path,
                    size,
                    timestamp,
                });
            }
            Message::Update { state, files }
        }
        Command::RequestFiles => {
            let count = get_len_u32(&mut buf)?;
            let mut paths = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                paths.push(get_string(&mut buf)?);
            }
            Message::RequestFiles { paths }
        }
        Command::GiveCredit => Message::GiveCredit {
            amount: get_u64(&mut buf)?,
        },
        Command::SendChunk => {
            let sequence = get_u64(&mut buf)?;
            let path = get_string(&mut buf)?;
            let offset = get_u64(&mut buf)?;
            let len = get_len_u32(&mut buf)?;
            ensure(buf, len)?;
            let data = buf.copy_to_bytes(len);
            Message::SendChunk {
                sequence,
                path,
                offset,
                data,
            }
        }
        Command::Abort => Message::Abort,
    };

    if buf.has_remaining() {
        return Err(ProtoError::TrailingBytes(buf.remaining()));
    }
    Ok(message)
}

fn ensure(buf: &[u8], needed: usize) -> Result<(), ProtoError> {
    if buf.len() < needed {
        return Err(ProtoError::Truncated {
            needed,
            remaining: buf.len(),
        });
    }
    Ok(())
}

fn get_u64(buf: &mut &[u8]) -> Result<u64, ProtoError> {
    ensure(buf, 8)?;
    Ok(buf.get_u64())
}

fn get_len_u32(buf: &mut &[u8]) -> Result<usize, ProtoError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32() as usize)
}

fn get_string(buf: &mut &[u8]) -> Result<String, ProtoError> {
    ensure(buf, 2)?;
    let len = buf.get_u16() as usize;
    ensure(buf, len)?;
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| ProtoError::InvalidUtf8)
}

fn put_string(buf: &mut BytesMut, s: &str) -> Result<(), ProtoError> {
    if s.len() > MAX_STRING_LEN {
        return Err(ProtoError::FieldTooLong {
            len: s.len(),
            max: MAX_STRING_LEN,
        });
    }
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn put_len_u32(buf: &mut BytesMut, len: usize) -> Result<(), ProtoError> {
    if len > MAX_SEQUENCE_LEN {
        return Err(ProtoError::FieldTooLong {
            len,
            max: MAX_SEQUENCE_LEN,
        });
    }
    buf.put_u32(len as u32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn roundtrip(message: Message) {
        let frame = encode(&message).unwrap();
        assert_eq!(decode(&frame).unwrap(), message);
    }

    #[test]
    fn test_roundtrip_all_commands() {
        roundtrip(Message::Greet {
            node_id: NodeId::new([7; NODE_ID_LEN]),
            state: 42,
        });
        roundtrip(Message::LastState { state: 0xFF });
        roundtrip(Message::Update {
            state: 9,
            files: vec![
                FileMeta::new("a.txt", 0x1533, 0x1dfa533),
                FileMeta::new("dir/b.bin", 0, 1),
            ],
        });
        roundtrip(Message::RequestFiles {
            paths: vec!["a.txt".into(), "b.txt".into()],
        });
        roundtrip(Message::GiveCredit { amount: 1 << 20 });
        roundtrip(Message::SendChunk {
            sequence: 3,
            path: "a.txt".into(),
            offset: 200,
            data: Bytes::from(vec![0x5a; 100]),
        });
        roundtrip(Message::Abort);
    }

    #[test]
    fn test_last_state_layout() {
        let frame = encode(&Message::LastState { state: 0xFF }).unwrap();
        assert_eq!(
            frame.as_ref(),
            &[0xAA, 0x55, 0x02, 0, 0, 0, 0, 0, 0, 0, 0xFF]
        );
    }

    #[test]
    fn test_empty_update() {
        roundtrip(Message::Update {
            state: 0,
            files: vec![],
        });
    }

    #[test]
    fn test_rejects_bad_signature() {
        assert_matches!(
            decode(&[0x00, 0x01, 0x07]),
            Err(ProtoError::InvalidSignature(0x0001))
        );
    }

    #[test]
    fn test_rejects_unknown_command() {
        assert_matches!(
            decode(&[0xAA, 0x55, 0x42]),
            Err(ProtoError::UnknownCommand(0x42))
        );
    }

    #[test]
    fn test_rejects_truncated_frame() {
        let frame = encode(&Message::GiveCredit { amount: 5 }).unwrap();
        assert_matches!(
            decode(&frame[..frame.len() - 1]),
            Err(ProtoError::Truncated { needed: 8, remaining: 7 })
        );
        assert_matches!(decode(&[0xAA]), Err(ProtoError::Truncated { .. }));
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut frame = encode(&Message::Abort).unwrap().to_vec();
        frame.push(0);
        assert_matches!(decode(&frame), Err(ProtoError::TrailingBytes(1)));
    }

    #[test]
    fn test_rejects_oversized_chunk_length() {
        let mut frame = BytesMut::new();
        frame.put_u16(SIGNATURE);
        frame.put_u8(Command::SendChunk as u8);
        frame.put_u64(1);
        frame.put_u16(0);
        frame.put_u64(0);
        frame.put_u32(1000);
        frame.put_slice(&[1, 2, 3]);
        assert_matches!(
            decode(&frame),
            Err(ProtoError::Truncated { needed: 1000, remaining: 3 })
        );
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let mut frame = BytesMut::new();
        frame.put_u16(SIGNATURE);
        frame.put_u8(Command::RequestFiles as u8);
        frame.put_u32(1);
        frame.put_u16(2);
        frame.put_slice(&[0xff, 0xfe]);
        assert_matches!(decode(&frame), Err(ProtoError::InvalidUtf8));
    }
}
