//! Protocol codec
//!
//! Encoding and decoding functions for the binary wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Command Type
//! Strings are `len (4) + utf8 bytes`, integers are big-endian.
//! - GET:    key
//! - PUT:    key + value (rest of payload)
//! - REMOVE: key
//! - PING:   empty
//! - RANGE:  start + end + limit (4)
//! - PREFIX: prefix + limit (4)
//! - KMIN:   k (4)
//! - KMAX:   k (4)
//! - LENGTH: empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### OK Payload by Reply
//! - value:   raw bytes
//! - entries: count (4) + (key string + value_len (4) + value)*
//! - length:  u64 (8)
//! - removed: bool (1)

use std::collections::BTreeMap;
use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use super::{Command, Reply, Response, Status};
use crate::error::{Result, TreapError};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut payload = BytesMut::new();
    match command {
        Command::Get { key } | Command::Remove { key } => put_str(&mut payload, key),
        Command::Put { key, value } => {
            put_str(&mut payload, key);
            payload.put_slice(value);
        }
        Command::Range { start, end, limit } => {
            put_str(&mut payload, start);
            put_str(&mut payload, end);
            payload.put_u32(*limit);
        }
        Command::Prefix { prefix, limit } => {
            put_str(&mut payload, prefix);
            payload.put_u32(*limit);
        }
        Command::KMin { k } | Command::KMax { k } => payload.put_u32(*k),
        Command::Ping | Command::Length => {}
    }

    frame(command.command_type() as u8, &payload)
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_type, payload) = split_frame(bytes, "command")?;

    let name = match cmd_type {
        0x01 => "GET",
        0x02 => "PUT",
        0x03 => "REMOVE",
        0x04 => "PING",
        0x05 => "RANGE",
        0x06 => "PREFIX",
        0x07 => "KMIN",
        0x08 => "KMAX",
        0x09 => "LENGTH",
        _ => {
            return Err(TreapError::Protocol(format!(
                "Unknown command type: 0x{:02x}",
                cmd_type
            )))
        }
    };
    let mut reader = PayloadReader::new(payload, name);

    let command = match cmd_type {
        0x01 => Command::Get {
            key: reader.string("key")?,
        },
        0x02 => {
            let key = reader.string("key")?;
            let value = reader.rest();
            Command::Put { key, value }
        }
        0x03 => Command::Remove {
            key: reader.string("key")?,
        },
        0x04 => Command::Ping,
        0x05 => Command::Range {
            start: reader.string("start key")?,
            end: reader.string("end key")?,
            limit: reader.u32("limit")?,
        },
        0x06 => Command::Prefix {
            prefix: reader.string("prefix")?,
            limit: reader.u32("limit")?,
        },
        0x07 => Command::KMin { k: reader.u32("k")? },
        0x08 => Command::KMax { k: reader.u32("k")? },
        _ => Command::Length,
    };

    reader.finish()?;
    Ok(command)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
pub fn encode_response(response: &Response) -> Vec<u8> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    frame(response.status as u8, payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = split_frame(bytes, "response")?;

    let status = match status_byte {
        0x00 => Status::Ok,
        0x01 => Status::NotFound,
        0x02 => Status::Error,
        _ => {
            return Err(TreapError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                status_byte
            )))
        }
    };

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

/// Turn an engine reply into a wire response
pub fn encode_reply(reply: &Reply) -> Response {
    match reply {
        Reply::Value(Some(value)) if value.len() > MAX_PAYLOAD_SIZE as usize => {
            reply_too_large(value.len())
        }
        Reply::Value(Some(value)) => Response::ok(Some(value.clone())),
        Reply::Value(None) => Response::not_found(),
        Reply::Stored => Response::ok(None),
        Reply::Pong => Response::ok(Some(b"PONG".to_vec())),
        Reply::Removed(removed) => Response::ok(Some(vec![u8::from(*removed)])),
        Reply::Length(n) => Response::ok(Some(n.to_be_bytes().to_vec())),
        Reply::Entries(entries) => {
            let size = entries
                .iter()
                .fold(4, |acc, (key, value)| acc + 8 + key.len() + value.len());
            if size > MAX_PAYLOAD_SIZE as usize {
                return reply_too_large(size);
            }

            let mut payload = BytesMut::with_capacity(size);
            payload.put_u32(entries.len() as u32);
            for (key, value) in entries {
                put_str(&mut payload, key);
                payload.put_u32(value.len() as u32);
                payload.put_slice(value);
            }
            Response::ok(Some(payload.to_vec()))
        }
    }
}

fn reply_too_large(size: usize) -> Response {
    Response::error(&format!(
        "reply too large: {} bytes (max {})",
        size, MAX_PAYLOAD_SIZE
    ))
}

/// Decode an entries payload (RANGE / PREFIX / KMIN / KMAX)
pub fn decode_entries(payload: &[u8]) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut reader = PayloadReader::new(payload, "entries");
    let count = reader.u32("entry count")?;

    let mut entries = BTreeMap::new();
    for _ in 0..count {
        let key = reader.string("entry key")?;
        let value = reader.blob("entry value")?;
        entries.insert(key, value);
    }

    reader.finish()?;
    Ok(entries)
}

/// Decode a LENGTH payload
pub fn decode_length(payload: &[u8]) -> Result<u64> {
    let mut reader = PayloadReader::new(payload, "length");
    let n = reader.u64("length")?;
    reader.finish()?;
    Ok(n)
}

/// Decode a REMOVE payload
pub fn decode_removed(payload: &[u8]) -> Result<bool> {
    let mut reader = PayloadReader::new(payload, "remove");
    let flag = reader.u8("removed flag")?;
    reader.finish()?;
    Ok(flag != 0)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let message = read_frame(reader, "command")?;
    decode_command(&message)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    let bytes = encode_command(command);
    check_payload_len(bytes.len() - HEADER_SIZE, "command")?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let message = read_frame(reader, "response")?;
    decode_response(&message)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response);
    check_payload_len(bytes.len() - HEADER_SIZE, "response")?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Framing helpers
// =============================================================================

fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(tag);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);
    message.to_vec()
}

fn split_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(TreapError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let tag = header.get_u8();
    let payload_len = header.get_u32();
    check_payload_len(payload_len as usize, what)?;

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() < total_len {
        return Err(TreapError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((tag, &bytes[HEADER_SIZE..total_len]))
}

fn read_frame<R: Read>(reader: &mut R, what: &str) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = (&header[1..]).get_u32();
    check_payload_len(payload_len as usize, what)?;

    let mut message = vec![0u8; HEADER_SIZE + payload_len as usize];
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[HEADER_SIZE..])?;
    Ok(message)
}

fn check_payload_len(payload_len: usize, what: &str) -> Result<()> {
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(TreapError::Protocol(format!(
            "{} payload too large: {} bytes (max {})",
            what, payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

/// Bounds-checked cursor over a payload
struct PayloadReader<'a> {
    buf: &'a [u8],
    context: &'static str,
}

impl<'a> PayloadReader<'a> {
    fn new(buf: &'a [u8], context: &'static str) -> Self {
        Self { buf, context }
    }

    fn need(&self, n: usize, field: &str) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(TreapError::Protocol(format!(
                "{}: incomplete {} (expected {} bytes, got {})",
                self.context,
                field,
                n,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn u8(&mut self, field: &str) -> Result<u8> {
        self.need(1, field)?;
        Ok(self.buf.get_u8())
    }

    fn u32(&mut self, field: &str) -> Result<u32> {
        self.need(4, field)?;
        Ok(self.buf.get_u32())
    }

    fn u64(&mut self, field: &str) -> Result<u64> {
        self.need(8, field)?;
        Ok(self.buf.get_u64())
    }

    fn blob(&mut self, field: &str) -> Result<Vec<u8>> {
        let len = self.u32(field)? as usize;
        self.need(len, field)?;
        let bytes = self.buf[..len].to_vec();
        self.buf.advance(len);
        Ok(bytes)
    }

    fn string(&mut self, field: &str) -> Result<String> {
        let bytes = self.blob(field)?;
        String::from_utf8(bytes).map_err(|_| {
            TreapError::Protocol(format!("{}: {} is not valid UTF-8", self.context, field))
        })
    }

    fn rest(&mut self) -> Vec<u8> {
        let bytes = self.buf.to_vec();
        self.buf.advance(self.buf.len());
        bytes
    }

    fn finish(self) -> Result<()> {
        if self.buf.has_remaining() {
            return Err(TreapError::Protocol(format!(
                "{}: unexpected trailing {} bytes",
                self.context,
                self.buf.remaining()
            )));
        }
        Ok(())
    }
}
