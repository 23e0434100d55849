//! Text command protocol
//!
//! Line-oriented form of the binary protocol, usable from telnet/netcat.
//! Lines end with `\r\n` (a bare `\n` is accepted); verbs are
//! case-insensitive; keys cannot contain whitespace.
//!
//! ```text
//! get <key>                    -> VALUE <key> <len>\r\n<bytes>\r\nEND
//! put <key> <len>\r\n<bytes>   -> STORED
//! range <start> <end> <limit>  -> (VALUE ...)* END
//! prefix <prefix> <limit>      -> (VALUE ...)* END
//! kmin <k> | kmax <k>          -> (VALUE ...)* END
//! length                       -> LENGTH <n>
//! remove <key>                 -> REMOVED | NOT_REMOVED
//! ping                         -> PONG
//! quit                         -> connection closed
//! ```
//! Failures are reported as `ERROR <message>`.

use std::io::{self, BufRead, Read, Write};

use super::codec::MAX_PAYLOAD_SIZE;
use super::{Command, Reply};
use crate::error::{Result, TreapError};

/// Longest accepted request line, terminator included
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// One request read from a text connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextRequest {
    Command(Command),
    /// A request that was consumed whole but refused; the session can go on
    Rejected(String),
    Quit,
}

/// A parsed request line; `put` still needs its body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextLine {
    Complete(TextRequest),
    PutHeader { key: String, len: usize },
}

/// Parse a single request line (without its terminator)
pub fn parse_text_line(line: &str) -> Result<TextLine> {
    let mut parts = line.split_whitespace();
    let verb = parts
        .next()
        .ok_or_else(|| TreapError::Protocol("empty command".to_string()))?
        .to_ascii_lowercase();
    let args: Vec<&str> = parts.collect();

    let expect = |n: usize| -> Result<()> {
        if args.len() == n {
            Ok(())
        } else {
            Err(TreapError::Protocol(format!(
                "{} expects {} argument(s), got {}",
                verb,
                n,
                args.len()
            )))
        }
    };

    let command = match verb.as_str() {
        "get" => {
            expect(1)?;
            Command::Get {
                key: args[0].to_string(),
            }
        }
        "put" | "set" => {
            expect(2)?;
            let len = parse_number::<usize>(args[1], "length")?;
            return Ok(TextLine::PutHeader {
                key: args[0].to_string(),
                len,
            });
        }
        "remove" | "del" => {
            expect(1)?;
            Command::Remove {
                key: args[0].to_string(),
            }
        }
        "range" => {
            expect(3)?;
            Command::Range {
                start: args[0].to_string(),
                end: args[1].to_string(),
                limit: parse_number(args[2], "limit")?,
            }
        }
        "prefix" => {
            expect(2)?;
            Command::Prefix {
                prefix: args[0].to_string(),
                limit: parse_number(args[1], "limit")?,
            }
        }
        "kmin" => {
            expect(1)?;
            Command::KMin {
                k: parse_number(args[0], "k")?,
            }
        }
        "kmax" => {
            expect(1)?;
            Command::KMax {
                k: parse_number(args[0], "k")?,
            }
        }
        "length" | "len" => {
            expect(0)?;
            Command::Length
        }
        "ping" => {
            expect(0)?;
            Command::Ping
        }
        "quit" | "exit" => return Ok(TextLine::Complete(TextRequest::Quit)),
        other => {
            return Err(TreapError::Protocol(format!("unknown command: {}", other)));
        }
    };

    Ok(TextLine::Complete(TextRequest::Command(command)))
}

fn parse_number<T: std::str::FromStr>(raw: &str, field: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| TreapError::Protocol(format!("invalid {}: {}", field, raw)))
}

/// Read the next request, including a `put` body
///
/// Returns `Ok(None)` at end of stream. Blank lines are skipped. A bad
/// line comes back as `TextRequest::Rejected`; an error means the stream
/// can no longer be split into requests and the session must end.
pub fn read_text_request<R: BufRead>(reader: &mut R) -> Result<Option<TextRequest>> {
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader
            .by_ref()
            .take(MAX_LINE_LENGTH as u64)
            .read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        if read == MAX_LINE_LENGTH && !line.ends_with('\n') {
            return Err(TreapError::Protocol(format!(
                "request line exceeds {} bytes",
                MAX_LINE_LENGTH
            )));
        }
        if !line.trim().is_empty() {
            break;
        }
    }

    let line = line.trim_end_matches(['\r', '\n']);
    let parsed = match parse_text_line(line) {
        Ok(parsed) => parsed,
        // Without a length the put body cannot be skipped
        Err(e) if is_put_line(line) => return Err(e),
        Err(e) => return Ok(Some(TextRequest::Rejected(e.to_string()))),
    };

    match parsed {
        TextLine::Complete(request) => Ok(Some(request)),
        TextLine::PutHeader { len, .. } if len > MAX_PAYLOAD_SIZE as usize => {
            skip_body(reader, len)?;
            Ok(Some(TextRequest::Rejected(format!(
                "value too large: {} bytes (max {})",
                len, MAX_PAYLOAD_SIZE
            ))))
        }
        TextLine::PutHeader { key, len } => {
            let mut value = vec![0u8; len];
            reader.read_exact(&mut value)?;
            consume_line_end(reader)?;
            Ok(Some(TextRequest::Command(Command::Put { key, value })))
        }
    }
}

fn is_put_line(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .map(|verb| verb.eq_ignore_ascii_case("put") || verb.eq_ignore_ascii_case("set"))
        .unwrap_or(false)
}

/// Drop a body of `len` bytes and its terminator
fn skip_body<R: BufRead>(reader: &mut R, len: usize) -> Result<()> {
    let skipped = io::copy(&mut reader.by_ref().take(len as u64), &mut io::sink())?;
    if skipped < len as u64 {
        return Err(TreapError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("value body ended after {} of {} bytes", skipped, len),
        )));
    }
    consume_line_end(reader)
}

fn consume_line_end<R: BufRead>(reader: &mut R) -> Result<()> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    if byte[0] == b'\r' {
        reader.read_exact(&mut byte)?;
    }
    if byte[0] != b'\n' {
        return Err(TreapError::Protocol(
            "value is not followed by a line terminator".to_string(),
        ));
    }
    Ok(())
}

/// Write the text form of the reply to `command`
pub fn write_text_reply<W: Write>(writer: &mut W, command: &Command, reply: &Reply) -> Result<()> {
    match reply {
        Reply::Value(Some(value)) => {
            let key = match command {
                Command::Get { key } => key.as_str(),
                _ => "",
            };
            write_value(writer, key, value)?;
            writer.write_all(b"END\r\n")?;
        }
        Reply::Value(None) => writer.write_all(b"END\r\n")?,
        Reply::Stored => writer.write_all(b"STORED\r\n")?,
        Reply::Removed(true) => writer.write_all(b"REMOVED\r\n")?,
        Reply::Removed(false) => writer.write_all(b"NOT_REMOVED\r\n")?,
        Reply::Pong => writer.write_all(b"PONG\r\n")?,
        Reply::Length(n) => write!(writer, "LENGTH {}\r\n", n)?,
        Reply::Entries(entries) => {
            for (key, value) in entries {
                write_value(writer, key, value)?;
            }
            writer.write_all(b"END\r\n")?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write an error line
pub fn write_text_error<W: Write>(writer: &mut W, message: &str) -> Result<()> {
    // Keep the reply on one line
    let message = message.replace(['\r', '\n'], " ");
    write!(writer, "ERROR {}\r\n", message)?;
    writer.flush()?;
    Ok(())
}

fn write_value<W: Write>(writer: &mut W, key: &str, value: &[u8]) -> Result<()> {
    write!(writer, "VALUE {} {}\r\n", key, value.len())?;
    writer.write_all(value)?;
    writer.write_all(b"\r\n")?;
    Ok(())
}
