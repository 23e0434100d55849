//! Protocol Module
//!
//! Defines the wire protocols for client-server communication.
//!
//! ## Binary Protocol
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: GET    - Payload: key
//! - 0x02: PUT    - Payload: key + value
//! - 0x03: REMOVE - Payload: key
//! - 0x04: PING   - Payload: empty
//! - 0x05: RANGE  - Payload: start + end + limit
//! - 0x06: PREFIX - Payload: prefix + limit
//! - 0x07: KMIN   - Payload: k
//! - 0x08: KMAX   - Payload: k
//! - 0x09: LENGTH - Payload: empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR
//!
//! ## Text Protocol
//! See [`text`] for the line-oriented command form.

mod command;
mod response;
mod codec;
pub mod text;

pub use command::{Command, CommandType};
pub use response::{Reply, Response, Status};
pub use codec::{
    decode_command, decode_entries, decode_length, decode_removed, decode_response,
    encode_command, encode_reply, encode_response, read_command, read_response, write_command,
    write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use text::{read_text_request, write_text_error, write_text_reply, TextRequest};
