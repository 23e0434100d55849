//! Codec Tests
//!
//! Tests for command, response and reply encoding/decoding.

use std::collections::BTreeMap;
use std::io::Cursor;

use treapdb::protocol::{
    decode_command, decode_entries, decode_length, decode_removed, decode_response,
    encode_command, encode_reply, encode_response, read_command, read_response, write_command,
    write_response, Command, CommandType, Reply, Response, Status, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
use treapdb::TreapError;

fn round_trip(cmd: Command) {
    let encoded = encode_command(&cmd);
    assert_eq!(decode_command(&encoded).unwrap(), cmd);
}

// =============================================================================
// Command Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_every_command() {
    round_trip(Command::Get { key: "hello".to_string() });
    round_trip(Command::Put {
        key: "mykey".to_string(),
        value: b"myvalue".to_vec(),
    });
    round_trip(Command::Remove { key: "gone".to_string() });
    round_trip(Command::Ping);
    round_trip(Command::Range {
        start: "a".to_string(),
        end: "m".to_string(),
        limit: 25,
    });
    round_trip(Command::Prefix {
        prefix: "user:".to_string(),
        limit: 10,
    });
    round_trip(Command::KMin { k: 3 });
    round_trip(Command::KMax { k: u32::MAX });
    round_trip(Command::Length);
}

#[test]
fn test_encode_get_layout() {
    let encoded = encode_command(&Command::Get { key: "abc".to_string() });

    // cmd + len + (key len + key)
    assert_eq!(encoded[0], CommandType::Get as u8);
    assert_eq!(&encoded[1..5], &7u32.to_be_bytes());
    assert_eq!(&encoded[5..9], &3u32.to_be_bytes());
    assert_eq!(&encoded[9..], b"abc");
}

#[test]
fn test_encode_decode_empty_key_and_value() {
    round_trip(Command::Put {
        key: String::new(),
        value: Vec::new(),
    });
}

#[test]
fn test_encode_decode_binary_value() {
    let value: Vec<u8> = (0..=255).collect();
    round_trip(Command::Put {
        key: "bin".to_string(),
        value,
    });
}

#[test]
fn test_command_types() {
    assert_eq!(Command::Length.command_type(), CommandType::Length);
    assert_eq!(CommandType::KMax as u8, 0x08);
    assert_eq!(
        Command::Put {
            key: "k".to_string(),
            value: vec![]
        }
        .command_type(),
        CommandType::Put
    );
}

// =============================================================================
// Command Decoding Errors
// =============================================================================

#[test]
fn test_decode_unknown_command() {
    let bytes = [0x7f, 0, 0, 0, 0];
    assert!(matches!(decode_command(&bytes), Err(TreapError::Protocol(_))));
}

#[test]
fn test_decode_incomplete_header() {
    assert!(matches!(decode_command(&[0x01, 0, 0]), Err(TreapError::Protocol(_))));
}

#[test]
fn test_decode_incomplete_payload() {
    let mut encoded = encode_command(&Command::Get { key: "hello".to_string() });
    encoded.truncate(encoded.len() - 2);
    assert!(matches!(decode_command(&encoded), Err(TreapError::Protocol(_))));
}

#[test]
fn test_decode_truncated_field() {
    // RANGE payload missing its limit
    let mut payload = Vec::new();
    for s in ["a", "b"] {
        payload.extend_from_slice(&(s.len() as u32).to_be_bytes());
        payload.extend_from_slice(s.as_bytes());
    }
    let mut bytes = vec![CommandType::Range as u8];
    bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&payload);

    assert!(matches!(decode_command(&bytes), Err(TreapError::Protocol(_))));
}

#[test]
fn test_decode_trailing_bytes() {
    let bytes = [CommandType::Ping as u8, 0, 0, 0, 1, 0xaa];
    assert!(matches!(decode_command(&bytes), Err(TreapError::Protocol(_))));
}

#[test]
fn test_decode_invalid_utf8_key() {
    let bytes = [CommandType::Get as u8, 0, 0, 0, 6, 0, 0, 0, 2, 0xff, 0xfe];
    assert!(matches!(decode_command(&bytes), Err(TreapError::Protocol(_))));
}

#[test]
fn test_decode_oversized_payload() {
    let mut bytes = vec![CommandType::Get as u8];
    bytes.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());
    assert!(matches!(decode_command(&bytes), Err(TreapError::Protocol(_))));
}

// =============================================================================
// Response Encoding/Decoding Tests
// =============================================================================

#[test]
fn test_encode_decode_response_ok() {
    let response = Response::ok(Some(b"value".to_vec()));
    let decoded = decode_response(&encode_response(&response)).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn test_encode_decode_response_ok_no_payload() {
    let encoded = encode_response(&Response::ok(None));
    assert_eq!(encoded.len(), HEADER_SIZE);
    assert_eq!(decode_response(&encoded).unwrap(), Response::ok(None));
}

#[test]
fn test_encode_decode_response_not_found_and_error() {
    let decoded = decode_response(&encode_response(&Response::not_found())).unwrap();
    assert_eq!(decoded.status, Status::NotFound);

    let decoded = decode_response(&encode_response(&Response::error("boom"))).unwrap();
    assert_eq!(decoded.status, Status::Error);
    assert_eq!(decoded.payload, Some(b"boom".to_vec()));
}

#[test]
fn test_decode_unknown_status() {
    assert!(matches!(
        decode_response(&[0x09, 0, 0, 0, 0]),
        Err(TreapError::Protocol(_))
    ));
}

// =============================================================================
// Reply Encoding Tests
// =============================================================================

#[test]
fn test_reply_value_and_miss() {
    let response = encode_reply(&Reply::Value(Some(b"v".to_vec())));
    assert_eq!(response, Response::ok(Some(b"v".to_vec())));

    let response = encode_reply(&Reply::Value(None));
    assert_eq!(response.status, Status::NotFound);
}

#[test]
fn test_reply_simple_acknowledgements() {
    assert_eq!(encode_reply(&Reply::Stored), Response::ok(None));
    assert_eq!(encode_reply(&Reply::Pong), Response::ok(Some(b"PONG".to_vec())));
}

#[test]
fn test_reply_removed_flag() {
    let response = encode_reply(&Reply::Removed(false));
    assert!(!decode_removed(response.payload.as_deref().unwrap()).unwrap());

    let response = encode_reply(&Reply::Removed(true));
    assert!(decode_removed(response.payload.as_deref().unwrap()).unwrap());
}

#[test]
fn test_reply_length() {
    let response = encode_reply(&Reply::Length(1 << 40));
    assert_eq!(decode_length(response.payload.as_deref().unwrap()).unwrap(), 1 << 40);
    assert!(decode_length(&[0, 1]).is_err());
}

#[test]
fn test_reply_entries() {
    let mut entries = BTreeMap::new();
    entries.insert("a".to_string(), b"1".to_vec());
    entries.insert("b".to_string(), Vec::new());
    entries.insert("c".to_string(), vec![0, 255, 7]);

    let response = encode_reply(&Reply::Entries(entries.clone()));
    assert_eq!(response.status, Status::Ok);
    assert_eq!(decode_entries(response.payload.as_deref().unwrap()).unwrap(), entries);
}

#[test]
fn test_reply_empty_entries() {
    let response = encode_reply(&Reply::Entries(BTreeMap::new()));
    assert_eq!(response.payload, Some(vec![0, 0, 0, 0]));
    assert!(decode_entries(&[0, 0, 0, 0]).unwrap().is_empty());
}

#[test]
fn test_reply_entries_over_frame_limit_becomes_error() {
    // 17 x 1 MiB values cannot fit in one 16 MiB frame
    let entries: BTreeMap<String, Vec<u8>> = (0..17)
        .map(|i| (format!("big{:02}", i), vec![7u8; 1024 * 1024]))
        .collect();

    let response = encode_reply(&Reply::Entries(entries));
    assert_eq!(response.status, Status::Error);
    let message = String::from_utf8(response.payload.unwrap()).unwrap();
    assert!(message.contains("reply too large"));

    // The error still frames cleanly
    let encoded = encode_response(&Response::error(&message));
    assert_eq!(decode_response(&encoded).unwrap().status, Status::Error);
}

#[test]
fn test_reply_entries_at_frame_limit_is_sent() {
    // count (4) + key len (4) + key (1) + value len (4) + value
    let value = vec![1u8; MAX_PAYLOAD_SIZE as usize - 13];
    let mut entries = BTreeMap::new();
    entries.insert("k".to_string(), value);

    let response = encode_reply(&Reply::Entries(entries.clone()));
    assert_eq!(response.status, Status::Ok);
    assert_eq!(response.payload.as_ref().unwrap().len(), MAX_PAYLOAD_SIZE as usize);
    assert_eq!(decode_entries(response.payload.as_deref().unwrap()).unwrap(), entries);
}

#[test]
fn test_write_response_refuses_oversized_payload() {
    let response = Response::ok(Some(vec![0u8; MAX_PAYLOAD_SIZE as usize + 1]));
    let mut out = Vec::new();

    assert!(matches!(write_response(&mut out, &response), Err(TreapError::Protocol(_))));
    assert!(out.is_empty());
}

#[test]
fn test_decode_entries_count_mismatch() {
    // Claims two entries, carries none
    assert!(matches!(decode_entries(&[0, 0, 0, 2]), Err(TreapError::Protocol(_))));
}

// =============================================================================
// Stream I/O Tests
// =============================================================================

#[test]
fn test_stream_command_sequence() {
    let commands = vec![
        Command::Put {
            key: "k".to_string(),
            value: b"v".to_vec(),
        },
        Command::Get { key: "k".to_string() },
        Command::KMin { k: 2 },
    ];

    let mut buffer = Vec::new();
    for cmd in &commands {
        write_command(&mut buffer, cmd).unwrap();
    }

    let mut cursor = Cursor::new(buffer);
    for cmd in &commands {
        assert_eq!(&read_command(&mut cursor).unwrap(), cmd);
    }
    assert!(matches!(read_command(&mut cursor), Err(TreapError::Io(_))));
}

#[test]
fn test_stream_response() {
    let mut buffer = Vec::new();
    write_response(&mut buffer, &Response::ok(Some(b"hi".to_vec()))).unwrap();
    write_response(&mut buffer, &Response::not_found()).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_response(&mut cursor).unwrap(), Response::ok(Some(b"hi".to_vec())));
    assert_eq!(read_response(&mut cursor).unwrap(), Response::not_found());
}

#[test]
fn test_stream_rejects_oversized_frame_before_reading_payload() {
    let mut bytes = vec![CommandType::Put as u8];
    bytes.extend_from_slice(&u32::MAX.to_be_bytes());

    let mut cursor = Cursor::new(bytes);
    assert!(matches!(read_command(&mut cursor), Err(TreapError::Protocol(_))));
}
