//! Blocking client for the binary protocol

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::{Result, TreapError};
use crate::protocol::{
    decode_entries, decode_length, decode_removed, read_response, write_command, Command,
    Response, Status,
};

/// A single connection to a TreapDB server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Send a command and wait for its response
    pub fn call(&mut self, command: &Command) -> Result<Response> {
        write_command(&mut self.writer, command)?;
        let response = read_response(&mut self.reader)?;
        if response.status == Status::Error {
            let message = response
                .payload
                .as_deref()
                .map(String::from_utf8_lossy)
                .unwrap_or_default();
            return Err(TreapError::Network(format!("server error: {}", message)));
        }
        Ok(response)
    }

    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let response = self.call(&Command::Get {
            key: key.to_string(),
        })?;
        match response.status {
            Status::NotFound => Ok(None),
            _ => Ok(Some(response.payload.unwrap_or_default())),
        }
    }

    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.call(&Command::Put {
            key: key.to_string(),
            value: value.to_vec(),
        })?;
        Ok(())
    }

    /// Always `false`: the server accepts removals but never deletes
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        let response = self.call(&Command::Remove {
            key: key.to_string(),
        })?;
        decode_removed(&response.payload.unwrap_or_default())
    }

    pub fn ping(&mut self) -> Result<()> {
        let response = self.call(&Command::Ping)?;
        match response.payload.as_deref() {
            Some(b"PONG") => Ok(()),
            other => Err(TreapError::Protocol(format!("unexpected ping reply: {:?}", other))),
        }
    }

    pub fn range(&mut self, start: &str, end: &str, limit: u32) -> Result<BTreeMap<String, Vec<u8>>> {
        self.entries(&Command::Range {
            start: start.to_string(),
            end: end.to_string(),
            limit,
        })
    }

    pub fn prefix(&mut self, prefix: &str, limit: u32) -> Result<BTreeMap<String, Vec<u8>>> {
        self.entries(&Command::Prefix {
            prefix: prefix.to_string(),
            limit,
        })
    }

    pub fn kmin(&mut self, k: u32) -> Result<BTreeMap<String, Vec<u8>>> {
        self.entries(&Command::KMin { k })
    }

    pub fn kmax(&mut self, k: u32) -> Result<BTreeMap<String, Vec<u8>>> {
        self.entries(&Command::KMax { k })
    }

    pub fn length(&mut self) -> Result<u64> {
        let response = self.call(&Command::Length)?;
        decode_length(&response.payload.unwrap_or_default())
    }

    fn entries(&mut self, command: &Command) -> Result<BTreeMap<String, Vec<u8>>> {
        let response = self.call(command)?;
        decode_entries(&response.payload.unwrap_or_default())
    }
}
