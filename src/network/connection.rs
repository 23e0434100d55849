//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, TreapError};
use crate::protocol::{
    encode_reply, read_command, read_text_request, write_response, write_text_error,
    write_text_reply, Command, Response, TextRequest,
};
use crate::Database;

/// Which protocol a listener speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    /// Length-prefixed binary frames
    Binary,
    /// Line-oriented text commands
    Text,
}

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the storage engine
    engine: Arc<Database>,

    kind: ProtocolKind,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O
    pub fn new(stream: TcpStream, engine: Arc<Database>, kind: ProtocolKind) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            engine,
            kind,
            peer_addr,
        })
    }

    /// Configure connection timeouts (0 leaves a direction unbounded)
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Returns when the client disconnects or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {} ({:?})", self.peer_addr, self.kind);

        let outcome = match self.kind {
            ProtocolKind::Binary => self.handle_binary(),
            ProtocolKind::Text => self.handle_text(),
        };

        match outcome {
            Err(ref e) if is_disconnect(e) => {
                tracing::debug!("Client {} disconnected: {}", self.peer_addr, e);
                Ok(())
            }
            other => other,
        }
    }

    fn handle_binary(&mut self) -> Result<()> {
        loop {
            let command = match read_command(&mut self.reader) {
                Ok(cmd) => cmd,
                Err(e) if is_disconnect(&e) => return Err(e),
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    // Send error response if possible
                    let _ = write_response(&mut self.writer, &Response::error(&e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!("Received command from {}: {:?}", self.peer_addr, command.command_type());

            let response = match self.engine.execute(command) {
                Ok(reply) => encode_reply(&reply),
                Err(e) => Response::error(&e.to_string()),
            };
            write_response(&mut self.writer, &response)?;
        }
    }

    fn handle_text(&mut self) -> Result<()> {
        loop {
            let command = match read_text_request(&mut self.reader) {
                Ok(Some(TextRequest::Command(cmd))) => cmd,
                Ok(Some(TextRequest::Rejected(message))) => {
                    write_text_error(&mut self.writer, &message)?;
                    continue;
                }
                Ok(Some(TextRequest::Quit)) | Ok(None) => return Ok(()),
                Err(e @ TreapError::Protocol(_)) => {
                    // Request boundaries are lost; report and hang up
                    tracing::warn!("Closing text session with {}: {}", self.peer_addr, e);
                    let _ = write_text_error(&mut self.writer, &e.to_string());
                    return Err(e);
                }
                Err(e) => return Err(e),
            };

            tracing::trace!("Received text command from {}: {:?}", self.peer_addr, command.command_type());
            self.execute_text(command)?;
        }
    }

    fn execute_text(&mut self, command: Command) -> Result<()> {
        // Keep the key around so a get hit can name it
        let echo = match &command {
            Command::Get { key } => Command::Get { key: key.clone() },
            _ => Command::Ping,
        };

        match self.engine.execute(command) {
            Ok(reply) => write_text_reply(&mut self.writer, &echo, &reply),
            Err(e) => write_text_error(&mut self.writer, &e.to_string()),
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Whether an error means the peer went away (or idled out)
fn is_disconnect(e: &TreapError) -> bool {
    match e {
        TreapError::Io(io) => matches!(
            io.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::WouldBlock
                | ErrorKind::TimedOut
        ),
        _ => false,
    }
}
