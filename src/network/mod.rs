//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single non-blocking acceptor loop over the binary and text listeners
//! - Worker thread pool fed through a bounded channel
//! - Commands routed through Engine

mod server;
mod connection;
mod client;

pub use server::Server;
pub use connection::{Connection, ProtocolKind};
pub use client::Client;
