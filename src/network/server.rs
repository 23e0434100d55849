//! TCP Server
//!
//! Accepts connections and dispatches them to a fixed pool of workers.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, TrySendError};

use crate::config::Config;
use crate::error::{Result, TreapError};
use crate::Database;

use super::connection::{Connection, ProtocolKind};

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// TCP server for TreapDB
///
/// Serves the binary protocol on `listen_addr` and, when configured, the
/// text protocol on `text_listen_addr`. Each accepted connection is queued
/// for one of `worker_threads` workers; at most `max_connections` may wait.
pub struct Server {
    config: Config,
    engine: Arc<Database>,
    listeners: Vec<(TcpListener, ProtocolKind)>,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Bind the configured listeners
    pub fn bind(config: Config, engine: Arc<Database>) -> Result<Self> {
        let mut listeners = vec![(Self::listen(&config.listen_addr)?, ProtocolKind::Binary)];
        if let Some(addr) = &config.text_listen_addr {
            listeners.push((Self::listen(addr)?, ProtocolKind::Text));
        }

        if config.worker_threads == 0 {
            return Err(TreapError::Config("worker_threads must be at least 1".to_string()));
        }

        Ok(Self {
            config,
            engine,
            listeners,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    fn listen(addr: &str) -> Result<TcpListener> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| TreapError::Network(format!("failed to bind {}: {}", addr, e)))?;
        listener.set_nonblocking(true)?;
        Ok(listener)
    }

    /// Address of the binary protocol listener
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.addr_of(ProtocolKind::Binary)
            .ok_or_else(|| TreapError::Network("binary listener missing".to_string()))
    }

    /// Address of the text protocol listener, if enabled
    pub fn text_addr(&self) -> Option<SocketAddr> {
        self.addr_of(ProtocolKind::Text)
    }

    fn addr_of(&self, kind: ProtocolKind) -> Option<SocketAddr> {
        self.listeners
            .iter()
            .find(|(_, k)| *k == kind)
            .and_then(|(listener, _)| listener.local_addr().ok())
    }

    /// Start the server (blocking until `shutdown` is called)
    pub fn run(&self) -> Result<()> {
        let (tx, rx) = channel::bounded::<(TcpStream, ProtocolKind)>(self.config.max_connections);

        let workers: Vec<_> = (0..self.config.worker_threads)
            .map(|id| {
                let rx = rx.clone();
                let engine = Arc::clone(&self.engine);
                let config = self.config.clone();
                thread::Builder::new()
                    .name(format!("treapdb-worker-{}", id))
                    .spawn(move || worker_loop(rx, engine, config))
            })
            .collect::<std::io::Result<_>>()?;

        for (listener, kind) in &self.listeners {
            tracing::info!("Listening on {} ({:?} protocol)", listener.local_addr()?, kind);
        }

        while !self.shutdown.load(Ordering::Relaxed) {
            let mut accepted_any = false;

            for (listener, kind) in &self.listeners {
                match listener.accept() {
                    Ok((stream, peer)) => {
                        accepted_any = true;
                        stream.set_nonblocking(false)?;
                        match tx.try_send((stream, *kind)) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                tracing::warn!("Rejecting {}: too many pending connections", peer);
                            }
                            Err(TrySendError::Disconnected(_)) => {
                                return Err(TreapError::Network("worker pool is gone".to_string()));
                            }
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                    Err(e) => tracing::warn!("Accept failed: {}", e),
                }
            }

            if !accepted_any {
                thread::sleep(ACCEPT_POLL);
            }
        }

        // Workers drain once the channel closes
        drop(tx);
        for worker in workers {
            let _ = worker.join();
        }
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Signal the server to shutdown gracefully
    ///
    /// The accept loop stops; workers finish their current connections.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

fn worker_loop(rx: Receiver<(TcpStream, ProtocolKind)>, engine: Arc<Database>, config: Config) {
    while let Ok((stream, kind)) = rx.recv() {
        let mut connection = match Connection::new(stream, Arc::clone(&engine), kind) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Failed to set up connection: {}", e);
                continue;
            }
        };

        if let Err(e) = connection.set_timeouts(config.read_timeout_ms, config.write_timeout_ms) {
            tracing::warn!("Failed to set timeouts for {}: {}", connection.peer_addr(), e);
            continue;
        }

        if let Err(e) = connection.handle() {
            tracing::warn!("Connection {} ended with error: {}", connection.peer_addr(), e);
        }
    }
}
