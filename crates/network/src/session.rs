//! # Connection Session
//!
//! This module owns the client's TCP connection to the game server.
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected --connect()--> Connecting --ok--> Connected --peer close / shutdown()--> Disconnected
//!                                 |
//!                                 +-- max_attempts failures --> Failed
//! ```
//!
//! Attempts are strictly sequential. Between two failed attempts the session
//! sleeps for `retry_delay`; after the last failure it gives up and stays
//! Failed. A [`CancellationToken`] aborts the sequence at any point.
//!
//! # Thread Safety
//!
//! The state lives in an `Arc<parking_lot::Mutex<_>>` ([`SessionStatus`]) so
//! the listener task and the command sender can observe and update it. After
//! [`ConnectionSession::split`] the write half sits behind a
//! `tokio::sync::Mutex` so concurrent senders never interleave bytes.

use crate::config::ClientConfig;
use async_trait::async_trait;
use netsync_core::{NetSyncError, Result};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Write half shared by every command sender
///
/// `None` once the session has been shut down.
pub type SharedWriter = Arc<TokioMutex<Option<OwnedWriteHalf>>>;

/// State of the server connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No connection (initial state, or after close/shutdown)
    #[default]
    Disconnected,

    /// Connect attempts in progress
    Connecting,

    /// Stream established
    Connected,

    /// Every connect attempt failed
    Failed,
}

/// Shared, cloneable view of a session's state
#[derive(Debug, Clone, Default)]
pub struct SessionStatus(Arc<Mutex<SessionState>>);

impl SessionStatus {
    pub fn new(state: SessionState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    pub fn get(&self) -> SessionState {
        *self.0.lock()
    }

    /// Move to `state`, returning the previous one
    pub fn set(&self, state: SessionState) -> SessionState {
        let previous = std::mem::replace(&mut *self.0.lock(), state);
        if previous != state {
            debug!("Session state {:?} -> {:?}", previous, state);
        }
        previous
    }

    pub fn is_connected(&self) -> bool {
        self.get() == SessionState::Connected
    }
}

/// Opens the byte stream for one connect attempt
///
/// Production code uses [`TcpConnector`]; tests substitute failing or
/// counting connectors to exercise the retry schedule.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, address: &str) -> io::Result<TcpStream>;
}

/// Plain TCP connector
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, address: &str) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(address).await?;

        // Commands are tiny and latency sensitive
        stream.set_nodelay(true)?;

        Ok(stream)
    }
}

/// Connection to the game server
///
/// # Purpose
/// Runs the bounded-retry connect, then hands the stream to the listener and
/// the sender via [`split`](Self::split).
pub struct ConnectionSession {
    config: ClientConfig,

    connector: Arc<dyn Connector>,

    state: SessionStatus,

    /// Attempts made by the last connect sequence
    attempts: u32,

    /// Unsplit stream, between connect and split
    stream: Option<TcpStream>,

    /// Write half, after split
    writer: Option<SharedWriter>,
}

impl ConnectionSession {
    /// Create a session that connects over plain TCP
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }

    pub fn with_connector(config: ClientConfig, connector: impl Connector + 'static) -> Self {
        Self {
            config,
            connector: Arc::new(connector),
            state: SessionStatus::default(),
            attempts: 0,
            stream: None,
            writer: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Handle observing this session's state
    pub fn status(&self) -> SessionStatus {
        self.state.clone()
    }

    /// Number of attempts made by the most recent connect sequence
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Connect to the configured host and port
    pub async fn connect(&mut self, cancel: &CancellationToken) -> Result<()> {
        let host = self.config.host.clone();
        let port = self.config.port;
        self.connect_to(&host, port, cancel).await
    }

    /// Connect to `host:port`, retrying up to `max_attempts` times
    ///
    /// # Errors
    /// - `ConnectFailed` after the last failed attempt (state Failed)
    /// - `Cancelled` if `cancel` fires first (state Disconnected)
    pub async fn connect_to(
        &mut self,
        host: &str,
        port: u16,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if self.stream.is_some() || self.writer.is_some() {
            return Ok(());
        }

        let address = format!("{}:{}", host, port);

        // Failed is terminal
        if self.state.get() == SessionState::Failed {
            warn!("Not reconnecting to {}: retry budget exhausted", address);
            return Err(NetSyncError::ConnectFailed {
                address,
                attempts: self.attempts,
            });
        }

        let max_attempts = self.config.max_attempts.max(1);
        self.attempts = 0;
        self.state.set(SessionState::Connecting);

        info!("Connecting to {}...", address);

        for attempt in 1..=max_attempts {
            self.attempts = attempt;

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(self.cancelled(&address)),
                result = timeout(self.config.connect_timeout, self.connector.connect(&address)) => result,
            };

            match result {
                Ok(Ok(stream)) => {
                    self.stream = Some(stream);
                    self.state.set(SessionState::Connected);
                    info!("Connected to {} (attempt {}/{})", address, attempt, max_attempts);
                    return Ok(());
                }
                Ok(Err(e)) => {
                    warn!("Connect attempt {}/{} to {} failed: {}", attempt, max_attempts, address, e);
                }
                Err(_) => {
                    warn!(
                        "Connect attempt {}/{} to {} timed out after {:?}",
                        attempt, max_attempts, address, self.config.connect_timeout
                    );
                }
            }

            if attempt < max_attempts {
                debug!("Retrying in {:?}", self.config.retry_delay);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(self.cancelled(&address)),
                    _ = sleep(self.config.retry_delay) => {}
                }
            }
        }

        self.state.set(SessionState::Failed);
        warn!("Giving up on {} after {} attempts", address, max_attempts);

        Err(NetSyncError::ConnectFailed {
            address,
            attempts: max_attempts,
        })
    }

    fn cancelled(&self, address: &str) -> NetSyncError {
        info!("Connecting to {} cancelled", address);
        self.state.set(SessionState::Disconnected);
        NetSyncError::Cancelled
    }

    /// Read from the unsplit stream
    ///
    /// # Returns
    /// Bytes read; `0` means the server closed the connection, which also
    /// moves the session to Disconnected.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(NetSyncError::NotConnected)?;

        let n = stream.read(buf).await?;
        if n == 0 {
            info!("Server closed connection");
            self.stream = None;
            self.state.set(SessionState::Disconnected);
        }
        Ok(n)
    }

    /// Write all of `bytes` to the server
    ///
    /// Works both before and after [`split`](Self::split).
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.state.is_connected() {
            return Err(NetSyncError::NotConnected);
        }

        if let Some(stream) = self.stream.as_mut() {
            stream.write_all(bytes).await?;
            return Ok(());
        }

        let writer = self.writer.as_ref().ok_or(NetSyncError::NotConnected)?;
        let mut guard = writer.lock().await;
        let half = guard.as_mut().ok_or(NetSyncError::NotConnected)?;
        half.write_all(bytes).await?;
        Ok(())
    }

    /// Split the stream into the listener's read half and the shared writer
    pub fn split(&mut self) -> Result<(OwnedReadHalf, SharedWriter)> {
        let stream = self.stream.take().ok_or(NetSyncError::NotConnected)?;
        let (read_half, write_half) = stream.into_split();

        let writer: SharedWriter = Arc::new(TokioMutex::new(Some(write_half)));
        self.writer = Some(writer.clone());

        Ok((read_half, writer))
    }

    /// Close the socket and move to Disconnected
    pub async fn shutdown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }

        // Scope the lock to the write half only
        if let Some(writer) = self.writer.take() {
            if let Some(mut half) = writer.lock().await.take() {
                let _ = half.shutdown().await;
            }
        }

        if self.state.set(SessionState::Disconnected) != SessionState::Disconnected {
            info!("Disconnected from {}", self.config.address());
        }
    }
}
