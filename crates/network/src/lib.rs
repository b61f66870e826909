//! # NetSync Networking Layer
//!
//! This crate provides the Tokio-based connection to the game server.
//!
//! ## Modules
//!
//! - [`config`] - Client configuration options
//! - [`session`] - Bounded-retry connect and socket ownership
//! - [`listener`] - Background task applying server broadcasts
//! - [`sender`] - Fire-and-forget outbound commands
//! - [`client`] - Orchestrates all of the above

pub mod client;
pub mod config;
pub mod listener;
pub mod sender;
pub mod session;

// Re-export commonly used items
pub use client::NetSyncClient;
pub use config::ClientConfig;
pub use listener::{
    BroadcastListener, EventSink, ListenerExit, SharedEngine, SyncStats, SyncStatsSnapshot,
};
pub use sender::OutboundCommandSender;
pub use session::{
    ConnectionSession, Connector, SessionState, SessionStatus, SharedWriter, TcpConnector,
};
