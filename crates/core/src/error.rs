//! Core error types for NetSync

use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum NetSyncError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to connect to {address} after {attempts} attempts")]
    ConnectFailed { address: String, attempts: u32 },

    #[error("Not connected")]
    NotConnected,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, NetSyncError>;
