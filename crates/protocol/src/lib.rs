//! # NetSync Protocol Library
//!
//! This library implements the newline-delimited JSON protocol spoken between
//! the game server and its clients.
//!
//! ## Architecture
//!
//! The protocol is organized into three layers:
//!
//! ### 1. Framing ([`codecs`])
//! A [`tokio_util::codec`] line codec. Every wire message is terminated by a
//! single `\n`; partial lines stay buffered until the rest arrives and
//! oversized lines are discarded instead of growing the buffer.
//!
//! ### 2. Messages ([`messages`])
//! Typed payloads:
//! - [`Command`]: client-to-server `move` / `attack`
//! - [`Broadcast`]: server-to-client entity state
//! - [`Handshake`]: the first server message, describing the local player
//!
//! ### 3. Stream decoding ([`decoder`])
//! [`StreamDecoder`] owns the accumulation buffer for one connection and turns
//! arbitrary read chunks into decoded broadcasts plus per-message failures.
//!
//! ## Usage Example
//!
//! ```rust
//! use netsync_core::EntityId;
//! use netsync_protocol::{encode_command, Command, StreamDecoder};
//!
//! let wire = encode_command(&Command::Move { id: EntityId::new(7), dx: 1.0, dy: 0.0 }).unwrap();
//! assert!(wire.ends_with(b"\n"));
//!
//! let mut decoder = StreamDecoder::new();
//! let first = decoder.decode(br#"[{"type":"boss","uuid":1,"health":9"#);
//! assert!(first.broadcasts.is_empty());
//! let second = decoder.decode(br#"0,"position":{"X":0,"Y":0}}]
//! "#);
//! assert_eq!(second.broadcasts.len(), 1);
//! ```

pub mod codecs;
pub mod decoder;
pub mod messages;

// Re-export commonly used items
pub use codecs::*;
pub use decoder::*;
pub use messages::*;
