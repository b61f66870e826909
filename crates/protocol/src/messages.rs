//! Typed wire messages
//!
//! # Outbound
//! ```text
//! {"type":"move","x":<f32>,"y":<f32>,"uuid":<int>,"target_uuid":0}
//! {"type":"attack","x":0.0,"y":0.0,"uuid":<attacker>,"target_uuid":<target>}
//! ```
//!
//! # Inbound
//! ```text
//! {"uuid":<int>,"name":<string>,"position":{"x":<f32>,"y":<f32>}}          (handshake)
//! [{"type":"player","health":<int>,"position":{"X":<f32>,"Y":<f32>},"uuid":<int>}, ...]
//! ```
//!
//! A broadcast line may also carry a single object instead of an array.

use crate::codecs::DELIMITER;
use bytes::{BufMut, BytesMut};
use netsync_core::{EntityClass, EntityId, NetSyncError, Position, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client-to-server command
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Movement input for entity `id`
    Move { id: EntityId, dx: f32, dy: f32 },

    /// Attack request from `attacker_id` against `target_id`
    Attack {
        attacker_id: EntityId,
        target_id: EntityId,
    },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
        }
    }
}

/// Flat wire shape shared by every command
#[derive(Debug, Serialize, Deserialize)]
struct WireCommand {
    #[serde(rename = "type")]
    kind: String,
    x: f32,
    y: f32,
    uuid: EntityId,
    // Move commands always send 0 here; the server ignores it for moves.
    #[serde(default = "no_target")]
    target_uuid: EntityId,
}

fn no_target() -> EntityId {
    EntityId::new(0)
}

impl From<&Command> for WireCommand {
    fn from(command: &Command) -> Self {
        match *command {
            Command::Move { id, dx, dy } => Self {
                kind: command.kind().to_string(),
                x: dx,
                y: dy,
                uuid: id,
                target_uuid: no_target(),
            },
            Command::Attack {
                attacker_id,
                target_id,
            } => Self {
                kind: command.kind().to_string(),
                x: 0.0,
                y: 0.0,
                uuid: attacker_id,
                target_uuid: target_id,
            },
        }
    }
}

impl TryFrom<WireCommand> for Command {
    type Error = NetSyncError;

    fn try_from(wire: WireCommand) -> Result<Self> {
        match wire.kind.as_str() {
            "move" => Ok(Command::Move {
                id: wire.uuid,
                dx: wire.x,
                dy: wire.y,
            }),
            "attack" => Ok(Command::Attack {
                attacker_id: wire.uuid,
                target_id: wire.target_uuid,
            }),
            other => Err(NetSyncError::InvalidData(format!(
                "Unknown command type: {}",
                other
            ))),
        }
    }
}

/// Serialize a command and its delimiter into `dst`
pub fn encode_command_into(command: &Command, dst: &mut BytesMut) -> Result<()> {
    let wire = WireCommand::from(command);
    let json = serde_json::to_vec(&wire)
        .map_err(|e| NetSyncError::Protocol(format!("Failed to encode {}: {}", command.kind(), e)))?;
    dst.reserve(json.len() + 1);
    dst.put_slice(&json);
    dst.put_u8(DELIMITER);
    Ok(())
}

/// Serialize a command into a fresh, delimited buffer
pub fn encode_command(command: &Command) -> Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(96);
    encode_command_into(command, &mut buf)?;
    Ok(buf)
}

/// Parse one command line (with or without its delimiter)
pub fn decode_command(line: &[u8]) -> Result<Command> {
    let line = line.strip_suffix(&[DELIMITER]).unwrap_or(line);
    let wire: WireCommand = serde_json::from_slice(line)
        .map_err(|e| NetSyncError::Protocol(format!("Malformed command: {}", e)))?;
    Command::try_from(wire)
}

/// Broadcast position
///
/// Broadcasts use upper-case keys; lower-case keys are accepted too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WirePosition {
    #[serde(rename = "X", alias = "x")]
    pub x: f32,
    #[serde(rename = "Y", alias = "y")]
    pub y: f32,
}

impl From<WirePosition> for Position {
    fn from(pos: WirePosition) -> Self {
        Position::new(pos.x, pos.y)
    }
}

impl From<Position> for WirePosition {
    fn from(pos: Position) -> Self {
        Self { x: pos.x, y: pos.y }
    }
}

/// Server-pushed state of one remote entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    /// Entity class as sent on the wire (see [`EntityClass::from_wire`])
    #[serde(rename = "type")]
    pub class: String,

    #[serde(rename = "uuid")]
    pub id: EntityId,

    pub health: i32,

    pub position: WirePosition,

    /// Carried by the server but not applied to local state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack: Option<i32>,

    /// Carried by the server but not applied to local state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Broadcast {
    pub fn new(class: EntityClass, id: EntityId, health: i32, position: Position) -> Self {
        Self {
            class: class.as_str().to_string(),
            id,
            health,
            position: position.into(),
            attack: None,
            username: None,
        }
    }

    /// Known entity class, if any
    pub fn entity_class(&self) -> Option<EntityClass> {
        EntityClass::from_wire(&self.class)
    }

    pub fn position(&self) -> Position {
        self.position.into()
    }

    /// Health at or below zero means the entity is gone
    pub fn is_destroy(&self) -> bool {
        self.health <= 0
    }
}

/// First server message after connect, describing the local player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handshake {
    #[serde(rename = "uuid")]
    pub id: EntityId,

    #[serde(default)]
    pub name: String,

    pub position: Position,
}

/// Parse a handshake line
pub fn parse_handshake(line: &[u8]) -> Result<Handshake> {
    serde_json::from_slice(line)
        .map_err(|e| NetSyncError::Protocol(format!("Malformed handshake: {}", e)))
}

/// Parse one broadcast line into per-entity results
///
/// # Payload Shapes
/// - Array: every element decodes independently, so one malformed element
///   does not discard its siblings
/// - Object: a single broadcast
/// - Anything else, or invalid JSON: one failure for the whole line
pub fn parse_broadcasts(line: &[u8]) -> Vec<Result<Broadcast>> {
    let value: Value = match serde_json::from_slice(line) {
        Ok(value) => value,
        Err(e) => {
            return vec![Err(NetSyncError::Protocol(format!(
                "Malformed broadcast line: {}",
                e
            )))]
        }
    };

    match value {
        Value::Array(items) => items.into_iter().map(broadcast_from_value).collect(),
        object @ Value::Object(_) => vec![broadcast_from_value(object)],
        other => vec![Err(NetSyncError::InvalidData(format!(
            "Expected broadcast object or array, got {}",
            json_kind(&other)
        )))],
    }
}

fn broadcast_from_value(value: Value) -> Result<Broadcast> {
    serde_json::from_value(value)
        .map_err(|e| NetSyncError::Protocol(format!("Malformed broadcast: {}", e)))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
