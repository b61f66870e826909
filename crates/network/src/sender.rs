//! # Outbound Command Sender
//!
//! Fire-and-forget `move` / `attack` commands.
//!
//! Commands are encoded with the protocol codec and written through the
//! session's shared writer. There is no acknowledgement and no retry: when
//! the session is not connected, or the write fails, the command is dropped
//! with a diagnostic.

use crate::listener::{SharedEngine, SyncStats};
use crate::session::{SessionStatus, SharedWriter};
use netsync_core::{EntityId, NetSyncError, Result};
use netsync_protocol::{encode_command, Command};
use netsync_world::EntitySpawner;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Handle for sending commands to the server
///
/// Cheap to clone; clones share the writer, the state and the attack
/// cooldown.
#[derive(Clone)]
pub struct OutboundCommandSender {
    writer: SharedWriter,
    state: SessionStatus,
    stats: Arc<SyncStats>,
    attack_cooldown: Duration,

    /// When the last attack passed the cooldown check
    last_attack: Arc<Mutex<Option<Instant>>>,
}

impl OutboundCommandSender {
    pub fn new(writer: SharedWriter, state: SessionStatus, stats: Arc<SyncStats>) -> Self {
        Self {
            writer,
            state,
            stats,
            attack_cooldown: Duration::ZERO,
            last_attack: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_attack_cooldown(mut self, cooldown: Duration) -> Self {
        self.attack_cooldown = cooldown;
        self
    }

    /// Encode and write one command
    ///
    /// # Errors
    /// - `NotConnected` if the session is not Connected or was shut down
    /// - `Io` if the write fails (counted in [`SyncStats`])
    pub async fn send(&self, command: &Command) -> Result<()> {
        if !self.state.is_connected() {
            return Err(NetSyncError::NotConnected);
        }

        let bytes = encode_command(command)?;

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(NetSyncError::NotConnected)?;

        if let Err(e) = writer.write_all(&bytes).await {
            self.stats.record_write_failure();
            return Err(e.into());
        }

        trace!("Sent {} ({} bytes)", command.kind(), bytes.len());
        Ok(())
    }

    /// Send a relative move for entity `id`
    ///
    /// # Returns
    /// `true` if the command was written
    pub async fn send_move(&self, id: EntityId, dx: f32, dy: f32) -> bool {
        self.send_logged(Command::Move { id, dx, dy }).await
    }

    /// Move the host player
    ///
    /// No-op once the host player is gone.
    pub async fn send_move_host<S: EntitySpawner>(
        &self,
        engine: &SharedEngine<S>,
        dx: f32,
        dy: f32,
    ) -> bool {
        let host = engine.lock().host_player().map(|player| player.id);

        match host {
            Some(id) => self.send_move(id, dx, dy).await,
            None => {
                debug!("Move dropped: no host player");
                false
            }
        }
    }

    /// Send an attack from `attacker_id` on `target_id`
    ///
    /// Attacks inside the cooldown of the previous accepted attack are
    /// dropped. An attack dropped while disconnected does not start the
    /// cooldown.
    pub async fn send_attack(&self, attacker_id: EntityId, target_id: EntityId) -> bool {
        if !self.state.is_connected() {
            debug!("Dropping attack: not connected");
            return false;
        }
        if !self.try_start_attack() {
            debug!("Attack on {} dropped: cooldown", target_id);
            return false;
        }

        self.send_logged(Command::Attack {
            attacker_id,
            target_id,
        })
        .await
    }

    /// Attack the host boss with the host player
    ///
    /// No-op when either role is unset.
    pub async fn send_attack_host_boss<S: EntitySpawner>(&self, engine: &SharedEngine<S>) -> bool {
        let target = engine.lock().attack_target();

        match target {
            Some((attacker_id, target_id)) => self.send_attack(attacker_id, target_id).await,
            None => {
                debug!("Attack dropped: no host player or host boss");
                false
            }
        }
    }

    fn try_start_attack(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last_attack.lock();

        if let Some(previous) = *last {
            if now.duration_since(previous) < self.attack_cooldown {
                return false;
            }
        }
        *last = Some(now);
        true
    }

    async fn send_logged(&self, command: Command) -> bool {
        match self.send(&command).await {
            Ok(()) => true,
            Err(NetSyncError::NotConnected) => {
                debug!("Dropping {}: not connected", command.kind());
                false
            }
            Err(e) => {
                warn!("Dropping {}: {}", command.kind(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use netsync_core::Position;
    use netsync_protocol::{Broadcast, Handshake};
    use netsync_world::{EntityState, ReconciliationEngine};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::Mutex as TokioMutex;

    struct NoopSpawner;

    impl EntitySpawner for NoopSpawner {
        type Handle = ();

        fn spawn(&mut self, _entity: &EntityState) {}

        fn despawn(&mut self, _entity: &EntityState, _handle: ()) {}
    }

    /// Connected sender plus a line reader for the server side
    async fn connected_sender() -> (OutboundCommandSender, BufReader<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();

        let (_read_half, write_half) = client.into_split();
        let writer: SharedWriter = Arc::new(TokioMutex::new(Some(write_half)));
        let sender = OutboundCommandSender::new(
            writer,
            SessionStatus::new(SessionState::Connected),
            Arc::new(SyncStats::new()),
        );
        (sender, BufReader::new(server))
    }

    async fn next_line(reader: &mut BufReader<TcpStream>) -> String {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        line
    }

    #[tokio::test]
    async fn test_move_wire_bytes() {
        let (sender, mut server) = connected_sender().await;

        assert!(sender.send_move(EntityId::new(7), 1.5, -2.0).await);
        assert_eq!(
            next_line(&mut server).await,
            "{\"type\":\"move\",\"x\":1.5,\"y\":-2.0,\"uuid\":7,\"target_uuid\":0}\n"
        );
    }

    #[tokio::test]
    async fn test_attack_wire_bytes() {
        let (sender, mut server) = connected_sender().await;

        assert!(sender.send_attack(EntityId::new(3), EntityId::new(42)).await);
        assert_eq!(
            next_line(&mut server).await,
            "{\"type\":\"attack\",\"x\":0.0,\"y\":0.0,\"uuid\":3,\"target_uuid\":42}\n"
        );
    }

    #[tokio::test]
    async fn test_disconnected_send_is_noop() {
        let writer: SharedWriter = Arc::new(TokioMutex::new(None));
        let sender = OutboundCommandSender::new(
            writer,
            SessionStatus::new(SessionState::Disconnected),
            Arc::new(SyncStats::new()),
        );

        assert!(!sender.send_move(EntityId::new(1), 1.0, 0.0).await);
        assert!(matches!(
            sender.send(&Command::Move { id: EntityId::new(1), dx: 0.0, dy: 0.0 }).await,
            Err(NetSyncError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_attack_cooldown() {
        let (sender, mut server) = connected_sender().await;
        let sender = sender.with_attack_cooldown(Duration::from_millis(50));

        assert!(sender.send_attack(EntityId::new(1), EntityId::new(2)).await);
        assert!(!sender.send_attack(EntityId::new(1), EntityId::new(2)).await);

        // Clones share the cooldown
        assert!(!sender.clone().send_attack(EntityId::new(1), EntityId::new(2)).await);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(sender.send_attack(EntityId::new(1), EntityId::new(2)).await);

        // Moves are never throttled
        assert!(sender.send_move(EntityId::new(1), 0.0, 1.0).await);

        assert!(next_line(&mut server).await.contains("\"attack\""));
        assert!(next_line(&mut server).await.contains("\"attack\""));
        assert!(next_line(&mut server).await.contains("\"move\""));
    }

    #[tokio::test]
    async fn test_disconnected_attack_keeps_cooldown_free() {
        let (sender, mut server) = connected_sender().await;
        let sender = sender.with_attack_cooldown(Duration::from_secs(3600));

        sender.state.set(SessionState::Disconnected);
        assert!(!sender.send_attack(EntityId::new(1), EntityId::new(2)).await);

        sender.state.set(SessionState::Connected);
        assert!(sender.send_attack(EntityId::new(1), EntityId::new(2)).await);
        assert!(next_line(&mut server).await.contains("\"attack\""));
    }

    #[tokio::test]
    async fn test_write_failure_is_counted() {
        let (sender, server) = connected_sender().await;
        drop(server);

        // The first write after the peer closes may still be accepted locally
        let mut results = Vec::new();
        for _ in 0..10 {
            results.push(sender.send_move(EntityId::new(1), 1.0, 0.0).await);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(results.last(), Some(&false));
        assert!(sender.stats.snapshot().write_failures > 0);
        assert_eq!(
            sender.stats.snapshot().write_failures,
            results.iter().filter(|sent| !**sent).count() as u64
        );

        // Failed writes are not fatal to the session
        assert!(sender.state.is_connected());
    }

    #[tokio::test]
    async fn test_move_host_stops_when_host_destroyed() {
        let (sender, mut server) = connected_sender().await;
        let engine: SharedEngine<NoopSpawner> =
            Arc::new(parking_lot::Mutex::new(ReconciliationEngine::new(NoopSpawner)));

        assert!(!sender.send_move_host(&engine, 1.0, 0.0).await);

        engine.lock().spawn_host_player(&Handshake {
            id: EntityId::new(4),
            name: "pilot".to_string(),
            position: Position::default(),
        });
        assert!(sender.send_move_host(&engine, 1.0, 0.0).await);
        assert_eq!(
            next_line(&mut server).await,
            "{\"type\":\"move\",\"x\":1.0,\"y\":0.0,\"uuid\":4,\"target_uuid\":0}\n"
        );

        engine
            .lock()
            .apply(&Broadcast::new(
                netsync_core::EntityClass::Player,
                EntityId::new(4),
                0,
                Position::default(),
            ))
            .unwrap();
        assert!(!sender.send_move_host(&engine, 1.0, 0.0).await);
    }

    #[tokio::test]
    async fn test_attack_host_boss() {
        let (sender, mut server) = connected_sender().await;
        let engine: SharedEngine<NoopSpawner> =
            Arc::new(parking_lot::Mutex::new(ReconciliationEngine::new(NoopSpawner)));

        // No roles yet
        assert!(!sender.send_attack_host_boss(&engine).await);

        {
            let mut engine = engine.lock();
            engine.spawn_host_player(&Handshake {
                id: EntityId::new(4),
                name: "pilot".to_string(),
                position: Position::default(),
            });
            engine
                .apply(&Broadcast::new(
                    netsync_core::EntityClass::Boss,
                    EntityId::new(99),
                    500,
                    Position::default(),
                ))
                .unwrap();
        }

        assert!(sender.send_attack_host_boss(&engine).await);
        assert_eq!(
            next_line(&mut server).await,
            "{\"type\":\"attack\",\"x\":0.0,\"y\":0.0,\"uuid\":4,\"target_uuid\":99}\n"
        );
    }
}
