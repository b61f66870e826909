//! # NetSync Client
//!
//! Wires the session, the reconciliation engine, the listener task and the
//! command sender together.
//!
//! # Startup
//!
//! 1. Bounded-retry connect ([`ConnectionSession::connect`])
//! 2. Read the handshake line and spawn the host player
//! 3. Split the stream; spawn the [`BroadcastListener`]
//!
//! # Example
//!
//! ```rust,no_run
//! use netsync_network::{ClientConfig, NetSyncClient};
//! # use netsync_world::{EntitySpawner, EntityState};
//! # struct Visuals;
//! # impl EntitySpawner for Visuals {
//! #     type Handle = ();
//! #     fn spawn(&mut self, _: &EntityState) {}
//! #     fn despawn(&mut self, _: &EntityState, _: ()) {}
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = NetSyncClient::start(ClientConfig::default(), Visuals).await?;
//!
//!     let host = client.engine().lock().host_player().map(|p| p.id);
//!     if let Some(host) = host {
//!         client.sender().send_move(host, 1.0, 0.0).await;
//!     }
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::config::ClientConfig;
use crate::listener::{
    BroadcastListener, EventSink, ListenerExit, SharedEngine, SyncStats, SyncStatsSnapshot,
};
use crate::sender::OutboundCommandSender;
use crate::session::{ConnectionSession, Connector, SessionState, SessionStatus, TcpConnector};
use netsync_core::{NetSyncError, Result};
use netsync_protocol::{parse_handshake, Frame, Handshake, LineCodec, StreamDecoder};
use netsync_world::{EntitySpawner, LifecycleEvent, ReconciliationEngine};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Running client for one server connection
///
/// # Shutdown
///
/// The client runs until:
/// - `shutdown()` is called
/// - The server closes the connection (the listener stops and the state
///   becomes Disconnected; call `shutdown()` to despawn the mirror)
/// - The client is dropped (the listener is cancelled; entities are not
///   despawned)
pub struct NetSyncClient<S: EntitySpawner> {
    session: ConnectionSession,
    engine: SharedEngine<S>,
    sender: OutboundCommandSender,
    stats: Arc<SyncStats>,
    status: SessionStatus,
    cancel: CancellationToken,
    listener: Option<JoinHandle<ListenerExit>>,
    events: EventSink,
    handshake: Handshake,
}

impl<S> NetSyncClient<S>
where
    S: EntitySpawner + 'static,
{
    /// Connect over TCP and start synchronizing
    pub async fn start(config: ClientConfig, spawner: S) -> Result<Self> {
        Self::start_with(config, spawner, TcpConnector, CancellationToken::new()).await
    }

    /// Connect with a custom connector; `cancel` aborts the connect sequence
    /// and later stops the listener
    pub async fn start_with(
        config: ClientConfig,
        spawner: S,
        connector: impl Connector + 'static,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate().map_err(NetSyncError::Config)?;

        let mut session = ConnectionSession::with_connector(config.clone(), connector);
        session.connect(&cancel).await?;

        let (mut read_half, writer) = session.split()?;
        let mut decoder = StreamDecoder::with_codec(LineCodec::with_max_length(config.max_line_length));

        let handshake = tokio::select! {
            _ = cancel.cancelled() => Err(NetSyncError::Cancelled),
            result = timeout(
                config.handshake_timeout,
                read_handshake(&mut read_half, &mut decoder, config.read_chunk_size),
            ) => result.unwrap_or(Err(NetSyncError::Timeout(config.handshake_timeout))),
        };
        let handshake = match handshake {
            Ok(handshake) => handshake,
            Err(e) => {
                warn!("Handshake failed: {}", e);
                session.shutdown().await;
                return Err(e);
            }
        };

        // Subscribers see the host player through the replay in `events()`
        let engine: SharedEngine<S> = Arc::new(Mutex::new(ReconciliationEngine::new(spawner)));
        engine.lock().spawn_host_player(&handshake);

        let events = EventSink::new();
        let stats = Arc::new(SyncStats::new());
        let status = session.status();
        let cancel = cancel.child_token();

        let listener = BroadcastListener::new(read_half, decoder, engine.clone())
            .with_events(events.clone())
            .with_stats(stats.clone())
            .with_status(status.clone())
            .with_cancel(cancel.clone())
            .with_read_chunk_size(config.read_chunk_size)
            .spawn();

        let sender = OutboundCommandSender::new(writer, status.clone(), stats.clone())
            .with_attack_cooldown(config.attack_cooldown);

        info!("Synchronizing with {} as {}", config.address(), handshake.id);

        Ok(Self {
            session,
            engine,
            sender,
            stats,
            status,
            cancel,
            listener: Some(listener),
            events,
            handshake,
        })
    }

    /// Command sender; clone it to send from other tasks
    pub fn sender(&self) -> &OutboundCommandSender {
        &self.sender
    }

    pub fn engine(&self) -> &SharedEngine<S> {
        &self.engine
    }

    /// Subscribe to lifecycle events
    ///
    /// The receiver first gets a `Created` for every entity already mirrored,
    /// then live events. Subscribing again closes the previous receiver.
    /// Until someone subscribes, events are not buffered.
    pub fn events(&self) -> mpsc::UnboundedReceiver<LifecycleEvent> {
        let engine = self.engine.lock();
        let rx = self.events.subscribe();
        self.events
            .publish(engine.snapshot().into_iter().map(LifecycleEvent::Created));
        rx
    }

    pub fn stats(&self) -> SyncStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn state(&self) -> SessionState {
        self.status.get()
    }

    /// Handshake received from the server
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Stop the listener, close the socket and despawn every entity
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();

        if let Some(listener) = self.listener.take() {
            match listener.await {
                Ok(exit) => info!("Listener finished: {:?}", exit),
                Err(e) => warn!("Listener task failed: {}", e),
            }
        }

        self.session.shutdown().await;

        let mut engine = self.engine.lock();
        let destroyed = engine.clear();
        self.events.publish(destroyed);
        drop(engine);

        info!("Client shut down");
    }
}

impl<S: EntitySpawner> Drop for NetSyncClient<S> {
    fn drop(&mut self) {
        // Stop the listener task
        self.cancel.cancel();
    }
}

/// Read until the first complete line and parse it as the handshake
///
/// Bytes after the handshake line stay in `decoder` for the listener.
async fn read_handshake<R>(
    reader: &mut R,
    decoder: &mut StreamDecoder,
    read_chunk_size: usize,
) -> Result<Handshake>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; read_chunk_size.max(1)];

    loop {
        while let Some(frame) = decoder.next_frame()? {
            match frame {
                Frame::Line(line) => return parse_handshake(&line),
                Frame::Oversized { discarded } => {
                    warn!("Discarded oversized line ({} bytes) before handshake", discarded);
                }
                Frame::Truncated { .. } => {}
            }
        }

        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(NetSyncError::Protocol(
                "Connection closed before handshake".to_string(),
            ));
        }
        decoder.extend(&buf[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsync_core::{EntityClass, EntityId, Position};
    use netsync_world::EntityState;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct CountingSpawner {
        despawned: usize,
    }

    impl EntitySpawner for CountingSpawner {
        type Handle = ();

        fn spawn(&mut self, _entity: &EntityState) {}

        fn despawn(&mut self, _entity: &EntityState, _handle: ()) {
            self.despawned += 1;
        }
    }

    async fn local_server() -> (TcpListener, ClientConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = ClientConfig {
            host: "127.0.0.1".to_string(),
            port: listener.local_addr().unwrap().port(),
            attack_cooldown: Duration::ZERO,
            ..Default::default()
        };
        (listener, config)
    }

    #[tokio::test]
    async fn test_start_sync_and_shutdown() {
        let (listener, config) = local_server().await;

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();

            // Handshake and first broadcast in one write
            write_half
                .write_all(
                    b"{\"uuid\":4,\"name\":\"pilot\",\"position\":{\"x\":10,\"y\":20}}\n\
                      [{\"type\":\"boss\",\"uuid\":9,\"health\":500,\"position\":{\"X\":0,\"Y\":0}}]\n",
                )
                .await
                .unwrap();

            let mut lines = BufReader::new(read_half).lines();
            let command = lines.next_line().await.unwrap().unwrap();
            (write_half, command)
        });

        let mut client = NetSyncClient::start(config, CountingSpawner::default())
            .await
            .unwrap();
        let mut events = client.events();
        assert_eq!(client.state(), SessionState::Connected);
        assert_eq!(client.handshake().id, EntityId::new(4));

        match events.recv().await.unwrap() {
            LifecycleEvent::Created(state) => {
                assert_eq!(state.class, EntityClass::Player);
                assert_eq!(state.position, Position::new(10.0, 20.0));
            }
            other => panic!("expected host player, got {:?}", other),
        }
        match events.recv().await.unwrap() {
            LifecycleEvent::Created(state) => assert_eq!(state.class, EntityClass::Boss),
            other => panic!("expected boss, got {:?}", other),
        }

        assert!(client.sender().send_attack_host_boss(client.engine()).await);
        let (_write_half, command) = server.await.unwrap();
        assert_eq!(
            command,
            "{\"type\":\"attack\",\"x\":0.0,\"y\":0.0,\"uuid\":4,\"target_uuid\":9}"
        );

        client.shutdown().await;
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(client.engine().lock().is_empty());
        assert_eq!(client.engine().lock().spawner().despawned, 2);
        assert!(!client.sender().send_move(EntityId::new(4), 1.0, 0.0).await);
    }

    #[tokio::test]
    async fn test_peer_close_marks_disconnected() {
        let (listener, config) = local_server().await;

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"uuid\":1,\"name\":\"a\",\"position\":{\"x\":0,\"y\":0}}\n")
                .await
                .unwrap();
        });

        let mut client = NetSyncClient::start(config, CountingSpawner::default())
            .await
            .unwrap();

        let listener = client.listener.take().unwrap();
        assert!(matches!(listener.await.unwrap(), ListenerExit::Closed));
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_events_not_buffered_without_subscriber() {
        let (listener, config) = local_server().await;

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"uuid\":4,\"name\":\"pilot\",\"position\":{\"x\":0,\"y\":0}}\n")
                .await
                .unwrap();
            for health in (1..=200).rev() {
                let line = format!(
                    "[{{\"type\":\"boss\",\"uuid\":9,\"health\":{},\"position\":{{\"X\":0,\"Y\":0}}}}]\n",
                    health
                );
                socket.write_all(line.as_bytes()).await.unwrap();
            }
            socket
        });

        let client = NetSyncClient::start(config, CountingSpawner::default())
            .await
            .unwrap();
        let _socket = server.await.unwrap();

        timeout(Duration::from_secs(5), async {
            while client.stats().applied < 200 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(!client.events.is_subscribed());

        // A late subscriber gets the current mirror and nothing queued before
        let mut events = client.events();
        match events.try_recv().unwrap() {
            LifecycleEvent::Created(state) => assert_eq!(state.id, EntityId::new(4)),
            other => panic!("expected host player, got {:?}", other),
        }
        match events.try_recv().unwrap() {
            LifecycleEvent::Created(state) => {
                assert_eq!(state.class, EntityClass::Boss);
                assert_eq!(state.health, 1);
            }
            other => panic!("expected boss, got {:?}", other),
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_drop_stops_listener() {
        let (listener, config) = local_server().await;

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"uuid\":1,\"name\":\"a\",\"position\":{\"x\":0,\"y\":0}}\n")
                .await
                .unwrap();
            socket
        });

        let client = NetSyncClient::start(config, CountingSpawner::default())
            .await
            .unwrap();
        // Server keeps the connection open
        let _socket = server.await.unwrap();

        let status = client.status.clone();
        let engine = client.engine().clone();
        drop(client);

        timeout(Duration::from_secs(1), async {
            while Arc::strong_count(&engine) > 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(status.get(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let (listener, mut config) = local_server().await;
        config.handshake_timeout = Duration::from_millis(50);

        let server = tokio::spawn(async move {
            // Accept and stay silent
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            drop(socket);
        });

        let result = NetSyncClient::start(config, CountingSpawner::default()).await;
        assert!(matches!(result, Err(NetSyncError::Timeout(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_before_handshake() {
        let (listener, config) = local_server().await;

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let result = NetSyncClient::start(config, CountingSpawner::default()).await;
        assert!(matches!(result, Err(NetSyncError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_read_handshake_keeps_remainder() {
        let mut decoder = StreamDecoder::new();
        let mut input: &[u8] = b"{\"uuid\":2,\"name\":\"b\",\"position\":{\"x\":1,\"y\":1}}\n[{\"type\":";

        let handshake = read_handshake(&mut input, &mut decoder, 8).await.unwrap();
        assert_eq!(handshake.id, EntityId::new(2));

        let mut rest = decoder.remainder().to_vec();
        rest.extend_from_slice(input);
        assert_eq!(rest, b"[{\"type\":");
    }
}
