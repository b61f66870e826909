//! NetSync - headless synchronization client
//!
//! Connects to a game server, mirrors its entities in memory and accepts
//! commands on stdin:
//!
//! - `move <dx> <dy>` - send one move for the host player
//! - `walk <dx> <dy>` - send that move every `moveinterval` ms (`walk 0 0` stops)
//! - `attack` - attack the host boss
//! - `status` - print counters and entity counts
//! - `quit`

use anyhow::Context;
use netsync_config::{ClientOptions, DEFAULT_OPTIONS_PATH};
use netsync_core::EntityClass;
use netsync_network::{NetSyncClient, TcpConnector};
use netsync_world::{EntitySpawner, EntityState, LifecycleEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use tracing_subscriber::EnvFilter;

/// Spawner that only logs; stands in for a renderer
struct LoggingSpawner;

impl EntitySpawner for LoggingSpawner {
    type Handle = String;

    fn spawn(&mut self, entity: &EntityState) -> String {
        let label = format!("{}#{}", entity.class, entity.id);
        info!(
            "+ {} at ({:.1}, {:.1}) hp {}",
            label, entity.position.x, entity.position.y, entity.health
        );
        label
    }

    fn despawn(&mut self, _entity: &EntityState, handle: String) {
        info!("- {}", handle);
    }

    fn sync(&mut self, entity: &EntityState, handle: &mut String) {
        trace!(
            "~ {} at ({:.1}, {:.1}) hp {} heading {:?}",
            handle,
            entity.position.x,
            entity.position.y,
            entity.health,
            entity.orientation
        );
    }
}

/// One parsed stdin line
#[derive(Debug, PartialEq)]
enum Input {
    Move(f32, f32),
    Walk(f32, f32),
    Attack,
    Status,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let mut words = line.split_whitespace();
    let command = words.next()?;
    let input = match command {
        "move" | "walk" => {
            let dx = words.next()?.parse().ok()?;
            let dy = words.next()?.parse().ok()?;
            if command == "move" {
                Input::Move(dx, dy)
            } else {
                Input::Walk(dx, dy)
            }
        }
        "attack" => Input::Attack,
        "status" => Input::Status,
        "quit" | "exit" => Input::Quit,
        _ => return None,
    };
    Some(input)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_OPTIONS_PATH.to_string());
    info!("Loading options from {}...", path);

    let options = match ClientOptions::load_or_default(&path) {
        Ok(options) => options,
        Err(e) => {
            warn!("Failed to load {}: {}", path, e);
            warn!("Using default options");
            ClientOptions::default()
        }
    };
    options.display();

    // Ctrl-C aborts the connect sequence as well as a running session
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            ctrl_c.cancel();
        }
    });

    let mut client =
        NetSyncClient::start_with(options.client_config(), LoggingSpawner, TcpConnector, cancel.clone())
            .await
            .context("failed to start client")?;

    let mut events = client.events();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                LifecycleEvent::Destroyed { class: EntityClass::Boss, id } => {
                    info!("Boss {} destroyed", id)
                }
                other => debug!("{:?}", other),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = interval(options.move_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut walking: Option<(f32, f32)> = None;

    info!("Ready: move <dx> <dy> | walk <dx> <dy> | attack | status | quit");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Some((dx, dy)) = walking {
                    if !client.sender().send_move_host(client.engine(), dx, dy).await
                        && client.engine().lock().host_player().is_none()
                    {
                        info!("Host player is gone, stopped walking");
                        walking = None;
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match parse_input(&line) {
                    Some(Input::Move(dx, dy)) => {
                        client.sender().send_move_host(client.engine(), dx, dy).await;
                    }
                    Some(Input::Walk(dx, dy)) => {
                        walking = (dx != 0.0 || dy != 0.0).then_some((dx, dy));
                    }
                    Some(Input::Attack) => {
                        client.sender().send_attack_host_boss(client.engine()).await;
                    }
                    Some(Input::Status) => {
                        let counts: Vec<String> = {
                            let engine = client.engine().lock();
                            EntityClass::ALL
                                .iter()
                                .map(|class| format!("{}={}", class, engine.registry(*class).len()))
                                .collect()
                        };
                        info!("{:?} | {} | {:?}", client.state(), counts.join(" "), client.stats());
                    }
                    Some(Input::Quit) => break,
                    None if line.trim().is_empty() => {}
                    None => warn!("Unknown command: {}", line.trim()),
                }
            }
        }
    }

    client.shutdown().await;
    info!("Goodbye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("move 1 -2.5"), Some(Input::Move(1.0, -2.5)));
        assert_eq!(parse_input("  walk 0 1"), Some(Input::Walk(0.0, 1.0)));
        assert_eq!(parse_input("attack"), Some(Input::Attack));
        assert_eq!(parse_input("quit"), Some(Input::Quit));
        assert_eq!(parse_input("move 1"), None);
        assert_eq!(parse_input("dance"), None);
        assert_eq!(parse_input(""), None);
    }
}
