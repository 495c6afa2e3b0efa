//! Kursi production server.
//!
//! Seat and presence server for a fixed set of rooms, spoken over WebSocket
//! with JSON text frames.
//!
//! # Architecture
//!
//! The [`ServerDriver`] follows the Sans-IO pattern: it consumes
//! [`ServerEvent`]s and returns [`ServerAction`]s without performing I/O.
//! [`Server`] is the production glue. axum accepts WebSocket upgrades, every
//! socket feeds one channel, and a single task owns the driver, so all room
//! and seat state is mutated from one place.
//!
//! # Components
//!
//! - [`ServerDriver`]: Action-based orchestrator (pure logic, no I/O)
//! - [`RoomManager`]: Seat tables of the configured rooms
//! - [`BroadcastScheduler`]: Tick-buffered point and seat broadcasts
//! - [`Server`]: Production runtime that executes driver actions
//! - [`SystemEnv`]: Production environment (real time, crypto RNG)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod counter;
mod driver;
mod error;
mod executor;
mod presence;
mod registry;
mod room_manager;
mod scheduler;
mod server_error;
mod system_env;
mod transport;

use std::{net::SocketAddr, time::Duration};

pub use counter::RotatingCounter;
pub use driver::{DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent};
pub use error::ServerError;
pub use executor::{Outboxes, execute_actions};
use kursi_proto::ClientMessage;
pub use registry::{ConnectionRegistry, SessionInfo};
pub use room_manager::{ExpiredSeat, RoomError, RoomManager};
pub use scheduler::BroadcastScheduler;
pub use server_error::DriverError;
pub use system_env::SystemEnv;
use tokio::{net::TcpListener, sync::mpsc, time::MissedTickBehavior};
pub use transport::{Outbound, TransportEvent, TransportState};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080")
    pub bind_address: String,
    /// Period of the fast tick (buffer flush, lock sweep)
    pub tick_interval: Duration,
    /// Period of the rotating counter broadcast
    pub counter_interval: Duration,
    /// Capacity of each session's outbound queue
    pub outbound_queue: usize,
    /// Driver configuration (rooms, seats, limits)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tick_interval: Duration::from_millis(100),
            counter_interval: Duration::from_secs(15 * 60),
            outbound_queue: 256,
            driver: DriverConfig::default(),
        }
    }
}

impl ServerRuntimeConfig {
    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.driver.rooms.is_empty() {
            return Err(ServerError::Config("at least one room is required".to_string()));
        }
        if self.driver.rooms.iter().any(String::is_empty) {
            return Err(ServerError::Config("room identifiers must be non-empty".to_string()));
        }
        if self.driver.seats_per_room == 0 {
            return Err(ServerError::Config("seats per room must be positive".to_string()));
        }
        if self.tick_interval.is_zero() || self.counter_interval.is_zero() {
            return Err(ServerError::Config("tick intervals must be positive".to_string()));
        }
        Ok(())
    }
}

/// Production Kursi server.
///
/// Wraps `ServerDriver` with an axum WebSocket listener and system
/// environment.
pub struct Server {
    /// The action-based server driver
    driver: ServerDriver<SystemEnv>,
    /// Bound listener, handed to axum on `run`
    listener: TcpListener,
    /// Environment
    env: SystemEnv,
    /// Runtime settings
    config: ServerRuntimeConfig,
}

impl Server {
    /// Validate the configuration and bind the listener.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let env = SystemEnv::new();
        let driver = ServerDriver::new(env.clone(), config.driver.clone());
        let listener = TcpListener::bind(&config.bind_address).await.map_err(|e| {
            ServerError::Transport(format!("failed to bind '{}': {e}", config.bind_address))
        })?;

        Ok(Self { driver, listener, env, config })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the server, accepting connections and processing frames.
    ///
    /// This method runs until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let Self { mut driver, listener, env, config } = self;
        tracing::info!("Server starting on {}", listener.local_addr()?);

        let (events_tx, mut events_rx) = mpsc::channel::<TransportEvent>(1024);
        let router = transport::router(TransportState {
            events: events_tx,
            env,
            outbound_queue: config.outbound_queue,
        });

        let mut serve = tokio::spawn(async move { axum::serve(listener, router).await });

        let mut outboxes = Outboxes::new();
        let mut tick = tokio::time::interval(config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut counter_tick = tokio::time::interval(config.counter_interval);
        counter_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        counter_tick.tick().await; // consume first immediate tick

        loop {
            let event = tokio::select! {
                result = &mut serve => {
                    return match result {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(ServerError::Transport(e.to_string())),
                        Err(e) => Err(ServerError::Internal(format!("listener task failed: {e}"))),
                    };
                },
                Some(transport_event) = events_rx.recv() => {
                    into_server_event(transport_event, &mut outboxes)
                },
                _ = tick.tick() => ServerEvent::Tick,
                _ = counter_tick.tick() => ServerEvent::CounterTick,
            };

            match driver.process_event(event) {
                Ok(actions) => execute_actions(&driver, actions, &outboxes),
                Err(e) => tracing::warn!(error = %e, "event processing error"),
            }
        }
    }
}

/// Map a transport event to a driver event, tracking outbound queues.
fn into_server_event(event: TransportEvent, outboxes: &mut Outboxes) -> ServerEvent {
    match event {
        TransportEvent::Connected { session_id, outbound } => {
            outboxes.insert(session_id, outbound);
            ServerEvent::ConnectionAccepted { session_id }
        },
        TransportEvent::Frame { session_id, text } => match ClientMessage::decode(&text) {
            Ok(message) => ServerEvent::MessageReceived { session_id, message },
            Err(error) => ServerEvent::MessageRejected { session_id, error },
        },
        TransportEvent::Closed { session_id, reason } => {
            outboxes.remove(session_id);
            ServerEvent::ConnectionClosed { session_id, reason }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ServerRuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_room_list_is_rejected() {
        let mut config = ServerRuntimeConfig::default();
        config.driver.rooms.clear();
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn zero_seats_is_rejected() {
        let mut config = ServerRuntimeConfig::default();
        config.driver.seats_per_room = 0;
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));
    }

    #[test]
    fn bad_frames_become_rejections() {
        let mut outboxes = Outboxes::new();
        let (tx, _rx) = mpsc::channel(1);

        let event = into_server_event(
            TransportEvent::Connected { session_id: 5, outbound: tx },
            &mut outboxes,
        );
        assert!(matches!(event, ServerEvent::ConnectionAccepted { session_id: 5 }));
        assert_eq!(outboxes.len(), 1);

        let event = into_server_event(
            TransportEvent::Frame { session_id: 5, text: "not json".to_string() },
            &mut outboxes,
        );
        assert!(matches!(event, ServerEvent::MessageRejected { session_id: 5, .. }));

        let event = into_server_event(
            TransportEvent::Closed { session_id: 5, reason: "bye".to_string() },
            &mut outboxes,
        );
        assert!(matches!(event, ServerEvent::ConnectionClosed { session_id: 5, .. }));
        assert!(outboxes.is_empty());
    }
}
