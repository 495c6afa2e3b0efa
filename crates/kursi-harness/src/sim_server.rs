//! In-memory simulation server.
//!
//! `SimServer` wraps `ServerDriver<SimEnv>` and executes its actions against
//! per-session inboxes instead of sockets. Tests drive it explicitly: connect,
//! send, tick, advance time, then inspect what each session received.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    time::Duration,
};

use kursi_proto::{ClientMessage, ServerMessage};
use kursi_server::{DriverConfig, DriverError, LogLevel, ServerAction, ServerDriver, ServerEvent};

use crate::{SystemSnapshot, sim_env::SimEnv};

/// Simulation server for deterministic tests.
pub struct SimServer {
    /// The action-based server driver
    driver: ServerDriver<SimEnv>,
    /// Shared handle to the driver's clock
    env: SimEnv,
    /// Messages delivered to each open session, oldest first
    inboxes: BTreeMap<u64, Vec<ServerMessage>>,
    /// Sessions the server closed, with the reason
    closed: HashMap<u64, String>,
    /// Next session ID
    next_session_id: u64,
}

impl SimServer {
    /// Server with default configuration and seed 0.
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    /// Server with custom configuration and seed 0.
    pub fn with_config(config: DriverConfig) -> Self {
        Self::with_seed(0, config)
    }

    /// Server with custom configuration and seed.
    pub fn with_seed(seed: u64, config: DriverConfig) -> Self {
        let env = SimEnv::with_seed(seed);
        let driver = ServerDriver::new(env.clone(), config);
        Self {
            driver,
            env,
            inboxes: BTreeMap::new(),
            closed: HashMap::new(),
            next_session_id: 1,
        }
    }

    /// Open a new connection and return its session ID.
    ///
    /// The connection may be closed immediately if the server is at its
    /// connection cap; check [`SimServer::close_reason`].
    pub fn connect(&mut self) -> Result<u64, DriverError> {
        let session_id = self.next_session_id;
        self.next_session_id += 1;

        self.inboxes.insert(session_id, Vec::new());
        self.process(ServerEvent::ConnectionAccepted { session_id })?;
        Ok(session_id)
    }

    /// Deliver a decoded message from a session.
    pub fn send(&mut self, session_id: u64, message: ClientMessage) -> Result<(), DriverError> {
        self.process(ServerEvent::MessageReceived { session_id, message })
    }

    /// Deliver a raw text frame from a session, decoding it as the transport
    /// would.
    pub fn send_text(&mut self, session_id: u64, text: &str) -> Result<(), DriverError> {
        let event = match ClientMessage::decode(text) {
            Ok(message) => ServerEvent::MessageReceived { session_id, message },
            Err(error) => ServerEvent::MessageRejected { session_id, error },
        };
        self.process(event)
    }

    /// Close a session from the client side.
    pub fn disconnect(&mut self, session_id: u64) -> Result<(), DriverError> {
        self.inboxes.remove(&session_id);
        self.process(ServerEvent::ConnectionClosed {
            session_id,
            reason: "client disconnect".to_string(),
        })
    }

    /// Run one fast tick.
    pub fn tick(&mut self) -> Result<(), DriverError> {
        self.process(ServerEvent::Tick)
    }

    /// Run one counter tick.
    pub fn counter_tick(&mut self) -> Result<(), DriverError> {
        self.process(ServerEvent::CounterTick)
    }

    /// Move the virtual clock forward without ticking.
    pub fn advance(&mut self, by: Duration) {
        self.env.advance(by);
    }

    /// Move the virtual clock forward, then tick.
    pub fn advance_and_tick(&mut self, by: Duration) -> Result<(), DriverError> {
        self.advance(by);
        self.tick()
    }

    /// Messages a session has received and not yet taken.
    pub fn messages(&self, session_id: u64) -> &[ServerMessage] {
        self.inboxes.get(&session_id).map_or(&[], Vec::as_slice)
    }

    /// Take and clear a session's received messages.
    pub fn take_messages(&mut self, session_id: u64) -> Vec<ServerMessage> {
        self.inboxes.get_mut(&session_id).map(std::mem::take).unwrap_or_default()
    }

    /// Clear every session's received messages.
    pub fn clear_messages(&mut self) {
        self.inboxes.values_mut().for_each(Vec::clear);
    }

    /// Why the server closed a session, if it did.
    pub fn close_reason(&self, session_id: u64) -> Option<&str> {
        self.closed.get(&session_id).map(String::as_str)
    }

    /// Sessions still open, ascending.
    pub fn open_sessions(&self) -> Vec<u64> {
        self.inboxes.keys().copied().collect()
    }

    /// The wrapped driver (read-only).
    pub fn driver(&self) -> &ServerDriver<SimEnv> {
        &self.driver
    }

    /// The simulated environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Observable state for invariant checks.
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::from_driver(&self.driver)
    }

    /// Process an event and execute the resulting actions, including the
    /// follow-up events of server-initiated closes.
    fn process(&mut self, event: ServerEvent) -> Result<(), DriverError> {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            let actions = self.driver.process_event(event)?;
            self.execute_actions(actions, &mut pending);
        }
        Ok(())
    }

    /// Execute server actions.
    fn execute_actions(&mut self, actions: Vec<ServerAction>, pending: &mut VecDeque<ServerEvent>) {
        for action in actions {
            match action {
                ServerAction::SendToSession { session_id, message } => {
                    self.deliver(session_id, message);
                },

                ServerAction::BroadcastToRoom { room, message, exclude_session } => {
                    let sessions: Vec<u64> = self.driver.sessions_in_room(&room).collect();
                    for session_id in sessions {
                        if Some(session_id) != exclude_session {
                            self.deliver(session_id, message.clone());
                        }
                    }
                },

                ServerAction::BroadcastAll { message } => {
                    let sessions: Vec<u64> = self.driver.session_ids().collect();
                    for session_id in sessions {
                        self.deliver(session_id, message.clone());
                    }
                },

                ServerAction::CloseConnection { session_id, reason } => {
                    self.inboxes.remove(&session_id);
                    self.closed.insert(session_id, reason.clone());
                    if self.driver.registry().has_session(session_id) {
                        pending.push_back(ServerEvent::ConnectionClosed { session_id, reason });
                    }
                },

                ServerAction::Log { level, message, .. } => {
                    Self::log(level, &message);
                },
            }
        }
    }

    fn deliver(&mut self, session_id: u64, message: ServerMessage) {
        if let Some(inbox) = self.inboxes.get_mut(&session_id) {
            inbox.push(message);
        }
    }

    fn log(level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
    }
}

impl Default for SimServer {
    fn default() -> Self {
        Self::new()
    }
}
