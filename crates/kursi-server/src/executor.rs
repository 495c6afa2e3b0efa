//! Action execution for the production runtime.
//!
//! Turns [`ServerAction`]s into frames on per-session outbound queues. A
//! message is encoded once however many sessions receive it. Delivery never
//! blocks the driver loop: a full or closed queue drops the frame for that
//! recipient only and is logged.

use std::{collections::HashMap, sync::Arc};

use kursi_core::env::Environment;
use kursi_proto::ServerMessage;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{
    driver::{LogLevel, ServerAction, ServerDriver},
    transport::Outbound,
};

/// Outbound queues of connected sessions.
#[derive(Debug, Default)]
pub struct Outboxes {
    senders: HashMap<u64, mpsc::Sender<Outbound>>,
}

impl Outboxes {
    /// Create an empty set of queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a session's queue.
    pub fn insert(&mut self, session_id: u64, sender: mpsc::Sender<Outbound>) {
        self.senders.insert(session_id, sender);
    }

    /// Stop tracking a session's queue.
    pub fn remove(&mut self, session_id: u64) -> Option<mpsc::Sender<Outbound>> {
        self.senders.remove(&session_id)
    }

    /// Number of tracked queues.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// No queues are tracked.
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    fn deliver(&self, session_id: u64, frame: Outbound) {
        let Some(sender) = self.senders.get(&session_id) else {
            tracing::debug!(session_id, "recipient unreachable: no outbound queue");
            return;
        };
        match sender.try_send(frame) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => {
                tracing::warn!(session_id, "recipient unreachable: outbound queue full, dropping frame");
            },
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(session_id, "recipient unreachable: outbound queue closed");
            },
        }
    }
}

fn encode(message: &ServerMessage) -> Option<Arc<str>> {
    match message.encode() {
        Ok(text) => Some(Arc::from(text)),
        Err(e) => {
            tracing::error!(tag = message.tag(), error = %e, "failed to encode server message");
            None
        },
    }
}

/// Execute server actions.
pub fn execute_actions<E>(driver: &ServerDriver<E>, actions: Vec<ServerAction>, outboxes: &Outboxes)
where
    E: Environment,
{
    for action in actions {
        match action {
            ServerAction::SendToSession { session_id, message } => {
                if let Some(text) = encode(&message) {
                    outboxes.deliver(session_id, Outbound::Text(text));
                }
            },

            ServerAction::BroadcastToRoom { room, message, exclude_session } => {
                let Some(text) = encode(&message) else { continue };
                for session_id in driver.sessions_in_room(&room) {
                    if Some(session_id) != exclude_session {
                        outboxes.deliver(session_id, Outbound::Text(Arc::clone(&text)));
                    }
                }
            },

            ServerAction::BroadcastAll { message } => {
                let Some(text) = encode(&message) else { continue };
                for session_id in driver.session_ids() {
                    outboxes.deliver(session_id, Outbound::Text(Arc::clone(&text)));
                }
            },

            ServerAction::CloseConnection { session_id, reason } => {
                tracing::info!(session_id, %reason, "closing connection");
                outboxes.deliver(session_id, Outbound::Close(reason));
            },

            ServerAction::Log { level, message, .. } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use kursi_proto::{ChatMessage, ClientMessage};

    use super::*;
    use crate::{DriverConfig, ServerEvent, SystemEnv};

    fn connect(
        driver: &mut ServerDriver<SystemEnv>,
        outboxes: &mut Outboxes,
        session_id: u64,
        capacity: usize,
    ) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(capacity);
        outboxes.insert(session_id, tx);
        let actions = driver.process_event(ServerEvent::ConnectionAccepted { session_id }).unwrap();
        execute_actions(driver, actions, outboxes);
        rx
    }

    fn send(
        driver: &mut ServerDriver<SystemEnv>,
        outboxes: &Outboxes,
        session_id: u64,
        message: ClientMessage,
    ) {
        let actions =
            driver.process_event(ServerEvent::MessageReceived { session_id, message }).unwrap();
        execute_actions(driver, actions, outboxes);
    }

    fn texts(rx: &mut mpsc::Receiver<Outbound>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let Outbound::Text(text) = frame {
                out.push(text.to_string());
            }
        }
        out
    }

    #[test]
    fn broadcast_reaches_room_members_only() {
        let mut driver = ServerDriver::new(SystemEnv::new(), DriverConfig::default());
        let mut outboxes = Outboxes::new();
        let mut alice = connect(&mut driver, &mut outboxes, 1, 16);
        let mut bob = connect(&mut driver, &mut outboxes, 2, 16);

        send(&mut driver, &outboxes, 1, ClientMessage::SetIdentifier { id: "alice".to_string() });
        send(&mut driver, &outboxes, 1, ClientMessage::JoinRoom { room: "room1".to_string() });

        let alice_frames = texts(&mut alice);
        assert_eq!(alice_frames, vec![
            r#"["setIdTargetAck","alice"]"#.to_string(),
            r#"["numberKursiSaya",1]"#.to_string(),
            r#"["allUpdateKursiList","room1",[]]"#.to_string(),
            r#"["roomUserCount","room1",0]"#.to_string(),
        ]);
        assert!(texts(&mut bob).is_empty());
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let mut driver = ServerDriver::new(SystemEnv::new(), DriverConfig::default());
        let mut outboxes = Outboxes::new();
        let mut rx = connect(&mut driver, &mut outboxes, 1, 1);

        send(&mut driver, &outboxes, 1, ClientMessage::Ping);
        send(&mut driver, &outboxes, 1, ClientMessage::Ping);

        assert_eq!(texts(&mut rx), vec![r#"["pong"]"#.to_string()]);
    }

    fn join(driver: &mut ServerDriver<SystemEnv>, outboxes: &Outboxes, session_id: u64, id: &str) {
        send(driver, outboxes, session_id, ClientMessage::SetIdentifier { id: id.to_string() });
        send(driver, outboxes, session_id, ClientMessage::JoinRoom { room: "room1".to_string() });
    }

    fn chat(username: &str, message: &str) -> ClientMessage {
        ClientMessage::Chat {
            room: "room1".to_string(),
            chat: ChatMessage {
                image_url: String::new(),
                username: username.to_string(),
                message: message.to_string(),
                username_color: String::new(),
                text_color: String::new(),
            },
        }
    }

    #[test]
    fn closed_recipient_does_not_stop_room_broadcast() {
        let mut driver = ServerDriver::new(SystemEnv::new(), DriverConfig::default());
        let mut outboxes = Outboxes::new();
        let alice = connect(&mut driver, &mut outboxes, 1, 16);
        let mut bob = connect(&mut driver, &mut outboxes, 2, 16);
        join(&mut driver, &outboxes, 1, "alice");
        join(&mut driver, &outboxes, 2, "bob");
        texts(&mut bob);

        // Session 1's writer is gone but the driver still lists it in room1.
        drop(alice);
        send(&mut driver, &outboxes, 2, chat("bob", "hi"));

        assert_eq!(texts(&mut bob), vec![r#"["chat","room1","","bob","hi","",""]"#.to_string()]);
    }

    #[test]
    fn full_recipient_does_not_stop_room_broadcast() {
        let mut driver = ServerDriver::new(SystemEnv::new(), DriverConfig::default());
        let mut outboxes = Outboxes::new();
        let mut alice = connect(&mut driver, &mut outboxes, 1, 1);
        let mut bob = connect(&mut driver, &mut outboxes, 2, 16);
        join(&mut driver, &outboxes, 2, "bob");
        join(&mut driver, &outboxes, 1, "alice");
        texts(&mut bob);

        // Alice's queue still holds her identifier ack; everything after it was dropped.
        send(&mut driver, &outboxes, 2, chat("bob", "first"));
        send(&mut driver, &outboxes, 2, chat("bob", "second"));

        assert_eq!(texts(&mut bob), vec![
            r#"["chat","room1","","bob","first","",""]"#.to_string(),
            r#"["chat","room1","","bob","second","",""]"#.to_string(),
        ]);
        assert_eq!(texts(&mut alice), vec![r#"["setIdTargetAck","alice"]"#.to_string()]);
    }

    #[test]
    fn close_connection_queues_close_frame() {
        let config = DriverConfig { max_connections: 0, ..DriverConfig::default() };
        let mut driver = ServerDriver::new(SystemEnv::new(), config);
        let mut outboxes = Outboxes::new();
        let mut rx = connect(&mut driver, &mut outboxes, 1, 4);

        assert!(matches!(rx.try_recv(), Ok(Outbound::Close(_))));
    }
}
