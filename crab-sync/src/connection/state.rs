//! Connection state owned by the connection manager

use serde::Serialize;
use shared::message::ClientEmit;
use shared::Room;
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Read-only view published to observers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub reconnection_attempts: u32,
    pub subscribed_rooms: Vec<Room>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct ConnectionState {
    status: ConnectionStatus,
    reconnection_attempts: u32,
    /// Rooms to (re)join on every connect
    subscribed_rooms: BTreeSet<Room>,
    /// Outbound emits waiting for the next connect
    pending_events: VecDeque<ClientEmit>,
    last_error: Option<String>,
}

impl ConnectionState {
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn reconnection_attempts(&self) -> u32 {
        self.reconnection_attempts
    }

    pub fn subscribed_rooms(&self) -> impl Iterator<Item = &Room> {
        self.subscribed_rooms.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending_events.len()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            status: self.status,
            reconnection_attempts: self.reconnection_attempts,
            subscribed_rooms: self.subscribed_rooms.iter().cloned().collect(),
            last_error: self.last_error.clone(),
        }
    }

    /// Remember a room; returns the join to send now, if connected and new
    pub fn subscribe(&mut self, room: Room) -> Option<ClientEmit> {
        self.pending_events
            .retain(|emit| !matches!(emit, ClientEmit::Leave(r) if *r == room));
        let added = self.subscribed_rooms.insert(room.clone());
        (added && self.is_connected()).then(|| ClientEmit::Join(room))
    }

    /// Forget a room; the leave is sent now or queued for the next connect
    pub fn unsubscribe(&mut self, room: Room) -> Option<ClientEmit> {
        if !self.subscribed_rooms.remove(&room) {
            return None;
        }
        let leave = ClientEmit::Leave(room);
        if self.is_connected() {
            Some(leave)
        } else {
            if !self.pending_events.contains(&leave) {
                self.pending_events.push_back(leave);
            }
            None
        }
    }

    /// Start a connect attempt
    pub fn begin_attempt(&mut self) {
        self.status = if self.reconnection_attempts == 0
            && self.status == ConnectionStatus::Disconnected
        {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Reconnecting
        };
        self.reconnection_attempts += 1;
    }

    /// Channel is up; returns the joins for every remembered room followed
    /// by queued emits
    pub fn on_connected(&mut self) -> Vec<ClientEmit> {
        self.status = ConnectionStatus::Connected;
        self.reconnection_attempts = 0;
        self.last_error = None;

        let mut emits: Vec<ClientEmit> = self
            .subscribed_rooms
            .iter()
            .cloned()
            .map(ClientEmit::Join)
            .collect();
        emits.extend(self.pending_events.drain(..));
        emits
    }

    /// Channel dropped but the session still wants it
    pub fn on_lost(&mut self, error: impl Into<String>) {
        self.status = ConnectionStatus::Reconnecting;
        self.last_error = Some(error.into());
    }

    /// Attempt failed or was rejected; keeps room memory
    pub fn on_failed(&mut self, error: impl Into<String>, will_retry: bool) {
        self.last_error = Some(error.into());
        if will_retry {
            self.status = ConnectionStatus::Reconnecting;
        } else {
            self.status = ConnectionStatus::Disconnected;
            self.reconnection_attempts = 0;
        }
    }

    /// Logout: forget everything
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resubscribe_on_connect() {
        let mut state = ConnectionState::default();
        assert_eq!(state.subscribe(Room::outlet("o-1")), None);
        assert_eq!(state.subscribe(Room::outlet("o-2")), None);

        state.begin_attempt();
        assert_eq!(state.status(), ConnectionStatus::Connecting);
        let emits = state.on_connected();
        assert_eq!(
            emits,
            vec![
                ClientEmit::Join(Room::outlet("o-1")),
                ClientEmit::Join(Room::outlet("o-2")),
            ]
        );

        // Already subscribed: no second join
        assert_eq!(state.subscribe(Room::outlet("o-1")), None);
        assert_eq!(
            state.subscribe(Room::outlet("o-3")),
            Some(ClientEmit::Join(Room::outlet("o-3")))
        );
    }

    #[test]
    fn test_leave_is_queued_while_offline() {
        let mut state = ConnectionState::default();
        state.subscribe(Room::outlet("o-1"));
        state.subscribe(Room::outlet("o-2"));

        assert_eq!(state.unsubscribe(Room::outlet("o-2")), None);
        assert_eq!(state.unsubscribe(Room::outlet("o-9")), None);
        assert_eq!(state.pending_len(), 1);

        state.begin_attempt();
        let emits = state.on_connected();
        assert_eq!(
            emits,
            vec![
                ClientEmit::Join(Room::outlet("o-1")),
                ClientEmit::Leave(Room::outlet("o-2")),
            ]
        );
        assert_eq!(state.pending_len(), 0);
    }

    #[test]
    fn test_resubscribe_cancels_queued_leave() {
        let mut state = ConnectionState::default();
        state.subscribe(Room::outlet("o-1"));
        state.unsubscribe(Room::outlet("o-1"));
        state.subscribe(Room::outlet("o-1"));
        assert_eq!(state.pending_len(), 0);
    }

    #[test]
    fn test_attempt_counter() {
        let mut state = ConnectionState::default();
        state.begin_attempt();
        state.on_failed("refused", true);
        // Backing off between attempts
        assert_eq!(state.status(), ConnectionStatus::Reconnecting);
        assert_eq!(state.reconnection_attempts(), 1);
        state.begin_attempt();
        assert_eq!(state.status(), ConnectionStatus::Reconnecting);
        assert_eq!(state.reconnection_attempts(), 2);

        state.on_connected();
        assert_eq!(state.reconnection_attempts(), 0);

        state.on_lost("reset by peer");
        assert_eq!(state.snapshot().last_error.as_deref(), Some("reset by peer"));
        assert_eq!(state.status(), ConnectionStatus::Reconnecting);

        state.on_failed("HTTP 401", false);
        assert_eq!(state.status(), ConnectionStatus::Disconnected);
        assert_eq!(state.reconnection_attempts(), 0);
    }
}
