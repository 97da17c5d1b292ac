//! Rooms and client-to-server emits

use serde::{Deserialize, Serialize};
use std::fmt;

/// Partition a room is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomScope {
    Vendor,
    Outlet,
}

impl RoomScope {
    fn as_str(self) -> &'static str {
        match self {
            RoomScope::Vendor => "vendor",
            RoomScope::Outlet => "outlet",
        }
    }
}

/// Server-side broadcast room the dashboard listens to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Room {
    pub scope: RoomScope,
    pub id: String,
}

impl Room {
    pub fn outlet(id: impl Into<String>) -> Self {
        Self {
            scope: RoomScope::Outlet,
            id: id.into(),
        }
    }

    pub fn vendor(id: impl Into<String>) -> Self {
        Self {
            scope: RoomScope::Vendor,
            id: id.into(),
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope.as_str(), self.id)
    }
}

/// Frame sent from the dashboard to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEmit {
    /// `join-<scope>`
    Join(Room),
    /// `leave-<scope>`
    Leave(Room),
    /// Application-level heartbeat
    Ping,
}

#[derive(Serialize)]
struct ClientFrame<'a> {
    event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<RoomPayload<'a>>,
}

#[derive(Serialize)]
struct RoomPayload<'a> {
    id: &'a str,
}

impl ClientEmit {
    pub fn event_name(&self) -> String {
        match self {
            ClientEmit::Join(room) => format!("join-{}", room.scope.as_str()),
            ClientEmit::Leave(room) => format!("leave-{}", room.scope.as_str()),
            ClientEmit::Ping => "ping".to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let payload = match self {
            ClientEmit::Join(room) | ClientEmit::Leave(room) => Some(RoomPayload { id: &room.id }),
            ClientEmit::Ping => None,
        };
        serde_json::to_string(&ClientFrame {
            event: self.event_name(),
            payload,
        })
    }
}
