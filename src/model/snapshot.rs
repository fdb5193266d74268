use serde::{Deserialize, Serialize};

use crate::model::message::{format_timestamp, parse_timestamp, Message, Role};

/* =========================
   Snapshot file layout
   ========================= */

/// One element of the snapshot array:
/// `{timestamp, role, username, parts: [{text}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub timestamp: String,
    pub role: Role,
    pub username: String,
    #[serde(default)]
    pub parts: Vec<SnapshotPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPart {
    pub text: String,
}

impl From<&Message> for SnapshotEntry {
    fn from(msg: &Message) -> Self {
        SnapshotEntry {
            timestamp: format_timestamp(&msg.timestamp),
            role: msg.role,
            username: msg.sender.clone(),
            parts: vec![SnapshotPart {
                text: msg.text.clone(),
            }],
        }
    }
}

impl TryFrom<SnapshotEntry> for Message {
    type Error = chrono::ParseError;

    fn try_from(entry: SnapshotEntry) -> Result<Self, Self::Error> {
        let timestamp = parse_timestamp(&entry.timestamp)?;
        let text: String = entry.parts.into_iter().map(|p| p.text).collect();
        Ok(Message::new(entry.username, text, entry.role, timestamp))
    }
}
