use crate::model::message::{Message, Role};

/// The generation-ready form of a recorded message.
///
/// Backends only know two speakers, so humans and system notices both
/// become `user` while the agent becomes `model`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptRole {
    User,
    Model,
}

impl TranscriptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptRole::User => "user",
            TranscriptRole::Model => "model",
        }
    }
}

impl From<Role> for TranscriptRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Agent => TranscriptRole::Model,
            Role::Human | Role::System => TranscriptRole::User,
        }
    }
}

impl From<&Message> for TranscriptEntry {
    fn from(msg: &Message) -> Self {
        TranscriptEntry {
            role: msg.role.into(),
            text: format!(
                "At {}, {} said: {}",
                msg.formatted_timestamp(),
                msg.sender,
                msg.text
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::parse_timestamp;

    #[test]
    fn transcript_line_names_time_and_speaker() {
        let ts = parse_timestamp("2025-10-01 09:30:00").unwrap();
        let msg = Message::new("JJ", "good morning", Role::Human, ts);
        let entry = TranscriptEntry::from(&msg);
        assert_eq!(entry.role, TranscriptRole::User);
        assert_eq!(entry.text, "At 2025-10-01 09:30:00, JJ said: good morning");
    }

    #[test]
    fn agent_lines_use_model_role() {
        let msg = Message::agent("Willow", "hello");
        assert_eq!(TranscriptEntry::from(&msg).role.as_str(), "model");
    }
}
