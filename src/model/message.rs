use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Wall-clock format used in snapshots, transcripts and the display.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "user")]
    Human,
    #[serde(alias = "model")]
    Agent,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Human => "human",
            Role::Agent => "agent",
            Role::System => "system",
        }
    }
}

/// One chat line. Created where it originates and never mutated afterwards;
/// downstream components receive it by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub text: String,
    pub role: Role,
    pub timestamp: NaiveDateTime,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        text: impl Into<String>,
        role: Role,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            role,
            timestamp,
        }
    }

    pub fn human(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(sender, text, Role::Human, now())
    }

    pub fn agent(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(sender, text, Role::Agent, now())
    }

    pub fn system(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(sender, text, Role::System, now())
    }

    /// Same message re-tagged with `role`.
    pub fn with_role(self, role: Role) -> Self {
        Self { role, ..self }
    }

    pub fn formatted_timestamp(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

/// Local time truncated to whole seconds, so that a stamp survives a
/// format/parse round-trip unchanged.
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
}
