use crate::model::message::Message;

/// Which component an envelope is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Router,
    ReplyWorker,
    Recorder,
    Display,
}

/// The closed set of things that travel between components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeKind {
    UserTurn(Message),
    AgentTurn(Message),
    SystemNotice(Message),
    Quit(Message),
}

impl EnvelopeKind {
    pub fn payload(&self) -> &Message {
        match self {
            EnvelopeKind::UserTurn(m)
            | EnvelopeKind::AgentTurn(m)
            | EnvelopeKind::SystemNotice(m)
            | EnvelopeKind::Quit(m) => m,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EnvelopeKind::UserTurn(_) => "user-turn",
            EnvelopeKind::AgentTurn(_) => "agent-turn",
            EnvelopeKind::SystemNotice(_) => "system-notice",
            EnvelopeKind::Quit(_) => "quit",
        }
    }
}

/// The unit placed on every channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEnvelope {
    pub destination: Destination,
    pub kind: EnvelopeKind,
}

impl RoutingEnvelope {
    pub fn new(destination: Destination, kind: EnvelopeKind) -> Self {
        Self { destination, kind }
    }

    pub fn to_router(kind: EnvelopeKind) -> Self {
        Self::new(Destination::Router, kind)
    }
}
