use tracing::debug;

use crate::engine::conversation_log::ConversationLog;
use crate::engine::error::EngineError;
use crate::engine::protocol::{Destination, EnvelopeKind, RoutingEnvelope};
use crate::engine::shutdown::{Inbox, LoopExit};
use crate::model::message::Message;

/// Sole writer of the conversation log.
pub struct Recorder {
    log: ConversationLog,
}

impl Recorder {
    pub fn new(log: ConversationLog) -> Self {
        Self { log }
    }

    /// Appends the message and its transcript entry in one step.
    pub fn record(&self, message: Message) -> Result<usize, EngineError> {
        self.log.append(message)
    }

    pub fn handle(&self, envelope: RoutingEnvelope) -> Result<(), EngineError> {
        if envelope.destination != Destination::Recorder {
            return Err(EngineError::Misaddressed {
                component: Destination::Recorder,
                addressed_to: envelope.destination,
            });
        }

        match envelope.kind {
            EnvelopeKind::UserTurn(msg)
            | EnvelopeKind::AgentTurn(msg)
            | EnvelopeKind::SystemNotice(msg) => {
                let len = self.record(msg)?;
                debug!(component = "recorder", len, "recorded");
            }
            EnvelopeKind::Quit(_) => {
                debug!(component = "recorder", "ignoring quit");
            }
        }
        Ok(())
    }

    pub fn run(self, inbox: Inbox<RoutingEnvelope>) -> LoopExit {
        inbox.drive("recorder", |envelope| self.handle(envelope))
    }
}
