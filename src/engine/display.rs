use std::io;
use std::sync::mpsc::Sender;

use thiserror::Error;
use tracing::warn;

use crate::engine::error::EngineError;
use crate::engine::protocol::{Destination, EnvelopeKind, RoutingEnvelope};
use crate::engine::shutdown::{Inbox, LoopExit};
use crate::model::message::Message;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("failed to write to the display: {0}")]
    Io(#[from] io::Error),

    #[error("display surface is detached")]
    Detached,
}

/// Where messages end up being rendered: a terminal table, a window's text
/// widget, a channel read by tests.
pub trait DisplaySurface: Send + 'static {
    fn show(&mut self, message: &Message) -> Result<(), DisplayError>;
}

/// Hands every message to another thread, e.g. a GUI event loop.
pub struct ChannelSurface {
    tx: Sender<Message>,
}

impl ChannelSurface {
    pub fn new(tx: Sender<Message>) -> Self {
        Self { tx }
    }
}

impl DisplaySurface for ChannelSurface {
    fn show(&mut self, message: &Message) -> Result<(), DisplayError> {
        self.tx
            .send(message.clone())
            .map_err(|_| DisplayError::Detached)
    }
}

/// Renders outbound messages. Surface failures are logged and skipped,
/// never escalated.
pub struct DisplaySink<S> {
    surface: S,
    view: Vec<Message>,
}

impl<S: DisplaySurface> DisplaySink<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            view: Vec::new(),
        }
    }

    pub fn show(&mut self, message: Message) {
        if let Err(err) = self.surface.show(&message) {
            warn!(component = "display", error = %err, "render failed");
        }
        self.view.push(message);
    }

    /// Shows previously persisted history, oldest first.
    pub fn replay(&mut self, history: Vec<Message>) {
        for message in history {
            self.show(message);
        }
    }

    /// Everything shown so far.
    pub fn view(&self) -> &[Message] {
        &self.view
    }

    pub fn handle(&mut self, envelope: RoutingEnvelope) -> Result<(), EngineError> {
        if envelope.destination != Destination::Display {
            return Err(EngineError::Misaddressed {
                component: Destination::Display,
                addressed_to: envelope.destination,
            });
        }

        match envelope.kind {
            EnvelopeKind::UserTurn(msg)
            | EnvelopeKind::AgentTurn(msg)
            | EnvelopeKind::SystemNotice(msg)
            | EnvelopeKind::Quit(msg) => self.show(msg),
        }
        Ok(())
    }

    pub fn run(mut self, inbox: Inbox<RoutingEnvelope>) -> LoopExit {
        inbox.drive("display", |envelope| self.handle(envelope))
    }
}
