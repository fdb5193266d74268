use std::sync::mpsc::Sender;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::engine::error::EngineError;
use crate::engine::protocol::{Destination, EnvelopeKind, RoutingEnvelope};
use crate::engine::shutdown::{Inbox, LoopExit};
use crate::model::message::{Message, Role};

/// Decides who receives what.
///
/// The only state is the set of outbound channels. Human input and agent
/// replies arrive on one shared inbound channel, so the two sources are
/// served in arrival order and neither can starve the other.
pub struct Router {
    human: String,
    agent: String,
    worker: Option<Sender<RoutingEnvelope>>,
    recorder: Sender<RoutingEnvelope>,
    display: Sender<RoutingEnvelope>,
}

impl Router {
    pub fn new(
        human: impl Into<String>,
        agent: impl Into<String>,
        worker: Sender<RoutingEnvelope>,
        recorder: Sender<RoutingEnvelope>,
        display: Sender<RoutingEnvelope>,
    ) -> Self {
        Self {
            human: human.into(),
            agent: agent.into(),
            worker: Some(worker),
            recorder,
            display,
        }
    }

    pub fn is_accepting_input(&self) -> bool {
        self.worker.is_some()
    }

    pub fn route(&mut self, envelope: RoutingEnvelope) -> Result<(), EngineError> {
        if envelope.destination != Destination::Router {
            return Err(EngineError::Misaddressed {
                component: Destination::Router,
                addressed_to: envelope.destination,
            });
        }
        debug!(component = "router", kind = envelope.kind.name(), "routing");

        match envelope.kind {
            EnvelopeKind::UserTurn(msg) => {
                let Some(worker) = &self.worker else {
                    debug!(component = "router", "quit received, dropping human turn");
                    return Ok(());
                };
                let msg = msg.with_role(Role::Human);
                send(worker, Destination::ReplyWorker, EnvelopeKind::UserTurn(msg.clone()))?;
                self.show(EnvelopeKind::UserTurn(msg.clone()));
                send(&self.recorder, Destination::Recorder, EnvelopeKind::UserTurn(msg))?;
            }
            EnvelopeKind::AgentTurn(msg) => {
                let msg = msg.with_role(Role::Agent);
                self.show(EnvelopeKind::AgentTurn(msg.clone()));
                send(&self.recorder, Destination::Recorder, EnvelopeKind::AgentTurn(msg))?;
            }
            EnvelopeKind::SystemNotice(msg) => {
                self.show(EnvelopeKind::SystemNotice(msg));
            }
            EnvelopeKind::Quit(msg) => {
                // Dropping the worker's sender lets it finish its queue and
                // exit; its replies still come through here.
                if self.worker.take().is_some() {
                    info!(component = "router", sender = %msg.sender, "quit received, draining");
                    self.show(EnvelopeKind::SystemNotice(msg.with_role(Role::System)));
                }
            }
        }
        Ok(())
    }

    /// Greets both participants on the display.
    pub fn announce(&self) {
        let notices = [
            format!("*** {} joined the chat. ***", self.human),
            format!("*** {} is online. Say 'hello' to begin! ***", self.agent),
        ];
        for text in notices {
            self.show(EnvelopeKind::SystemNotice(Message::system("Server", text)));
        }
    }

    // A lost render is recoverable; the recorder holds the real copy.
    fn show(&self, kind: EnvelopeKind) {
        if send(&self.display, Destination::Display, kind).is_err() {
            warn!(component = "router", "display is gone, message not shown");
        }
    }

    /// Routes until every producer is gone or the stop signal is set.
    ///
    /// After a quit the inbox only closes once the reply worker has drained
    /// and exited, so every pending reply is fanned out first. Returning
    /// drops the recorder and display senders, which lets both drain and
    /// close in turn. The stop signal for a finished quit is tripped by the
    /// engine once all three are done.
    pub fn run(mut self, inbox: Inbox<RoutingEnvelope>) -> LoopExit {
        self.announce();
        inbox.drive("router", |envelope| self.route(envelope))
    }
}

fn send(
    tx: &Sender<RoutingEnvelope>,
    destination: Destination,
    kind: EnvelopeKind,
) -> Result<(), EngineError> {
    tx.send(RoutingEnvelope::new(destination, kind))
        .map_err(|_| EngineError::ChannelClosed(destination))
}

/* =========================
   Human input port
   ========================= */

#[derive(Debug, Error)]
pub enum InputError {
    #[error("router is no longer accepting input")]
    RouterGone,

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// The only way human turns reach the router. `quit` consumes the handle,
/// so nothing can be submitted after it.
///
/// Dropping the handle without `quit` (a panicking input thread, say) still
/// sends the quit, so the router can drain and close.
pub struct HumanInput {
    username: String,
    tx: Sender<RoutingEnvelope>,
    quit_sent: bool,
}

impl HumanInput {
    pub fn new(username: impl Into<String>, tx: Sender<RoutingEnvelope>) -> Self {
        Self {
            username: username.into(),
            tx,
            quit_sent: false,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn submit(&self, text: impl Into<String>) -> Result<(), InputError> {
        let msg = Message::human(self.username.clone(), text);
        self.tx
            .send(RoutingEnvelope::to_router(EnvelopeKind::UserTurn(msg)))
            .map_err(|_| InputError::RouterGone)
    }

    pub fn quit(mut self) -> Result<(), InputError> {
        self.send_quit()
    }

    fn send_quit(&mut self) -> Result<(), InputError> {
        self.quit_sent = true;
        let msg = Message::system(
            self.username.clone(),
            format!("{} is leaving.", self.username),
        );
        self.tx
            .send(RoutingEnvelope::to_router(EnvelopeKind::Quit(msg)))
            .map_err(|_| InputError::RouterGone)
    }
}

impl Drop for HumanInput {
    fn drop(&mut self) {
        if self.quit_sent {
            return;
        }
        if self.send_quit().is_err() {
            debug!(component = "input", "router already gone, quit not delivered");
        } else {
            warn!(component = "input", user = %self.username, "input dropped without quit");
        }
    }
}
