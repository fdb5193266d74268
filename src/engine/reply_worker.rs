use std::sync::mpsc::Sender;

use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::conversation_log::ConversationLog;
use crate::engine::error::EngineError;
use crate::engine::llm_client::ReplyGenerator;
use crate::engine::prompt_builder;
use crate::engine::protocol::{Destination, EnvelopeKind, RoutingEnvelope};
use crate::engine::shutdown::{Inbox, LoopExit};
use crate::model::message::Message;

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("refusing to answer our own message from {0}")]
    SelfReply(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Answers human turns through the generation backend, one at a time.
pub struct ReplyWorker<G> {
    identity: String,
    instructions: String,
    log: ConversationLog,
    generator: G,
}

impl<G: ReplyGenerator> ReplyWorker<G> {
    pub fn new(
        identity: impl Into<String>,
        instructions: impl Into<String>,
        log: ConversationLog,
        generator: G,
    ) -> Self {
        Self {
            identity: identity.into(),
            instructions: instructions.into(),
            log,
            generator,
        }
    }

    /// Produces the agent's reply to `request`.
    ///
    /// A failed generation is not an error here: its cause becomes the reply
    /// text. Only self-addressed requests and a broken log are errors.
    pub fn handle(&self, request: &Message) -> Result<Message, ReplyError> {
        if request.sender == self.identity {
            return Err(ReplyError::SelfReply(request.sender.clone()));
        }

        // Copy under the lock; the lock is released before the remote call.
        let transcript = self.log.transcript()?;
        let prompt = prompt_builder::compose(transcript, request);

        let text = match self
            .generator
            .generate(&prompt.history, &prompt.request, &self.instructions)
        {
            Ok(text) => text,
            Err(err) => {
                warn!(component = "reply-worker", error = %err, "generation failed");
                format!("An error occurred: {err}")
            }
        };

        Ok(Message::agent(self.identity.clone(), text))
    }

    fn dispatch(
        &self,
        envelope: RoutingEnvelope,
        replies: &Sender<RoutingEnvelope>,
    ) -> Result<(), EngineError> {
        if envelope.destination != Destination::ReplyWorker {
            return Err(EngineError::Misaddressed {
                component: Destination::ReplyWorker,
                addressed_to: envelope.destination,
            });
        }

        let request = match envelope.kind {
            EnvelopeKind::UserTurn(msg) => msg,
            other => {
                debug!(component = "reply-worker", kind = other.name(), "ignored");
                return Ok(());
            }
        };

        let reply = match self.handle(&request) {
            Ok(reply) => reply,
            Err(ReplyError::SelfReply(sender)) => {
                warn!(component = "reply-worker", %sender, "dropped self-addressed request");
                return Ok(());
            }
            Err(ReplyError::Engine(err)) => return Err(err),
        };

        replies
            .send(RoutingEnvelope::to_router(EnvelopeKind::AgentTurn(reply)))
            .map_err(|_| EngineError::ChannelClosed(Destination::Router))
    }

    pub fn run(self, inbox: Inbox<RoutingEnvelope>, replies: Sender<RoutingEnvelope>) -> LoopExit {
        let shutdown = inbox.shutdown().clone();
        inbox.drive("reply-worker", |envelope| match self.dispatch(envelope, &replies) {
            // The router leaves first during shutdown; a late reply has nowhere to go.
            Err(EngineError::ChannelClosed(_)) if shutdown.is_stopped() => {
                warn!(component = "reply-worker", "router gone, reply discarded");
                Ok(())
            }
            result => result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::llm_client::GenerationError;
    use crate::model::message::Role;
    use crate::model::transcript::TranscriptEntry;
    use crate::engine::shutdown::ShutdownCoordinator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    type Seen = Arc<Mutex<Vec<(usize, String, String)>>>;

    fn recording_generator(
        seen: Seen,
    ) -> impl Fn(&[TranscriptEntry], &TranscriptEntry, &str) -> Result<String, GenerationError> + Send + 'static
    {
        move |history: &[TranscriptEntry], request: &TranscriptEntry, instructions: &str| {
            seen.lock()
                .unwrap()
                .push((history.len(), request.text.clone(), instructions.to_string()));
            Ok("Hello, JJ!".to_string())
        }
    }

    #[test]
    fn reply_uses_history_request_and_instructions() {
        let log = ConversationLog::new();
        log.append(Message::human("JJ", "earlier")).unwrap();
        let seen = Seen::default();
        let worker = ReplyWorker::new("Willow", "Be brief.", log, recording_generator(seen.clone()));

        let reply = worker.handle(&Message::human("JJ", "hello")).unwrap();

        assert_eq!(reply.sender, "Willow");
        assert_eq!(reply.role, Role::Agent);
        assert_eq!(reply.text, "Hello, JJ!");
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, 1);
        assert!(seen[0].1.ends_with("JJ said: hello"));
        assert_eq!(seen[0].2, "Be brief.");
    }

    #[test]
    fn recorder_running_ahead_does_not_leak_later_turns() {
        let log = ConversationLog::new();
        let one = Message::human("JJ", "one");
        log.append(one.clone()).unwrap();
        log.append(Message::human("JJ", "two")).unwrap();
        let seen = Seen::default();
        let worker = ReplyWorker::new("Willow", "", log, recording_generator(seen.clone()));

        worker.handle(&one).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, 0);
        assert!(seen[0].1.ends_with("JJ said: one"));
    }

    #[test]
    fn generation_failure_becomes_reply_text() {
        let failing = |_: &[TranscriptEntry], _: &TranscriptEntry, _: &str| {
            Err::<String, _>(GenerationError::Other("quota exhausted".into()))
        };
        let worker = ReplyWorker::new("Willow", "", ConversationLog::new(), failing);

        let reply = worker.handle(&Message::human("JJ", "hello")).unwrap();
        assert_eq!(reply.text, "An error occurred: quota exhausted");
        assert_eq!(reply.role, Role::Agent);
    }

    #[test]
    fn own_messages_are_not_answered() {
        let seen = Seen::default();
        let worker = ReplyWorker::new("Willow", "", ConversationLog::new(), recording_generator(seen.clone()));

        let result = worker.handle(&Message::agent("Willow", "talking to myself"));
        assert!(matches!(result, Err(ReplyError::SelfReply(_))));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn dispatch_sends_agent_turn_to_router() {
        let seen = Seen::default();
        let worker = ReplyWorker::new("Willow", "", ConversationLog::new(), recording_generator(seen));
        let (tx, rx) = mpsc::channel();

        worker
            .dispatch(
                RoutingEnvelope::new(
                    Destination::ReplyWorker,
                    EnvelopeKind::UserTurn(Message::human("JJ", "hello")),
                ),
                &tx,
            )
            .unwrap();

        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.destination, Destination::Router);
        assert!(matches!(envelope.kind, EnvelopeKind::AgentTurn(ref m) if m.text == "Hello, JJ!"));
    }

    #[test]
    fn stop_leaves_the_backlog_unanswered() {
        let shutdown = ShutdownCoordinator::new();
        let (work_tx, work_rx) = mpsc::channel();
        let (replies_tx, replies_rx) = mpsc::channel();
        let (started_tx, started) = mpsc::channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let generator = {
            let calls = calls.clone();
            move |_: &[TranscriptEntry], _: &TranscriptEntry, _: &str| {
                calls.fetch_add(1, Ordering::SeqCst);
                let _ = started_tx.send(());
                thread::sleep(Duration::from_millis(100));
                Ok::<_, GenerationError>("done".to_string())
            }
        };

        for i in 0..10 {
            work_tx
                .send(RoutingEnvelope::new(
                    Destination::ReplyWorker,
                    EnvelopeKind::UserTurn(Message::human("JJ", format!("request {i}"))),
                ))
                .unwrap();
        }
        let worker = ReplyWorker::new("Willow", "", ConversationLog::new(), generator);
        let inbox = shutdown.inbox(work_rx, Duration::from_millis(20));
        let handle = thread::spawn(move || worker.run(inbox, replies_tx));

        started.recv_timeout(Duration::from_secs(5)).unwrap();
        let signalled = Instant::now();
        shutdown.request_stop("recorder");

        assert_eq!(handle.join().unwrap(), LoopExit::Stopped);
        assert!(signalled.elapsed() < Duration::from_millis(200));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(replies_rx.try_iter().count(), 1);
        drop(work_tx);
    }

    #[test]
    fn closed_router_is_fatal_while_running() {
        let seen = Seen::default();
        let worker = ReplyWorker::new("Willow", "", ConversationLog::new(), recording_generator(seen));
        let (tx, rx) = mpsc::channel();
        drop(rx);

        let result = worker.dispatch(
            RoutingEnvelope::new(
                Destination::ReplyWorker,
                EnvelopeKind::UserTurn(Message::human("JJ", "hello")),
            ),
            &tx,
        );
        assert!(matches!(result, Err(EngineError::ChannelClosed(Destination::Router))));
    }
}
