use std::sync::{Arc, Mutex, MutexGuard};

use crate::engine::error::EngineError;
use crate::model::message::Message;
use crate::model::transcript::TranscriptEntry;

/// The authoritative, append-only conversation.
///
/// Entries and their transcript form sit behind one lock, so a reader
/// never sees one updated without the other. Clones share the same log.
#[derive(Clone, Default)]
pub struct ConversationLog {
    inner: Arc<Mutex<LogState>>,
}

#[derive(Default)]
struct LogState {
    entries: Vec<Message>,
    transcript: Vec<TranscriptEntry>,
}

impl LogState {
    fn push(&mut self, message: Message) {
        self.transcript.push(TranscriptEntry::from(&message));
        self.entries.push(message);
    }
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LogState>, EngineError> {
        self.inner.lock().map_err(|_| EngineError::LogPoisoned)
    }

    /// Appends one message and its transcript entry. Returns the new length.
    pub fn append(&self, message: Message) -> Result<usize, EngineError> {
        let mut state = self.lock()?;
        state.push(message);
        Ok(state.entries.len())
    }

    /// Loads persisted history. Must run before anything else appends.
    pub fn hydrate(&self, messages: Vec<Message>) -> Result<usize, EngineError> {
        let mut state = self.lock()?;
        for message in messages {
            state.push(message);
        }
        Ok(state.entries.len())
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> Result<Vec<Message>, EngineError> {
        Ok(self.lock()?.entries.clone())
    }

    /// Point-in-time copy of the transcript. The lock is released before
    /// this returns, so callers may hold the copy across slow calls.
    pub fn transcript(&self) -> Result<Vec<TranscriptEntry>, EngineError> {
        Ok(self.lock()?.transcript.clone())
    }

    pub fn len(&self) -> Result<usize, EngineError> {
        Ok(self.lock()?.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::Role;
    use std::thread;

    #[test]
    fn append_keeps_entries_and_transcript_in_step() {
        let log = ConversationLog::new();
        log.append(Message::human("JJ", "hello")).unwrap();
        log.append(Message::agent("Willow", "hi JJ")).unwrap();

        let entries = log.snapshot().unwrap();
        let transcript = log.transcript().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(transcript.len(), 2);
        assert_eq!(entries[0].role, Role::Human);
        assert!(transcript[1].text.ends_with("Willow said: hi JJ"));
    }

    #[test]
    fn hydrate_then_append_preserves_order() {
        let log = ConversationLog::new();
        let old = vec![Message::human("JJ", "one"), Message::agent("Willow", "two")];
        assert_eq!(log.hydrate(old).unwrap(), 2);
        assert_eq!(log.append(Message::human("JJ", "three")).unwrap(), 3);

        let texts: Vec<_> = log.snapshot().unwrap().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, ["one", "two", "three"]);
    }

    #[test]
    fn concurrent_snapshots_never_see_a_torn_log() {
        let log = ConversationLog::new();
        let writer = {
            let log = log.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    log.append(Message::human("JJ", format!("line {i}"))).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let state = log.lock().unwrap();
            assert_eq!(state.entries.len(), state.transcript.len());
            for (entry, line) in state.entries.iter().zip(&state.transcript) {
                assert!(!entry.sender.is_empty());
                assert!(line.text.ends_with(&entry.text));
            }
        }

        writer.join().unwrap();
        assert_eq!(log.len().unwrap(), 500);
    }

    #[test]
    fn poisoned_lock_is_reported() {
        let log = ConversationLog::new();
        let poisoner = log.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison the log");
        })
        .join();

        assert!(matches!(
            log.append(Message::human("JJ", "x")),
            Err(EngineError::LogPoisoned)
        ));
    }
}
