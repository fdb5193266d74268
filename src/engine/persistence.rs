use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::engine::conversation_log::ConversationLog;
use crate::engine::error::EngineError;
use crate::engine::shutdown::{LoopExit, ShutdownCoordinator};
use crate::model::message::Message;
use crate::model::snapshot::SnapshotEntry;

pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot I/O failed at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot entry {index} has a bad timestamp: {source}")]
    Timestamp {
        index: usize,
        source: chrono::ParseError,
    },
}

/* =========================
   Snapshot file
   ========================= */

/// The JSON snapshot on disk. Each save overwrites the previous one.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot. A missing file is an empty history.
    pub fn read(&self) -> Result<Vec<Message>, PersistenceError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let entries: Vec<SnapshotEntry> = serde_json::from_str(&raw)?;
        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                Message::try_from(entry).map_err(|source| PersistenceError::Timestamp { index, source })
            })
            .collect()
    }

    /// Like `read`, but a broken snapshot degrades to an empty history.
    pub fn load(&self) -> Vec<Message> {
        match self.read() {
            Ok(messages) => messages,
            Err(err) => {
                warn!(
                    component = "persistence",
                    path = %self.path.display(),
                    error = %err,
                    "ignoring unreadable snapshot"
                );
                Vec::new()
            }
        }
    }

    pub fn save(&self, messages: &[Message]) -> Result<(), PersistenceError> {
        let entries: Vec<SnapshotEntry> = messages.iter().map(SnapshotEntry::from).collect();
        let json = serde_json::to_string_pretty(&entries)?;

        let io_err = |source: io::Error| PersistenceError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&self.path, json).map_err(io_err)
    }
}

/* =========================
   Worker
   ========================= */

/// Periodically writes the conversation log to the snapshot file.
#[derive(Clone)]
pub struct PersistenceWorker {
    store: SnapshotStore,
    log: ConversationLog,
    interval: Duration,
}

impl PersistenceWorker {
    pub fn new(store: SnapshotStore, log: ConversationLog, interval: Duration) -> Self {
        Self {
            store,
            log,
            interval,
        }
    }

    /// Fills `log` from the last snapshot. Runs before any other component
    /// touches the log.
    pub fn hydrate(store: &SnapshotStore, log: &ConversationLog) -> Result<usize, EngineError> {
        let messages = store.load();
        for msg in &messages {
            debug!(
                component = "persistence",
                sender = %msg.sender,
                timestamp = %msg.formatted_timestamp(),
                "loaded entry"
            );
        }
        let count = log.hydrate(messages)?;
        info!(component = "persistence", count, path = %store.path().display(), "history loaded");
        Ok(count)
    }

    /// Writes one consistent copy of the log. A failed write is logged and
    /// left for the next cycle; only a broken log is an error.
    pub fn flush(&self) -> Result<(), EngineError> {
        let messages = self.log.snapshot()?;
        match self.store.save(&messages) {
            Ok(()) => debug!(component = "persistence", count = messages.len(), "history saved"),
            Err(err) => warn!(component = "persistence", error = %err, "history not saved"),
        }
        Ok(())
    }

    /// Saves every interval until stopped. The final save happens after the
    /// other components have drained, see `Engine::join`.
    pub fn run(self, shutdown: ShutdownCoordinator) -> LoopExit {
        info!(component = "persistence", interval = ?self.interval, "started");
        let exit = loop {
            if shutdown.wait_timeout(self.interval) {
                break LoopExit::Stopped;
            }
            if let Err(err) = self.flush() {
                tracing::error!(component = "persistence", error = %err, "fatal error");
                shutdown.request_stop("persistence");
                break LoopExit::Failed;
            }
        };
        info!(component = "persistence", ?exit, "stopped");
        exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::{parse_timestamp, Role};
    use std::thread;
    use std::time::Instant;
    use tempfile::TempDir;

    fn sample() -> Vec<Message> {
        let ts = parse_timestamp("2025-12-04 18:00:00").unwrap();
        vec![
            Message::new("JJ", "hello", Role::Human, ts),
            Message::new("Willow", "Hi JJ! How can I help?", Role::Agent, ts),
            Message::new("Server", "maintenance at noon", Role::System, ts),
        ]
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("history.json"));

        store.save(&sample()).unwrap();
        assert_eq!(store.read().unwrap(), sample());

        // Messages stamped now survive as well.
        let live = vec![Message::human("JJ", "right now"), Message::agent("Willow", "indeed")];
        store.save(&live).unwrap();
        assert_eq!(store.read().unwrap(), live);
    }

    #[test]
    fn missing_snapshot_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("nope.json"));
        assert!(store.read().unwrap().is_empty());
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_snapshot_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "[{\"timestamp\": ").unwrap();

        let store = SnapshotStore::new(&path);
        assert!(matches!(store.read(), Err(PersistenceError::Json(_))));
        assert!(store.load().is_empty());
    }

    #[test]
    fn legacy_snapshot_is_understood() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        fs::write(
            &path,
            r#"[
                {"timestamp": "2025-10-01 08:00:00", "role": "user", "username": "JJ", "parts": [{"text": "hi"}]},
                {"timestamp": "2025-10-01 08:00:04", "role": "model", "username": "Willow", "parts": [{"text": "hello"}]}
            ]"#,
        )
        .unwrap();

        let messages = SnapshotStore::new(&path).read().unwrap();
        assert_eq!(messages[0].role, Role::Human);
        assert_eq!(messages[1].role, Role::Agent);
        assert_eq!(messages[1].sender, "Willow");
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested").join("history.json"));
        store.save(&sample()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn hydrate_fills_log_and_transcript() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("history.json"));
        store.save(&sample()).unwrap();

        let log = ConversationLog::new();
        assert_eq!(PersistenceWorker::hydrate(&store, &log).unwrap(), 3);
        let transcript = log.transcript().unwrap();
        assert_eq!(transcript[0].text, "At 2025-12-04 18:00:00, JJ said: hello");
    }

    #[test]
    fn snapshots_taken_during_appends_are_complete() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("history.json"));
        let log = ConversationLog::new();
        let worker = PersistenceWorker::new(store.clone(), log.clone(), Duration::from_millis(1));

        let writer = {
            let log = log.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    log.append(Message::human("JJ", format!("message {i}"))).unwrap();
                }
            })
        };
        for _ in 0..20 {
            worker.flush().unwrap();
            let saved: Vec<serde_json::Value> =
                serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
            for entry in saved {
                assert!(entry["timestamp"].is_string());
                assert!(entry["role"].is_string());
                assert!(entry["username"].is_string());
                assert!(entry["parts"][0]["text"].is_string());
            }
        }
        writer.join().unwrap();

        worker.flush().unwrap();
        assert_eq!(store.read().unwrap().len(), 200);
    }

    #[test]
    fn run_saves_periodically_and_stops_promptly() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("history.json"));
        let log = ConversationLog::new();
        log.append(Message::human("JJ", "hello")).unwrap();

        let shutdown = ShutdownCoordinator::new();
        let worker = PersistenceWorker::new(store.clone(), log, Duration::from_millis(20));
        let handle = {
            let shutdown = shutdown.clone();
            thread::spawn(move || worker.run(shutdown))
        };

        thread::sleep(Duration::from_millis(100));
        let signalled = Instant::now();
        shutdown.request_stop("test");
        assert_eq!(handle.join().unwrap(), LoopExit::Stopped);
        assert!(signalled.elapsed() < Duration::from_millis(200));
        assert_eq!(store.read().unwrap().len(), 1);
    }
}
