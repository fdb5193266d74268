use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info, warn};

use crate::engine::conversation_log::ConversationLog;
use crate::engine::display::{DisplaySink, DisplaySurface};
use crate::engine::instructions;
use crate::engine::llm_client::ReplyGenerator;
use crate::engine::persistence::{PersistenceWorker, SnapshotStore, DEFAULT_SAVE_INTERVAL};
use crate::engine::recorder::Recorder;
use crate::engine::reply_worker::ReplyWorker;
use crate::engine::router::{HumanInput, Router};
use crate::engine::shutdown::{LoopExit, ShutdownCoordinator};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct EngineSettings {
    pub human: String,
    pub agent: String,
    /// `None` uses the built-in instructions without touching disk.
    pub instructions_file: Option<PathBuf>,
    pub poll_interval: Duration,
    pub save_interval: Duration,
}

impl EngineSettings {
    pub fn new(human: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            human: human.into(),
            agent: agent.into(),
            instructions_file: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            save_interval: DEFAULT_SAVE_INTERVAL,
        }
    }
}

/// The running component set: one thread per component, wired through
/// channels, sharing one conversation log and one stop signal.
pub struct Engine {
    shutdown: ShutdownCoordinator,
    log: ConversationLog,
    persistence: PersistenceWorker,
    threads: Vec<(&'static str, JoinHandle<LoopExit>)>,
}

impl Engine {
    /// Hydrates the log, then starts every component. The returned
    /// `HumanInput` is the router's only external producer. Once it quits,
    /// or is dropped (which sends the quit), the message components drain
    /// and exit and the stop signal trips with origin `router`.
    pub fn start<G, S>(
        settings: EngineSettings,
        store: SnapshotStore,
        generator: G,
        surface: S,
    ) -> Result<(Self, HumanInput)>
    where
        G: ReplyGenerator,
        S: DisplaySurface,
    {
        let shutdown = ShutdownCoordinator::new();
        let log = ConversationLog::new();

        // Nothing may read or append before hydration is done.
        PersistenceWorker::hydrate(&store, &log)?;
        let persistence = PersistenceWorker::new(store, log.clone(), settings.save_interval);

        let (router_tx, router_rx) = mpsc::channel();
        let (worker_tx, worker_rx) = mpsc::channel();
        let (recorder_tx, recorder_rx) = mpsc::channel();
        let (display_tx, display_rx) = mpsc::channel();
        let poll = settings.poll_interval;

        let mut engine = Engine {
            shutdown: shutdown.clone(),
            log: log.clone(),
            persistence: persistence.clone(),
            threads: Vec::new(),
        };

        // Router, recorder and display each hold one. After a quit they
        // drain and close in that order; the last one out trips the signal.
        let drained = Arc::new(shutdown.stop_guard("router"));

        let stop = shutdown.clone();
        engine.spawn("persistence", move || persistence.run(stop))?;

        let recorder = Recorder::new(log.clone());
        let inbox = shutdown.inbox(recorder_rx, poll);
        let guard = drained.clone();
        engine.spawn("recorder", move || {
            let _drained = guard;
            recorder.run(inbox)
        })?;

        let mut display = DisplaySink::new(surface);
        display.replay(log.snapshot()?);
        let inbox = shutdown.inbox(display_rx, poll);
        let guard = drained.clone();
        engine.spawn("display", move || {
            let _drained = guard;
            display.run(inbox)
        })?;

        let agent = settings.agent.clone();
        let instructions_file = settings.instructions_file.clone();
        let worker_log = log.clone();
        let replies = router_tx.clone();
        let inbox = shutdown.inbox(worker_rx, poll);
        engine.spawn("reply-worker", move || {
            let instructions = match &instructions_file {
                Some(path) => instructions::load_or_create(path, &agent),
                None => instructions::default_instructions(&agent),
            };
            ReplyWorker::new(agent, instructions, worker_log, generator).run(inbox, replies)
        })?;

        let router = Router::new(
            settings.human.clone(),
            settings.agent,
            worker_tx,
            recorder_tx,
            display_tx,
        );
        let inbox = shutdown.inbox(router_rx, poll);
        let guard = drained.clone();
        engine.spawn("router", move || {
            let _drained = guard;
            router.run(inbox)
        })?;

        info!(threads = engine.threads.len(), "engine started");
        Ok((engine, HumanInput::new(settings.human, router_tx)))
    }

    fn spawn<F>(&mut self, name: &'static str, body: F) -> Result<()>
    where
        F: FnOnce() -> LoopExit + Send + 'static,
    {
        match thread::Builder::new().name(name.into()).spawn(body) {
            Ok(handle) => {
                self.threads.push((name, handle));
                Ok(())
            }
            Err(err) => {
                // Whatever already runs winds down on its own.
                self.shutdown.request_stop("engine");
                Err(err).with_context(|| format!("failed to spawn {name} thread"))
            }
        }
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Joins every component thread, then writes the final snapshot.
    /// Returns once the system has stopped, through a finished quit or
    /// through `request_stop`.
    pub fn join(self) -> Result<()> {
        let mut panicked = Vec::new();
        for (name, handle) in self.threads {
            match handle.join() {
                Ok(exit) => debug!(thread = name, ?exit, "joined"),
                Err(_) => {
                    error!(thread = name, "thread panicked");
                    self.shutdown.request_stop(name);
                    panicked.push(name);
                }
            }
        }

        if let Err(err) = self.persistence.flush() {
            warn!(error = %err, "final save failed");
        }

        if !panicked.is_empty() {
            bail!("component threads panicked: {}", panicked.join(", "));
        }
        info!("all threads cleaned up");
        Ok(())
    }
}
