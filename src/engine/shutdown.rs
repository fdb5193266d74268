use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::engine::error::EngineError;

/// Process-wide one-shot stop signal. Cloning shares the same signal.
///
/// The transition is one way: once stopped, nothing resets it.
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    inner: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    changed: Condvar,
}

#[derive(Default)]
struct State {
    stopped: bool,
    origin: Option<&'static str>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    // The state is a plain flag, so a poisoned lock still holds a usable value.
    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the signal. Returns `true` only for the call that made the
    /// transition; later calls are no-ops.
    pub fn request_stop(&self, origin: &'static str) -> bool {
        let mut state = self.state();
        if state.stopped {
            return false;
        }
        state.stopped = true;
        state.origin = Some(origin);
        drop(state);

        self.inner.changed.notify_all();
        tracing::info!(origin, "shutdown requested");
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.state().stopped
    }

    /// The component that tripped the signal first.
    pub fn origin(&self) -> Option<&'static str> {
        self.state().origin
    }

    /// Sleeps for up to `timeout`, waking early on stop. Returns whether the
    /// signal is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.state();
        let (guard, _) = self
            .inner
            .changed
            .wait_timeout_while(guard, timeout, |s| !s.stopped)
            .unwrap_or_else(PoisonError::into_inner);
        guard.stopped
    }

    pub fn inbox<T>(&self, rx: Receiver<T>, poll: Duration) -> Inbox<T> {
        Inbox {
            rx,
            shutdown: self.clone(),
            poll,
        }
    }
}

/// Trips the stop signal when dropped. Shared through an `Arc`, it fires
/// once the last holder is gone.
pub struct StopGuard {
    shutdown: ShutdownCoordinator,
    origin: &'static str,
}

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.shutdown.request_stop(self.origin);
    }
}

impl ShutdownCoordinator {
    pub fn stop_guard(&self, origin: &'static str) -> StopGuard {
        StopGuard {
            shutdown: self.clone(),
            origin,
        }
    }
}

/* =========================
   Cancellation-aware receive
   ========================= */

#[derive(Debug, PartialEq, Eq)]
pub enum Received<T> {
    Item(T),
    /// The stop signal is set. Anything still queued is left unread.
    Stopped,
    /// Every sender is gone and the queue is drained.
    Closed,
}

/// A receiver bound to the stop signal.
///
/// The signal is checked before every wait and at least once per `poll`,
/// so a component finishes the item in hand and nothing after it. Draining
/// on purpose goes through `Closed`: drop the senders instead of stopping.
pub struct Inbox<T> {
    rx: Receiver<T>,
    shutdown: ShutdownCoordinator,
    poll: Duration,
}

impl<T> Inbox<T> {
    pub fn recv(&self) -> Received<T> {
        loop {
            if self.shutdown.is_stopped() {
                return Received::Stopped;
            }
            match self.rx.recv_timeout(self.poll) {
                Ok(item) => return Received::Item(item),
                Err(RecvTimeoutError::Disconnected) => return Received::Closed,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Feeds every item to `handle` until the inbox stops or closes. An
    /// error from `handle` is fatal: it is logged and trips the stop signal
    /// with `component` as origin.
    pub fn drive<F>(&self, component: &'static str, mut handle: F) -> LoopExit
    where
        F: FnMut(T) -> Result<(), EngineError>,
    {
        tracing::info!(component, "started");
        let exit = loop {
            match self.recv() {
                Received::Item(item) => {
                    if let Err(err) = handle(item) {
                        tracing::error!(component, error = %err, "fatal error");
                        self.shutdown.request_stop(component);
                        break LoopExit::Failed;
                    }
                }
                Received::Stopped => break LoopExit::Stopped,
                Received::Closed => break LoopExit::Closed,
            }
        };
        tracing::info!(component, ?exit, "stopped");
        exit
    }
}

/// Why a component loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Stopped,
    Closed,
    Failed,
}
