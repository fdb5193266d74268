use thiserror::Error;

use crate::engine::protocol::Destination;

/// Failures that mean shared state or the routing protocol can no longer be
/// trusted. Every variant is fatal to the component that hits it: it is
/// logged and the component trips the shutdown signal.
///
/// Recoverable failures have their own types (`GenerationError`,
/// `PersistenceError`, `DisplayError`) and never end up here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("conversation log lock is poisoned")]
    LogPoisoned,

    #[error("{component:?} received an envelope addressed to {addressed_to:?}")]
    Misaddressed {
        component: Destination,
        addressed_to: Destination,
    },

    #[error("channel to {0:?} is closed")]
    ChannelClosed(Destination),
}
