pub mod message;
pub mod snapshot;
pub mod transcript;
