pub mod conversation_log;
pub mod display;
pub mod engine;
pub mod error;
pub mod instructions;
pub mod llm_client;
pub mod persistence;
pub mod prompt_builder;
pub mod protocol;
pub mod recorder;
pub mod reply_worker;
pub mod router;
pub mod shutdown;
