pub mod input;
pub mod settings;
pub mod settings_io;
pub mod terminal;
