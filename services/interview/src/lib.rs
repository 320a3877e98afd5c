pub mod config;
pub mod console;
pub mod console_speech;
pub mod prompt_loader;
pub mod providers;
