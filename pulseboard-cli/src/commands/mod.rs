pub mod config;
pub mod once;
pub mod watch;

pub use config::{handle_config_command, ConfigFormat};
pub use once::{handle_once_command, OnceArgs};
pub use watch::{handle_watch_command, WatchArgs};
