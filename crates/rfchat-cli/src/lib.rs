//! rfchat CLI library
//!
//! Configuration, persistence, terminal output and the interactive loop for
//! the `rfchat` binary.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;
pub mod store;

pub use app::{ChatApp, ChatCommand};
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
pub use store::JsonlStore;
