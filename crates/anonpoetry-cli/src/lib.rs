//! Command-line playground for AnonPoetry
//!
//! Runs the publish / like / reveal / ranking flows for several named users
//! against in-memory collaborators.

pub mod config;
pub mod playground;

pub use config::{Cli, Command, LogFormat};
pub use playground::{Action, DEMO_SCRIPT, Playground, ScriptError};
