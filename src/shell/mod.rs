//! C3/C4/C5 — the shell layer: parser, executor, and the dual-mode
//! command contract, plus the built-in command registry.

pub mod command;
pub mod commands;
pub mod executor;
pub mod parser;

pub use command::{CommandArgs, ExecOptions, ShellCommand, ShellResult, StructuredError};
pub use executor::ShellExecutor;
