//! Built-in command registry (spec §4.5's "~40 built-in commands";
//! this crate ships a representative core set exercising every contract
//! shape — CLI/typed dual dispatch, `additionalTools`, structured errors —
//! per the closed-union-plus-extensibility-seam design in spec §9).

mod fs_ops;
mod grep;
mod misc;
mod sed;

use crate::shell::command::ShellCommand;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps every tool name a command answers to (its own `name()` plus any
/// `additional_tools()`) to the shared command instance.
pub struct CommandRegistry {
    commands: HashMap<&'static str, Arc<dyn ShellCommand>>,
}

impl CommandRegistry {
    pub fn with_builtins() -> Self {
        let mut reg = Self {
            commands: HashMap::new(),
        };
        reg.register(Arc::new(fs_ops::CatCommand));
        reg.register(Arc::new(fs_ops::LsCommand));
        reg.register(Arc::new(fs_ops::MkdirCommand));
        reg.register(Arc::new(fs_ops::RmCommand));
        reg.register(Arc::new(fs_ops::MvCommand));
        reg.register(Arc::new(fs_ops::CpCommand));
        reg.register(Arc::new(fs_ops::TouchCommand));
        reg.register(Arc::new(fs_ops::WriteCommand));
        reg.register(Arc::new(misc::EchoCommand));
        reg.register(Arc::new(misc::PwdCommand));
        reg.register(Arc::new(misc::WcCommand));
        reg.register(Arc::new(misc::HeadCommand));
        reg.register(Arc::new(misc::TailCommand));
        reg.register(Arc::new(grep::GrepCommand));
        reg.register(Arc::new(sed::SedCommand));
        reg
    }

    pub fn register(&mut self, command: Arc<dyn ShellCommand>) {
        self.commands.insert(command.name(), command.clone());
        for tool in command.additional_tools() {
            self.commands.insert(tool.name, command.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ShellCommand>> {
        self.commands.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.commands.keys().copied().collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Curated "alternative" hints for commands this sandbox cannot run,
/// surfaced verbatim in stderr by the executor on exit 127 (spec §6).
pub fn unknown_command_hint(name: &str) -> Option<&'static str> {
    match name {
        "sed" => Some("use the `sed` or `sed_line` tool instead"),
        "awk" => Some("use `grep` to locate lines, then `sed` to replace"),
        "npm" | "yarn" | "pnpm" => Some("use esm.sh imports instead of a package manager"),
        "node" | "python" | "python3" | "pip" => Some("not supported in this sandbox"),
        "curl" | "wget" => Some("use fetch in your code instead"),
        "bash" | "sh" => Some("no shell wrapper needed, call the command directly"),
        _ => None,
    }
}
