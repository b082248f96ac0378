//! C4 — Shell command registry & executor (spec §4.4).

use super::command::{CommandArgs, ExecOptions, ShellResult};
use super::commands::{unknown_command_hint, CommandRegistry};
use super::parser::{self, ChainOp, ParsedCommand, RedirectKind, Stage};
use crate::guard::admit_write;
use crate::vfs::Vfs;
use std::sync::Arc;

pub struct ShellExecutor {
    registry: CommandRegistry,
    vfs: Arc<dyn Vfs>,
}

impl ShellExecutor {
    pub fn new(vfs: Arc<dyn Vfs>) -> Self {
        Self {
            registry: CommandRegistry::with_builtins(),
            vfs,
        }
    }

    pub fn with_registry(vfs: Arc<dyn Vfs>, registry: CommandRegistry) -> Self {
        Self { registry, vfs }
    }

    /// `execute(commandLine, cwd) -> ShellResult` per spec §4.4.
    pub async fn execute(&self, command_line: &str, cwd: &str) -> ShellResult {
        let stages = match parser::parse(command_line) {
            Ok(s) => s,
            Err(e) => return ShellResult::failure(2, format!("parse error: {e} (in `{command_line}`)")),
        };

        let mut last_result = ShellResult::ok("");
        let mut files_changed: Vec<String> = Vec::new();
        let mut should_run = true;

        for stage in &stages {
            if !should_run {
                break;
            }
            last_result = self.run_stage(stage, cwd).await;
            if let Some(fc) = &last_result.files_changed {
                files_changed.extend(fc.iter().cloned());
            }
            should_run = match stage.next_op {
                Some(ChainOp::And) => last_result.is_success(),
                Some(ChainOp::Or) => !last_result.is_success(),
                None => true,
            };
        }

        if !files_changed.is_empty() {
            let mut fc = files_changed;
            fc.sort();
            fc.dedup();
            last_result.files_changed = Some(fc);
        }
        last_result
    }

    async fn run_stage(&self, stage: &Stage, cwd: &str) -> ShellResult {
        let mut stdin = String::new();
        let mut result = ShellResult::ok("");
        let mut files_changed: Vec<String> = Vec::new();

        for (idx, command) in stage.pipeline.iter().enumerate() {
            let is_last = idx + 1 == stage.pipeline.len();
            result = self.run_one(command, cwd, &stdin).await;
            if let Some(fc) = &result.files_changed {
                files_changed.extend(fc.iter().cloned());
            }
            if !result.is_success() {
                break;
            }
            stdin = result.stdout.clone();

            if is_last {
                if let Some(redirect) = &command.redirect {
                    let decision = admit_write(&redirect.target, &result.stdout);
                    if !decision.allowed {
                        let mut msg = decision.reason.unwrap_or_default();
                        if let Some(s) = decision.suggestion {
                            msg.push_str(&format!(" (suggestion: {s})"));
                        }
                        result = ShellResult::failure(1, msg);
                        break;
                    }
                    let existing = match redirect.kind {
                        RedirectKind::Append => self
                            .vfs
                            .read_to_string(&redirect.target)
                            .await
                            .unwrap_or_default(),
                        RedirectKind::Overwrite => String::new(),
                    };
                    let combined = existing + &result.stdout;
                    if let Err(e) = self.vfs.write_string(&redirect.target, &combined).await {
                        result = ShellResult::failure(1, format!("{}: {e}", redirect.target));
                        break;
                    }
                    files_changed.push(redirect.target.clone());
                    result.stdout.clear();
                }
            }
        }

        if !files_changed.is_empty() {
            files_changed.sort();
            files_changed.dedup();
            result.files_changed = Some(files_changed);
        }
        result
    }

    /// Typed-mode dispatch (spec §4.5 path 2): the LLM called a named tool
    /// with a structured argument object rather than a shell command
    /// string. Validates against the tool's schema before running.
    pub async fn dispatch_typed(&self, tool_name: &str, value: serde_json::Value, cwd: &str) -> ShellResult {
        let Some(handler) = self.registry.get(tool_name) else {
            return ShellResult::failure(127, format!("{tool_name}: command not found"));
        };
        if let Some(schema) = super::command::schema_for_tool(handler.as_ref(), tool_name) {
            if let Err(err) = super::command::validate_typed_args(tool_name, &schema, &value) {
                return err;
            }
        }
        let opts = ExecOptions {
            vfs: self.vfs.clone(),
            cwd: cwd.to_string(),
            stdin: String::new(),
        };
        handler.execute(tool_name, CommandArgs::Typed(value), &opts).await
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    async fn run_one(&self, command: &ParsedCommand, cwd: &str, stdin: &str) -> ShellResult {
        let effective_stdin = match &command.heredoc {
            Some(h) => h.body.clone(),
            None => stdin.to_string(),
        };

        let Some(handler) = self.registry.get(&command.name) else {
            let mut stderr = format!("{}: command not found", command.name);
            if let Some(hint) = unknown_command_hint(&command.name) {
                stderr.push_str(&format!(" ({hint})"));
            }
            if command.args.iter().any(|a| a.contains('*')) {
                stderr.push_str(" (note: this shell does not expand glob patterns)");
            }
            return ShellResult::failure(127, stderr);
        };

        let args = handler.parse_cli_args(&command.args);
        let args = match args {
            CommandArgs::Typed(value) => {
                if let Some(schema) = super::command::schema_for_tool(handler.as_ref(), &command.name) {
                    if let Err(err) = super::command::validate_typed_args(&command.name, &schema, &value) {
                        return err;
                    }
                }
                CommandArgs::Typed(value)
            }
            other => other,
        };

        let opts = ExecOptions {
            vfs: self.vfs.clone(),
            cwd: cwd.to_string(),
            stdin: effective_stdin,
        };

        handler.execute(&command.name, args, &opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemVfs;

    fn vfs() -> Arc<MemVfs> {
        let v = Arc::new(MemVfs::new());
        v
    }

    #[tokio::test]
    async fn pipe_feeds_stdout_to_stdin() {
        let fs = vfs();
        let exec = ShellExecutor::new(fs.clone());
        let result = exec.execute(r#"echo "hi" | wc"#, "/").await;
        assert!(result.is_success());
        assert_eq!(result.stdout.trim(), "1 1 3");
    }

    #[tokio::test]
    async fn redirect_writes_guarded_file_and_clears_stdout() {
        let fs = vfs();
        fs.mkdir("src", true).await.unwrap();
        let exec = ShellExecutor::new(fs.clone());
        let result = exec.execute(r#"echo "hi" | cat > src/out.json"#, "/").await;
        assert!(result.is_success());
        assert_eq!(result.stdout, "");
        assert_eq!(fs.read_to_string("src/out.json").await.unwrap(), "hi\n");
    }

    #[tokio::test]
    async fn and_chain_short_circuits_on_failure() {
        let fs = vfs();
        let exec = ShellExecutor::new(fs.clone());
        let result = exec.execute("cat missing.tsx && echo should-not-run", "/").await;
        assert!(!result.is_success());
        assert!(!result.stdout.contains("should-not-run"));
    }

    #[tokio::test]
    async fn or_chain_runs_fallback_on_failure() {
        let fs = vfs();
        let exec = ShellExecutor::new(fs.clone());
        let result = exec.execute("cat missing.tsx || echo fallback", "/").await;
        assert!(result.is_success());
        assert!(result.stdout.contains("fallback"));
    }

    #[tokio::test]
    async fn unknown_command_is_exit_127() {
        let fs = vfs();
        let exec = ShellExecutor::new(fs.clone());
        let result = exec.execute("npm install", "/").await;
        assert_eq!(result.exit_code, 127);
        assert!(result.stderr.contains("esm.sh"));
    }

    #[tokio::test]
    async fn write_guard_blocks_index_html() {
        let fs = vfs();
        let exec = ShellExecutor::new(fs.clone());
        let result = exec.execute(r#"__write__ index.html "<html>""#, "/").await;
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("Cannot modify index.html"));
        assert!(!fs.exists("index.html").await);
    }
}
