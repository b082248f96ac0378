use crate::shell::command::{CommandArgs, ExecOptions, ShellCommand, ShellResult};
use async_trait::async_trait;
use schemars::{schema_for, JsonSchema, Schema};
use serde::Deserialize;
use serde_json::Value;

pub struct EchoCommand;

#[derive(Deserialize, JsonSchema)]
struct EchoArgs {
    text: String,
}

#[async_trait]
impl ShellCommand for EchoCommand {
    fn name(&self) -> &'static str {
        "echo"
    }
    fn description(&self) -> &'static str {
        "Print text to stdout"
    }
    fn args_schema(&self) -> Option<Schema> {
        Some(schema_for!(EchoArgs))
    }
    async fn execute(&self, _tool_name: &str, args: CommandArgs, _opts: &ExecOptions) -> ShellResult {
        let text = match &args {
            CommandArgs::Cli(argv) => argv.join(" "),
            CommandArgs::Typed(v) => v.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
        };
        ShellResult::ok(format!("{text}\n"))
    }
}

pub struct PwdCommand;

#[async_trait]
impl ShellCommand for PwdCommand {
    fn name(&self) -> &'static str {
        "pwd"
    }
    fn description(&self) -> &'static str {
        "Print the current working directory"
    }
    async fn execute(&self, _tool_name: &str, _args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        ShellResult::ok(format!("{}\n", opts.cwd))
    }
}

pub struct WcCommand;

#[async_trait]
impl ShellCommand for WcCommand {
    fn name(&self) -> &'static str {
        "wc"
    }
    fn description(&self) -> &'static str {
        "Count lines, words, and bytes of stdin or a file"
    }
    async fn execute(&self, _tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        let path = match &args {
            CommandArgs::Cli(argv) => argv.first().cloned(),
            CommandArgs::Typed(v) => v.get("path").and_then(Value::as_str).map(String::from),
        };
        let text = match path {
            Some(p) => match opts.vfs.read_to_string(&p).await {
                Ok(t) => t,
                Err(e) => return ShellResult::failure(1, format!("wc: {p}: {e}")),
            },
            None => opts.stdin.clone(),
        };
        let lines = text.lines().count();
        let words = text.split_whitespace().count();
        let bytes = text.len();
        ShellResult::ok(format!("{lines} {words} {bytes}\n"))
    }
}

pub struct HeadCommand;

#[async_trait]
impl ShellCommand for HeadCommand {
    fn name(&self) -> &'static str {
        "head"
    }
    fn description(&self) -> &'static str {
        "Print the first N lines of stdin or a file (default 10)"
    }
    async fn execute(&self, _tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        let (path, n) = extract_path_and_n(&args);
        let text = match resolve_text(path, opts).await {
            Ok(t) => t,
            Err(e) => return e,
        };
        ShellResult::ok(text.lines().take(n).collect::<Vec<_>>().join("\n"))
    }
}

pub struct TailCommand;

#[async_trait]
impl ShellCommand for TailCommand {
    fn name(&self) -> &'static str {
        "tail"
    }
    fn description(&self) -> &'static str {
        "Print the last N lines of stdin or a file (default 10)"
    }
    async fn execute(&self, _tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        let (path, n) = extract_path_and_n(&args);
        let text = match resolve_text(path, opts).await {
            Ok(t) => t,
            Err(e) => return e,
        };
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(n);
        ShellResult::ok(lines[start..].join("\n"))
    }
}

fn extract_path_and_n(args: &CommandArgs) -> (Option<String>, usize) {
    match args {
        CommandArgs::Cli(argv) => {
            let mut n = 10usize;
            let mut path = None;
            let mut iter = argv.iter().peekable();
            while let Some(a) = iter.next() {
                if a == "-n" {
                    if let Some(v) = iter.next().and_then(|s| s.parse().ok()) {
                        n = v;
                    }
                } else {
                    path = Some(a.clone());
                }
            }
            (path, n)
        }
        CommandArgs::Typed(v) => (
            v.get("path").and_then(Value::as_str).map(String::from),
            v.get("n").and_then(Value::as_u64).unwrap_or(10) as usize,
        ),
    }
}

async fn resolve_text(path: Option<String>, opts: &ExecOptions) -> Result<String, ShellResult> {
    match path {
        Some(p) => opts
            .vfs
            .read_to_string(&p)
            .await
            .map_err(|e| ShellResult::failure(1, format!("{p}: {e}"))),
        None => Ok(opts.stdin.clone()),
    }
}
