use crate::guard::admit_write;
use crate::shell::command::{CommandArgs, ExecOptions, ShellCommand, ShellResult};
use crate::vfs::EntryKind;
use async_trait::async_trait;
use schemars::{schema_for, JsonSchema, Schema};
use serde::Deserialize;
use serde_json::Value;

fn cli_paths(args: &CommandArgs) -> Vec<String> {
    match args {
        CommandArgs::Cli(argv) => argv.clone(),
        CommandArgs::Typed(v) => v
            .get("paths")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|x| x.as_str().map(String::from)).collect())
            .unwrap_or_default(),
    }
}

pub struct CatCommand;

#[derive(Deserialize, JsonSchema)]
struct CatArgs {
    paths: Vec<String>,
}

#[async_trait]
impl ShellCommand for CatCommand {
    fn name(&self) -> &'static str {
        "cat"
    }
    fn description(&self) -> &'static str {
        "Print the contents of one or more files"
    }
    fn args_schema(&self) -> Option<Schema> {
        Some(schema_for!(CatArgs))
    }
    fn examples(&self) -> Vec<String> {
        vec!["cat src/App.tsx".into()]
    }
    async fn execute(&self, _tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        let paths = cli_paths(&args);
        if paths.is_empty() {
            return ShellResult::failure(2, "cat: missing file operand");
        }
        let mut out = String::new();
        for path in &paths {
            match opts.vfs.read_to_string(path).await {
                Ok(contents) => out.push_str(&contents),
                Err(e) => return ShellResult::failure(1, format!("cat: {path}: {e}")),
            }
        }
        ShellResult::ok(out)
    }
}

pub struct LsCommand;

#[derive(Deserialize, JsonSchema)]
struct LsArgs {
    path: Option<String>,
}

#[async_trait]
impl ShellCommand for LsCommand {
    fn name(&self) -> &'static str {
        "ls"
    }
    fn description(&self) -> &'static str {
        "List directory contents"
    }
    fn args_schema(&self) -> Option<Schema> {
        Some(schema_for!(LsArgs))
    }
    async fn execute(&self, _tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        let path = match &args {
            CommandArgs::Cli(argv) => argv.first().cloned().unwrap_or_else(|| ".".into()),
            CommandArgs::Typed(v) => v
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or(".")
                .to_string(),
        };
        match opts.vfs.readdir(&path).await {
            Ok(mut entries) => {
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                let lines: Vec<String> = entries
                    .into_iter()
                    .map(|e| match e.kind {
                        EntryKind::Dir => format!("{}/", e.name),
                        EntryKind::File => e.name,
                    })
                    .collect();
                ShellResult::ok(lines.join("\n"))
            }
            Err(e) => ShellResult::failure(1, format!("ls: {path}: {e}")),
        }
    }
}

pub struct MkdirCommand;

#[derive(Deserialize, JsonSchema)]
struct MkdirArgs {
    path: String,
    #[serde(default)]
    recursive: bool,
}

#[async_trait]
impl ShellCommand for MkdirCommand {
    fn name(&self) -> &'static str {
        "mkdir"
    }
    fn description(&self) -> &'static str {
        "Create a directory"
    }
    fn args_schema(&self) -> Option<Schema> {
        Some(schema_for!(MkdirArgs))
    }
    async fn execute(&self, _tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        let (path, recursive) = match &args {
            CommandArgs::Cli(argv) => {
                let recursive = argv.iter().any(|a| a == "-p");
                let path = argv.iter().find(|a| *a != "-p").cloned();
                (path, recursive)
            }
            CommandArgs::Typed(v) => (
                v.get("path").and_then(Value::as_str).map(String::from),
                v.get("recursive").and_then(Value::as_bool).unwrap_or(false),
            ),
        };
        let Some(path) = path else {
            return ShellResult::failure(2, "mkdir: missing path operand");
        };
        let decision = admit_write(&format!("{path}/.keep"), "");
        if !decision.allowed {
            return deny(&decision);
        }
        match opts.vfs.mkdir(&path, recursive).await {
            Ok(()) => ShellResult::ok_with_changes("", vec![path]),
            Err(e) => ShellResult::failure(1, format!("mkdir: {e}")),
        }
    }
}

pub struct RmCommand;

#[derive(Deserialize, JsonSchema)]
struct RmArgs {
    path: String,
    #[serde(default)]
    recursive: bool,
}

#[async_trait]
impl ShellCommand for RmCommand {
    fn name(&self) -> &'static str {
        "rm"
    }
    fn description(&self) -> &'static str {
        "Remove a file or, with recursive, a directory tree"
    }
    fn args_schema(&self) -> Option<Schema> {
        Some(schema_for!(RmArgs))
    }
    async fn execute(&self, _tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        let (path, recursive) = match &args {
            CommandArgs::Cli(argv) => {
                let recursive = argv.iter().any(|a| a == "-r" || a == "-rf");
                let path = argv.iter().find(|a| !a.starts_with('-')).cloned();
                (path, recursive)
            }
            CommandArgs::Typed(v) => (
                v.get("path").and_then(Value::as_str).map(String::from),
                v.get("recursive").and_then(Value::as_bool).unwrap_or(false),
            ),
        };
        let Some(path) = path else {
            return ShellResult::failure(2, "rm: missing path operand");
        };
        if path.starts_with(".ralph") {
            return ShellResult::failure(1, "rm: .ralph/ is reserved and cannot be removed");
        }
        let result = if recursive {
            opts.vfs.rmdir(&path, true).await.or(opts.vfs.unlink(&path).await)
        } else {
            opts.vfs.unlink(&path).await
        };
        match result {
            Ok(()) => ShellResult::ok_with_changes("", vec![path]),
            Err(e) => ShellResult::failure(1, format!("rm: {path}: {e}")),
        }
    }
}

pub struct MvCommand;

#[derive(Deserialize, JsonSchema)]
struct MvArgs {
    from: String,
    to: String,
}

#[async_trait]
impl ShellCommand for MvCommand {
    fn name(&self) -> &'static str {
        "mv"
    }
    fn description(&self) -> &'static str {
        "Rename or move a file"
    }
    fn args_schema(&self) -> Option<Schema> {
        Some(schema_for!(MvArgs))
    }
    async fn execute(&self, _tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        let (from, to) = match &args {
            CommandArgs::Cli(argv) if argv.len() >= 2 => (argv[0].clone(), argv[1].clone()),
            CommandArgs::Typed(v) => (
                v.get("from").and_then(Value::as_str).unwrap_or_default().to_string(),
                v.get("to").and_then(Value::as_str).unwrap_or_default().to_string(),
            ),
            _ => return ShellResult::failure(2, "mv: requires <from> <to>"),
        };
        let decision = admit_write(&to, "");
        if !decision.allowed {
            return deny(&decision);
        }
        match opts.vfs.rename(&from, &to).await {
            Ok(()) => ShellResult::ok_with_changes("", vec![from, to]),
            Err(e) => ShellResult::failure(1, format!("mv: {e}")),
        }
    }
}

pub struct CpCommand;

#[derive(Deserialize, JsonSchema)]
struct CpArgs {
    from: String,
    to: String,
}

#[async_trait]
impl ShellCommand for CpCommand {
    fn name(&self) -> &'static str {
        "cp"
    }
    fn description(&self) -> &'static str {
        "Copy a file"
    }
    fn args_schema(&self) -> Option<Schema> {
        Some(schema_for!(CpArgs))
    }
    async fn execute(&self, _tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        let (from, to) = match &args {
            CommandArgs::Cli(argv) if argv.len() >= 2 => (argv[0].clone(), argv[1].clone()),
            CommandArgs::Typed(v) => (
                v.get("from").and_then(Value::as_str).unwrap_or_default().to_string(),
                v.get("to").and_then(Value::as_str).unwrap_or_default().to_string(),
            ),
            _ => return ShellResult::failure(2, "cp: requires <from> <to>"),
        };
        let contents = match opts.vfs.read_file(&from).await {
            Ok(c) => c,
            Err(e) => return ShellResult::failure(1, format!("cp: {from}: {e}")),
        };
        let text = String::from_utf8_lossy(&contents).into_owned();
        let decision = admit_write(&to, &text);
        if !decision.allowed {
            return deny(&decision);
        }
        match opts.vfs.write_file(&to, &contents).await {
            Ok(()) => ShellResult::ok_with_changes("", vec![to]),
            Err(e) => ShellResult::failure(1, format!("cp: {e}")),
        }
    }
}

pub struct TouchCommand;

#[async_trait]
impl ShellCommand for TouchCommand {
    fn name(&self) -> &'static str {
        "touch"
    }
    fn description(&self) -> &'static str {
        "Create an empty file if it does not already exist"
    }
    async fn execute(&self, _tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        let path = match &args {
            CommandArgs::Cli(argv) => argv.first().cloned(),
            CommandArgs::Typed(v) => v.get("path").and_then(Value::as_str).map(String::from),
        };
        let Some(path) = path else {
            return ShellResult::failure(2, "touch: missing path operand");
        };
        if opts.vfs.exists(&path).await {
            return ShellResult::ok("");
        }
        let decision = admit_write(&path, "");
        if !decision.allowed {
            return deny(&decision);
        }
        match opts.vfs.write_string(&path, "").await {
            Ok(()) => ShellResult::ok_with_changes("", vec![path]),
            Err(e) => ShellResult::failure(1, format!("touch: {e}")),
        }
    }
}

/// The synthetic internal command heredocs fold into (spec §4.3): a direct
/// `path, content` write that still runs through the write guard. Also
/// usable directly, as in spec scenario S2.
pub struct WriteCommand;

#[derive(Deserialize, JsonSchema)]
struct WriteArgs {
    path: String,
    content: String,
}

#[async_trait]
impl ShellCommand for WriteCommand {
    fn name(&self) -> &'static str {
        "__write__"
    }
    fn description(&self) -> &'static str {
        "Write content to a path, subject to the write guard"
    }
    fn args_schema(&self) -> Option<Schema> {
        Some(schema_for!(WriteArgs))
    }
    async fn execute(&self, _tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        let (path, content) = match &args {
            CommandArgs::Cli(argv) if argv.len() >= 2 => {
                (argv[0].clone(), argv[1..].join(" "))
            }
            CommandArgs::Typed(v) => (
                v.get("path").and_then(Value::as_str).unwrap_or_default().to_string(),
                v.get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            _ => return ShellResult::failure(2, "__write__: requires <path> <content>"),
        };
        let decision = admit_write(&path, &content);
        if !decision.allowed {
            return deny(&decision);
        }
        match opts.vfs.write_string(&path, &content).await {
            Ok(()) => ShellResult::ok_with_changes("", vec![path]),
            Err(e) => ShellResult::failure(1, format!("__write__: {e}")),
        }
    }
}

fn deny(decision: &crate::guard::GuardDecision) -> ShellResult {
    let mut msg = decision.reason.clone().unwrap_or_default();
    if let Some(suggestion) = &decision.suggestion {
        msg.push_str(&format!(" (suggestion: {suggestion})"));
    }
    ShellResult::failure(1, msg)
}
