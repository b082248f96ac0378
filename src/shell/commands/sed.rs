use crate::guard::admit_write;
use crate::shell::command::{CommandArgs, ExecOptions, ShellCommand, ShellResult, ToolSpec};
use async_trait::async_trait;
use regex::Regex;
use schemars::{schema_for, JsonSchema, Schema};
use serde::Deserialize;
use serde_json::Value;

/// `sed` exposes `sed` (regex substitution across a whole file) and
/// `sed_line` (single-line insert/replace/delete), sharing `execute` per
/// spec §4.5.
pub struct SedCommand;

#[derive(Deserialize, JsonSchema)]
struct SedArgs {
    path: String,
    pattern: String,
    replacement: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
enum SedLineOp {
    Insert,
    Replace,
    Delete,
}

#[derive(Deserialize, JsonSchema)]
struct SedLineArgs {
    path: String,
    line: usize,
    op: SedLineOp,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl ShellCommand for SedCommand {
    fn name(&self) -> &'static str {
        "sed"
    }
    fn description(&self) -> &'static str {
        "Substitute a regular expression match across a file"
    }
    fn args_schema(&self) -> Option<Schema> {
        Some(schema_for!(SedArgs))
    }
    fn additional_tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec {
            name: "sed_line",
            description: "Insert, replace, or delete a single line by 1-based line number",
            args_schema: Some(schema_for!(SedLineArgs)),
        }]
    }

    async fn execute(&self, tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        if tool_name == "sed_line" {
            return sed_line(args, opts).await;
        }

        let (path, pattern, replacement) = match &args {
            CommandArgs::Cli(argv) if argv.len() >= 3 => {
                (argv[0].clone(), argv[1].clone(), argv[2].clone())
            }
            CommandArgs::Typed(v) => (
                v.get("path").and_then(Value::as_str).unwrap_or_default().to_string(),
                v.get("pattern").and_then(Value::as_str).unwrap_or_default().to_string(),
                v.get("replacement")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            _ => return ShellResult::failure(2, "sed: requires <path> <pattern> <replacement>"),
        };
        let re = match Regex::new(&pattern) {
            Ok(r) => r,
            Err(e) => return ShellResult::failure(1, format!("sed: invalid pattern: {e}")),
        };
        let original = match opts.vfs.read_to_string(&path).await {
            Ok(t) => t,
            Err(e) => return ShellResult::failure(1, format!("sed: {path}: {e}")),
        };
        let updated = re.replace_all(&original, replacement.as_str()).into_owned();
        write_checked(&path, &updated, opts).await
    }
}

async fn sed_line(args: CommandArgs, opts: &ExecOptions) -> ShellResult {
    let (path, line, op, content) = match args {
        CommandArgs::Typed(v) => {
            let parsed: Result<SedLineArgs, _> = serde_json::from_value(v);
            match parsed {
                Ok(a) => (a.path, a.line, a.op, a.content),
                Err(e) => return ShellResult::failure(1, format!("sed_line: {e}")),
            }
        }
        CommandArgs::Cli(argv) if argv.len() >= 3 => {
            let line: usize = match argv[1].parse() {
                Ok(n) => n,
                Err(_) => return ShellResult::failure(2, "sed_line: <line> must be an integer"),
            };
            let op = match argv[2].as_str() {
                "insert" => SedLineOp::Insert,
                "delete" => SedLineOp::Delete,
                _ => SedLineOp::Replace,
            };
            let content = argv.get(3..).map(|s| s.join(" ")).unwrap_or_default();
            (argv[0].clone(), line, op, content)
        }
        _ => return ShellResult::failure(2, "sed_line: requires <path> <line> <op> [content]"),
    };

    let original = match opts.vfs.read_to_string(&path).await {
        Ok(t) => t,
        Err(e) => return ShellResult::failure(1, format!("sed_line: {path}: {e}")),
    };
    if line == 0 {
        return ShellResult::failure(2, "sed_line: line numbers are 1-based");
    }
    let mut lines: Vec<String> = original.lines().map(String::from).collect();
    let idx = line - 1;
    match op {
        SedLineOp::Insert => {
            if idx > lines.len() {
                return ShellResult::failure(1, format!("sed_line: line {line} out of range"));
            }
            lines.insert(idx, content);
        }
        SedLineOp::Replace => {
            if idx >= lines.len() {
                return ShellResult::failure(1, format!("sed_line: line {line} out of range"));
            }
            lines[idx] = content;
        }
        SedLineOp::Delete => {
            if idx >= lines.len() {
                return ShellResult::failure(1, format!("sed_line: line {line} out of range"));
            }
            lines.remove(idx);
        }
    }
    let updated = lines.join("\n") + "\n";
    write_checked(&path, &updated, opts).await
}

async fn write_checked(path: &str, content: &str, opts: &ExecOptions) -> ShellResult {
    let decision = admit_write(path, content);
    if !decision.allowed {
        let mut msg = decision.reason.unwrap_or_default();
        if let Some(s) = decision.suggestion {
            msg.push_str(&format!(" (suggestion: {s})"));
        }
        return ShellResult::failure(1, msg);
    }
    match opts.vfs.write_string(path, content).await {
        Ok(()) => ShellResult::ok_with_changes("", vec![path.to_string()]),
        Err(e) => ShellResult::failure(1, format!("{path}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemVfs;
    use std::sync::Arc;

    async fn opts_with(path: &str, content: &str) -> (Arc<MemVfs>, ExecOptions) {
        let vfs = Arc::new(MemVfs::new());
        vfs.mkdir("src", true).await.unwrap();
        vfs.write_string(path, content).await.unwrap();
        let opts = ExecOptions {
            vfs: vfs.clone(),
            cwd: "/".into(),
            stdin: String::new(),
        };
        (vfs, opts)
    }

    #[tokio::test]
    async fn sed_substitutes_all_occurrences() {
        let (vfs, opts) = opts_with("src/App.tsx", "old old old").await;
        let result = SedCommand
            .execute(
                "sed",
                CommandArgs::Cli(vec!["src/App.tsx".into(), "old".into(), "new".into()]),
                &opts,
            )
            .await;
        assert!(result.is_success());
        assert_eq!(vfs.read_to_string("src/App.tsx").await.unwrap(), "new new new");
    }

    #[tokio::test]
    async fn sed_line_replace_targets_one_line() {
        let (vfs, opts) = opts_with("src/App.tsx", "a\nb\nc\n").await;
        let result = sed_line(
            CommandArgs::Cli(vec!["src/App.tsx".into(), "2".into(), "replace".into(), "B".into()]),
            &opts,
        )
        .await;
        assert!(result.is_success());
        assert_eq!(vfs.read_to_string("src/App.tsx").await.unwrap(), "a\nB\nc\n");
    }

    #[tokio::test]
    async fn sed_line_rejects_zero_index() {
        let (_vfs, opts) = opts_with("src/App.tsx", "a\n").await;
        let result = sed_line(
            CommandArgs::Cli(vec!["src/App.tsx".into(), "0".into(), "replace".into(), "x".into()]),
            &opts,
        )
        .await;
        assert_eq!(result.exit_code, 2);
    }
}
