use crate::shell::command::{CommandArgs, ExecOptions, ShellCommand, ShellResult, ToolSpec};
use crate::vfs::{EntryKind, Vfs};
use async_trait::async_trait;
use regex::Regex;
use schemars::{schema_for, JsonSchema, Schema};
use serde::Deserialize;
use serde_json::Value;

/// `grep` exposes both `grep` (regex over one file) and `search` (recursive
/// substring/regex scan under a scope directory), sharing `execute` per
/// spec §4.5's `additionalTools` example.
pub struct GrepCommand;

#[derive(Deserialize, JsonSchema)]
struct GrepArgs {
    pattern: String,
    path: String,
}

#[derive(Deserialize, JsonSchema)]
struct SearchArgs {
    query: String,
    scope: Option<String>,
}

#[async_trait]
impl ShellCommand for GrepCommand {
    fn name(&self) -> &'static str {
        "grep"
    }
    fn description(&self) -> &'static str {
        "Search a file for lines matching a regular expression"
    }
    fn args_schema(&self) -> Option<Schema> {
        Some(schema_for!(GrepArgs))
    }
    fn additional_tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec {
            name: "search",
            description: "Search recursively under a scope directory for a query",
            args_schema: Some(schema_for!(SearchArgs)),
        }]
    }

    async fn execute(&self, tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult {
        if tool_name == "search" {
            return search(args, opts).await;
        }

        let (pattern, path) = match &args {
            CommandArgs::Cli(argv) => (argv.first().cloned(), argv.get(1).cloned()),
            CommandArgs::Typed(v) => (
                v.get("pattern").and_then(Value::as_str).map(String::from),
                v.get("path").and_then(Value::as_str).map(String::from),
            ),
        };
        let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
            return ShellResult::failure(2, "grep: missing pattern");
        };
        let Some(path) = path else {
            return ShellResult::failure(2, "grep: missing path operand");
        };
        let re = match Regex::new(&pattern) {
            Ok(r) => r,
            Err(e) => return ShellResult::failure(1, format!("grep: invalid pattern: {e}")),
        };
        let text = match opts.vfs.read_to_string(&path).await {
            Ok(t) => t,
            Err(e) => return ShellResult::failure(1, format!("grep: {path}: {e}")),
        };
        let matches: Vec<String> = text
            .lines()
            .enumerate()
            .filter(|(_, line)| re.is_match(line))
            .map(|(i, line)| format!("{path}:{}: {line}", i + 1))
            .collect();
        ShellResult::ok(matches.join("\n"))
    }
}

async fn search(args: CommandArgs, opts: &ExecOptions) -> ShellResult {
    let (query, scope) = match &args {
        CommandArgs::Cli(argv) => (argv.first().cloned(), argv.get(1).cloned()),
        CommandArgs::Typed(v) => (
            v.get("query").and_then(Value::as_str).map(String::from),
            v.get("scope").and_then(Value::as_str).map(String::from),
        ),
    };
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return ShellResult::failure(2, "search: missing query");
    };
    let scope = scope.unwrap_or_else(|| "src".to_string());
    let files = match walk(opts.vfs.as_ref(), &scope).await {
        Ok(f) => f,
        Err(e) => return ShellResult::failure(1, format!("search: {scope}: {e}")),
    };
    let needle = query.to_lowercase();
    let mut hits = Vec::new();
    for file in files {
        if let Ok(text) = opts.vfs.read_to_string(&file).await {
            for (i, line) in text.lines().enumerate() {
                if line.to_lowercase().contains(&needle) {
                    hits.push(format!("{file}:{}: {line}", i + 1));
                }
            }
        }
    }
    ShellResult::ok(hits.join("\n"))
}

async fn walk(vfs: &dyn Vfs, dir: &str) -> Result<Vec<String>, crate::error::VfsError> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_string()];
    while let Some(current) = stack.pop() {
        let entries = vfs.readdir(&current).await?;
        for entry in entries {
            let full = format!("{current}/{}", entry.name);
            match entry.kind {
                EntryKind::Dir => stack.push(full),
                EntryKind::File => out.push(full),
            }
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::command::ExecOptions;
    use crate::vfs::MemVfs;
    use std::sync::Arc;

    async fn opts() -> (Arc<MemVfs>, ExecOptions) {
        let vfs = Arc::new(MemVfs::new());
        vfs.mkdir("src", true).await.unwrap();
        vfs.write_string("src/App.tsx", "export function App() {\n  return null\n}\n")
            .await
            .unwrap();
        let opts = ExecOptions {
            vfs: vfs.clone(),
            cwd: "/".into(),
            stdin: String::new(),
        };
        (vfs, opts)
    }

    #[tokio::test]
    async fn grep_missing_pattern_is_exit_2() {
        let (_vfs, opts) = opts().await;
        let result = GrepCommand
            .execute("grep", CommandArgs::Cli(vec![]), &opts)
            .await;
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("missing pattern"));
    }

    #[tokio::test]
    async fn grep_finds_matching_line() {
        let (_vfs, opts) = opts().await;
        let result = GrepCommand
            .execute(
                "grep",
                CommandArgs::Cli(vec!["function App".into(), "src/App.tsx".into()]),
                &opts,
            )
            .await;
        assert!(result.stdout.contains("src/App.tsx:1:"));
    }

    #[tokio::test]
    async fn search_scans_recursively() {
        let (_vfs, opts) = opts().await;
        let result = search(
            CommandArgs::Cli(vec!["return null".into(), "src".into()]),
            &opts,
        )
        .await;
        assert!(result.stdout.contains("src/App.tsx:2:"));
    }
}
