//! C5 — Dual-mode command contract (spec §4.5).
//!
//! Every built-in exposes one behavioural object with a CLI argv path and
//! an optional typed/schema path, mirroring the teacher's
//! `GeneratePlanInput`/`ReviewPlanInput` pattern of deriving a JSON Schema
//! with `schemars` and validating caller input against it before the tool
//! body runs (`src/orchestrator/client.rs`).

use crate::vfs::Vfs;
use async_trait::async_trait;
use jsonschema::ValidationErrorKind;
use schemars::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// `{ exitCode, stdout, stderr, filesChanged? }` per spec §3.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShellResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_changed: Option<Vec<String>>,
}

impl ShellResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            files_changed: None,
        }
    }

    pub fn ok_with_changes(stdout: impl Into<String>, files_changed: Vec<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            files_changed: Some(files_changed),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            files_changed: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The JSON-in-stderr shape emitted on typed-mode schema validation
/// failure (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    pub error: &'static str,
    pub command: String,
    pub issues: Vec<ValidationIssue>,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub code: String,
    pub message: String,
}

impl StructuredError {
    pub fn new(command: &str, issues: Vec<ValidationIssue>, examples: Vec<String>) -> Self {
        Self {
            error: "invalid_arguments",
            command: command.to_string(),
            issues,
            examples,
        }
    }

    pub fn into_shell_result(self) -> ShellResult {
        let stderr = serde_json::to_string(&self).unwrap_or_else(|_| self.error.to_string());
        ShellResult::failure(1, stderr)
    }
}

/// Invocation arguments, the two halves of the dual-mode contract.
#[derive(Debug, Clone)]
pub enum CommandArgs {
    /// CLI path: a raw argv array (after the command name).
    Cli(Vec<String>),
    /// Typed path: a structured JSON object to validate against `args_schema`.
    Typed(Value),
}

/// Context threaded through every command invocation.
pub struct ExecOptions {
    pub vfs: Arc<dyn Vfs>,
    pub cwd: String,
    pub stdin: String,
}

/// One named tool shape sharing a command's `execute`, e.g. `sed` exposes
/// `sed` and `sed_line`; `grep` exposes `grep` and `search` (spec §4.5).
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub args_schema: Option<Schema>,
}

#[async_trait]
pub trait ShellCommand: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    /// JSON Schema for the primary typed-mode shape, if this command
    /// supports one.
    fn args_schema(&self) -> Option<Schema> {
        None
    }

    /// Additional narrower-schema tool shapes sharing this command's
    /// `execute` (spec §4.5).
    fn additional_tools(&self) -> Vec<ToolSpec> {
        Vec::new()
    }

    fn examples(&self) -> Vec<String> {
        Vec::new()
    }

    /// Map a raw argv array into the args this command's `execute` wants.
    /// Commands that have no typed shape at all just pass argv through.
    fn parse_cli_args(&self, argv: &[String]) -> CommandArgs {
        CommandArgs::Cli(argv.to_vec())
    }

    /// `tool_name` is whichever name the caller actually invoked — the
    /// command's own `name()` or one of its `additional_tools()` — so a
    /// command like `sed` (exposing `sed` + `sed_line`) can branch.
    async fn execute(&self, tool_name: &str, args: CommandArgs, opts: &ExecOptions) -> ShellResult;
}

/// Finds the schema that applies to a particular invoked tool name, which
/// may be the command's primary name or one of its `additional_tools()`.
pub fn schema_for_tool(command: &dyn ShellCommand, tool_name: &str) -> Option<Schema> {
    if tool_name == command.name() {
        return command.args_schema();
    }
    command
        .additional_tools()
        .into_iter()
        .find(|t| t.name == tool_name)
        .and_then(|t| t.args_schema)
}

/// Runs schema validation (if the command has a schema) against typed-mode
/// args, returning the structured error on failure. CLI-mode args skip
/// validation per spec §4.5 ("if absent, the command accepts argv
/// directly").
pub fn validate_typed_args(
    command_name: &str,
    schema: &Schema,
    value: &Value,
) -> Result<(), ShellResult> {
    let compiled = match jsonschema::validator_for(schema.as_value()) {
        Ok(v) => v,
        Err(e) => {
            return Err(StructuredError::new(
                command_name,
                vec![ValidationIssue {
                    path: "".into(),
                    code: "schema_compile_error".into(),
                    message: e.to_string(),
                }],
                vec![],
            )
            .into_shell_result());
        }
    };

    let errors: Vec<ValidationIssue> = compiled
        .iter_errors(value)
        .map(|e| {
            let message = e.to_string();
            match &e.kind {
                ValidationErrorKind::Required { property } => ValidationIssue {
                    path: property.as_str().unwrap_or_default().to_string(),
                    code: "required".into(),
                    message,
                },
                _ => ValidationIssue {
                    path: e.instance_path.to_string(),
                    code: "invalid_type".into(),
                    message,
                },
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(StructuredError::new(command_name, errors, vec![]).into_shell_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::{schema_for, JsonSchema};

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct FieldArgs {
        name: String,
        label: Option<String>,
    }

    #[test]
    fn missing_required_property_reports_its_name_and_required_code() {
        let schema = schema_for!(FieldArgs);
        let value = serde_json::json!({ "label": "Email" });
        let err = validate_typed_args("Field", &schema, &value).unwrap_err();
        let parsed: serde_json::Value = serde_json::from_str(&err.stderr).unwrap_or_default();
        let issues = parsed["issues"].as_array().cloned().unwrap_or_default();
        assert!(issues
            .iter()
            .any(|i| i["path"] == "name" && i["code"] == "required"));
    }
}
