//! C12 — the Ralph scheduler (spec §4.12), the core algorithm.
//!
//! Owns the single-threaded iteration loop: builds a fresh message array
//! from `.ralph/*` state each pass, calls the model, dispatches its tool
//! calls through the shell executor, commits, runs the gate pipeline, and
//! evaluates the `Idle → Running → {Waiting|Complete|Error|Idle}` state
//! machine. Grounded in the teacher's `LoopController`
//! (`src/orchestrator/loop_controller.rs`) for the shape of a cancellable,
//! step-at-a-time driver loop, generalised from plan-generation rounds to
//! shell-tool iterations.

use crate::error::SchedulerError;
use crate::gates::{GateContext, GateRunner};
use crate::llm::{ChatResponse, FinishReason, LlmClient, Message, ProviderConfig, ToolCall, ToolDef};
use crate::plan::{parse_plan, PlanNode, PlanRegistries, PropValue};
use crate::ralph_dir::{RalphDir, RunStatus};
use crate::shell::ShellExecutor;
use crate::vcs::VcsStore;
use crate::vfs::{EntryKind, Vfs};
use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

const MAX_TOOL_CALLS_PER_ITERATION: usize = 50;
const PLAN_EXCERPT_BUDGET_CHARS: usize = 4000;
const PROGRESS_TAIL_CHARS: usize = 2000;
const STALL_WINDOW: usize = 3;

#[derive(Debug, Deserialize, JsonSchema)]
struct ShellToolArgs {
    command: String,
}

/// One run at a time per project, enforced by the type system rather than
/// a runtime lock: every mutating entry point takes `&mut self`, so two
/// overlapping calls to [`RalphScheduler::run`] on the same instance
/// can't compile, let alone race (spec §5). External cancellation doesn't
/// need a `&mut` borrow: take [`RalphScheduler::cancellation_token`]
/// before calling `run` and call `.cancel()` on the cloned token from
/// another task.
pub struct RalphScheduler {
    vfs: Arc<dyn Vfs>,
    dir: RalphDir,
    shell: ShellExecutor,
    vcs: VcsStore,
    gates: GateRunner,
    llm: Arc<dyn LlmClient>,
    provider: ProviderConfig,
    cancel: CancellationToken,
    state: RunStatus,
    stall_window: VecDeque<String>,
    /// Delay awaited between iterations two and onward (spec §4.12's
    /// "polite delay"). Zero by default so tests run instantly; callers
    /// embedding this in a real loop can set a human-friendly pace.
    pub inter_iteration_delay: std::time::Duration,
}

enum StepResult {
    Continue,
    Complete,
    Waiting,
}

impl RalphScheduler {
    pub fn new(vfs: Arc<dyn Vfs>, llm: Arc<dyn LlmClient>, provider: ProviderConfig) -> Self {
        Self {
            dir: RalphDir::new(vfs.clone()),
            shell: ShellExecutor::new(vfs.clone()),
            vcs: VcsStore::new(vfs.clone()),
            gates: GateRunner::with_builtins(),
            vfs,
            llm,
            provider,
            cancel: CancellationToken::new(),
            state: RunStatus::Idle,
            stall_window: VecDeque::new(),
            inter_iteration_delay: std::time::Duration::ZERO,
        }
    }

    /// Clone of the abort signal. Hold onto this to cancel a run in
    /// progress from another task — no further access to the scheduler
    /// itself is needed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunStatus {
        self.state
    }

    /// Drives `start(task)` through to a terminal state (`Complete`,
    /// `Waiting`, `Idle`, or `Error`), per the state machine in spec
    /// §4.12. `task_n` scopes the scope-validation gate's markers.
    pub async fn run(&mut self, task: &str, task_n: u32) -> RunStatus {
        if let Err(e) = self.dir.ensure_exists().await {
            return self.enter_error(&e.to_string()).await;
        }
        let _ = self.dir.write_task(task).await;
        let _ = self.dir.write_status(RunStatus::Running).await;
        self.state = RunStatus::Running;
        self.stall_window.clear();

        let source = self.collect_source_files().await;
        let tracked: Vec<String> = source.keys().cloned().collect();
        self.vcs.add_all(&tracked).await;
        if self.vcs.resolve_ref(&format!("task-{task_n}-pre")).await.is_none() {
            if self.vcs.commit(&format!("ralph: task {task_n} start"), "ralph").await.is_ok() {
                let _ = self.vcs.tag_task_pre(task_n).await;
            }
        }

        let config = self.dir.read_config().await;

        loop {
            if self.cancel.is_cancelled() {
                let _ = self.dir.write_status(RunStatus::Idle).await;
                self.state = RunStatus::Idle;
                return RunStatus::Idle;
            }

            let iteration = self.dir.read_iteration().await + 1;
            if iteration > config.max_iterations as u64 {
                let _ = self.dir.write_status(RunStatus::Idle).await;
                self.state = RunStatus::Idle;
                return RunStatus::Idle;
            }
            let _ = self.dir.write_iteration(iteration).await;

            if iteration > 1 && !self.inter_iteration_delay.is_zero() {
                tokio::time::sleep(self.inter_iteration_delay).await;
            }

            match self.run_one_iteration(iteration, task_n).await {
                Ok(StepResult::Continue) => continue,
                Ok(StepResult::Complete) => {
                    self.state = RunStatus::Complete;
                    return RunStatus::Complete;
                }
                Ok(StepResult::Waiting) => {
                    self.state = RunStatus::Waiting;
                    return RunStatus::Waiting;
                }
                Err(e) => return self.enter_error(&e.to_string()).await,
            }
        }
    }

    async fn enter_error(&mut self, message: &str) -> RunStatus {
        let _ = self.dir.write_status(RunStatus::Error).await;
        self.state = RunStatus::Error;
        tracing::error!(message, "ralph scheduler entered Error state");
        RunStatus::Error
    }

    async fn run_one_iteration(&mut self, iteration: u64, task_n: u32) -> Result<StepResult, SchedulerError> {
        let task = self.dir.read_task().await.unwrap_or_default();
        let progress = self.dir.read_progress().await;
        let feedback = self.dir.read_feedback().await;
        let plan_text = self.dir.read_plan().await;
        let plan_root = plan_text.as_deref().and_then(parse_plan);

        let plan_excerpt = plan_text
            .as_deref()
            .and_then(|text| scope_plan_excerpt(text, plan_root.as_ref(), &task, PLAN_EXCERPT_BUDGET_CHARS));

        let messages = build_messages(iteration, &task, &tail(&progress, PROGRESS_TAIL_CHARS), &feedback, plan_excerpt.as_deref());
        let tools = self.build_tool_defs();

        let response = self
            .llm
            .chat(&self.provider, &messages, &tools, &self.cancel)
            .await
            .map_err(|e| SchedulerError::Llm(e.to_string()))?;

        if response.tool_calls.is_empty() && response.finish_reason == FinishReason::Stop {
            let _ = self.dir.append_progress(iteration, "(no actions this iteration)").await;
            self.commit(iteration).await?;
            self.run_gates(task_n, plan_root.as_ref(), &plan_text.unwrap_or_default()).await;
            return Ok(StepResult::Complete);
        }

        let summary = self.dispatch_and_summarize(&response).await;
        let _ = self.dir.append_progress(iteration, &summary).await;
        self.commit(iteration).await?;
        self.run_gates(task_n, plan_root.as_ref(), &plan_text.unwrap_or_default()).await;
        self.record_stall_window(&response.tool_calls).await;

        match self.dir.read_status().await {
            Some(RunStatus::Complete) => Ok(StepResult::Complete),
            Some(RunStatus::Waiting) => Ok(StepResult::Waiting),
            _ => Ok(StepResult::Continue),
        }
    }

    fn build_tool_defs(&self) -> Vec<ToolDef> {
        vec![ToolDef {
            name: "shell".to_string(),
            description: "Run a shell command against the project's virtual filesystem.".to_string(),
            parameters: schemars::schema_for!(ShellToolArgs),
        }]
    }

    async fn dispatch_and_summarize(&self, response: &ChatResponse) -> String {
        let mut lines = Vec::new();
        if !response.content.is_empty() {
            lines.push(response.content.clone());
        }
        for call in response.tool_calls.iter().take(MAX_TOOL_CALLS_PER_ITERATION) {
            let args = strip_status_field(&call.arguments);
            let result = if call.name == "shell" {
                let command = args.get("command").and_then(|v| v.as_str()).unwrap_or_default();
                self.shell.execute(command, "/").await
            } else if call.name.contains("__") {
                crate::shell::ShellResult::failure(127, format!("{}: external tool dispatch is out of scope", call.name))
            } else {
                self.shell.dispatch_typed(&call.name, args, "/").await
            };
            lines.push(format!(
                "- `{}` → exit {}{}",
                call.name,
                result.exit_code,
                result
                    .files_changed
                    .map(|f| format!(" (changed: {})", f.join(", ")))
                    .unwrap_or_default()
            ));
        }
        lines.join("\n")
    }

    async fn commit(&self, iteration: u64) -> Result<(), SchedulerError> {
        let source = self.collect_source_files().await;
        let tracked: Vec<String> = source.keys().cloned().collect();
        self.vcs.add_all(&tracked).await;
        self.vcs
            .commit(&format!("ralph: iteration {iteration}"), "ralph")
            .await
            .map(|_| ())
            .map_err(|e| SchedulerError::CommitFailed(e.to_string()))
    }

    async fn run_gates(&self, task_n: u32, plan_root: Option<&PlanNode>, plan_text: &str) {
        let source_files = self.collect_source_files().await;
        let baseline_files = self.load_baseline(task_n, &source_files).await;
        let ctx = GateContext {
            vfs: self.vfs.clone(),
            plan_root: plan_root.cloned(),
            registries: PlanRegistries::default(),
            plan_text: plan_text.to_string(),
            task_n,
            source_files,
            baseline_files,
            runtime_errors: Vec::new(),
        };
        self.gates.run_all(&ctx).await;
    }

    async fn load_baseline(&self, task_n: u32, current: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
        let oid = self.vcs.resolve_ref(&format!("task-{task_n}-pre")).await?;
        let mut baseline = BTreeMap::new();
        for path in current.keys() {
            if let Some(content) = self.vcs.read_file_at_commit(path, &oid).await {
                baseline.insert(path.clone(), content);
            }
        }
        Some(baseline)
    }

    async fn record_stall_window(&mut self, tool_calls: &[ToolCall]) {
        if tool_calls.is_empty() {
            return;
        }
        let signature = tool_calls
            .iter()
            .map(|c| format!("{}:{}", c.name, c.arguments))
            .collect::<Vec<_>>()
            .join(";");

        self.stall_window.push_back(signature.clone());
        while self.stall_window.len() > STALL_WINDOW {
            self.stall_window.pop_front();
        }
        let stalled = self.stall_window.len() == STALL_WINDOW && self.stall_window.iter().all(|s| *s == signature);

        if stalled {
            let existing = self.dir.read_feedback().await;
            let note = format!(
                "\nYou repeated the same action three times in a row (`{signature}`). \
Re-read .ralph/plan.tsx and choose a different action, or re-read the relevant gumdrop's guidance.\n"
            );
            let _ = self.dir.write_feedback(&(existing + &note)).await;
        }
    }

    async fn collect_source_files(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let mut stack = vec!["src".to_string()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = self.vfs.readdir(&dir).await else {
                continue;
            };
            for entry in entries {
                let full = format!("{dir}/{}", entry.name);
                match entry.kind {
                    EntryKind::Dir => stack.push(full),
                    EntryKind::File => {
                        if let Ok(content) = self.vfs.read_to_string(&full).await {
                            out.insert(full, content);
                        }
                    }
                }
            }
        }
        out
    }
}

/// Keeps one [`RalphScheduler`] per distinct project alive for hosts that
/// juggle several concurrent projects (spec §5) — never a second handle
/// onto the *same* project, which `RalphScheduler::run`'s `&mut self`
/// already rules out. Grounded in the teacher's `SessionRegistry`
/// (`src/orchestrator/client.rs`, removed in the final trim), narrowed from
/// goose-session bookkeeping to a project-id keyed scheduler map.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: AsyncMutex<HashMap<String, Arc<AsyncMutex<RalphScheduler>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self { sessions: AsyncMutex::new(HashMap::new()) }
    }

    /// Returns the existing scheduler for `project_id`, or inserts one
    /// built from `make` if this is the first time it's been seen.
    pub async fn get_or_create(
        &self,
        project_id: &str,
        make: impl FnOnce() -> RalphScheduler,
    ) -> Arc<AsyncMutex<RalphScheduler>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(make())))
            .clone()
    }

    pub async fn remove(&self, project_id: &str) -> Option<Arc<AsyncMutex<RalphScheduler>>> {
        self.sessions.lock().await.remove(project_id)
    }

    pub async fn project_ids(&self) -> Vec<String> {
        self.sessions.lock().await.keys().cloned().collect()
    }
}

fn strip_status_field(value: &serde_json::Value) -> serde_json::Value {
    let Some(obj) = value.as_object() else {
        return value.clone();
    };
    let mut stripped = obj.clone();
    stripped.remove("_status");
    serde_json::Value::Object(stripped)
}

fn tail(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let start = text.chars().count() - max_chars;
    text.chars().skip(start).collect()
}

fn build_messages(iteration: u64, task: &str, progress_tail: &str, feedback: &str, plan_excerpt: Option<&str>) -> Vec<Message> {
    let system = Message::system(
        "You are Ralph, an autonomous build agent. Use the `shell` tool to inspect and modify files under src/ through the virtual filesystem.",
    );
    let mut user = format!(
        "Iteration {iteration}\n\nTask:\n{task}\n\nRecent progress:\n{progress_tail}\n\nFeedback from the previous iteration:\n{feedback}\n"
    );
    if let Some(plan) = plan_excerpt {
        user.push_str(&format!("\nCurrent plan excerpt:\n{plan}\n"));
    }
    vec![system, Message::user(user)]
}

/// Context-scoped plan excerpt (spec §4.12): full plan if it fits the
/// budget, else `Theme` + the `Screen` whose name best matches the task,
/// else a condensed screen/gumdrop listing.
fn scope_plan_excerpt(plan_text: &str, root: Option<&PlanNode>, task: &str, budget: usize) -> Option<String> {
    if plan_text.chars().count() <= budget {
        return Some(plan_text.to_string());
    }
    let root = root?;
    let theme = root.find_first("Theme").map(render_node).unwrap_or_default();
    let screen = closest_screen(root, task).map(render_node).unwrap_or_default();
    let excerpt = format!("{theme}\n{screen}");
    if excerpt.chars().count() <= budget {
        Some(excerpt)
    } else {
        Some(condensed_listing(root))
    }
}

fn closest_screen<'a>(root: &'a PlanNode, task: &str) -> Option<&'a PlanNode> {
    let task_lower = task.to_lowercase();
    root.children_named("Screen")
        .max_by_key(|s| {
            s.prop_str("name")
                .map(|n| if task_lower.contains(&n.to_lowercase()) { n.len() } else { 0 })
                .unwrap_or(0)
        })
        .or_else(|| root.children_named("Screen").next())
}

fn condensed_listing(root: &PlanNode) -> String {
    root.children_named("Screen")
        .map(|screen| {
            let gumdrops: Vec<&str> = screen
                .walk()
                .filter(|n| n.component == "Section")
                .filter_map(|n| n.prop_str("gumdrop"))
                .collect();
            format!("- {}: [{}]", screen.prop_str("name").unwrap_or("?"), gumdrops.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_node(node: &PlanNode) -> String {
    let mut out = format!("<{}", node.component);
    for (key, value) in &node.props {
        match value {
            PropValue::Str(s) => out.push_str(&format!(" {key}=\"{s}\"")),
            PropValue::Num(n) => out.push_str(&format!(" {key}={{{n}}}")),
            PropValue::Bool(true) => out.push_str(&format!(" {key}")),
            PropValue::Bool(false) => out.push_str(&format!(" {key}={{false}}")),
        }
    }
    if node.children.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        for child in &node.children {
            out.push_str(&render_node(child));
        }
        out.push_str(&format!("</{}>", node.component));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::vfs::MemVfs;

    fn stop_response() -> ChatResponse {
        ChatResponse { content: "done".to_string(), tool_calls: Vec::new(), finish_reason: FinishReason::Stop }
    }

    fn tool_call_response(command: &str) -> ChatResponse {
        ChatResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "1".to_string(),
                name: "shell".to_string(),
                arguments: serde_json::json!({"command": command}),
            }],
            finish_reason: FinishReason::ToolCalls,
        }
    }

    async fn seeded_vfs() -> Arc<MemVfs> {
        let vfs = Arc::new(MemVfs::new());
        vfs.mkdir("src", true).await.unwrap();
        vfs.write_string("src/App.tsx", "export function App() {}").await.unwrap();
        vfs
    }

    #[tokio::test]
    async fn completes_immediately_when_model_stops_with_no_tool_calls() {
        let vfs = seeded_vfs().await;
        let llm = Arc::new(MockLlmClient::new(vec![stop_response()]));
        let mut scheduler = RalphScheduler::new(vfs, llm, ProviderConfig::new("anthropic", "test-model"));
        let status = scheduler.run("build a dashboard", 1).await;
        assert_eq!(status, RunStatus::Complete);
    }

    #[tokio::test]
    async fn continues_then_completes_on_second_stop() {
        let vfs = seeded_vfs().await;
        let llm = Arc::new(MockLlmClient::new(vec![
            tool_call_response("echo hi"),
            stop_response(),
        ]));
        let mut scheduler = RalphScheduler::new(vfs, llm, ProviderConfig::new("anthropic", "test-model"));
        let status = scheduler.run("build a dashboard", 1).await;
        assert_eq!(status, RunStatus::Complete);
    }

    #[tokio::test]
    async fn model_setting_status_waiting_pauses_the_run() {
        let vfs = seeded_vfs().await;
        let llm = Arc::new(MockLlmClient::new(vec![tool_call_response("echo hi && __write__ .ralph/status.txt waiting")]));
        let mut scheduler = RalphScheduler::new(vfs, llm, ProviderConfig::new("anthropic", "test-model"));
        let status = scheduler.run("build a dashboard", 1).await;
        assert_eq!(status, RunStatus::Waiting);
    }

    #[tokio::test]
    async fn max_iterations_reached_returns_idle() {
        let vfs = seeded_vfs().await;
        vfs.mkdir(".ralph", true).await.unwrap();
        vfs.write_string(".ralph/config.json", r#"{"maxIterations":1,"checkpointInterval":1}"#)
            .await
            .unwrap();
        let llm = Arc::new(MockLlmClient::new(vec![tool_call_response("echo hi"), tool_call_response("echo hi")]));
        let mut scheduler = RalphScheduler::new(vfs, llm, ProviderConfig::new("anthropic", "test-model"));
        let status = scheduler.run("build a dashboard", 1).await;
        assert_eq!(status, RunStatus::Idle);
    }

    #[tokio::test]
    async fn cancellation_before_start_yields_idle() {
        let vfs = seeded_vfs().await;
        let llm = Arc::new(MockLlmClient::new(vec![tool_call_response("echo hi")]));
        let mut scheduler = RalphScheduler::new(vfs, llm, ProviderConfig::new("anthropic", "test-model"));
        scheduler.cancellation_token().cancel();
        let status = scheduler.run("build a dashboard", 1).await;
        assert_eq!(status, RunStatus::Idle);
    }

    #[tokio::test]
    async fn stall_detection_appends_note_after_three_repeats() {
        let vfs = seeded_vfs().await;
        let repeated = tool_call_response("cat src/App.tsx");
        let llm = Arc::new(MockLlmClient::new(vec![
            tool_call_response("cat src/App.tsx"),
            tool_call_response("cat src/App.tsx"),
            tool_call_response("cat src/App.tsx"),
            stop_response(),
        ]));
        let _ = repeated;
        let mut scheduler = RalphScheduler::new(vfs.clone(), llm, ProviderConfig::new("anthropic", "test-model"));
        scheduler.run("build a dashboard", 1).await;
        let feedback = vfs.read_to_string(".ralph/feedback.md").await.unwrap_or_default();
        assert!(feedback.contains("repeated the same action"));
    }

    #[tokio::test]
    async fn session_registry_reuses_the_same_scheduler_per_project() {
        let registry = SessionRegistry::new();
        let vfs = seeded_vfs().await;
        let make = || RalphScheduler::new(vfs.clone(), Arc::new(MockLlmClient::new(vec![])), ProviderConfig::new("anthropic", "test-model"));

        let first = registry.get_or_create("proj-a", make).await;
        let second = registry.get_or_create("proj-a", make).await;
        assert!(Arc::ptr_eq(&first, &second));

        let other = registry.get_or_create("proj-b", make).await;
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.project_ids().await.len(), 2);
    }

    #[test]
    fn render_node_round_trips_simple_element() {
        let node = PlanNode {
            component: "Screen".to_string(),
            props: [("name".to_string(), PropValue::Str("home".to_string()))].into_iter().collect(),
            children: Vec::new(),
            line: 1,
        };
        assert_eq!(render_node(&node), r#"<Screen name="home"/>"#);
    }

    #[test]
    fn strip_status_field_removes_underscore_status() {
        let value = serde_json::json!({"command": "ls", "_status": "thinking"});
        let stripped = strip_status_field(&value);
        assert!(stripped.get("_status").is_none());
        assert_eq!(stripped.get("command").unwrap(), "ls");
    }
}
