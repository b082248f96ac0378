pub mod error;
pub mod gates;
pub mod guard;
pub mod llm;
pub mod plan;
pub mod ralph_dir;
pub mod scheduler;
pub mod shell;
pub mod vcs;
pub mod vfs;

pub use error::{GateError, GuardError, ParseError, SchedulerError, VfsError};
pub use gates::{Gate, GateContext, GateOutcome, GateRunner};
pub use guard::{admit_write, check_content, check_path, GuardDecision};
pub use llm::{
    ChatResponse, FinishReason, HttpLlmClient, LlmClient, LlmError, Message, MockLlmClient,
    ProviderConfig, Role, ToolCall, ToolDef,
};
pub use plan::{
    diff_plan, parse_plan, validate_plan, validate_scope, DiffReport, Finding, PlanNode,
    PlanRegistries, PropValue, ScopeFinding, ScopeReport, ScopeStatus, ValidationReport,
};
pub use ralph_dir::{RalphDir, RunConfig, RunStatus};
pub use scheduler::{RalphScheduler, SessionRegistry};
pub use shell::{CommandArgs, ExecOptions, ShellCommand, ShellExecutor, ShellResult};
pub use vcs::VcsStore;
pub use vfs::{DirEntry, EntryKind, LocalFsVfs, MemVfs, Stat, Vfs};
