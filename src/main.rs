use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ralph_core::{
    diff_plan, parse_plan, validate_plan, HttpLlmClient, LocalFsVfs, PlanRegistries,
    ProviderConfig, RalphDir, RalphScheduler, RunConfig, RunStatus,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Ralph: an autonomous build-agent loop and command harness for a
/// browser-resident virtual filesystem.
#[derive(Parser, Debug)]
#[command(name = "ralph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start (or resume) the iteration loop for a task.
    Run(RunArgs),

    /// Offline checks against a `plan.tsx` file, without running the loop.
    Plan {
        #[command(subcommand)]
        command: PlanCommand,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// What the agent should build or change.
    task: String,

    /// Project root the virtual filesystem is rooted at.
    #[arg(long, default_value = ".")]
    cwd: PathBuf,

    /// Task ordinal used to scope the scope-validation gate's markers.
    #[arg(long, default_value_t = 1)]
    task_n: u32,

    /// LLM provider name.
    #[arg(long, default_value = "anthropic")]
    provider: String,

    /// LLM model name.
    #[arg(long, default_value = "claude-sonnet-4-5")]
    model: String,

    /// Base URL of an OpenAI-compatible chat completions endpoint.
    #[arg(long, env = "RALPH_LLM_BASE_URL", default_value = "")]
    llm_base_url: String,

    /// API key for the configured LLM endpoint.
    #[arg(long, env = "RALPH_LLM_API_KEY", default_value = "")]
    llm_api_key: String,

    /// Override `.ralph/config.json`'s iteration cap before the run starts.
    #[arg(long, env = "RALPH_MAX_ITERATIONS")]
    max_iterations: Option<u32>,

    /// Override `.ralph/config.json`'s checkpoint interval before the run starts.
    #[arg(long, env = "RALPH_CHECKPOINT_INTERVAL")]
    checkpoint_interval: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum PlanCommand {
    /// Run the plan-valid checklist against a `plan.tsx` file.
    Validate {
        path: PathBuf,
    },

    /// Diff a `plan.tsx` file against a directory of generated source files.
    Diff {
        path: PathBuf,
        #[arg(long)]
        src: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run_command(args).await,
        Command::Plan { command } => plan_command(command),
    }
}

async fn run_command(args: RunArgs) -> Result<()> {
    info!(task = %args.task, cwd = %args.cwd.display(), "starting ralph run");

    let vfs = Arc::new(LocalFsVfs::new(args.cwd.clone()));

    if args.max_iterations.is_some() || args.checkpoint_interval.is_some() {
        let dir = RalphDir::new(vfs.clone());
        dir.ensure_exists().await.context("creating .ralph/")?;
        let mut config = dir.read_config().await;
        if let Some(max_iterations) = args.max_iterations {
            config.max_iterations = max_iterations;
        }
        if let Some(checkpoint_interval) = args.checkpoint_interval {
            config.checkpoint_interval = checkpoint_interval;
        }
        dir.write_config(&config).await.context("writing .ralph/config.json")?;
    }

    let llm = Arc::new(HttpLlmClient::new(args.llm_base_url, args.llm_api_key));
    let provider = ProviderConfig::new(args.provider, args.model);

    let mut scheduler = RalphScheduler::new(vfs, llm, provider);
    let status = scheduler.run(&args.task, args.task_n).await;

    println!("final status: {}", status.as_str());

    match status {
        RunStatus::Complete | RunStatus::Waiting | RunStatus::Idle => Ok(()),
        RunStatus::Error | RunStatus::Running => {
            std::process::exit(1);
        }
    }
}

fn plan_command(command: PlanCommand) -> Result<()> {
    match command {
        PlanCommand::Validate { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let root = parse_plan(&text);
            let report = validate_plan(root.as_ref(), &PlanRegistries::default());

            for f in &report.failures {
                println!("FAIL [{}] {}", f.id, f.message);
            }
            for w in &report.warnings {
                println!("WARN [{}] {}", w.id, w.message);
            }
            if report.passes() {
                println!("plan-valid: pass");
                Ok(())
            } else {
                println!("plan-valid: fail ({} failure(s))", report.failures.len());
                std::process::exit(1);
            }
        }

        PlanCommand::Diff { path, src } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let root = parse_plan(&text)
                .with_context(|| format!("{} did not parse as a plan", path.display()))?;

            let mut source_files = std::collections::BTreeMap::new();
            for entry in walk_files(&src)? {
                let rel = entry
                    .strip_prefix(&src)
                    .unwrap_or(&entry)
                    .to_string_lossy()
                    .replace('\\', "/");
                let content = std::fs::read_to_string(&entry)
                    .with_context(|| format!("reading {}", entry.display()))?;
                source_files.insert(rel, content);
            }

            let report = diff_plan(&root, &source_files);
            print!("{}", report.to_markdown());
            Ok(())
        }
    }
}

fn walk_files(root: &std::path::Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).with_context(|| format!("reading {}", dir.display()))? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}
