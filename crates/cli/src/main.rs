// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! herd — CLI wrapper around the agent orchestrator.
//!
//! Exit codes: 0 success, 2 usage error, 3 session error, 4 agent
//! error, 5 timeout, 6 cancelled, 7 capacity exhausted.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod exit_error;
mod output;

use clap::{Parser, Subcommand};
use exit_error::{ExitError, EXIT_USAGE};
use herd_core::{ExecutionId, MessageKind, SessionConfig, SessionId, UserId, WorkspaceId};
use herd_engine::{ExecOptions, LocalWorkspaceResolver, Orchestrator, OrchestratorConfig};
use herd_storage::JsonStateStore;
use output::OutputFormat;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "herd", version, about = "Orchestrate agent CLI sessions")]
struct Cli {
    /// Agent binary to spawn per session.
    #[arg(long, global = true, env = "HERD_AGENT", default_value = "agent")]
    agent: String,

    /// Extra arguments passed to the agent binary.
    #[arg(long = "agent-arg", global = true)]
    agent_args: Vec<String>,

    /// State directory (session summaries).
    #[arg(long, global = true, env = "HERD_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Workspace root directory.
    #[arg(long, global = true, env = "HERD_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one prompt through a session and stream the output.
    Run {
        /// Workspace to bind the session to.
        #[arg(long, default_value = "default")]
        workspace: String,

        /// Acting user id.
        #[arg(long, default_value = "local")]
        user: String,

        /// System prompt for the agent.
        #[arg(long)]
        system_prompt: Option<String>,

        /// Maximum agent turns.
        #[arg(long, default_value_t = 10)]
        max_turns: u32,

        /// Execution timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Keep the session alive for reuse instead of closing it.
        #[arg(long)]
        keep: bool,

        /// The prompt text.
        prompt: String,
    },

    /// Session operations.
    #[command(subcommand)]
    Session(SessionCommand),

    /// Execution operations.
    #[command(subcommand)]
    Exec(ExecCommand),
}

#[derive(Subcommand)]
enum SessionCommand {
    /// List sessions, optionally scoped to a workspace.
    List {
        #[arg(long)]
        workspace: Option<String>,
    },
    /// Show one session.
    Show { id: String },
    /// Close a session.
    Close { id: String },
}

#[derive(Subcommand)]
enum ExecCommand {
    /// List executions, optionally scoped to a session.
    List {
        #[arg(long)]
        session: Option<String>,
    },
    /// Show one execution.
    Show { id: String },
    /// Cancel an in-flight execution.
    Cancel { id: String },
}

/// Global options shared by every subcommand.
struct Globals {
    agent: String,
    agent_args: Vec<String>,
    state_dir: Option<PathBuf>,
    workspace_root: Option<PathBuf>,
    format: OutputFormat,
}

fn default_state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
        .unwrap_or_else(std::env::temp_dir)
        .join("herd")
}

fn default_workspace_root() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
        .unwrap_or_else(std::env::temp_dir)
        .join("herd")
        .join("workspaces")
}

fn build_orchestrator(globals: &Globals) -> Result<Orchestrator, ExitError> {
    let state_dir = globals.state_dir.clone().unwrap_or_else(default_state_dir);
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let repo = JsonStateStore::open(&state_dir, now_ms).map_err(ExitError::from)?;
    let workspace_root = globals.workspace_root.clone().unwrap_or_else(default_workspace_root);
    let config =
        OrchestratorConfig::new(globals.agent.clone()).agent_args(globals.agent_args.clone());
    Ok(Orchestrator::with_defaults(
        config,
        Arc::new(repo),
        Arc::new(LocalWorkspaceResolver::new(workspace_root)),
    ))
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    globals: &Globals,
    workspace: String,
    user: String,
    system_prompt: Option<String>,
    max_turns: u32,
    timeout: Option<u64>,
    keep: bool,
    prompt: String,
) -> Result<(), ExitError> {
    let orchestrator = build_orchestrator(globals)?;
    orchestrator.start();

    let mut config = SessionConfig::default().max_turns(max_turns);
    if let Some(system_prompt) = system_prompt {
        config = config.system_prompt(system_prompt);
    }

    let summary = orchestrator
        .create_session(WorkspaceId::new(workspace), UserId::new(user), config)
        .await?;
    let opts =
        ExecOptions { execution_timeout: timeout.map(Duration::from_secs), ..Default::default() };
    let (execution_id, mut consumer) = orchestrator.execute(summary.id, &prompt, opts).await?;
    tracing::debug!(session_id = %summary.id, execution_id = %execution_id, "execution started");

    let mut failed: Option<ExitError> = None;
    while let Some(msg) = consumer.next().await {
        output::render_message(&msg, globals.format);
        if msg.is_fatal_error() {
            let reason = msg
                .payload
                .get("reason")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("agent error")
                .to_string();
            failed = Some(ExitError::new(exit_error::EXIT_AGENT, reason));
            break;
        }
        if msg.kind == MessageKind::Complete {
            break;
        }
    }

    if !keep {
        orchestrator.close_session(summary.id).await?;
    }
    match failed {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn cmd_session(globals: &Globals, command: SessionCommand) -> Result<(), ExitError> {
    let orchestrator = build_orchestrator(globals)?;
    match command {
        SessionCommand::List { workspace } => {
            let workspace = workspace.map(WorkspaceId::new);
            let sessions = orchestrator.list_sessions(workspace.as_ref())?;
            if globals.format == OutputFormat::Json {
                for summary in &sessions {
                    println!("{}", serde_json::to_string(summary).unwrap_or_default());
                }
            } else {
                output::print_session_header();
                for summary in &sessions {
                    output::print_session_row(summary);
                }
            }
            Ok(())
        }
        SessionCommand::Show { id } => {
            let summary = orchestrator.get_session(&SessionId::parse(id))?;
            println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
            Ok(())
        }
        SessionCommand::Close { id } => {
            orchestrator.close_session(SessionId::parse(id)).await?;
            Ok(())
        }
    }
}

async fn cmd_exec(globals: &Globals, command: ExecCommand) -> Result<(), ExitError> {
    let orchestrator = build_orchestrator(globals)?;
    match command {
        ExecCommand::List { session } => {
            let session = session.map(SessionId::parse);
            let executions = orchestrator.list_executions(session.as_ref())?;
            if globals.format == OutputFormat::Json {
                for exec in &executions {
                    println!("{}", serde_json::to_string(exec).unwrap_or_default());
                }
            } else {
                output::print_execution_header();
                for exec in &executions {
                    output::print_execution_row(exec);
                }
            }
            Ok(())
        }
        ExecCommand::Show { id } => {
            let exec = orchestrator.get_execution(&ExecutionId::parse(id))?;
            println!("{}", serde_json::to_string_pretty(&exec).unwrap_or_default());
            Ok(())
        }
        ExecCommand::Cancel { id } => {
            orchestrator.cancel_execution(ExecutionId::parse(id)).await?;
            Ok(())
        }
    }
}

async fn run_command(cli: Cli) -> Result<(), ExitError> {
    let Cli { agent, agent_args, state_dir, workspace_root, format, command } = cli;
    let globals = Globals { agent, agent_args, state_dir, workspace_root, format };
    match command {
        Command::Run { workspace, user, system_prompt, max_turns, timeout, keep, prompt } => {
            cmd_run(&globals, workspace, user, system_prompt, max_turns, timeout, keep, prompt)
                .await
        }
        Command::Session(command) => cmd_session(&globals, command).await,
        Command::Exec(command) => cmd_exec(&globals, command).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // clap renders its own message; usage problems exit 2.
            let _ = e.print();
            std::process::exit(if e.use_stderr() { EXIT_USAGE } else { 0 });
        }
    };

    if let Err(err) = run_command(cli).await {
        eprintln!("error: {err}");
        std::process::exit(err.code);
    }
}
