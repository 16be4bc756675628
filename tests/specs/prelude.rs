//! Shared harness for specification tests.

pub use herd_core::{
    DropPolicy, ErrorKind, Event, ExecutionStatus, MessageKind, OrchestratorError, SessionConfig,
    SessionId, SessionState, SystemClock, SystemRandom, UserId, WorkspaceId,
};
pub use herd_engine::{ExecOptions, Orchestrator, OrchestratorConfig};
pub use std::sync::Arc;
pub use std::time::Duration;

use herd_engine::LocalWorkspaceResolver;
use herd_storage::JsonStateStore;
use tempfile::TempDir;

/// A running orchestrator wired to a scripted `/bin/sh` agent and a
/// JSON state store in a temp dir.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub state_dir: TempDir,
    _workspaces: TempDir,
}

pub fn harness(script: &str) -> Harness {
    harness_with(script, |config| config)
}

pub fn harness_with(
    script: &str,
    tune: impl FnOnce(OrchestratorConfig) -> OrchestratorConfig,
) -> Harness {
    let state_dir = TempDir::new().expect("state dir");
    let workspaces = TempDir::new().expect("workspace dir");
    let config = OrchestratorConfig::new("/bin/sh")
        .agent_args(vec!["-c".to_string(), script.to_string()])
        .reaper_interval(Duration::from_millis(50))
        .grace_period(Duration::from_millis(300))
        .shutdown_grace(Duration::from_millis(200))
        .spawn_max_attempts(1);
    let config = tune(config);
    let orchestrator = open_orchestrator(config, state_dir.path(), workspaces.path());
    Harness { orchestrator, state_dir, _workspaces: workspaces }
}

/// Open an orchestrator over an existing state dir (restart scenarios).
pub fn open_orchestrator(
    config: OrchestratorConfig,
    state_dir: &std::path::Path,
    workspace_root: &std::path::Path,
) -> Orchestrator {
    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_millis() as u64;
    let repo = JsonStateStore::open(state_dir, now_ms).expect("state store");
    Orchestrator::with_defaults(
        config,
        Arc::new(repo),
        Arc::new(LocalWorkspaceResolver::new(workspace_root)),
    )
}

pub async fn wait_for_state(
    orchestrator: &Orchestrator,
    id: SessionId,
    expected: SessionState,
) -> bool {
    for _ in 0..250 {
        if let Ok(summary) = orchestrator.get_session(&id) {
            if summary.state == expected {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// One text + complete per prompt; stays alive for the next prompt.
pub const ECHO_AGENT: &str = r#"while read line; do
  printf '{"type":"text","content":"hi"}\n{"type":"complete"}\n'
done"#;

/// Emits `count` text messages then a complete, then waits for the next
/// prompt.
pub fn burst_agent(count: u32) -> String {
    format!(
        r#"while read line; do
  i=1
  while [ $i -le {count} ]; do
    printf '{{"type":"text","content":"msg","n":%d}}\n' $i
    i=$((i+1))
  done
  printf '{{"type":"complete"}}\n'
done"#
    )
}
