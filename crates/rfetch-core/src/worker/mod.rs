//! Host worker: the full lifecycle of one host.
//!
//! ```text
//! Validating --invalid--> Skipped
//!     |
//! Connecting --error/timeout--> Failed
//!     |      --run cancelled--> Cancelled
//!     |
//! Executing (one task per command, then wait for all)
//!     |
//! Disconnecting --> Done
//! ```
//!
//! Nothing a worker does can fail or block another host's worker: every
//! error is logged and turned into a [`HostOutcome`].

use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, warn};

use crate::context::RunContext;
use crate::executor::{CommandStatus, execute_command};
use crate::host::{HostDefinition, HostValidationError};
use crate::transport::{Connection, TransportError};

/// Lifecycle states of a host worker, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Validating,
    Connecting,
    Executing,
    Disconnecting,
    Done,
    Skipped,
    Failed,
    Cancelled,
}

impl std::fmt::Display for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HostState::Validating => "validating",
            HostState::Connecting => "connecting",
            HostState::Executing => "executing",
            HostState::Disconnecting => "disconnecting",
            HostState::Done => "done",
            HostState::Skipped => "skipped",
            HostState::Failed => "failed",
            HostState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Per-host command counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandTally {
    pub succeeded: usize,
    pub failed: usize,
    /// Session-open failures, cancellations and panicked executors.
    pub not_run: usize,
}

impl CommandTally {
    fn add(&mut self, status: CommandStatus) {
        match status {
            CommandStatus::Succeeded => self.succeeded += 1,
            CommandStatus::Failed => self.failed += 1,
            CommandStatus::SessionFailed | CommandStatus::Cancelled => self.not_run += 1,
        }
    }
}

/// Terminal result of a host worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    /// The definition failed validation; no connection was attempted.
    Skipped(HostValidationError),
    /// Connecting or authenticating failed.
    ConnectFailed(String),
    /// The run was cancelled before the connection was established.
    Cancelled,
    /// Connected, ran every command, disconnected.
    Completed(CommandTally),
}

impl HostOutcome {
    /// The state a worker ends in when it produces this outcome.
    pub fn final_state(&self) -> HostState {
        match self {
            HostOutcome::Skipped(_) => HostState::Skipped,
            HostOutcome::ConnectFailed(_) => HostState::Failed,
            HostOutcome::Cancelled => HostState::Cancelled,
            HostOutcome::Completed(_) => HostState::Done,
        }
    }
}

fn enter(host: &str, state: HostState) {
    debug!(host, state = %state, "host state transition");
}

fn finish(host: &str, outcome: HostOutcome) -> HostOutcome {
    enter(host, outcome.final_state());
    outcome
}

/// Drive `host` through its whole lifecycle.
pub async fn run_host_worker(
    ctx: Arc<RunContext>,
    name: String,
    host: Arc<HostDefinition>,
) -> HostOutcome {
    enter(&name, HostState::Validating);
    let warnings = match host.validate() {
        Ok(warnings) => warnings,
        Err(e) => {
            error!(host = %name, error = %e, "host validation failed, skipping");
            return finish(&name, HostOutcome::Skipped(e));
        }
    };
    for warning in &warnings {
        warn!(host = %name, "{warning}");
    }
    if let Some(namespace) = host.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        debug!(host = %name, namespace, "host namespace");
    }
    info!(host = %name, endpoint = %host.endpoint(), "validation passed, establishing connection");

    enter(&name, HostState::Connecting);
    let connection = match connect(&ctx, &host).await {
        Some(Ok(connection)) => connection,
        Some(Err(e)) => {
            let message = format!("{e:#}");
            error!(host = %name, error = %message, "unable to establish connection");
            return finish(&name, HostOutcome::ConnectFailed(message));
        }
        None => {
            warn!(host = %name, "run cancelled before connection was established");
            return finish(&name, HostOutcome::Cancelled);
        }
    };
    debug!(host = %name, "connection established");

    enter(&name, HostState::Executing);
    let tally = run_commands(&ctx, &name, &host, Arc::clone(&connection)).await;

    enter(&name, HostState::Disconnecting);
    if let Err(e) = connection.disconnect().await {
        warn!(host = %name, error = %format!("{e:#}"), "disconnect failed");
    }

    info!(
        host = %name,
        succeeded = tally.succeeded,
        failed = tally.failed,
        not_run = tally.not_run,
        "execution complete"
    );
    finish(&name, HostOutcome::Completed(tally))
}

/// Connect with the configured deadline. `None` means the run was cancelled
/// first.
async fn connect(ctx: &RunContext, host: &HostDefinition) -> Option<Result<Arc<dyn Connection>>> {
    let Some(connector) = ctx.connectors.get(&host.host_type) else {
        return Some(Err(anyhow!(
            "no connector registered for host type {:?}",
            host.host_type
        )));
    };

    let attempt = async {
        let connected = match ctx.settings.connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, connector.connect(host)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::ConnectTimeout {
                    endpoint: host.endpoint(),
                    after: limit,
                }
                .into()),
            },
            None => connector.connect(host).await,
        };
        connected.map(Arc::<dyn Connection>::from)
    };

    tokio::select! {
        result = attempt => Some(result),
        _ = ctx.cancel.cancelled() => None,
    }
}

/// Fan the host's commands out over `connection` and wait for all of them.
async fn run_commands(
    ctx: &Arc<RunContext>,
    name: &str,
    host: &HostDefinition,
    connection: Arc<dyn Connection>,
) -> CommandTally {
    let mut tally = CommandTally::default();

    if host.commands.is_empty() {
        ctx.aggregator.ensure_host(name);
        return tally;
    }

    let limit = ctx
        .settings
        .max_sessions_per_host
        .map_or(Semaphore::MAX_PERMITS, |n| n.max(1));
    let sessions = Arc::new(Semaphore::new(limit));

    // Dispatch everything before waiting on anything.
    let mut commands = JoinSet::new();
    for (index, command) in host.commands.iter().enumerate() {
        let ctx = Arc::clone(ctx);
        let connection = Arc::clone(&connection);
        let sessions = Arc::clone(&sessions);
        let name = name.to_string();
        let command = command.clone();

        commands.spawn(
            async move {
                let Ok(_permit) = sessions.acquire_owned().await else {
                    return CommandStatus::Cancelled;
                };
                execute_command(&ctx, connection.as_ref(), &name, index, &command).await
            }
            .in_current_span(),
        );
    }

    while let Some(joined) = commands.join_next().await {
        match joined {
            Ok(status) => tally.add(status),
            Err(e) => {
                error!(host = %name, error = %e, "command executor panicked");
                tally.not_run += 1;
            }
        }
    }
    tally
}
