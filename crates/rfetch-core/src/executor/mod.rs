//! Command executor: runs one command on an established connection and
//! records its outcome.
//!
//! Each invocation opens its own session, so executors for the same host can
//! run concurrently on one shared connection without sharing a channel.

use tracing::{debug, error, warn};

use crate::context::RunContext;
use crate::report::CommandOutcome;
use crate::transport::Connection;

/// How one command ended, as seen by its host worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// Ran and exited with status 0. Outcome recorded.
    Succeeded,
    /// Ran but failed (non-zero exit, signal, or exec error). Outcome
    /// recorded with whatever output was captured.
    Failed,
    /// No session could be opened. Nothing recorded.
    SessionFailed,
    /// The run was cancelled before the command finished. Nothing recorded.
    Cancelled,
}

impl CommandStatus {
    /// Whether an outcome was written to the aggregator.
    pub fn recorded(self) -> bool {
        matches!(self, CommandStatus::Succeeded | CommandStatus::Failed)
    }
}

/// Run `command` (the `index`-th command of `host`) over `connection`.
///
/// Never returns an error: every failure is logged and folded into the
/// returned [`CommandStatus`], so one command can never abort its siblings.
pub async fn execute_command(
    ctx: &RunContext,
    connection: &dyn Connection,
    host: &str,
    index: usize,
    command: &str,
) -> CommandStatus {
    debug!(host, command_index = index, command, "executing command");

    let run = async {
        let mut session = match connection.open_session().await {
            Ok(session) => session,
            Err(e) => {
                error!(host, command_index = index, error = %format!("{e:#}"), "unable to open session");
                return CommandStatus::SessionFailed;
            }
        };
        debug!(host, command_index = index, "session opened");

        let (outcome, status) = match session.exec(command).await {
            Ok(output) => {
                let status = if output.exit.success() {
                    CommandStatus::Succeeded
                } else {
                    error!(
                        host,
                        command_index = index,
                        command,
                        exit = %output.exit,
                        "command execution failed"
                    );
                    CommandStatus::Failed
                };
                (
                    CommandOutcome::from_bytes(&output.stdout, &output.stderr),
                    status,
                )
            }
            Err(e) => {
                error!(
                    host,
                    command_index = index,
                    command,
                    error = %format!("{e:#}"),
                    "command execution failed"
                );
                (CommandOutcome::default(), CommandStatus::Failed)
            }
        };

        ctx.aggregator.record(host, command, outcome);
        status
    };

    tokio::select! {
        status = run => status,
        _ = ctx.cancel.cancelled() => {
            warn!(host, command_index = index, command, "command cancelled");
            CommandStatus::Cancelled
        }
    }
}
