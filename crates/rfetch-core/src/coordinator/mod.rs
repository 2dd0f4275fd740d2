//! Run coordinator: fans out one host worker per supported host, waits for
//! every one of them, then finalizes the report.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, warn};

use crate::context::RunContext;
use crate::host::HostRegistry;
use crate::report::{RunReport, local_identity};
use crate::worker::{HostOutcome, run_host_worker};

/// Counters describing how a run went.
///
/// The persisted report deliberately carries no failure information; this
/// summary is what the CLI logs and prints instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Hosts present in the registry.
    pub hosts_total: usize,
    /// Hosts whose kind has no connector; never started.
    pub hosts_unsupported: usize,
    /// Hosts that failed validation.
    pub hosts_skipped: usize,
    /// Hosts whose connection failed (or whose worker panicked).
    pub hosts_failed: usize,
    /// Hosts that were cancelled before connecting.
    pub hosts_cancelled: usize,
    /// Hosts that connected and ran their command list.
    pub hosts_completed: usize,
    pub commands_succeeded: usize,
    pub commands_failed: usize,
    pub commands_not_run: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &HostOutcome) {
        match outcome {
            HostOutcome::Skipped(_) => self.hosts_skipped += 1,
            HostOutcome::ConnectFailed(_) => self.hosts_failed += 1,
            HostOutcome::Cancelled => self.hosts_cancelled += 1,
            HostOutcome::Completed(tally) => {
                self.hosts_completed += 1;
                self.commands_succeeded += tally.succeeded;
                self.commands_failed += tally.failed;
                self.commands_not_run += tally.not_run;
            }
        }
    }

    /// `true` when every host completed and every command succeeded.
    pub fn is_clean(&self) -> bool {
        self.hosts_completed == self.hosts_total
            && self.commands_failed == 0
            && self.commands_not_run == 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "hosts: {} total, {} completed, {} failed, {} skipped, {} unsupported, {} cancelled; \
             commands: {} succeeded, {} failed, {} not run",
            self.hosts_total,
            self.hosts_completed,
            self.hosts_failed,
            self.hosts_skipped,
            self.hosts_unsupported,
            self.hosts_cancelled,
            self.commands_succeeded,
            self.commands_failed,
            self.commands_not_run,
        )
    }
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub summary: RunSummary,
}

/// Launches host workers and assembles the final report.
#[derive(Debug, Clone)]
pub struct RunCoordinator {
    ctx: Arc<RunContext>,
}

impl RunCoordinator {
    pub fn new(ctx: Arc<RunContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    /// Run every supported host in `hosts` to completion.
    ///
    /// Never fails: host and command errors are absorbed and reflected in
    /// the [`RunSummary`] and the log. The report is built only after every
    /// spawned worker has been joined.
    pub async fn run(&self, hosts: &HostRegistry) -> RunOutcome {
        let span = self.ctx.span().clone();
        self.run_inner(hosts).instrument(span).await
    }

    async fn run_inner(&self, hosts: &HostRegistry) -> RunOutcome {
        let ctx = &self.ctx;
        let started = Instant::now();
        let mut summary = RunSummary {
            hosts_total: hosts.len(),
            ..RunSummary::default()
        };
        info!(hosts = hosts.len(), "working on host map");

        let watchdog = ctx.settings.run_timeout.map(|limit| {
            let cancel = ctx.cancel.clone();
            tokio::spawn(
                async move {
                    tokio::select! {
                        _ = tokio::time::sleep(limit) => {
                            warn!(timeout_secs = limit.as_secs(), "run timeout reached, cancelling");
                            cancel.cancel();
                        }
                        _ = cancel.cancelled() => {}
                    }
                }
                .in_current_span(),
            )
        });

        let limit = ctx
            .settings
            .max_parallel_hosts
            .map_or(Semaphore::MAX_PERMITS, |n| n.max(1));
        let slots = Arc::new(Semaphore::new(limit));

        let mut workers = JoinSet::new();
        for (name, host) in hosts.iter() {
            if !ctx.connectors.supports(&host.host_type) {
                warn!(
                    host = %name,
                    host_type = %host.host_type,
                    "could not start worker: host type not supported"
                );
                summary.hosts_unsupported += 1;
                continue;
            }

            debug!(host = %name, host_type = %host.host_type, "starting host worker");
            let ctx = Arc::clone(ctx);
            let slots = Arc::clone(&slots);
            let name = name.to_string();
            let host = Arc::clone(host);
            let span = tracing::info_span!("host", host = %name);

            workers.spawn(
                async move {
                    let _slot = slots.acquire_owned().await.ok();
                    let started = Instant::now();
                    let outcome = run_host_worker(ctx, name.clone(), host).await;
                    debug!(host = %name, elapsed = ?started.elapsed(), "host worker finished");
                    outcome
                }
                .instrument(span),
            );
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    error!(error = %e, "host worker panicked");
                    summary.hosts_failed += 1;
                }
            }
        }

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        let servers = ctx.aggregator.take();
        let execution_host = ctx
            .settings
            .execution_host
            .clone()
            .unwrap_or_else(local_identity);
        let report = RunReport::finalize(servers, chrono::Utc::now().timestamp(), execution_host);

        info!(elapsed = ?started.elapsed(), "{summary}");
        RunOutcome { report, summary }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostValidationError;
    use crate::worker::CommandTally;

    #[test]
    fn summary_records_each_outcome() {
        let mut summary = RunSummary {
            hosts_total: 4,
            ..RunSummary::default()
        };
        summary.record(&HostOutcome::Skipped(HostValidationError::ZeroPort));
        summary.record(&HostOutcome::ConnectFailed("refused".into()));
        summary.record(&HostOutcome::Cancelled);
        summary.record(&HostOutcome::Completed(CommandTally {
            succeeded: 3,
            failed: 1,
            not_run: 2,
        }));

        assert_eq!(summary.hosts_skipped, 1);
        assert_eq!(summary.hosts_failed, 1);
        assert_eq!(summary.hosts_cancelled, 1);
        assert_eq!(summary.hosts_completed, 1);
        assert_eq!(summary.commands_succeeded, 3);
        assert_eq!(summary.commands_failed, 1);
        assert_eq!(summary.commands_not_run, 2);
        assert!(!summary.is_clean());
    }

    #[test]
    fn clean_summary() {
        let mut summary = RunSummary {
            hosts_total: 1,
            ..RunSummary::default()
        };
        summary.record(&HostOutcome::Completed(CommandTally {
            succeeded: 2,
            ..CommandTally::default()
        }));
        assert!(summary.is_clean());
    }

    #[test]
    fn summary_display_mentions_counts() {
        let summary = RunSummary {
            hosts_total: 2,
            hosts_completed: 1,
            hosts_unsupported: 1,
            commands_succeeded: 5,
            ..RunSummary::default()
        };
        let text = summary.to_string();
        assert!(text.contains("2 total"));
        assert!(text.contains("1 unsupported"));
        assert!(text.contains("5 succeeded"));
    }
}
