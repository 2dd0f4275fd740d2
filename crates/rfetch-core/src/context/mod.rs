//! Run context: everything a run needs, passed explicitly instead of living
//! in process-wide globals.
//!
//! The CLI builds one [`RunContext`] per invocation and hands it to the
//! [`crate::coordinator::RunCoordinator`], which shares it (behind `Arc`)
//! with every host worker and command executor.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::aggregate::ResultAggregator;
use crate::transport::ConnectorRegistry;

/// Tuning knobs for one run. The defaults reproduce an unbounded,
/// untimed fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSettings {
    /// Maximum number of host workers running at once. `None` = unbounded.
    pub max_parallel_hosts: Option<usize>,
    /// Maximum concurrent sessions on one connection. `None` = unbounded.
    pub max_sessions_per_host: Option<usize>,
    /// Deadline for establishing each host's connection.
    pub connect_timeout: Option<Duration>,
    /// Deadline for the whole run; on expiry the run is cancelled.
    pub run_timeout: Option<Duration>,
    /// Overrides the `ExecutionHost` value (defaults to the local hostname).
    pub execution_host: Option<String>,
}

/// Shared state for one run.
#[derive(Debug)]
pub struct RunContext {
    /// Unique identifier of this run, attached to every log line.
    pub run_id: Uuid,
    pub settings: RunSettings,
    pub connectors: ConnectorRegistry,
    pub aggregator: ResultAggregator,
    /// Cancelling this token stops the run; in-flight commands are dropped.
    pub cancel: CancellationToken,
    span: tracing::Span,
}

impl RunContext {
    /// Build a context with a fresh run ID, an empty aggregator and a new
    /// cancellation token.
    pub fn new(connectors: ConnectorRegistry, settings: RunSettings) -> Self {
        let run_id = Uuid::new_v4();
        Self {
            run_id,
            settings,
            connectors,
            aggregator: ResultAggregator::new(),
            cancel: CancellationToken::new(),
            span: tracing::info_span!("run", run_id = %run_id),
        }
    }

    /// Use an externally owned cancellation token (e.g. wired to Ctrl-C).
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Wrap in `Arc` for sharing across tasks.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// The span every run event is recorded under.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}
