//! `rfetch run`: execute every configured command and write the report.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use rfetch_core::{
    ConnectorRegistry, HostRegistry, ReportFile, RunContext, RunCoordinator, RunOutcome,
    RunSummary,
};

use crate::config::{self, RunConfig, RunOverrides};

/// Run the fetch command.
///
/// Configuration problems, and failure to open the log or report file, are
/// returned as errors before any host is contacted. Everything after that is
/// absorbed by the engine and shows up in the returned summary.
pub async fn run_fetch(
    config_path: &Path,
    overrides: &RunOverrides,
    pretty: bool,
    verbose: bool,
) -> Result<RunSummary> {
    let file = config::load_config(config_path)?;
    let run_config = RunConfig::resolve(&file.application, overrides)?;

    crate::init_logging(verbose, run_config.log_file.as_deref())?;
    let report_file = ReportFile::create(&run_config.out_file)?;

    // Set up graceful shutdown: first signal cancels, second force-exits.
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));
    let got_first_clone = Arc::clone(&got_first_signal);

    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_clone.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nCancelling run, collected results will still be written (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    let ctx = RunContext::new(ConnectorRegistry::with_defaults(), run_config.settings)
        .with_cancel(cancel)
        .into_shared();
    info!(
        run_id = %ctx.run_id,
        config = %config_path.display(),
        hosts = file.servers.len(),
        "starting run"
    );

    let RunOutcome { report, summary } = execute(ctx, &file.servers).await;

    report_file.write(&report, pretty)?;
    info!(
        path = %run_config.out_file.display(),
        hosts = report.servers.len(),
        "report written"
    );

    println!("{summary}");
    if got_first_signal.load(Ordering::SeqCst) {
        println!("Run was interrupted; the report holds partial results.");
    }
    Ok(summary)
}

async fn execute(ctx: Arc<RunContext>, hosts: &HostRegistry) -> RunOutcome {
    RunCoordinator::new(ctx).run(hosts).await
}
