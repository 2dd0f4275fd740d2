//! The run report and its JSON persistence.
//!
//! On disk the report looks like:
//!
//! ```json
//! {"metadata":{"ExecutionTime":1700000000,"ExecutionHost":"box"},
//!  "servers":{"web1":{"uptime":{"stdout":"...","stderr":""}}}}
//! ```
//!
//! Failed hosts and commands are simply absent; failure details live in the
//! log and in [`crate::coordinator::RunSummary`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Captured output of one command on one host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    /// Build an outcome from raw stream bytes, replacing invalid UTF-8.
    pub fn from_bytes(stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }
}

/// Command string -> outcome, for one host.
pub type HostOutcomes = BTreeMap<String, CommandOutcome>;

/// Host name -> that host's outcomes.
pub type ServerOutcomes = BTreeMap<String, HostOutcomes>;

/// When and where the run was executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Run completion time, unix seconds.
    #[serde(rename = "ExecutionTime")]
    pub execution_time: i64,
    /// Identity of the machine that ran rfetch.
    #[serde(rename = "ExecutionHost")]
    pub execution_host: String,
}

/// The finalized output of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: ReportMetadata,
    #[serde(default)]
    pub servers: ServerOutcomes,
}

impl RunReport {
    /// Stamp collected outcomes with completion time and machine identity.
    pub fn finalize(
        servers: ServerOutcomes,
        execution_time: i64,
        execution_host: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ReportMetadata {
                execution_time,
                execution_host: execution_host.into(),
            },
            servers,
        }
    }

    /// Look up the outcome for a (host, command) pair.
    pub fn outcome(&self, host: &str, command: &str) -> Option<&CommandOutcome> {
        self.servers.get(host).and_then(|h| h.get(command))
    }
}

/// Identity of the local machine, as recorded in `ExecutionHost`.
///
/// Falls back to an empty string (with a warning) when the hostname cannot
/// be read.
pub fn local_identity() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "unable to read local hostname");
            String::new()
        }
    }
}

/// An output file opened before the run starts.
///
/// Opening up front means an unwritable destination fails the process before
/// any host is contacted, instead of after the whole fleet has been queried.
#[derive(Debug)]
pub struct ReportFile {
    path: PathBuf,
    file: File,
}

impl ReportFile {
    /// Create (or truncate) the report file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .with_context(|| format!("failed to open report file {}", path.display()))?;
        Ok(Self { path, file })
    }

    /// Path the report is written to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `report` into the file, followed by a newline.
    pub fn write(self, report: &RunReport, pretty: bool) -> Result<()> {
        let mut writer = BufWriter::new(self.file);
        let encoded = if pretty {
            serde_json::to_writer_pretty(&mut writer, report)
        } else {
            serde_json::to_writer(&mut writer, report)
        };
        encoded.with_context(|| format!("failed to serialize report to {}", self.path.display()))?;
        writer.write_all(b"\n")?;
        writer
            .flush()
            .with_context(|| format!("failed to write report file {}", self.path.display()))?;
        Ok(())
    }
}
