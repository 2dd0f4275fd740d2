//! Remote transport abstraction.
//!
//! Decouples the execution engine from the wire protocol so that different
//! host kinds (SSH today, scripted mocks in tests) can be driven by the same
//! host worker and command executor.
//!
//! # Architecture
//!
//! ```text
//! ConnectorRegistry --get("ssh2")--> &dyn Connector
//!     |
//!     |   connect(host) ----------> Box<dyn Connection>   (one per host)
//!     |                                  |
//!     |                       open_session() --> Box<dyn Session>  (one per command)
//!     |                                  |            |
//!     |                                  |       exec(command) --> ExecOutput
//!     |                       disconnect()
//! ```

pub mod registry;
pub mod ssh;

use anyhow::Result;
use async_trait::async_trait;

use crate::host::HostDefinition;

pub use registry::ConnectorRegistry;
pub use ssh::{SshConnector, TransportError};

/// How a remote command finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitState {
    /// The remote side reported an exit status.
    Code(u32),
    /// The remote process was terminated by a signal.
    Signal(String),
    /// The channel closed without reporting how the command ended.
    Unknown,
}

impl ExitState {
    /// `true` only for an explicit zero exit status.
    pub fn success(&self) -> bool {
        matches!(self, ExitState::Code(0))
    }
}

impl std::fmt::Display for ExitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitState::Code(code) => write!(f, "exit status {code}"),
            ExitState::Signal(signal) => write!(f, "signal {signal}"),
            ExitState::Unknown => f.write_str("no exit status"),
        }
    }
}

/// Everything captured from one command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Raw bytes written to standard output.
    pub stdout: Vec<u8>,
    /// Raw bytes written to standard error.
    pub stderr: Vec<u8>,
    /// How the command ended.
    pub exit: ExitState,
}

/// Factory for connections of one host kind.
///
/// Implementations are stored as `Box<dyn Connector>` in the
/// [`ConnectorRegistry`] and looked up by [`Connector::host_type`].
#[async_trait]
pub trait Connector: Send + Sync {
    /// The `HostType` value this connector serves (e.g. `"ssh2"`).
    fn host_type(&self) -> &str;

    /// Establish and authenticate a connection to `host`.
    async fn connect(&self, host: &HostDefinition) -> Result<Box<dyn Connection>>;
}

/// An established, authenticated connection to one host.
///
/// Shared between the concurrently running command executors of that host,
/// so every method takes `&self`.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Open a fresh session for exactly one command.
    async fn open_session(&self) -> Result<Box<dyn Session>>;

    /// Tear the connection down.
    async fn disconnect(&self) -> Result<()>;
}

/// A single-use session on a [`Connection`].
#[async_trait]
pub trait Session: Send {
    /// Run `command` to completion and return its captured output.
    ///
    /// A non-zero exit is not an error; it is reported through
    /// [`ExecOutput::exit`]. `Err` means the command could not be run or
    /// the channel failed, and no output is available.
    async fn exec(&mut self, command: &str) -> Result<ExecOutput>;
}

// Compile-time assertion: the transport traits must be usable as trait objects.
const _: () = {
    fn _assert_object_safe(_: &dyn Connector, _: &dyn Connection, _: &dyn Session) {}
};
