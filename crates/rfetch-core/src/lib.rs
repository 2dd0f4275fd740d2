//! rfetch core: the concurrent execution engine.
//!
//! Given a [`HostRegistry`], the [`RunCoordinator`] starts one host worker
//! per supported host. Each worker validates its host, opens one connection
//! through the registered [`transport::Connector`], and runs every command
//! concurrently on its own session. All outcomes flow into a shared
//! [`ResultAggregator`], which is read only after every worker has been
//! joined, producing one [`RunReport`].
//!
//! ```text
//! HostRegistry --> RunCoordinator --spawn--> host worker (per host)
//!                        |                        |
//!                        |                        +--spawn--> command executor (per command)
//!                        |                                          |
//!                        |                                          v
//!                        +-- after all joined --> ResultAggregator --> RunReport
//! ```

pub mod aggregate;
pub mod context;
pub mod coordinator;
pub mod executor;
pub mod host;
pub mod report;
pub mod transport;
pub mod worker;

pub use aggregate::ResultAggregator;
pub use context::{RunContext, RunSettings};
pub use coordinator::{RunCoordinator, RunOutcome, RunSummary};
pub use host::{HostDefinition, HostRegistry};
pub use report::{CommandOutcome, ReportFile, RunReport};
pub use transport::ConnectorRegistry;
