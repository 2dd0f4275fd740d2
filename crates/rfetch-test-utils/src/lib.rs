//! Shared test utilities for rfetch integration tests.
//!
//! Provides [`MockConnector`], an in-memory implementation of the transport
//! traits whose behaviour is scripted per destination address, plus
//! [`MockStats`] for asserting on what the engine did (connects,
//! disconnects, session concurrency, executed commands).
//!
//! Unscripted commands behave like a tiny shell: `echo X` prints `X\n`,
//! `false` exits 1, anything else succeeds silently.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use rfetch_core::HostDefinition;
use rfetch_core::transport::{Connection, Connector, ExecOutput, ExitState, Session};

/// Scripted behaviour for one command.
#[derive(Debug, Clone)]
pub enum CommandScript {
    /// Complete with the given output and exit state.
    Output {
        stdout: String,
        stderr: String,
        exit: ExitState,
    },
    /// The exec request itself fails; no output is produced.
    ExecFails,
    /// Wait, then behave like the inner script.
    Delayed(Duration, Box<CommandScript>),
    /// Never complete (for cancellation and timeout tests).
    Hang,
}

impl CommandScript {
    /// Exit 0 with `stdout` and an empty stderr.
    pub fn ok(stdout: &str) -> Self {
        Self::exit(0, stdout, "")
    }

    /// Exit with `code` and the given streams.
    pub fn exit(code: u32, stdout: &str, stderr: &str) -> Self {
        CommandScript::Output {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit: ExitState::Code(code),
        }
    }

    /// Sleep for `millis` before running `inner`.
    pub fn delayed(millis: u64, inner: CommandScript) -> Self {
        CommandScript::Delayed(Duration::from_millis(millis), Box::new(inner))
    }

    fn default_for(command: &str) -> Self {
        if let Some(text) = command.strip_prefix("echo ") {
            Self::ok(&format!("{text}\n"))
        } else if command == "false" {
            Self::exit(1, "", "")
        } else {
            Self::ok("")
        }
    }
}

/// Scripted behaviour for one destination address.
#[derive(Debug, Clone, Default)]
struct HostScript {
    connect_error: Option<String>,
    connect_delay: Option<Duration>,
    failing_sessions: usize,
    /// Each exec of a command consumes the next entry; the last one repeats.
    commands: HashMap<String, VecDeque<CommandScript>>,
}

impl HostScript {
    fn next_for(&mut self, command: &str) -> CommandScript {
        let scripted = match self.commands.get_mut(command) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        scripted.unwrap_or_else(|| CommandScript::default_for(command))
    }
}

/// Per-address counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressStats {
    pub connects: usize,
    pub disconnects: usize,
    pub sessions_opened: usize,
    pub active_sessions: usize,
    pub peak_sessions: usize,
    /// Commands in the order their exec calls started.
    pub executed: Vec<String>,
}

/// Observations shared between a [`MockConnector`] and the test.
#[derive(Debug, Default)]
pub struct MockStats {
    by_address: Mutex<HashMap<String, AddressStats>>,
}

impl MockStats {
    /// Snapshot of the counters for `address` (zeroed if never contacted).
    pub fn for_address(&self, address: &str) -> AddressStats {
        self.by_address
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    /// Total connection attempts across all addresses.
    pub fn total_connects(&self) -> usize {
        self.by_address
            .lock()
            .unwrap()
            .values()
            .map(|s| s.connects)
            .sum()
    }

    fn update(&self, address: &str, f: impl FnOnce(&mut AddressStats)) {
        let mut map = self.by_address.lock().unwrap();
        f(map.entry(address.to_string()).or_default());
    }
}

/// A scripted [`Connector`].
///
/// # Example
///
/// ```ignore
/// let connector = MockConnector::ssh()
///     .unreachable("10.0.0.9")
///     .script("10.0.0.1", "uptime", CommandScript::ok("up 3 days\n"));
/// let stats = connector.stats();
/// registry.register(connector);
/// ```
#[derive(Debug)]
pub struct MockConnector {
    kind: String,
    scripts: HashMap<String, HostScript>,
    stats: Arc<MockStats>,
}

impl MockConnector {
    /// A connector serving `kind`.
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            scripts: HashMap::new(),
            stats: Arc::new(MockStats::default()),
        }
    }

    /// A connector standing in for the real SSH one (`"ssh2"`).
    pub fn ssh() -> Self {
        Self::new(rfetch_core::host::SSH_HOST_TYPE)
    }

    /// Handle to the shared counters. Grab it before registering the
    /// connector, which moves it into the registry.
    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }

    /// Every connection attempt to `address` fails.
    pub fn unreachable(mut self, address: &str) -> Self {
        self.host(address).connect_error = Some(format!("connection refused by {address}"));
        self
    }

    /// Connecting to `address` takes `millis` before succeeding.
    pub fn slow_connect(mut self, address: &str, millis: u64) -> Self {
        self.host(address).connect_delay = Some(Duration::from_millis(millis));
        self
    }

    /// The first `count` session opens on `address` fail.
    pub fn failing_sessions(mut self, address: &str, count: usize) -> Self {
        self.host(address).failing_sessions = count;
        self
    }

    /// Script `command` on `address`.
    pub fn script(self, address: &str, command: &str, script: CommandScript) -> Self {
        self.script_sequence(address, command, [script])
    }

    /// Script successive executions of `command` on `address` (per
    /// connection). Once the sequence is exhausted its last entry repeats.
    pub fn script_sequence(
        mut self,
        address: &str,
        command: &str,
        scripts: impl IntoIterator<Item = CommandScript>,
    ) -> Self {
        self.host(address)
            .commands
            .insert(command.to_string(), scripts.into_iter().collect());
        self
    }

    fn host(&mut self, address: &str) -> &mut HostScript {
        self.scripts.entry(address.to_string()).or_default()
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn host_type(&self) -> &str {
        &self.kind
    }

    async fn connect(&self, host: &HostDefinition) -> Result<Box<dyn Connection>> {
        let script = self.scripts.get(&host.address).cloned().unwrap_or_default();
        self.stats.update(&host.address, |s| s.connects += 1);

        if let Some(delay) = script.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = script.connect_error {
            bail!("unable to establish connection to {}: {message}", host.endpoint());
        }

        Ok(Box::new(MockConnection {
            address: host.address.clone(),
            script: Arc::new(Mutex::new(script)),
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct MockConnection {
    address: String,
    script: Arc<Mutex<HostScript>>,
    stats: Arc<MockStats>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn open_session(&self) -> Result<Box<dyn Session>> {
        {
            let mut script = self.script.lock().unwrap();
            if script.failing_sessions > 0 {
                script.failing_sessions -= 1;
                return Err(anyhow!("channel open failure on {}", self.address));
            }
        }

        self.stats.update(&self.address, |s| {
            s.sessions_opened += 1;
            s.active_sessions += 1;
            s.peak_sessions = s.peak_sessions.max(s.active_sessions);
        });
        Ok(Box::new(MockSession {
            address: self.address.clone(),
            script: Arc::clone(&self.script),
            stats: Arc::clone(&self.stats),
        }))
    }

    async fn disconnect(&self) -> Result<()> {
        self.stats.update(&self.address, |s| s.disconnects += 1);
        Ok(())
    }
}

struct MockSession {
    address: String,
    script: Arc<Mutex<HostScript>>,
    stats: Arc<MockStats>,
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.stats.update(&self.address, |s| s.active_sessions -= 1);
    }
}

#[async_trait]
impl Session for MockSession {
    async fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        self.stats
            .update(&self.address, |s| s.executed.push(command.to_string()));

        let mut script = self.script.lock().unwrap().next_for(command);

        loop {
            match script {
                CommandScript::Output {
                    stdout,
                    stderr,
                    exit,
                } => {
                    return Ok(ExecOutput {
                        stdout: stdout.into_bytes(),
                        stderr: stderr.into_bytes(),
                        exit,
                    });
                }
                CommandScript::ExecFails => bail!("exec request rejected on {}", self.address),
                CommandScript::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    script = *inner;
                }
                CommandScript::Hang => std::future::pending::<()>().await,
            }
        }
    }
}

/// A valid `ssh2` host definition for `address` with password credentials.
pub fn test_host<I, S>(address: &str, commands: I) -> HostDefinition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    HostDefinition::ssh(address, "tester")
        .password("secret")
        .commands(commands)
}
