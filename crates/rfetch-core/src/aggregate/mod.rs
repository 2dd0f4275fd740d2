//! Result aggregator: the one structure every command executor writes into.
//!
//! A single mutex guards the whole two-level `host -> command -> outcome`
//! map. Creating a host's slot and inserting into it happen in the same
//! critical section, so two concurrent first writes for a new host can never
//! produce two slots.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::report::{CommandOutcome, ServerOutcomes};

/// Concurrency-safe sink for command outcomes.
///
/// Cloning is cheap and yields a handle to the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    servers: Arc<Mutex<ServerOutcomes>>,
}

impl ResultAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of `command` on `host`.
    ///
    /// A second write for the same `(host, command)` pair replaces the first
    /// (last write wins). Returns the replaced outcome, if any.
    pub fn record(
        &self,
        host: &str,
        command: &str,
        outcome: CommandOutcome,
    ) -> Option<CommandOutcome> {
        let mut servers = self.lock();
        servers
            .entry(host.to_string())
            .or_default()
            .insert(command.to_string(), outcome)
    }

    /// Make sure `host` has an entry, even if it never records a command.
    pub fn ensure_host(&self, host: &str) {
        self.lock().entry(host.to_string()).or_default();
    }

    /// Number of hosts with an entry.
    pub fn host_count(&self) -> usize {
        self.lock().len()
    }

    /// Drain everything recorded so far.
    ///
    /// Only meaningful once every writer has finished; the coordinator calls
    /// it after joining all host workers.
    pub fn take(&self) -> ServerOutcomes {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, ServerOutcomes> {
        // A writer that panicked mid-insert leaves the map structurally valid.
        self.servers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(stdout: &str) -> CommandOutcome {
        CommandOutcome {
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[test]
    fn record_creates_host_slot() {
        let agg = ResultAggregator::new();
        assert!(agg.record("web", "uptime", outcome("up")).is_none());
        let servers = agg.take();
        assert_eq!(servers["web"]["uptime"].stdout, "up");
    }

    #[test]
    fn duplicate_command_last_write_wins() {
        let agg = ResultAggregator::new();
        agg.record("web", "date", outcome("first"));
        let replaced = agg.record("web", "date", outcome("second"));
        assert_eq!(replaced.unwrap().stdout, "first");

        let servers = agg.take();
        assert_eq!(servers["web"].len(), 1);
        assert_eq!(servers["web"]["date"].stdout, "second");
    }

    #[test]
    fn ensure_host_creates_empty_entry_once() {
        let agg = ResultAggregator::new();
        agg.ensure_host("idle");
        agg.ensure_host("idle");
        assert_eq!(agg.host_count(), 1);
        assert!(agg.take()["idle"].is_empty());
    }

    #[test]
    fn ensure_host_keeps_existing_outcomes() {
        let agg = ResultAggregator::new();
        agg.record("web", "id", outcome("uid=0"));
        agg.ensure_host("web");
        assert_eq!(agg.take()["web"].len(), 1);
    }

    #[test]
    fn take_drains() {
        let agg = ResultAggregator::new();
        agg.record("web", "id", outcome("x"));
        assert_eq!(agg.take().len(), 1);
        assert!(agg.take().is_empty());
    }

    #[test]
    fn clones_share_state() {
        let agg = ResultAggregator::new();
        let other = agg.clone();
        other.record("web", "id", outcome("x"));
        assert_eq!(agg.host_count(), 1);
    }

    #[test]
    fn concurrent_first_writes_for_same_host_share_one_slot() {
        let agg = ResultAggregator::new();
        let threads: Vec<_> = (0..16)
            .map(|t| {
                let agg = agg.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        agg.record("shared", &format!("cmd-{t}-{i}"), outcome("o"));
                        agg.record(&format!("host-{t}"), &format!("cmd-{i}"), outcome("o"));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let servers = agg.take();
        assert_eq!(servers.len(), 17, "16 private hosts plus the shared one");
        assert_eq!(servers["shared"].len(), 16 * 50, "no lost updates");
        for t in 0..16 {
            assert_eq!(servers[&format!("host-{t}")].len(), 50);
        }
    }

    #[test]
    fn survives_poisoned_lock() {
        let agg = ResultAggregator::new();
        agg.record("web", "id", outcome("x"));

        let poisoner = agg.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.servers.lock().unwrap();
            panic!("writer panicked while holding the lock");
        })
        .join();

        agg.record("web", "uptime", outcome("y"));
        assert_eq!(agg.take()["web"].len(), 2);
    }
}
