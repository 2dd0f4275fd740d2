//! `rfetch check`: validate the configuration without touching the network.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use rfetch_core::{ConnectorRegistry, HostRegistry};

use crate::config::{self, RunConfig, RunOverrides};

/// Run the check command. Returns the number of hosts that would not be run.
pub fn run_check(config_path: &Path) -> Result<usize> {
    let file = config::load_config(config_path)?;

    println!("Configuration: {}", config_path.display());
    match RunConfig::resolve(&file.application, &RunOverrides::default()) {
        Ok(run) => println!("  report: {}", run.out_file.display()),
        Err(e) => println!("  report: {e}"),
    }
    println!();

    let connectors = ConnectorRegistry::with_defaults();
    let problems = check_hosts(&file.servers, &connectors, &mut std::io::stdout().lock())
        .context("failed to write check output")?;

    println!();
    if problems == 0 {
        println!("All {} host(s) OK.", file.servers.len());
    } else {
        println!("{problems} of {} host(s) would be skipped.", file.servers.len());
    }
    Ok(problems)
}

/// Print one block per host and count the invalid or unsupported ones.
pub fn check_hosts(
    hosts: &HostRegistry,
    connectors: &ConnectorRegistry,
    out: &mut impl Write,
) -> std::io::Result<usize> {
    let mut problems = 0;
    for (name, host) in hosts.iter() {
        if !connectors.supports(&host.host_type) {
            writeln!(out, "{name}: unsupported host type {:?}", host.host_type)?;
            problems += 1;
            continue;
        }
        match host.validate() {
            Ok(warnings) => {
                writeln!(
                    out,
                    "{name}: ok ({} {}@{}, {} command(s))",
                    host.host_type,
                    host.user,
                    host.endpoint(),
                    host.commands.len()
                )?;
                for warning in warnings {
                    writeln!(out, "  warning: {warning}")?;
                }
            }
            Err(e) => {
                writeln!(out, "{name}: invalid: {e}")?;
                problems += 1;
            }
        }
    }
    Ok(problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfetch_core::HostDefinition;

    fn check(hosts: &HostRegistry) -> (usize, String) {
        let mut out = Vec::new();
        let problems = check_hosts(hosts, &ConnectorRegistry::with_defaults(), &mut out).unwrap();
        (problems, String::from_utf8(out).unwrap())
    }

    #[test]
    fn valid_hosts_pass() {
        let hosts = HostRegistry::new().with_host(
            "web1",
            HostDefinition::ssh("10.0.0.5", "ops")
                .password("pw")
                .commands(["uptime"]),
        );
        let (problems, text) = check(&hosts);
        assert_eq!(problems, 0);
        assert!(text.contains("web1: ok (ssh2 ops@10.0.0.5:22, 1 command(s))"), "{text}");
        assert!(!text.contains("warning"));
    }

    #[test]
    fn warnings_do_not_count_as_problems() {
        let hosts = HostRegistry::new().with_host("idle", HostDefinition::ssh("10.0.0.5", "ops"));
        let (problems, text) = check(&hosts);
        assert_eq!(problems, 0);
        assert!(text.contains("warning: command list is empty"), "{text}");
        assert!(text.contains("warning: password and private key are both empty"), "{text}");
    }

    #[test]
    fn invalid_and_unsupported_hosts_are_counted() {
        let mut telnet = HostDefinition::ssh("10.0.0.6", "ops");
        telnet.host_type = "telnet".into();
        let hosts = HostRegistry::new()
            .with_host("noport", HostDefinition::new("ssh2", "10.0.0.5", 0, "ops"))
            .with_host("router", telnet);

        let (problems, text) = check(&hosts);
        assert_eq!(problems, 2);
        assert!(text.contains("noport: invalid: destination port cannot be zero"), "{text}");
        assert!(text.contains("router: unsupported host type \"telnet\""), "{text}");
    }

    #[test]
    fn out_of_range_port_is_reported_per_host() {
        let hosts: HostRegistry = serde_json::from_str(
            r#"{"wide": {"HostType": "ssh2", "DestHost": "10.0.0.5", "DestPort": 70000,
                         "HostUser": "ops", "ExecCommands": null},
                "web1": {"HostType": "ssh2", "DestHost": "10.0.0.6", "DestPort": 22,
                         "HostUser": "ops", "HostPass": "pw", "ExecCommands": ["uptime"]}}"#,
        )
        .unwrap();

        let (problems, text) = check(&hosts);
        assert_eq!(problems, 1);
        assert!(text.contains("wide: invalid: destination port 70000 is outside 1-65535"), "{text}");
        assert!(text.contains("web1: ok"), "{text}");
    }
}
