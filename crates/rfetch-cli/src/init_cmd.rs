//! `rfetch init`: write a sample configuration file.

use std::path::Path;

use anyhow::{Result, bail};

use crate::config;

/// Write the sample configuration to `path`, refusing to clobber an existing
/// file unless `force` is set.
pub fn run_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let sample = config::sample_config();
    config::save_config(path, &sample)?;

    println!("Config written to {}", path.display());
    println!("  application.OutFile = {}", sample.application.out_file);
    println!("  servers = {} sample host(s)", sample.servers.len());
    println!();
    println!("Next: edit the servers section, then run `rfetch check`.");

    Ok(())
}
