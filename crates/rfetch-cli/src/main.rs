mod check_cmd;
mod config;
mod init_cmd;
mod run_cmd;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::RunOverrides;

#[derive(Parser)]
#[command(name = "rfetch", about = "Run commands across a fleet of hosts over SSH")]
struct Cli {
    /// Configuration file (overrides RFETCH_CONFIG env var)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Defaults to `run` when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every configured command and write the report
    Run(RunArgs),
    /// Validate the configuration without contacting any host
    Check,
    /// Write a sample configuration file
    Init {
        /// Where to write it (defaults to the resolved config path)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args, Default)]
pub struct RunArgs {
    /// Report file (overrides application.OutFile)
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Indent the JSON report
    #[arg(long)]
    pretty: bool,
    /// Maximum number of hosts worked on at once
    #[arg(long)]
    max_parallel_hosts: Option<usize>,
    /// Maximum concurrent sessions per host
    #[arg(long)]
    max_sessions: Option<usize>,
    /// Per-host connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,
    /// Whole-run timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl RunArgs {
    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            output: self.output.clone(),
            max_parallel_hosts: self.max_parallel_hosts,
            max_sessions_per_host: self.max_sessions,
            connect_timeout_secs: self.connect_timeout,
            run_timeout_secs: self.timeout,
        }
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber: appended to `log_file` without colours
/// when given, stdout otherwise.
pub(crate) fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(verbose));
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = config::resolve_config_path(cli.config.as_deref());

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            run_cmd::run_fetch(&config_path, &args.overrides(), args.pretty, cli.verbose).await?;
        }
        Commands::Check => {
            init_logging(cli.verbose, None)?;
            let problems = check_cmd::run_check(&config_path)?;
            if problems > 0 {
                std::process::exit(1);
            }
        }
        Commands::Init { path, force } => {
            let path = path.unwrap_or(config_path);
            init_cmd::run_init(&path, force)?;
        }
    }

    Ok(())
}
