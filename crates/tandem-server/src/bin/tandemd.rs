//! Tandem Daemon
//!
//! The `tandemd` binary hosts a coordinator with in-process resource
//! managers and drives it from an operator shell:
//! - Loads configuration from a TOML file, flags and environment
//! - Starts the TTL reaper
//! - Runs commands interactively, from a file, or from `--command`
//!
//! # Usage
//!
//! ```bash
//! # Interactive shell
//! tandemd
//!
//! # Use configuration file
//! tandemd --config /etc/tandem/tandemd.toml
//!
//! # Run a script
//! tandemd --file bookings.txt
//!
//! # Run a single command
//! tandemd -c "start"
//! ```

use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tandem_coordinator::Coordinator;
use tandem_server::config::ServerConfig;
use tandem_server::repl::{print_reply, Repl};
use tandem_server::shell::Shell;

/// Tandem Daemon
#[derive(Parser, Debug)]
#[command(
    name = "tandemd",
    version,
    about = "Tandem transaction coordinator",
    long_about = "Tandem coordinates transactions across flight, car and room managers.\n\n\
                  This daemon hosts the coordinator and accepts shell commands."
)]
struct Args {
    /// Configuration file path
    #[arg(short = 'C', long, value_name = "FILE", env = "TANDEM_CONFIG")]
    config: Option<PathBuf>,

    /// Execute a single command and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Execute commands from file and exit
    #[arg(short = 'f', long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "TANDEM_LOG_LEVEL")]
    log_level: Option<String>,

    /// Transaction time-to-live in milliseconds
    #[arg(long, env = "TANDEM_TXN_TTL_MS")]
    txn_ttl_ms: Option<u64>,

    /// Reaper scan interval in milliseconds
    #[arg(long, env = "TANDEM_REAPER_INTERVAL_MS")]
    reaper_interval_ms: Option<u64>,

    /// Disable deadlock detection
    #[arg(long)]
    no_deadlock_detection: bool,

    /// Do not run the TTL reaper
    #[arg(long)]
    no_reaper: bool,

    /// Print configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args)?;

    // Print config and exit if requested
    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    init_logging(&args, &config);

    run(&args, &config)
}

fn init_logging(args: &Args, config: &ServerConfig) {
    let level = if args.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };

    let filter = EnvFilter::try_new(format!(
        "tandem_server={level},tandem_coordinator={level},tandem_rm={level},tandem_txn={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    // Start with defaults
    let mut config = if let Some(path) = &args.config {
        ServerConfig::from_file(path).context("Failed to load config file")?
    } else {
        ServerConfig::default()
    };

    // Override with command-line arguments
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    if let Some(ms) = args.txn_ttl_ms {
        config.coordinator.txn_ttl_ms = ms;
    }
    if let Some(ms) = args.reaper_interval_ms {
        config.coordinator.reaper_interval_ms = ms;
    }
    if args.no_deadlock_detection {
        config.coordinator.deadlock_detection = false;
    }
    if args.no_reaper {
        config.reaper_enabled = false;
    }

    config.validate()?;
    Ok(config)
}

fn run(args: &Args, config: &ServerConfig) -> Result<()> {
    let coordinator = Arc::new(
        Coordinator::in_process(config.coordinator.clone())
            .context("Failed to create coordinator")?,
    );

    info!("Coordinator configuration:");
    info!("  Transaction TTL: {} ms", config.coordinator.txn_ttl_ms);
    info!("  Reaper interval: {} ms", config.coordinator.reaper_interval_ms);
    info!("  Deadlock detection: {}", config.coordinator.deadlock_detection);

    let _reaper = if config.reaper_enabled {
        Some(
            coordinator
                .start_reaper()
                .context("Failed to start reaper thread")?,
        )
    } else {
        info!("Reaper disabled; idle transactions are never aborted");
        None
    };

    let shell = Shell::new(Arc::clone(&coordinator));

    if let Some(command) = &args.command {
        print_reply(shell.execute_line(command));
    } else if let Some(path) = &args.file {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        run_lines(&shell, BufReader::new(file))?;
    } else {
        Repl::new(shell, config)
            .context("Failed to start shell")?
            .run()?;
    }

    let stats = coordinator.registry().stats();
    info!(
        "Shutting down: {} active transactions left",
        coordinator.registry().active_count()
    );
    info!("  Transactions started: {}", stats.started.load(Ordering::Relaxed));
    info!("  Transactions committed: {}", stats.committed.load(Ordering::Relaxed));
    info!("  Transactions aborted: {}", stats.aborted.load(Ordering::Relaxed));
    Ok(())
}

fn run_lines(shell: &Shell, input: impl BufRead) -> Result<()> {
    for line in input.lines() {
        let line = line.context("Failed to read command")?;
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        if !print_reply(shell.execute_line(line)) {
            break;
        }
    }
    Ok(())
}
