use clap::Parser;
use linetap::launcher::{self, LaunchRequest};
use linetap::{Channel, LauncherConfig};
use std::path::PathBuf;
use tracing::{debug, error, trace};

/// Run a program while capturing this process's output channels to a log file
#[derive(Parser)]
#[command(name = "linetap")]
#[command(
    about = "Runs the specified program with optional arguments, redirecting logs to a log file",
    long_about = None
)]
struct Cli {
    /// Enable verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// File that captured lines are appended to (default: logfile.txt)
    #[arg(short = 'l', long)]
    log_file: Option<PathBuf>,

    /// Seconds between log file flushes
    #[arg(long, value_name = "SECS")]
    flush_interval: Option<u64>,

    /// Channel to capture: stdout, stderr or log (repeatable; default: stderr and log)
    #[arg(long = "capture", value_name = "CHANNEL")]
    capture: Vec<Channel>,

    /// Program to run, followed by its arguments
    #[arg(
        value_name = "PROGRAM",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<String>,
}

impl Cli {
    fn launcher_config(&self) -> anyhow::Result<LauncherConfig> {
        let config = match &self.config {
            Some(path) => LauncherConfig::load(path)?,
            None => LauncherConfig::default(),
        };
        let mut config = config.apply_env_overrides()?;

        if let Some(log_file) = &self.log_file {
            config.log_file = log_file.clone();
        }
        if let Some(secs) = self.flush_interval {
            config.flush_interval_secs = secs;
        }
        if !self.capture.is_empty() {
            config.capture = self.capture.clone();
        }
        Ok(config)
    }

    fn launch_request(&self) -> anyhow::Result<LaunchRequest> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("No program given"))?;
        Ok(LaunchRequest::new(program.clone())
            .args(args.iter().cloned())
            .config(self.launcher_config()?))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Diagnostics go straight to the real stderr, never through a captured channel.
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 3)
        .with_line_number(cli.verbose >= 3)
        .init();

    debug!("linetap started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.launch_request() {
        Ok(request) => launcher::run(request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
