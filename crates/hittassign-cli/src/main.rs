//! Command-line runner for hittassign harvesting scripts.
//!
//! # Usage
//!
//! ```bash
//! # Run a script
//! hittassign run harvest.hit
//!
//! # Run several scripts in order, stopping at the first failure
//! hittassign run first.hit second.hit
//!
//! # Read the script from stdin, at most 4 top-level statements at once
//! cat harvest.hit | hittassign --concurrency 4 run
//!
//! # Check that scripts parse, without touching the network
//! hittassign check *.hit
//!
//! # Print a script in canonical form
//! hittassign fmt harvest.hit
//!
//! # Show or persist the effective configuration
//! hittassign --timeout-secs 30 config --save
//! ```
//!
//! Log output goes to stderr, or to the file named by `--log-file`, and is
//! controlled by `RUST_LOG` (e.g. `RUST_LOG=hittassign_core=debug`).

use std::io::Read;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hittassign_core::config::HittassignConfig;
use hittassign_core::error::AppError;
use hittassign_core::Interpreter;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Run hittassign data-harvesting scripts.
#[derive(Parser)]
#[command(name = "hittassign")]
#[command(about = "Run hittassign data-harvesting scripts")]
#[command(version)]
struct Cli {
    /// Maximum number of top-level statements running at once
    #[arg(short, long, global = true, env = "HITTASSIGN_CONCURRENCY")]
    concurrency: Option<NonZeroUsize>,

    /// User-Agent header sent with every request
    #[arg(long, global = true, env = "HITTASSIGN_USER_AGENT")]
    user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "HITTASSIGN_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, env = "HITTASSIGN_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run scripts in order (reads stdin if none are given)
    Run {
        /// Script files
        scripts: Vec<PathBuf>,
    },

    /// Check that scripts lex and parse, without running them
    Check {
        /// Script files (reads stdin if omitted)
        scripts: Vec<PathBuf>,
    },

    /// Print a script in canonical form
    Fmt {
        /// Script file (reads stdin if omitted)
        script: Option<PathBuf>,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Also write it to ~/.hittassign/config.json
        #[arg(long)]
        save: bool,
    },
}

/// Installs the global subscriber. File logs default to `info`, stderr logs
/// to `warn`; `RUST_LOG` overrides both.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map_or_else(|| "hittassign.log".into(), |n| n.to_os_string());
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

#[derive(Debug)]
enum CliError {
    App(AppError),
    Config(std::io::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::App(e) => ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1)),
            CliError::Config(_) => ExitCode::from(3),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::App(e) => write!(f, "{}", e),
            CliError::Config(e) => write!(f, "cannot save configuration: {}", e),
        }
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::App(e)
    }
}

/// Persisted configuration with command-line and environment overrides applied.
fn effective_config(cli: &Cli) -> HittassignConfig {
    let mut config = HittassignConfig::load();
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(user_agent) = &cli.user_agent {
        config.user_agent = user_agent.clone();
    }
    if cli.timeout_secs.is_some() {
        config.timeout_secs = cli.timeout_secs;
    }
    config
}

/// The script inputs to process in order; stdin when no path is given.
fn inputs(scripts: &[PathBuf]) -> Vec<Option<&Path>> {
    if scripts.is_empty() {
        vec![None]
    } else {
        scripts.iter().map(|p| Some(p.as_path())).collect()
    }
}

fn label(path: Option<&Path>) -> String {
    path.map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string())
}

fn read_source(path: Option<&Path>) -> Result<String, AppError> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|source| AppError::Read {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|source| AppError::Read {
                    path: PathBuf::from("<stdin>"),
                    source,
                })?;
            Ok(buf)
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = effective_config(&cli);

    match cli.command {
        Command::Run { ref scripts } => {
            let interpreter = Interpreter::new(&config).map_err(AppError::from)?;
            for path in inputs(scripts) {
                let source = read_source(path)?;
                info!(script = %label(path), concurrency = interpreter.concurrency().get(), "running script");
                interpreter.run(&source).await?;
            }
        }

        Command::Check { ref scripts } => {
            for path in inputs(scripts) {
                let script = hittassign_core::parse_source(&read_source(path)?)?;
                println!("{}: ok ({} top-level statements)", label(path), script.len());
            }
        }

        Command::Fmt { ref script } => {
            let parsed = hittassign_core::parse_source(&read_source(script.as_deref())?)?;
            print!("{}", parsed);
        }

        Command::Config { save } => {
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| CliError::Config(std::io::Error::other(e)))?;
            println!("{}", json);
            if save {
                config.save().map_err(CliError::Config)?;
                info!("configuration saved");
            }
        }
    }

    Ok(())
}
