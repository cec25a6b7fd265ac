//! Arvak target selection CLI.
//!
//! Picks an execution target for the quantum runtime and prints the launch
//! configuration it needs:
//!
//! ```text
//! $ arvak resolve nvidia-mgpu
//! export LIBRARY_MODE="true"
//! export NVQIR_SIMULATION_BACKEND="nvidia_mgpu"
//! ...
//! $ arvak resolve iqm -- --iqm-server-url https://iqm.example --iqm-machine Apollo
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::time::Duration;

use arvak_target::config::ENV_CATALOG;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::common::Settings;
use commands::{probe, resolve, targets, version};

/// Arvak - execution target selection for GPU simulators and remote QPUs
#[derive(Parser)]
#[command(name = "arvak")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Additional target definitions (YAML)
    #[arg(long, global = true, env = ENV_CATALOG)]
    catalog: Option<PathBuf>,

    /// GPU listing tool
    #[arg(long, global = true)]
    gpu_tool: Option<PathBuf>,

    /// Hardware probe timeout in seconds
    #[arg(long, global = true, value_parser = parse_probe_timeout)]
    probe_timeout: Option<Duration>,

    /// Extra directory to search for backend libraries
    #[arg(long = "library-dir", global = true)]
    library_dirs: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List known targets
    Targets {
        /// Probe the machine and mark which targets can run here
        #[arg(long)]
        probe: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Report GPU devices and installed backend libraries
    Probe {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// Resolve a target and print its launch configuration
    Resolve {
        /// Target name (see `arvak targets`)
        target: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Env)]
        format: Format,

        /// Override library mode (ignored for remote targets)
        #[arg(long)]
        library_mode: Option<bool>,

        /// Target flags, `--<target>-<option> <value>` (put them after `--`)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        extra: Vec<String>,
    },

    /// Show version information
    Version,
}

/// Output format shared by all commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Human-readable table
    Table,
    /// JSON document
    Json,
    /// Shell `export` lines
    Env,
}

fn parse_probe_timeout(value: &str) -> Result<Duration, String> {
    arvak_target::config::parse_timeout(value).map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings {
        catalog: cli.catalog,
        gpu_tool: cli.gpu_tool,
        probe_timeout: cli.probe_timeout,
        library_dirs: cli.library_dirs,
    };

    // Execute command
    let result = match cli.command {
        Commands::Targets { probe, format } => targets::execute(&settings, probe, format.into()),
        Commands::Probe { format } => probe::execute(&settings, format.into()),
        Commands::Resolve {
            target,
            format,
            library_mode,
            extra,
        } => resolve::execute(&settings, &target, &extra, library_mode, format.into()),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

impl From<Format> for commands::common::OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Table => Self::Table,
            Format::Json => Self::Json,
            Format::Env => Self::Env,
        }
    }
}
