//! policyctl - declarative ABAC policy management
//!
//! Validates policy configuration files and drives the create/read/update/
//! delete lifecycle of policy resources against the platform API, keeping
//! the resulting state in a local JSON file.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod documents;

/// policyctl - declarative ABAC policy management
#[derive(Parser, Debug)]
#[command(name = "policyctl")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Provider configuration file (YAML); `LIFEOMIC_*` variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (e.g. `warn`, `policy=debug`)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a policy configuration file without contacting the API
    Validate {
        /// Policy configuration (YAML, or JSON with a `.json` extension)
        file: PathBuf,
    },

    /// Print the wire policy a configuration file expands to
    Render {
        /// Policy configuration (YAML, or JSON with a `.json` extension)
        file: PathBuf,
    },

    /// Create or update the policy described by a configuration file
    Apply {
        /// Policy configuration (YAML, or JSON with a `.json` extension)
        file: PathBuf,

        /// State file to read and write
        #[arg(short, long)]
        state: PathBuf,
    },

    /// Refresh recorded state from the API and report drift
    Read {
        /// State file to read and write
        #[arg(short, long)]
        state: PathBuf,
    },

    /// Delete the policy recorded in a state file
    Delete {
        /// State file to read and remove
        #[arg(short, long)]
        state: PathBuf,
    },

    /// Record state for an existing remote policy
    Import {
        /// Policy name
        name: String,

        /// State file to write
        #[arg(short, long)]
        state: PathBuf,
    },

    /// List policies visible in the configured account
    #[command(alias = "ls")]
    List,

    /// List accounts the token has access to
    Accounts,
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = cli.config.as_deref();
    match cli.command {
        Command::Validate { file } => commands::validate(&file),
        Command::Render { file } => commands::render(&file),
        Command::Apply { file, state } => commands::apply(config, &file, &state).await,
        Command::Read { state } => commands::read(config, &state).await,
        Command::Delete { state } => commands::delete(config, &state).await,
        Command::Import { name, state } => commands::import(config, &name, &state).await,
        Command::List => commands::list(config).await,
        Command::Accounts => commands::accounts(config).await,
    }
}
