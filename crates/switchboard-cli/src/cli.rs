use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the switchboard CLI
#[derive(Debug, Parser)]
#[command(name = "switchboard")]
#[command(about = "Capability-aware model selection with fallback and tier detection", long_about = None)]
pub struct Cli {
    /// Configuration file; defaults to `~/.switchboard/config.toml`
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rank the catalog for a request without calling any model
    Select(SelectArgs),

    /// Select a model and send a prompt, falling back on failure
    Generate {
        /// Selection options
        #[command(flatten)]
        selection: SelectArgs,

        /// Prompt to send
        prompt: String,

        /// Completion budget
        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Classify models as free or paid by probing their providers
    Tiers {
        /// JSON file holding a list of provider payloads
        #[arg(short, long)]
        payloads: PathBuf,

        /// User whose cache entry is used
        #[arg(short, long, default_value = "cli")]
        user: String,
    },

    /// Show the configuration path and configured providers
    Config,
}

/// Options shared by `select` and `generate`
#[derive(Debug, Clone, Args)]
pub struct SelectArgs {
    /// JSON file holding the candidate catalog
    #[arg(long)]
    pub catalog: PathBuf,

    /// Request category
    #[arg(long, default_value = "text")]
    pub category: String,

    /// Required capability, repeatable
    #[arg(long = "capability")]
    pub capabilities: Vec<String>,

    /// Ranking strategy override
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// User whose preferences apply
    #[arg(short, long, default_value = "cli")]
    pub user: String,

    /// Cost ceiling in USD, logged only
    #[arg(long)]
    pub max_cost: Option<f64>,
}
