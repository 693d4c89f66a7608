//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "casedex",
    version,
    about = "Per-case document indexing and passage retrieval",
    long_about = "casedex keeps one isolated vector store per case. Documents are split into \
                  overlapping word windows, embedded, and indexed for exact nearest-neighbor \
                  search; queries return the most relevant passages as a context block."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/casedex/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index UTF-8 text files into a case
    Ingest {
        /// Case name
        case: String,

        /// Text files to ingest
        #[arg(required_unless_present = "stdin")]
        files: Vec<PathBuf>,

        /// Read a single document from standard input
        #[arg(long, conflicts_with = "files", requires = "name")]
        stdin: bool,

        /// Document name for --stdin
        #[arg(long)]
        name: Option<String>,

        /// Print the ingest report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Retrieve the passages of a case most relevant to a query
    Query {
        /// Case name
        case: String,

        /// Query text
        query: String,

        /// Number of passages to return (defaults to retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Show hits with provenance in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List cases with their sizes
    Cases {
        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the state of one case
    Stats {
        /// Case name
        case: String,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
