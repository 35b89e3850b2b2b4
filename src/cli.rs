//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Mirror MTGJSON card data into SQLite and validate generated decks.
#[derive(Parser, Debug)]
#[command(name = "mtgdb")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// SQLite database file (overrides `db_path` in the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/mtgdb/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download (or read) archives and load them into the store
    Ingest(IngestArgs),

    /// Manage the category → URL link registry
    Links {
        #[command(subcommand)]
        command: LinksCommand,
    },

    /// Store maintenance and statistics
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },

    /// Search cards by name
    View(ViewArgs),

    /// Validate or generate decks
    Deck {
        #[command(subcommand)]
        command: DeckCommand,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Args, Debug, Clone)]
#[command(group(
    clap::ArgGroup::new("source")
        .required(true)
        .args(["url", "registry", "file"])
))]
pub struct IngestArgs {
    /// Archive URL to fetch (repeatable)
    #[arg(long, value_name = "URL")]
    pub url: Vec<String>,

    /// Fetch every link in the registry
    #[arg(long)]
    pub registry: bool,

    /// Local archive or JSON file
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Category for --url / --file sources (repeatable, paired with --url in order)
    #[arg(long, value_name = "NAME")]
    pub category: Vec<String>,

    /// Maximum concurrent downloads (1-32)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: Option<u8>,

    /// Maximum retry attempts for transient failures (0-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Directory for downloaded and unpacked archives
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum LinksCommand {
    /// Replace the registry with `category,url` lines from a file
    Import {
        /// File with one `category,url` pair per line
        file: PathBuf,
    },
    /// List registered links
    List,
}

#[derive(Subcommand, Debug, Clone)]
pub enum DbCommand {
    /// Card and set counts
    Stats,
    /// List cards
    List {
        /// Maximum rows
        #[arg(long, default_value_t = 50)]
        limit: u32,
        /// Rows to skip
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// List sets
    Sets,
    /// Drop and recreate the schema
    Init {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Clone)]
#[command(group(
    clap::ArgGroup::new("filter")
        .required(true)
        .multiple(true)
        .args(["term", "type_line", "text"])
))]
pub struct ViewArgs {
    /// Name fragment to search for
    pub term: Option<String>,

    /// Type line fragment, e.g. `Goblin` or `Instant`
    #[arg(long = "type", value_name = "TYPE")]
    pub type_line: Option<String>,

    /// Rules text fragment
    #[arg(long, value_name = "TEXT")]
    pub text: Option<String>,

    /// Maximum rows
    #[arg(long, default_value_t = 20)]
    pub limit: u32,
}

#[derive(Subcommand, Debug, Clone)]
pub enum DeckCommand {
    /// Validate a candidate list (`-` reads stdin)
    Validate {
        /// Candidate list file, or `-` for stdin
        input: String,

        /// Write the validated deck as JSON
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,
    },
    /// Ask a local Ollama model for a deck, then validate it
    Generate {
        /// Deck theme
        #[arg(long)]
        theme: String,

        /// Ollama model (overrides `ollama_model`)
        #[arg(long)]
        model: Option<String>,

        /// Ollama base URL (overrides `ollama_url`)
        #[arg(long, value_name = "URL")]
        ollama_url: Option<String>,

        /// Card the deck must contain (repeatable)
        #[arg(long = "include", value_name = "CARD")]
        include: Vec<String>,

        /// Write the validated deck as JSON
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print effective configuration values
    Show,
}
