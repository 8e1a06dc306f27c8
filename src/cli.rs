use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[clap(long, global = true, value_parser, default_value_t = false)]
    pub verbose: bool,

    /// Write log output to this file instead of stderr
    #[clap(long, global = true, value_parser)]
    pub log: Option<PathBuf>,

    /// Configuration file to use instead of the default lookup
    #[clap(long, global = true, value_parser)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Per-run overrides of configured search options.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SearchArgs {
    /// Match case exactly
    #[clap(short = 's', long, value_parser, default_value_t = false)]
    pub case_sensitive: bool,

    /// Characters (bytes for binary files) of context around each match
    #[clap(long, value_parser)]
    pub context: Option<usize>,

    /// Maximum directory depth, 0 for unlimited
    #[clap(long, value_parser)]
    pub max_depth: Option<usize>,

    /// Timeout in seconds, 0 for unlimited
    #[clap(long, value_parser)]
    pub timeout: Option<u64>,

    /// Include hidden files and directories
    #[clap(long, value_parser, default_value_t = false)]
    pub hidden: bool,

    /// Only search files with these extensions
    #[clap(long, value_parser, use_value_delimiter = true)]
    pub extensions: Option<Vec<String>>,

    /// Do not save results even if the configuration says so
    #[clap(long, value_parser, default_value_t = false)]
    pub no_save: bool,

    /// Print results as JSON instead of a table
    #[clap(long, value_parser, default_value_t = false)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search files below a directory for a literal string
    Search {
        pattern: String,

        #[clap(default_value = ".")]
        path: PathBuf,

        /// Only search the top-level directory
        #[clap(long, value_parser, default_value_t = false)]
        no_recursive: bool,

        #[clap(flatten)]
        args: SearchArgs,
    },
    /// Search inside ZIP, TAR.GZ and GZ archives below a directory
    Archives {
        pattern: String,

        #[clap(default_value = ".")]
        path: PathBuf,

        /// Directory used for extracted archive contents
        #[clap(long, value_parser)]
        scratch: Option<PathBuf>,

        #[clap(flatten)]
        args: SearchArgs,
    },
    /// Show saved results, or list them when no file is given
    Load {
        file: Option<PathBuf>,

        #[clap(long, value_parser, default_value_t = false)]
        json: bool,
    },
    /// Inspect or change the configuration
    Config {
        #[clap(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    Completions {
        #[clap(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Menu-driven session
    Interactive,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    Show,
    /// Write the current configuration to a file
    Save { path: Option<PathBuf> },
    /// Write the default configuration
    Reset,
    /// Print recommended excluded paths for this system
    SuggestExcludes {
        /// Add them to the configuration and save it
        #[clap(long, value_parser, default_value_t = false)]
        apply: bool,
    },
}
