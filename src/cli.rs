use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::output::OutputFormat;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
    pub verbose: bool,  // global --verbose
    pub log_json: bool, // global --log-json
}

impl AppContext {
    /// `text` painted by `paint` unless colors are disabled
    pub fn styled<F>(&self, text: &str, paint: F) -> String
    where
        F: FnOnce(&str) -> String,
    {
        if self.no_color { text.to_string() } else { paint(text) }
    }
}

#[derive(Parser)]
#[command(name = "mpk")]
#[command(about = "Compress markdown notes into a tiered, token-budgeted knowledge base for LLMs")]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress spinners and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without writing files
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compress markdown files into a knowledge base
    Compress(CompressArgs),

    /// Merge and drop topics of an existing knowledge base to fit a budget
    Prune(PruneArgs),

    /// Recompress a directory whenever its markdown changes
    Watch(WatchArgs),

    /// Initialize a memorypack.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Flags left unset fall back to the config file, then to built-in defaults.
#[derive(Debug, Parser)]
pub struct CompressArgs {
    /// Markdown files or directories to compress
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output layout
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Target tokens per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Similarity at or above which chunks count as duplicates
    #[arg(long)]
    pub dedup_threshold: Option<f64>,

    /// Smallest number of topics to try
    #[arg(long)]
    pub min_clusters: Option<usize>,

    /// Largest number of topics to try
    #[arg(long)]
    pub max_clusters: Option<usize>,

    /// Title of the knowledge base
    #[arg(long)]
    pub topic: Option<String>,

    /// Seed for partitioning
    #[arg(long)]
    pub seed: Option<u64>,

    /// Also count output tokens with this GPT model or encoding (e.g., gpt-4o, o200k_base)
    #[arg(long)]
    pub precise_model: Option<String>,
}

#[derive(Debug, Parser)]
pub struct PruneArgs {
    /// Knowledge base file to prune
    pub file: PathBuf,

    /// Token budget for the pruned output (0 = unlimited)
    #[arg(long)]
    pub max_tokens: Option<usize>,

    /// Drop topics scoring below this importance
    #[arg(long)]
    pub min_importance: Option<f64>,

    /// Summary similarity at or above which topics are merged
    #[arg(long)]
    pub similarity_threshold: Option<f64>,

    /// Skip merging near-duplicate topics
    #[arg(long)]
    pub no_merge: bool,

    /// Write the pruned file here instead of overwriting the input
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct WatchArgs {
    /// Directory to watch for markdown changes
    pub dir: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Polling interval in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Auto-prune when the output exceeds this many tokens (0 = off)
    #[arg(long)]
    pub token_budget: Option<usize>,

    /// Title of the knowledge base
    #[arg(long)]
    pub topic: Option<String>,
}

#[derive(Debug, Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn compress_flags_parse() {
        let cli = Cli::try_parse_from([
            "mpk", "compress", "notes", "extra.md", "-o", "out", "--format", "multi",
            "--chunk-size", "256", "--quiet",
        ])
        .unwrap();
        assert!(cli.quiet);
        let Commands::Compress(args) = cli.command else { panic!("expected compress") };
        assert_eq!(args.inputs, vec![PathBuf::from("notes"), PathBuf::from("extra.md")]);
        assert_eq!(args.output, Some(PathBuf::from("out")));
        assert_eq!(args.format, Some(OutputFormat::Multi));
        assert_eq!(args.chunk_size, Some(256));
        assert_eq!(args.topic, None);
    }

    #[test]
    fn compress_requires_inputs() {
        assert!(Cli::try_parse_from(["mpk", "compress"]).is_err());
    }

    #[test]
    fn prune_flags_parse() {
        let cli = Cli::try_parse_from([
            "mpk", "prune", "kb.md", "--max-tokens", "800", "--no-merge", "--dry-run",
        ])
        .unwrap();
        assert!(cli.dry_run);
        let Commands::Prune(args) = cli.command else { panic!("expected prune") };
        assert_eq!(args.max_tokens, Some(800));
        assert!(args.no_merge);
        assert_eq!(args.output, None);
    }

    #[test]
    fn styled_respects_no_color() {
        let ctx = AppContext {
            quiet: false,
            no_color: true,
            dry_run: false,
            verbose: false,
            log_json: false,
        };
        assert_eq!(ctx.styled("ok", |s| format!("<{s}>")), "ok");
    }
}
