//! **memorypack** - Compress markdown notes into a tiered knowledge base for LLM context
//!
//! Near-duplicate removal, spectral topic clustering and budget pruning over a
//! pluggable similarity provider, with extractive summaries and fact lists.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Compression engine - dedup, clustering, labels, importance and pruning
pub mod core {
    /// Typed engine errors
    pub mod error;
    pub use error::{EngineError, EngineResult};

    /// Items, groups and the tiered output
    pub mod model;
    pub use model::{Group, Item, KSelection, PipelineResult, PruneResult, TieredOutput};

    /// Word-based estimates and cached BPE counting
    pub mod tokens;
    pub use tokens::estimate_tokens;

    /// Similarity matrices and providers
    pub mod similarity;
    pub use similarity::{LexicalProvider, SimilarityMatrix, SimilarityProvider};

    /// Transitive near-duplicate collapse
    pub mod dedup;
    pub use dedup::deduplicate;

    /// Spectral partitioning with silhouette-driven k selection
    pub mod cluster;
    pub use cluster::{ClusterOptions, cluster};

    /// Heading or lead-phrase topic labels
    pub mod label;

    /// Fact/summary importance scores
    pub mod importance;

    /// Merging of near-duplicate groups
    pub mod merge;

    /// Importance floor and token-budget pruning
    pub mod prune;
    pub use prune::{PruneConfig, prune};
}

/// Markdown ingestion - discovery, frontmatter, cleaning and chunking
pub mod ingest {
    pub mod chunker;
    pub mod cleaner;
    pub mod reader;
    pub use reader::{SourceFile, read_files};
}

/// Group summaries, overview and fact extraction
pub mod summarize {
    pub mod facts;
    pub mod summarizer;
    pub use summarizer::{LeadSummarizer, Summarizer};
}

/// Rendering, writing and re-parsing knowledge bases
pub mod output {
    pub mod parser;
    pub mod render;
    pub mod stats;
    pub mod writer;
    pub use writer::{OutputFormat, write_output};
}

/// Read, clean, chunk, dedup, cluster, summarize
pub mod pipeline;
pub use pipeline::run_pipeline;

/// Infrastructure - Configuration, I/O, logging and discovery
pub mod infra {
    /// Layered configuration (file + MEMORYPACK_* env)
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Memory-mapped reads and atomic writes
    pub mod io;
    pub use io::{FileContent, read_file_smart};

    /// tracing subscriber setup
    pub mod logging;

    /// Gitignore-aware markdown discovery
    pub mod walk;
    pub use walk::FileWalker;
}

/// Subcommand handlers
pub mod cli_ext {
    pub mod compress_cmd;
    pub mod prune_cmd;
    pub mod watch_cmd;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use cli_ext::{
    compress_cmd::run as compress_run, prune_cmd::run as prune_run, watch_cmd::run as watch_run,
};
pub use infra::{Config, FileWalker, load_config};
