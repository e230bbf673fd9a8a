use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    cli::{AppContext, InitArgs},
    core::{cluster::DEFAULT_SEED, dedup::DEFAULT_DEDUP_THRESHOLD, prune::PruneConfig},
    ingest::chunker::DEFAULT_CHUNK_TOKENS,
    output::OutputFormat,
};

/// Config files probed in order; the first one found wins
const CONFIG_FILES: [&str; 4] =
    ["memorypack.toml", "memorypack.yaml", "memorypack.json", ".memorypack.toml"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Extra ignore globs for markdown discovery (in addition to .gitignore)
    pub ignore_patterns: Vec<String>,

    /// Compression settings
    pub pipeline: PipelineConfig,

    /// Pruning settings
    pub prune: PruneConfig,

    /// Watch mode settings
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig
{
    /// Target tokens per chunk
    pub chunk_size: usize,

    /// Item similarity at or above which items are duplicates
    pub dedup_threshold: f64,

    pub min_clusters: usize,
    pub max_clusters: usize,

    /// Token budget per group summary
    pub summary_max_tokens: usize,

    /// Token budget for the overview
    pub overview_max_tokens: usize,

    /// Title of the knowledge base
    pub topic: String,

    /// Seed for spectral partitioning
    pub seed: u64,

    pub output_format: OutputFormat,
    pub output_dir: PathBuf,

    /// Tokenizer model for precise output stats; empty disables
    pub precise_model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig
{
    /// Polling interval in seconds
    pub interval_secs: u64,

    /// Auto-prune when the output exceeds this many tokens (0 = off)
    pub token_budget: usize,
}

impl Default for PipelineConfig
{
    fn default() -> Self
    {
        Self {
            chunk_size: DEFAULT_CHUNK_TOKENS,
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            min_clusters: 2,
            max_clusters: 20,
            summary_max_tokens: 150,
            overview_max_tokens: 250,
            topic: "Knowledge Base".to_string(),
            seed: DEFAULT_SEED,
            output_format: OutputFormat::Single,
            output_dir: PathBuf::from("compressed"),
            precise_model: "gpt-4o".to_string(),
        }
    }
}

impl Default for WatchConfig
{
    fn default() -> Self
    {
        Self { interval_secs: 60, token_budget: 0 }
    }
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            ignore_patterns: vec![
                "node_modules/**".to_string(),
                ".git/**".to_string(),
                "target/**".to_string(),
                "compressed/**".to_string(),
            ],
            pipeline: PipelineConfig::default(),
            prune: PruneConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

/// Load the first config file found in `dir`, then `MEMORYPACK_*` env vars.
///
/// Nested keys use a double underscore: `MEMORYPACK_PIPELINE__CHUNK_SIZE=256`.
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    for name in &CONFIG_FILES
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MEMORYPACK")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("memorypack.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        println!("{toml_string}");
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests
{
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn defaults_match_documented_values()
    {
        let cfg = Config::default();
        assert_eq!(cfg.pipeline.chunk_size, 512);
        assert_eq!(cfg.pipeline.dedup_threshold, 0.92);
        assert_eq!(cfg.pipeline.topic, "Knowledge Base");
        assert_eq!(cfg.prune.similarity_threshold, 0.80);
        assert!(cfg.prune.merge_duplicates);
        assert_eq!(cfg.watch.interval_secs, 60);
    }

    #[test]
    fn default_config_survives_toml()
    {
        let cfg = Config::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn partial_file_keeps_other_defaults()
    {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path()
                .join("memorypack.toml"),
            "[pipeline]\nchunk_size = 128\ntopic = \"Rust Notes\"\n",
        )
        .unwrap();

        let cfg = load_config_from(tmp.path()).unwrap();
        assert_eq!(cfg.pipeline.chunk_size, 128);
        assert_eq!(cfg.pipeline.topic, "Rust Notes");
        assert_eq!(cfg.pipeline.max_clusters, 20);
        assert_eq!(cfg.prune, PruneConfig::default());
    }
}
