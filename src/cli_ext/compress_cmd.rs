//! `mpk compress`: run the pipeline and write the knowledge base.

use anyhow::Result;
use owo_colors::OwoColorize;
use tracing::warn;

use crate::{
    cli::{AppContext, CompressArgs},
    core::{
        similarity::LexicalProvider,
        tokens::{PreciseCounter, count_tokens_precise},
    },
    infra::{
        config::{Config, PipelineConfig, load_config},
        io::expand_path,
    },
    output::{
        render::render_single,
        stats::stats_table,
        writer::{render_files, write_output},
    },
    pipeline::run_pipeline,
    summarize::summarizer::LeadSummarizer,
};

/// Config from disk/env, or defaults when it cannot be loaded
pub fn effective_config() -> Config
{
    load_config().unwrap_or_else(|e| {
        warn!(error = %format!("{e:#}"), "ignoring unreadable configuration");
        Config::default()
    })
}

/// Overlay explicitly passed flags on the configured pipeline settings
pub fn apply_overrides(
    cfg: &mut PipelineConfig,
    args: &CompressArgs,
)
{
    if let Some(dir) = &args.output
    {
        cfg.output_dir = dir.clone();
    }
    if let Some(format) = args.format
    {
        cfg.output_format = format;
    }
    if let Some(n) = args.chunk_size
    {
        cfg.chunk_size = n;
    }
    if let Some(t) = args.dedup_threshold
    {
        cfg.dedup_threshold = t;
    }
    if let Some(n) = args.min_clusters
    {
        cfg.min_clusters = n;
    }
    if let Some(n) = args.max_clusters
    {
        cfg.max_clusters = n;
    }
    if let Some(topic) = &args.topic
    {
        cfg.topic = topic.clone();
    }
    if let Some(seed) = args.seed
    {
        cfg.seed = seed;
    }
    if let Some(model) = &args.precise_model
    {
        cfg.precise_model = model.clone();
    }
}

/// Method name and token count of the rendered document: BPE for a
/// configured model, `chars/4` when none is set or it cannot be loaded
pub fn precise_count(
    model: &str,
    rendered: &str,
) -> (String, usize)
{
    if !model.is_empty()
    {
        match PreciseCounter::new(model)
        {
            Ok(counter) => return (model.to_string(), counter.count(rendered)),
            Err(e) => warn!(%model, error = %e, "BPE token count unavailable"),
        }
    }
    ("chars/4".to_string(), count_tokens_precise(rendered))
}

pub fn run(
    args: CompressArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut config = effective_config();
    apply_overrides(&mut config.pipeline, &args);
    config.pipeline.output_dir = expand_path(&config.pipeline.output_dir);
    let cfg = &config.pipeline;

    let result = run_pipeline(&args.inputs, &config, &LexicalProvider::new(), &LeadSummarizer, ctx)?;

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!("{}", ctx.styled("DRY RUN: Would write:", |s| s.yellow().to_string()));
            for (path, content) in render_files(&result.output, &cfg.output_dir, cfg.output_format)?
            {
                println!("  {} ({} bytes)", path.display(), content.len());
            }
        }
        return Ok(());
    }

    let written = write_output(&result.output, &cfg.output_dir, cfg.output_format)?;

    if ctx.quiet
    {
        return Ok(());
    }

    let precise = precise_count(&cfg.precise_model, &render_single(&result.output));

    if result
        .k_selection
        .is_fallback()
    {
        println!(
            "{} no cluster count could be validated; used {} topics",
            ctx.styled("!", |s| s.yellow().to_string()),
            result
                .k_selection
                .k()
        );
    }

    println!();
    println!("{}", ctx.styled("Compression Statistics", |s| s.bold().to_string()));
    println!("{}", stats_table(&result, Some((precise.0.as_str(), precise.1))));
    println!();
    for path in &written
    {
        println!("{} Written: {}", ctx.styled("✓", |s| s.green().to_string()), path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests
{
    use std::path::PathBuf;

    use clap::Parser;

    use super::*;
    use crate::{
        cli::{Cli, Commands},
        output::OutputFormat,
    };

    fn args(argv: &[&str]) -> CompressArgs
    {
        let mut full = vec!["mpk", "compress"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command
        {
            Commands::Compress(a) => a,
            _ => unreachable!(),
        }
    }

    #[test]
    fn flags_override_config_values()
    {
        let mut cfg = PipelineConfig::default();
        apply_overrides(
            &mut cfg,
            &args(&["in", "-o", "kb", "--format", "multi", "--topic", "Rust", "--seed", "7"]),
        );
        assert_eq!(cfg.output_dir, PathBuf::from("kb"));
        assert_eq!(cfg.output_format, OutputFormat::Multi);
        assert_eq!(cfg.topic, "Rust");
        assert_eq!(cfg.seed, 7);
    }

    #[test]
    fn precise_count_without_model_uses_char_heuristic()
    {
        let text = "a".repeat(40);
        assert_eq!(precise_count("", &text), ("chars/4".to_string(), 10));
        let (method, n) = precise_count("no-such-model", "");
        assert_eq!((method.as_str(), n), ("chars/4", 1));
    }

    #[test]
    fn absent_flags_keep_config_values()
    {
        let mut cfg = PipelineConfig { chunk_size: 300, ..Default::default() };
        apply_overrides(&mut cfg, &args(&["in"]));
        assert_eq!(cfg.chunk_size, 300);
        assert_eq!(cfg, PipelineConfig { chunk_size: 300, ..Default::default() });
    }
}
