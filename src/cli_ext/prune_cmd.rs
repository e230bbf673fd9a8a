//! `mpk prune`: shrink an existing knowledge base to a token budget.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use crate::{
    cli::{AppContext, PruneArgs},
    core::{
        model::PruneResult,
        prune::{PruneConfig, prune},
        similarity::LexicalProvider,
        tokens::estimate_tokens,
    },
    infra::io::write_atomic,
    output::{parser::parse_knowledge_base, render::render_single},
};

/// Overlay explicitly passed flags on the configured prune settings
pub fn apply_overrides(
    cfg: &mut PruneConfig,
    args: &PruneArgs,
)
{
    if let Some(n) = args.max_tokens
    {
        cfg.max_tokens = n;
    }
    if let Some(f) = args.min_importance
    {
        cfg.min_importance = f;
    }
    if let Some(t) = args.similarity_threshold
    {
        cfg.similarity_threshold = t;
    }
    if args.no_merge
    {
        cfg.merge_duplicates = false;
    }
}

/// Parse, prune and re-render `path`; returns the result and the new document
pub fn prune_file(
    path: &Path,
    cfg: &PruneConfig,
) -> Result<(PruneResult, String)>
{
    let output = parse_knowledge_base(path)?;
    let mut result = prune(output, cfg, Some(&LexicalProvider::new()));

    // Header reflects the pruned document
    result.output.output_token_count = estimate_tokens(&render_single(&result.output));
    let rendered = render_single(&result.output);

    Ok((result, rendered))
}

pub fn run(
    args: PruneArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut cfg = super::compress_cmd::effective_config().prune;
    apply_overrides(&mut cfg, &args);

    let (result, rendered) = prune_file(&args.file, &cfg)?;
    let target = args
        .output
        .as_deref()
        .unwrap_or(&args.file);

    if !ctx.dry_run
    {
        write_atomic(target, rendered.as_bytes())
            .with_context(|| format!("Failed to write {}", target.display()))?;
    }

    if ctx.quiet
    {
        return Ok(());
    }

    for (kept, merged) in &result.merged_pairs
    {
        println!("  {} {merged} → {kept}", ctx.styled("merged", |s| s.cyan().to_string()));
    }
    for label in &result.removed_labels
    {
        println!("  {} {label}", ctx.styled("removed", |s| s.red().to_string()));
    }

    let budget = if result.budget == 0
    {
        "unlimited".to_string()
    }
    else
    {
        format!("{} budget", result.budget)
    };
    let summary = format!(
        "{} → {} topics, ~{} tokens ({budget})",
        result.original_group_count, result.pruned_group_count, result.output_token_count
    );

    if result.over_budget()
    {
        println!(
            "{} {summary}; a single topic still exceeds the budget",
            ctx.styled("!", |s| s.yellow().to_string())
        );
    }
    else
    {
        println!("{} {summary}", ctx.styled("✓", |s| s.green().to_string()));
    }

    if ctx.dry_run
    {
        let msg = format!("DRY RUN: Would write {} bytes to {}", rendered.len(), target.display());
        println!("{}", ctx.styled(&msg, |s| s.yellow().to_string()));
    }
    else
    {
        println!("  Written: {}", target.display());
    }

    Ok(())
}
