//! End-to-end compression: markdown files in, three-tier knowledge base out.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{Level, debug, info, instrument};

use crate::{
    cli::AppContext,
    core::{
        cluster::{ClusterOptions, cluster},
        dedup::deduplicate,
        model::{Item, PipelineResult, TieredOutput},
        similarity::{SimilarityProvider, cosine_matrix},
        tokens::estimate_tokens,
    },
    infra::{config::Config, walk::FileWalker},
    ingest::{chunker::chunk_text, cleaner::clean_markdown, reader::read_files},
    output::render::render_single,
    summarize::{
        facts::extract_facts,
        summarizer::{Summarizer, generate_overview, summarize_group},
    },
};

fn spinner(ctx: &AppContext) -> ProgressBar
{
    if ctx.quiet
    {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Compress the markdown reachable from `inputs` into a [`PipelineResult`].
///
/// Stages run in order: read, clean, chunk, similarity, dedup, cluster,
/// summarize, facts, overview. The output token count is estimated from the
/// rendered single-file document.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn run_pipeline(
    inputs: &[PathBuf],
    config: &Config,
    provider: &dyn SimilarityProvider,
    summarizer: &dyn Summarizer,
    ctx: &AppContext,
) -> Result<PipelineResult>
{
    let cfg = &config.pipeline;
    let progress = spinner(ctx);

    progress.set_message("Reading markdown files...");
    let walker = FileWalker::new(&config.ignore_patterns)?;
    let mut sources = read_files(inputs, &walker)?;
    if sources.is_empty()
    {
        progress.finish_and_clear();
        bail!("No markdown files found");
    }
    info!(files = sources.len(), "read sources");

    let input_token_count: usize = sources
        .iter()
        .map(|sf| estimate_tokens(&sf.body))
        .sum();

    progress.set_message("Cleaning markdown...");
    for sf in &mut sources
    {
        sf.body = clean_markdown(&sf.body);
    }

    progress.set_message("Chunking into blocks...");
    let mut items: Vec<Item> = Vec::new();
    for sf in &sources
    {
        let origin = sf
            .path
            .display()
            .to_string();
        let chunks = chunk_text(&sf.body, &origin, cfg.chunk_size, items.len());
        debug!(%origin, chunks = chunks.len(), "chunked");
        items.extend(chunks);
    }
    if items.is_empty()
    {
        progress.finish_and_clear();
        bail!("No content to process");
    }
    let total_items = items.len();

    progress.set_message(format!("Comparing {total_items} items..."));
    let texts: Vec<&str> = items
        .iter()
        .map(|i| i.text.as_str())
        .collect();
    let matrix = match provider.embeddings(&texts)
    {
        Some(vectors) =>
        {
            let matrix = cosine_matrix(&vectors);
            for (item, v) in items
                .iter_mut()
                .zip(vectors)
            {
                item.embedding = Some(v);
            }
            matrix
        }
        None => provider.similarity(&texts),
    };

    progress.set_message("Deduplicating...");
    let outcome = deduplicate(&items, &matrix, cfg.dedup_threshold)
        .context("Deduplication failed")?;
    let duplicate_items = outcome.duplicate_count();
    info!(total = total_items, unique = outcome.unique.len(), duplicates = duplicate_items, "deduplicated");
    if tracing::enabled!(Level::DEBUG)
    {
        for dup in outcome
            .flagged(&items)
            .iter()
            .filter(|i| i.is_duplicate)
        {
            debug!(id = dup.id, origin = %dup.origin, kept = ?outcome.duplicate_of.get(&dup.id), "duplicate chunk");
        }
    }

    progress.set_message("Clustering topics...");
    let opts = ClusterOptions { min_k: cfg.min_clusters, max_k: cfg.max_clusters, seed: cfg.seed };
    let unique_matrix = matrix.select(&outcome.unique_indices);
    let partition = cluster(&outcome.unique, &unique_matrix, &opts).context("Clustering failed")?;
    info!(groups = partition.groups.len(), selection = %partition.selection, "clustered");

    let mut groups = partition.groups;
    for g in &mut groups
    {
        progress.set_message(format!("Summarizing: {}", g.label));
        g.summary = summarize_group(g, summarizer, cfg.summary_max_tokens);
        g.facts = extract_facts(g);
    }

    progress.set_message("Generating overview...");
    let overview = generate_overview(&groups, summarizer, cfg.overview_max_tokens);
    progress.finish_and_clear();

    let group_count = groups.len();
    let mut output = TieredOutput {
        topic: cfg
            .topic
            .clone(),
        overview,
        groups,
        input_token_count,
        output_token_count: 0,
        file_count: sources.len(),
    };
    output.output_token_count = estimate_tokens(&render_single(&output));

    Ok(PipelineResult {
        output,
        total_items,
        unique_items: outcome
            .unique
            .len(),
        duplicate_items,
        group_count,
        k_selection: partition.selection,
    })
}
