//! `mpk watch`: recompress a directory whenever its markdown changes.
//!
//! A [`notify::PollWatcher`] wakes the loop; an mtime snapshot of the
//! markdown files decides whether anything relevant changed, so writes to
//! the output directory or non-markdown files never trigger a run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::Local;
use notify::{PollWatcher, RecursiveMode, Watcher};
use owo_colors::OwoColorize;
use tracing::{debug, error, info, warn};

use crate::{
    cli::{AppContext, WatchArgs},
    core::{model::PruneResult, prune::PruneConfig, similarity::LexicalProvider},
    infra::{
        config::Config,
        io::{expand_path, write_atomic},
        walk::FileWalker,
    },
    output::{OutputFormat, writer::write_output},
    pipeline::run_pipeline,
    summarize::summarizer::LeadSummarizer,
};

use super::{compress_cmd::effective_config, prune_cmd::prune_file};

/// Modification times of the watched markdown files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot(BTreeMap<PathBuf, SystemTime>);

impl Snapshot
{
    /// Markdown under `dir`, skipping anything inside `exclude`
    pub fn scan(
        walker: &FileWalker,
        dir: &Path,
        exclude: &Path,
    ) -> Self
    {
        let entries = walker
            .walk_markdown(dir)
            .into_iter()
            .filter(|p| !p.starts_with(exclude))
            .filter_map(|p| {
                let mtime = std::fs::metadata(&p)
                    .and_then(|m| m.modified())
                    .ok()?;
                Some((p, mtime))
            })
            .collect();
        Self(entries)
    }

    pub fn len(&self) -> usize
    {
        self.0
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.0
            .is_empty()
    }
}

/// Outcome of one compress (and maybe prune) pass
#[derive(Debug)]
pub struct CycleReport
{
    pub files: usize,
    pub output_tokens: usize,
    pub written: PathBuf,
    pub pruned: Option<PruneResult>,
}

/// Settings and state of a running watch
pub struct WatchSession
{
    dir: PathBuf,
    out_dir: PathBuf,
    interval: Duration,
    token_budget: usize,
    config: Config,
    walker: FileWalker,
}

impl WatchSession
{
    pub fn new(
        args: &WatchArgs,
        mut config: Config,
    ) -> Result<Self>
    {
        let dir = args
            .dir
            .canonicalize()
            .with_context(|| format!("Cannot watch {}", args.dir.display()))?;

        if let Some(out) = &args.output
        {
            config.pipeline.output_dir = out.clone();
        }
        if let Some(topic) = &args.topic
        {
            config.pipeline.topic = topic.clone();
        }
        config.pipeline.output_dir = expand_path(&config.pipeline.output_dir);
        // Auto-prune reads the single-file document back
        config.pipeline.output_format = OutputFormat::Single;

        std::fs::create_dir_all(&config.pipeline.output_dir).with_context(|| {
            format!("Failed to create {}", config.pipeline.output_dir.display())
        })?;
        let out_dir = config
            .pipeline
            .output_dir
            .canonicalize()
            .context("Failed to resolve output directory")?;

        let interval = Duration::from_secs(
            args.interval
                .unwrap_or(config.watch.interval_secs)
                .max(1),
        );
        let token_budget = args
            .token_budget
            .unwrap_or(config.watch.token_budget);
        let walker = FileWalker::new(&config.ignore_patterns)?;

        Ok(Self { dir, out_dir, interval, token_budget, config, walker })
    }

    pub fn snapshot(&self) -> Snapshot
    {
        Snapshot::scan(&self.walker, &self.dir, &self.out_dir)
    }

    /// Compress the watched directory and prune the result if over budget
    pub fn cycle(
        &self,
        ctx: &AppContext,
    ) -> Result<Option<CycleReport>>
    {
        let files = self.snapshot();
        if files.is_empty()
        {
            warn!(dir = %self.dir.display(), "no markdown files to compress");
            return Ok(None);
        }

        let inputs: Vec<PathBuf> = files
            .0
            .into_keys()
            .collect();
        let result =
            run_pipeline(&inputs, &self.config, &LexicalProvider::new(), &LeadSummarizer, ctx)?;

        let written = write_output(&result.output, &self.out_dir, OutputFormat::Single)?
            .into_iter()
            .next()
            .context("No output written")?;

        let output_tokens = result
            .output
            .output_token_count;
        info!(files = inputs.len(), tokens = output_tokens, "compressed");

        let pruned = if self.token_budget > 0 && output_tokens > self.token_budget
        {
            let cfg = PruneConfig { max_tokens: self.token_budget, ..self.config.prune.clone() };
            let (pruned, rendered) = prune_file(&written, &cfg)?;
            write_atomic(&written, rendered.as_bytes())
                .with_context(|| format!("Failed to write {}", written.display()))?;
            Some(pruned)
        }
        else
        {
            None
        };

        Ok(Some(CycleReport { files: inputs.len(), output_tokens, written, pruned }))
    }

    /// Run one cycle, reporting instead of propagating failure
    fn cycle_and_report(
        &self,
        ctx: &AppContext,
    )
    {
        match self.cycle(ctx)
        {
            Ok(Some(report)) => report_cycle(&report, self.token_budget, ctx),
            Ok(None) =>
            {
                if !ctx.quiet
                {
                    println!("{}", ctx.styled("No .md files found.", |s| s.yellow().to_string()));
                }
            }
            Err(e) =>
            {
                error!(error = %format!("{e:#}"), "compression failed");
                if !ctx.quiet
                {
                    let msg = format!("Compression failed: {e:#}");
                    eprintln!("{}", ctx.styled(&msg, |s| s.red().to_string()));
                }
            }
        }
    }
}

fn report_cycle(
    report: &CycleReport,
    budget: usize,
    ctx: &AppContext,
)
{
    if ctx.quiet
    {
        return;
    }

    let msg = format!("Compressed {} files → {} tokens", report.files, report.output_tokens);
    println!("{}", ctx.styled(&msg, |s| s.green().to_string()));

    if let Some(p) = &report.pruned
    {
        let msg = format!(
            "Over budget ({budget} tokens), pruned to {} topics, ~{} tokens",
            p.pruned_group_count, p.output_token_count
        );
        println!("{}", ctx.styled(&msg, |s| s.yellow().to_string()));
    }
    println!("  Written: {}", report.written.display());
}

pub fn run(
    args: WatchArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let session = WatchSession::new(&args, effective_config())?;

    if ctx.dry_run
    {
        println!(
            "{} would watch {} every {}s, writing to {}",
            ctx.styled("DRY RUN:", |s| s.yellow().to_string()),
            session
                .dir
                .display(),
            session
                .interval
                .as_secs(),
            session
                .out_dir
                .display()
        );
        return Ok(());
    }

    if !ctx.quiet
    {
        let dir = session
            .dir
            .display()
            .to_string();
        println!(
            "Watching {} every {}s...",
            ctx.styled(&dir, |s| s.bold().to_string()),
            session
                .interval
                .as_secs()
        );
    }

    let mut last = session.snapshot();
    session.cycle_and_report(ctx);

    let (tx, rx) = mpsc::channel();
    let mut poller = PollWatcher::new(tx, notify::Config::default().with_poll_interval(session.interval))
        .context("Failed to start file watcher")?;
    poller
        .watch(&session.dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", session.dir.display()))?;

    for event in &rx
    {
        if let Err(e) = event
        {
            warn!(error = %e, "watch error");
            continue;
        }

        // One poll can report many paths
        while rx
            .try_recv()
            .is_ok()
        {}

        let current = session.snapshot();
        if current == last
        {
            debug!("no markdown changes");
            continue;
        }
        last = current;

        if !ctx.quiet
        {
            let msg = format!("[{}] Changes detected, recompressing...", Local::now().format("%H:%M:%S"));
            println!("\n{}", ctx.styled(&msg, |s| s.cyan().to_string()));
        }
        session.cycle_and_report(ctx);
    }

    Ok(())
}
