use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    core::model::TieredOutput,
    infra::io::write_atomic,
    output::render::{SINGLE_FILE, render_multi, render_single},
};

/// On-disk layout of a knowledge base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat
{
    /// One `knowledge_base.md`
    #[default]
    Single,

    /// `overview.md`, `facts.md` and `index.json`
    Multi,
}

impl fmt::Display for OutputFormat
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        match self
        {
            OutputFormat::Single => write!(f, "single"),
            OutputFormat::Multi => write!(f, "multi"),
        }
    }
}

/// Rendered files for `format`, as (path under `dir`, content)
pub fn render_files(
    output: &TieredOutput,
    dir: &Path,
    format: OutputFormat,
) -> Result<Vec<(PathBuf, String)>>
{
    match format
    {
        OutputFormat::Single => Ok(vec![(dir.join(SINGLE_FILE), render_single(output))]),
        OutputFormat::Multi => Ok(render_multi(output)
            .context("Failed to serialize index.json")?
            .into_iter()
            .map(|(name, body)| (dir.join(name), body))
            .collect()),
    }
}

/// Write the knowledge base under `dir`, returning the written paths
pub fn write_output(
    output: &TieredOutput,
    dir: &Path,
    format: OutputFormat,
) -> Result<Vec<PathBuf>>
{
    let mut written = Vec::new();

    for (path, content) in render_files(output, dir, format)?
    {
        write_atomic(&path, content.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), bytes = content.len(), "wrote output");
        written.push(path);
    }

    Ok(written)
}
