//! Reading a rendered knowledge base back into a [`TieredOutput`].
//!
//! Only an unreadable file is an error. Missing sections or counts fall back
//! to empty values so partially edited documents still load.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

use crate::core::model::{Group, TieredOutput};

/// Topic used when the title line is missing
const DEFAULT_TOPIC: &str = "Knowledge Base";

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^# Knowledge Base:[ \t]*(.+?)[ \t]*$").expect("title regex compiles")
});

static TOKENS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d[\d,]*)\s*→\s*(\d[\d,]*)\s*tokens").expect("token regex compiles")
});

static FILES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*files").expect("files regex compiles"));

/// `"12,345"` -> 12345, 0 when unparsable
fn parse_count(s: &str) -> usize
{
    s.replace(',', "")
        .parse()
        .unwrap_or(0)
}

/// Top-level sections in rendered order
const TIERS: [&str; 3] = ["Overview", "Topics", "Facts"];

/// `## <name>` as a bare line
fn tier_heading(line: &str) -> Option<&'static str>
{
    let name = line.strip_prefix("## ")?;
    TIERS
        .iter()
        .copied()
        .find(|t| *t == name)
}

/// Body of the `## <name>` section, up to the next tier heading.
///
/// Other `## ` lines are section content.
fn section<'a>(
    text: &'a str,
    name: &str,
) -> Option<&'a str>
{
    let mut start = None;
    let mut offset = 0usize;

    for line in text.split_inclusive('\n')
    {
        let bare = line.trim_end_matches(['\r', '\n']);
        match (start, tier_heading(bare))
        {
            (None, Some(tier)) if tier == name => start = Some(offset + line.len()),
            (Some(s), Some(_)) => return Some(&text[s..offset]),
            _ =>
            {}
        }
        offset += line.len();
    }

    start.map(|s| &text[s..])
}

/// `### label` blocks of a section as (label, body)
fn blocks(body: &str) -> Vec<(String, String)>
{
    let mut out: Vec<(String, String)> = Vec::new();

    for line in body.lines()
    {
        if let Some(label) = line.strip_prefix("### ")
        {
            out.push((
                label
                    .trim()
                    .to_string(),
                String::new(),
            ));
        }
        else if let Some((_, text)) = out.last_mut()
        {
            text.push_str(line);
            text.push('\n');
        }
    }

    out.into_iter()
        .map(|(label, text)| {
            (
                label,
                text.trim()
                    .to_string(),
            )
        })
        .collect()
}

/// Parse rendered single-file text
pub fn parse_text(text: &str) -> TieredOutput
{
    let topic = TITLE_RE
        .captures(text)
        .map_or_else(|| DEFAULT_TOPIC.to_string(), |c| c[1].to_string());

    let (input_token_count, output_token_count) = TOKENS_RE
        .captures(text)
        .map_or((0, 0), |c| (parse_count(&c[1]), parse_count(&c[2])));

    let file_count = FILES_RE
        .captures(text)
        .map_or(0, |c| parse_count(&c[1]));

    let overview = section(text, "Overview")
        .map(|s| {
            s.trim()
                .to_string()
        })
        .unwrap_or_default();

    let mut groups: Vec<Group> = section(text, "Topics")
        .map(blocks)
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(id, (label, summary))| {
            let mut g = Group::new(id, label);
            g.summary = summary;
            g
        })
        .collect();

    // Facts attach to the first group with that label that has none yet
    for (label, body) in section(text, "Facts")
        .map(blocks)
        .unwrap_or_default()
    {
        let facts: Vec<String> = body
            .lines()
            .filter_map(|l| {
                l.trim()
                    .strip_prefix("- ")
            })
            .map(|f| {
                f.trim()
                    .to_string()
            })
            .collect();

        match groups
            .iter_mut()
            .find(|g| g.label == label && g.facts.is_empty())
        {
            Some(g) => g.facts = facts,
            None => debug!(%label, "facts for unknown topic ignored"),
        }
    }

    TieredOutput { topic, overview, groups, input_token_count, output_token_count, file_count }
}

/// Parse a knowledge base file
pub fn parse_knowledge_base(path: &Path) -> Result<TieredOutput>
{
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read knowledge base {}", path.display()))?;
    Ok(parse_text(&text))
}
