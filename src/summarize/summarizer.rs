//! Group summaries and the knowledge-base overview.
//!
//! Summarization itself sits behind [`Summarizer`]; the functions here only
//! decide how text is segmented and fed to it. Inputs larger than
//! [`SEGMENT_TOKENS`] are summarized per segment, then the joined segment
//! summaries are summarized again (or, if still too large, segmented once
//! more and concatenated).

use tracing::debug;

use crate::{
    core::{model::Group, tokens::estimate_tokens},
    ingest::chunker::split_sentences,
};

/// Largest estimated input handed to a summarizer in one call
pub const SEGMENT_TOKENS: usize = 900;

/// Text emitted when no group carries a summary
pub const EMPTY_OVERVIEW: &str = "No content to summarize.";

/// Characters kept when segmentation finds no sentence at all
const RAW_SEGMENT_CHARS: usize = 3000;

/// Reduce text to at most about `max_tokens` estimated tokens
pub trait Summarizer
{
    fn summarize(
        &self,
        text: &str,
        max_tokens: usize,
    ) -> String;
}

/// Extractive summarizer keeping the leading sentences that fit the budget
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadSummarizer;

impl Summarizer for LeadSummarizer
{
    fn summarize(
        &self,
        text: &str,
        max_tokens: usize,
    ) -> String
    {
        let flat = text.replace('\n', " ");
        let sentences = split_sentences(&flat);

        let mut kept: Vec<&str> = Vec::new();
        let mut used = 0usize;
        for s in &sentences
        {
            let t = estimate_tokens(s);
            if used + t > max_tokens
            {
                break;
            }
            kept.push(*s);
            used += t;
        }

        if !kept.is_empty()
        {
            return kept.join(" ");
        }

        // First sentence alone is over budget: keep its leading words
        let words = ((max_tokens as f64 / 1.3).floor() as usize).max(1);
        sentences
            .first()
            .map(|s| {
                s.split_whitespace()
                    .take(words)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }
}

/// Split text into `". "`-joined segments of at most `max_tokens` each
pub fn segment_text(
    text: &str,
    max_tokens: usize,
) -> Vec<String>
{
    let flat = text.replace('\n', " ");
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;

    for sentence in flat
        .split(". ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let t = estimate_tokens(sentence);
        if current_tokens + t > max_tokens && !current.is_empty()
        {
            segments.push(format!("{}.", current.join(". ")));
            current.clear();
            current_tokens = 0;
        }
        current.push(sentence);
        current_tokens += t;
    }

    if !current.is_empty()
    {
        segments.push(format!("{}.", current.join(". ")));
    }

    if segments.is_empty()
    {
        segments.push(
            text.chars()
                .take(RAW_SEGMENT_CHARS)
                .collect(),
        );
    }
    segments
}

/// Summarize every segment and join the results
fn summarize_segments(
    text: &str,
    summarizer: &dyn Summarizer,
    max_tokens: usize,
) -> String
{
    segment_text(text, SEGMENT_TOKENS)
        .iter()
        .map(|seg| summarizer.summarize(seg, max_tokens))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop leading `#` runs from every line so no summary line reads as a heading
pub fn strip_heading_marks(text: &str) -> String
{
    text.lines()
        .map(|l| {
            l.trim_start()
                .trim_start_matches('#')
                .trim()
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hierarchical summary of a group's member texts
pub fn summarize_group(
    group: &Group,
    summarizer: &dyn Summarizer,
    max_tokens: usize,
) -> String
{
    let combined = group
        .items
        .iter()
        .map(|i| i.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let summary = if estimate_tokens(&combined) <= SEGMENT_TOKENS
    {
        summarizer.summarize(&combined, max_tokens)
    }
    else
    {
        let merged = summarize_segments(&combined, summarizer, max_tokens);
        debug!(group = group.id, merged_tokens = estimate_tokens(&merged), "segment summaries");

        if estimate_tokens(&merged) > SEGMENT_TOKENS
        {
            summarize_segments(&merged, summarizer, max_tokens)
        }
        else
        {
            summarizer.summarize(&merged, max_tokens)
        }
    };

    strip_heading_marks(&summary)
}

/// Meta-summary over `label: summary` of every summarized group
pub fn generate_overview(
    groups: &[Group],
    summarizer: &dyn Summarizer,
    max_tokens: usize,
) -> String
{
    let mut combined = groups
        .iter()
        .filter(|g| !g.summary.is_empty())
        .map(|g| format!("{}: {}", g.label, g.summary))
        .collect::<Vec<_>>()
        .join(" ");

    if combined
        .trim()
        .is_empty()
    {
        return EMPTY_OVERVIEW.to_string();
    }

    if estimate_tokens(&combined) > SEGMENT_TOKENS
    {
        combined = summarize_segments(&combined, summarizer, max_tokens);
    }

    strip_heading_marks(&summarizer.summarize(&combined, max_tokens))
}
