//! Budget pruning of a compressed knowledge base.
//!
//! Fixed step order, each step optional:
//! 1. merge near-duplicate groups (scores from the original set)
//! 2. drop groups under an importance floor (scores after merging)
//! 3. drop the least important group while over the token budget,
//!    rescoring on every iteration and never dropping the last group

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::{
    importance::{score, score_of},
    merge::{DEFAULT_MERGE_THRESHOLD, find_near_duplicate_pairs, merge_groups},
    model::{Group, GroupIndex, PruneResult, TieredOutput},
    similarity::SimilarityProvider,
    tokens::estimate_tokens,
};

/// Knobs for one prune run; zero disables the floor and the budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruneConfig
{
    /// Merge near-duplicate groups before filtering
    pub merge_duplicates: bool,

    /// Summary similarity at or above which two groups merge
    pub similarity_threshold: f64,

    /// Groups scoring below this are removed (0 = off)
    pub min_importance: f64,

    /// Target estimated token count (0 = unlimited)
    pub max_tokens: usize,
}

impl Default for PruneConfig
{
    fn default() -> Self
    {
        Self {
            merge_duplicates: true,
            similarity_threshold: DEFAULT_MERGE_THRESHOLD,
            min_importance: 0.0,
            max_tokens: 0,
        }
    }
}

/// Estimated tokens over overview, summaries and facts, newline-joined
pub fn estimate_output_tokens(
    overview: &str,
    groups: &[Group],
) -> usize
{
    let mut parts: Vec<&str> = vec![overview];
    for g in groups
    {
        parts.push(&g.summary);
        parts.extend(
            g.facts
                .iter()
                .map(String::as_str),
        );
    }
    estimate_tokens(&parts.join("\n"))
}

/// Trim `output` to fit `config`.
///
/// Merging only runs when enabled and a `provider` is supplied.
#[instrument(skip_all, fields(groups = output.groups.len(), max_tokens = config.max_tokens))]
pub fn prune(
    mut output: TieredOutput,
    config: &PruneConfig,
    provider: Option<&dyn SimilarityProvider>,
) -> PruneResult
{
    let original_group_count = output
        .groups
        .len();
    let mut removed_labels = Vec::new();
    let mut merged_pairs = Vec::new();

    // 1. merge
    if config.merge_duplicates
        && let Some(provider) = provider
    {
        let scores = score(&output.groups);
        let pairs = find_near_duplicate_pairs(&output.groups, provider, config.similarity_threshold);
        let (groups, merged) = merge_groups(&output.groups, &pairs, &scores);
        output.groups = groups;
        merged_pairs = merged;
    }

    // 2. floor against the post-merge set
    if config.min_importance > 0.0
    {
        let scores = score(&output.groups);
        let (kept, dropped): (Vec<Group>, Vec<Group>) = output
            .groups
            .into_iter()
            .partition(|g| score_of(&scores, g.id) >= config.min_importance);
        for g in &dropped
        {
            debug!(label = %g.label, score = score_of(&scores, g.id), "below importance floor");
        }
        removed_labels.extend(
            dropped
                .into_iter()
                .map(|g| g.label),
        );
        output.groups = kept;
    }

    // 3. budget loop, rescored each pass
    if config.max_tokens > 0
    {
        while output.groups.len() > 1
            && estimate_output_tokens(&output.overview, &output.groups) > config.max_tokens
        {
            let scores = score(&output.groups);
            let Some(worst) = lowest_scoring(&output.groups, &scores)
            else
            {
                break;
            };
            let g = output
                .groups
                .remove(worst);
            debug!(label = %g.label, "removed for budget");
            removed_labels.push(g.label);
        }
    }

    let output_token_count = estimate_output_tokens(&output.overview, &output.groups);

    info!(
        before = original_group_count,
        after = output.groups.len(),
        merged = merged_pairs.len(),
        removed = removed_labels.len(),
        tokens = output_token_count,
        "pruned knowledge base"
    );

    PruneResult {
        pruned_group_count: output
            .groups
            .len(),
        output,
        original_group_count,
        removed_labels,
        merged_pairs,
        output_token_count,
        budget: config.max_tokens,
    }
}

/// Position of the lowest score; the first such group on ties
fn lowest_scoring(
    groups: &[Group],
    scores: &BTreeMap<GroupIndex, f64>,
) -> Option<usize>
{
    groups
        .iter()
        .enumerate()
        .map(|(pos, g)| (pos, score_of(scores, g.id)))
        .reduce(|best, cur| if cur.1 < best.1 { cur } else { best })
        .map(|(pos, _)| pos)
}
