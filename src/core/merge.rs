//! Detection and resolution of near-duplicate groups.
//!
//! Pairs are resolved most-similar first so a weak match can never consume
//! a group that a stronger match would have merged.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::core::{
    importance::score_of,
    model::{Group, GroupIndex},
    similarity::SimilarityProvider,
};

/// Default summary similarity at or above which groups merge
pub const DEFAULT_MERGE_THRESHOLD: f64 = 0.80;

/// Two groups whose summaries are near-duplicates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicatePair
{
    pub a: GroupIndex,
    pub b: GroupIndex,
    pub similarity: f64,
}

/// Every unordered group pair with summary similarity `>= threshold`
pub fn find_near_duplicate_pairs(
    groups: &[Group],
    provider: &dyn SimilarityProvider,
    threshold: f64,
) -> Vec<DuplicatePair>
{
    if groups.len() < 2
    {
        return Vec::new();
    }

    let summaries: Vec<&str> = groups
        .iter()
        .map(|g| g.summary.as_str())
        .collect();
    let matrix = provider.similarity(&summaries);

    let mut pairs = Vec::new();
    for i in 0..groups.len()
    {
        for j in (i + 1)..groups.len()
        {
            let similarity = matrix.get(i, j);
            if similarity >= threshold
            {
                pairs.push(DuplicatePair { a: groups[i].id, b: groups[j].id, similarity });
            }
        }
    }

    debug!(groups = groups.len(), pairs = pairs.len(), threshold, "near-duplicate groups");
    pairs
}

/// Union of two groups into `keep`.
///
/// Facts keep the survivor's order followed by unseen facts of `remove`;
/// the longer summary wins, the survivor's on equal length.
pub fn merge_pair(
    keep: &Group,
    remove: &Group,
) -> Group
{
    let mut facts = keep
        .facts
        .clone();
    let mut seen: HashSet<&str> = keep
        .facts
        .iter()
        .map(String::as_str)
        .collect();
    for fact in &remove.facts
    {
        if seen.insert(fact.as_str())
        {
            facts.push(fact.clone());
        }
    }

    let summary = if keep
        .summary
        .chars()
        .count()
        >= remove
            .summary
            .chars()
            .count()
    {
        keep.summary
            .clone()
    }
    else
    {
        remove
            .summary
            .clone()
    };

    let mut items = keep
        .items
        .clone();
    items.extend(
        remove
            .items
            .iter()
            .cloned(),
    );

    Group { id: keep.id, items, label: keep.label.clone(), summary, facts }
}

/// Apply `pairs` to `groups` using importance `scores` from before any merge.
///
/// Returns the surviving groups in their original order and
/// `(survivor label, consumed label)` for every merge performed.
pub fn merge_groups(
    groups: &[Group],
    pairs: &[DuplicatePair],
    scores: &BTreeMap<GroupIndex, f64>,
) -> (Vec<Group>, Vec<(String, String)>)
{
    let mut sorted = pairs.to_vec();
    // Stable: equal similarities keep detection order
    sorted.sort_by(|x, y| y.similarity.total_cmp(&x.similarity));

    let mut by_id: BTreeMap<GroupIndex, Group> = groups
        .iter()
        .map(|g| (g.id, g.clone()))
        .collect();
    let mut removed: HashSet<GroupIndex> = HashSet::new();
    let mut merged = Vec::new();

    for pair in &sorted
    {
        if removed.contains(&pair.a) || removed.contains(&pair.b)
        {
            continue;
        }

        let (keep_id, remove_id) = if score_of(scores, pair.a) >= score_of(scores, pair.b)
        {
            (pair.a, pair.b)
        }
        else
        {
            (pair.b, pair.a)
        };

        let (Some(keep), Some(remove)) = (by_id.get(&keep_id), by_id.get(&remove_id))
        else
        {
            continue;
        };

        let combined = merge_pair(keep, remove);
        debug!(
            survivor = %keep.label,
            consumed = %remove.label,
            similarity = pair.similarity,
            "merged groups"
        );
        merged.push((
            keep.label
                .clone(),
            remove
                .label
                .clone(),
        ));
        by_id.insert(keep_id, combined);
        removed.insert(remove_id);
    }

    let survivors = groups
        .iter()
        .filter(|g| !removed.contains(&g.id))
        .filter_map(|g| by_id.remove(&g.id))
        .collect();

    (survivors, merged)
}
