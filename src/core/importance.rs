//! Relative importance of groups within one output.
//!
//! score = 0.6 * facts / max_facts + 0.4 * summary_words / max_summary_words
//!
//! Scores are relative to the group set they were computed over, so callers
//! recompute after the set changes.

use std::collections::BTreeMap;

use crate::core::model::{Group, GroupIndex};

const FACT_WEIGHT: f64 = 0.6;
const SUMMARY_WEIGHT: f64 = 0.4;

/// Importance in [0, 1] for every group, keyed by group id
pub fn score(groups: &[Group]) -> BTreeMap<GroupIndex, f64>
{
    let word_counts: Vec<usize> = groups
        .iter()
        .map(|g| {
            g.summary
                .split_whitespace()
                .count()
        })
        .collect();

    // A zero maximum becomes 1 so the degenerate case scores 0
    let max_facts = groups
        .iter()
        .map(|g| g.facts.len())
        .max()
        .unwrap_or(0)
        .max(1) as f64;
    let max_words = word_counts
        .iter()
        .copied()
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    groups
        .iter()
        .zip(word_counts)
        .map(|(g, words)| {
            let fact_score = g.facts.len() as f64 / max_facts;
            let summary_score = words as f64 / max_words;
            (g.id, FACT_WEIGHT * fact_score + SUMMARY_WEIGHT * summary_score)
        })
        .collect()
}

/// Score lookup with 0 for ids that were never scored
pub fn score_of(
    scores: &BTreeMap<GroupIndex, f64>,
    id: GroupIndex,
) -> f64
{
    scores
        .get(&id)
        .copied()
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn group(
        id: usize,
        facts: usize,
        summary: &str,
    ) -> Group
    {
        let mut g = Group::new(id, format!("g{id}"));
        g.summary = summary.to_string();
        g.facts = (0..facts)
            .map(|i| format!("fact {i}"))
            .collect();
        g
    }

    #[test]
    fn weights_facts_and_summary_length()
    {
        let groups = vec![group(0, 4, "one two three four"), group(1, 2, "one two")];
        let s = score(&groups);
        assert!((s[&0] - 1.0).abs() < 1e-12);
        assert!((s[&1] - (0.6 * 0.5 + 0.4 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn degenerate_groups_score_zero()
    {
        let groups = vec![group(3, 0, ""), group(5, 0, "   ")];
        let s = score(&groups);
        assert_eq!(s[&3], 0.0);
        assert_eq!(s[&5], 0.0);
    }

    #[test]
    fn empty_input_gives_empty_map()
    {
        assert!(score(&[]).is_empty());
    }

    #[test]
    fn scores_stay_in_unit_range()
    {
        let groups = vec![group(0, 1, "a"), group(1, 7, "a b c"), group(2, 3, "a b c d e f")];
        for v in score(&groups).values()
        {
            assert!((0.0..=1.0).contains(v));
        }
    }
}
