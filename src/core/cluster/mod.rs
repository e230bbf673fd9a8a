//! Topic partitioning with automatic group-count selection.
//!
//! Candidate k values in `[min_k, min(max_k, n - 1)]` are partitioned
//! independently (in parallel) and scored by silhouette against the
//! `1 - affinity` distance view; the highest score wins, smallest k on ties.
//! A candidate that errors or yields fewer than two groups is skipped. When
//! nothing is viable the partitioner falls back to `min_k` unvalidated and
//! reports it as [`KSelection::Fallback`].

pub mod silhouette;
pub mod spectral;

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use crate::core::{
    error::{EngineError, EngineResult},
    label::label,
    model::{Group, GroupId, Item, ItemId, KSelection},
    similarity::SimilarityMatrix,
};

pub use silhouette::silhouette_score;
pub use spectral::SpectralEmbedding;

/// Seed used when the caller does not choose one
pub const DEFAULT_SEED: u64 = 42;

/// Bounds and seed for one partitioning call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterOptions
{
    /// Smallest group count to try
    pub min_k: usize,

    /// Largest group count to try (clipped to `n - 1`)
    pub max_k: usize,

    /// Seed for every k-means restart
    pub seed: u64,
}

impl Default for ClusterOptions
{
    fn default() -> Self
    {
        Self { min_k: 2, max_k: 20, seed: DEFAULT_SEED }
    }
}

/// Groups plus the assignment view for the partitioned items
#[derive(Debug, Clone)]
pub struct Partition
{
    /// Groups in ascending id order, members in original relative order
    pub groups: Vec<Group>,

    /// Item id -> assigned group
    pub assignments: BTreeMap<ItemId, GroupId>,

    /// How k was chosen
    pub selection: KSelection,
}

/// Score of one candidate k, `None` when not viable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate
{
    pub k: usize,
    pub silhouette: Option<f64>,
}

/// Partition `items` into topic groups.
///
/// `matrix` is the item similarity matrix indexed like `items`.
#[instrument(skip_all, fields(n = items.len(), min_k = opts.min_k, max_k = opts.max_k))]
pub fn cluster(
    items: &[Item],
    matrix: &SimilarityMatrix,
    opts: &ClusterOptions,
) -> EngineResult<Partition>
{
    let n = items.len();
    if matrix.len() != n
    {
        return Err(EngineError::DimensionMismatch { items: n, dim: matrix.len() });
    }
    if opts.min_k == 0
    {
        return Err(EngineError::InvalidBounds { min_k: opts.min_k, max_k: opts.max_k });
    }

    if n <= 2
    {
        let labels = vec![0; n];
        return Ok(build_partition(items, &labels, KSelection::Trivial));
    }

    let affinity = matrix.clipped_affinity();
    let distance = affinity.complement();
    let embedding = SpectralEmbedding::compute(&affinity, opts.max_k.max(opts.min_k))?;

    let selection = select_k(&embedding, &distance, opts);

    // Fallback min_k may exceed what n items can support
    let k = selection
        .k()
        .min(n - 1);
    let labels = embedding.partition(k, opts.seed)?;

    Ok(build_partition(items, &labels, selection))
}

/// Evaluate every candidate k in range; order of the result follows k
pub fn score_candidates(
    embedding: &SpectralEmbedding,
    distance: &SimilarityMatrix,
    opts: &ClusterOptions,
) -> Vec<Candidate>
{
    let n = embedding.len();
    let upper = opts
        .max_k
        .min(n.saturating_sub(1))
        .min(embedding.rank());
    if upper <= opts.min_k
    {
        return Vec::new();
    }

    (opts.min_k..=upper)
        .into_par_iter()
        .map(|k| {
            let silhouette = match embedding.partition(k, opts.seed)
            {
                Ok(labels) => silhouette_score(&labels, distance),
                Err(err) =>
                {
                    debug!(k, %err, "candidate k not viable");
                    None
                }
            };
            Candidate { k, silhouette }
        })
        .collect()
}

/// Model-order search: best silhouette, or an observable `min_k` fallback
pub fn select_k(
    embedding: &SpectralEmbedding,
    distance: &SimilarityMatrix,
    opts: &ClusterOptions,
) -> KSelection
{
    let candidates = score_candidates(embedding, distance, opts);

    let mut best: Option<(usize, f64)> = None;
    for c in &candidates
    {
        let Some(score) = c.silhouette
        else
        {
            continue;
        };
        debug!(k = c.k, silhouette = score, "scored candidate");
        if best.is_none_or(|(_, b)| score > b)
        {
            best = Some((c.k, score));
        }
    }

    match best
    {
        Some((k, silhouette)) => KSelection::Scored { k, silhouette },
        None =>
        {
            warn!(
                min_k = opts.min_k,
                max_k = opts.max_k,
                candidates = candidates.len(),
                "no viable cluster count; falling back to unvalidated min_k"
            );
            KSelection::Fallback { k: opts.min_k }
        }
    }
}

/// Group items by label; groups sorted by label, members keep input order
fn build_partition(
    items: &[Item],
    labels: &[usize],
    selection: KSelection,
) -> Partition
{
    let mut members: BTreeMap<usize, Vec<Item>> = BTreeMap::new();
    let mut assignments = BTreeMap::new();

    for (item, &l) in items
        .iter()
        .zip(labels.iter())
    {
        let mut it = item.clone();
        it.group_id = GroupId::Group(l);
        assignments.insert(it.id, it.group_id);
        members
            .entry(l)
            .or_default()
            .push(it);
    }

    let groups = members
        .into_iter()
        .map(|(id, items)| {
            let name = if items.is_empty() { String::new() } else { label(&items) };
            Group { id, items, label: name, ..Default::default() }
        })
        .collect();

    Partition { groups, assignments, selection }
}
