//! Near-duplicate collapsing over an item similarity matrix.
//!
//! Pairs at or above the threshold are unioned, so duplicate groups are the
//! connected components of the thresholded similarity graph (chain merging:
//! A~B and B~C put A, B, C together even when A and C are dissimilar).
//! Each component keeps one representative:
//! - highest token count wins
//! - ties go to the lowest item id

use std::collections::BTreeMap;

use tracing::debug;

use crate::core::{
    error::{EngineError, EngineResult},
    model::{Item, ItemId},
    similarity::SimilarityMatrix,
};

/// Default cosine threshold above which two items are duplicates
pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.92;

/// Array-backed disjoint-set forest with path halving and union by rank
#[derive(Debug, Clone)]
pub struct DisjointSet
{
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet
{
    /// `n` singleton sets `{0}, {1}, ..., {n-1}`
    pub fn new(n: usize) -> Self
    {
        Self { parent: (0..n).collect(), rank: vec![0; n] }
    }

    /// Root of the set containing `x`
    pub fn find(
        &mut self,
        mut x: usize,
    ) -> usize
    {
        while self.parent[x] != x
        {
            // Path halving: point at grandparent while walking up
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets containing `x` and `y`; returns false if already joined
    pub fn union(
        &mut self,
        x: usize,
        y: usize,
    ) -> bool
    {
        let (mut rx, mut ry) = (self.find(x), self.find(y));
        if rx == ry
        {
            return false;
        }
        if self.rank[rx] < self.rank[ry]
        {
            std::mem::swap(&mut rx, &mut ry);
        }
        self.parent[ry] = rx;
        if self.rank[rx] == self.rank[ry]
        {
            self.rank[rx] = self.rank[rx].saturating_add(1);
        }
        true
    }

    /// Members of every set, each set ordered by index, sets ordered by
    /// their smallest member
    pub fn components(&mut self) -> Vec<Vec<usize>>
    {
        let n = self
            .parent
            .len();
        let mut by_root: BTreeMap<usize, usize> = BTreeMap::new();
        let mut out: Vec<Vec<usize>> = Vec::new();

        for i in 0..n
        {
            let root = self.find(i);
            let slot = *by_root
                .entry(root)
                .or_insert_with(|| {
                    out.push(Vec::new());
                    out.len() - 1
                });
            out[slot].push(i);
        }

        out
    }
}

/// Result of deduplication: a filtered view plus duplicate bookkeeping
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome
{
    /// One representative per duplicate group, ordered by the group's first
    /// member position
    pub unique: Vec<Item>,

    /// Positions of `unique` in the input slice (for submatrix selection)
    pub unique_indices: Vec<usize>,

    /// Duplicate item id -> representative item id
    pub duplicate_of: BTreeMap<ItemId, ItemId>,
}

impl DedupOutcome
{
    pub fn duplicate_count(&self) -> usize
    {
        self.duplicate_of
            .len()
    }

    pub fn is_duplicate(
        &self,
        id: ItemId,
    ) -> bool
    {
        self.duplicate_of
            .contains_key(&id)
    }

    /// Copies of `items` with the duplicate flag applied
    pub fn flagged(
        &self,
        items: &[Item],
    ) -> Vec<Item>
    {
        items
            .iter()
            .map(|it| {
                let mut it = it.clone();
                it.is_duplicate = self.is_duplicate(it.id);
                it
            })
            .collect()
    }
}

/// Collapse near-duplicate items.
///
/// `matrix` must be indexed like `items`. Zero or one item returns the input
/// unchanged without any comparison.
pub fn deduplicate(
    items: &[Item],
    matrix: &SimilarityMatrix,
    threshold: f64,
) -> EngineResult<DedupOutcome>
{
    let n = items.len();
    if matrix.len() != n
    {
        return Err(EngineError::DimensionMismatch { items: n, dim: matrix.len() });
    }

    if n <= 1
    {
        return Ok(DedupOutcome {
            unique: items.to_vec(),
            unique_indices: (0..n).collect(),
            duplicate_of: BTreeMap::new(),
        });
    }

    let mut dsu = DisjointSet::new(n);
    let mut unions = 0usize;

    // Unordered pairs only (i < j); self-pairs never compared
    for i in 0..n
    {
        for j in (i + 1)..n
        {
            if matrix.get(i, j) >= threshold && dsu.union(i, j)
            {
                unions += 1;
            }
        }
    }

    let mut outcome = DedupOutcome::default();

    for members in dsu.components()
    {
        let best = pick_representative(items, &members);

        for &m in &members
        {
            if m != best
            {
                outcome
                    .duplicate_of
                    .insert(items[m].id, items[best].id);
            }
        }

        outcome
            .unique
            .push(items[best].clone());
        outcome
            .unique_indices
            .push(best);
    }

    debug!(
        total = n,
        unions,
        unique = outcome.unique.len(),
        duplicates = outcome.duplicate_count(),
        threshold,
        "deduplicated items"
    );

    Ok(outcome)
}

/// Highest token count, lowest id on ties
fn pick_representative(
    items: &[Item],
    members: &[usize],
) -> usize
{
    let mut best = members[0];
    for &m in &members[1..]
    {
        let (cand, cur) = (&items[m], &items[best]);
        if cand.token_count > cur.token_count
            || (cand.token_count == cur.token_count && cand.id < cur.id)
        {
            best = m;
        }
    }
    best
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn item(
        id: ItemId,
        tokens: usize,
    ) -> Item
    {
        Item::new(id, format!("item {id}"), "test.md", tokens)
    }

    fn matrix(
        n: usize,
        pairs: &[(usize, usize, f64)],
    ) -> SimilarityMatrix
    {
        let mut rows = vec![vec![0.0; n]; n];
        for (i, row) in rows
            .iter_mut()
            .enumerate()
        {
            row[i] = 1.0;
        }
        for &(i, j, s) in pairs
        {
            rows[i][j] = s;
            rows[j][i] = s;
        }
        SimilarityMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn disjoint_set_tracks_components()
    {
        let mut dsu = DisjointSet::new(5);
        assert!(dsu.union(0, 1));
        assert!(dsu.union(3, 4));
        assert!(!dsu.union(1, 0));
        assert_eq!(dsu.components(), vec![vec![0, 1], vec![2], vec![3, 4]]);
    }

    #[test]
    fn chain_merging_is_transitive()
    {
        let items = vec![item(0, 10), item(1, 30), item(2, 20)];
        let m = matrix(3, &[(0, 1, 0.95), (1, 2, 0.93), (0, 2, 0.50)]);
        let out = deduplicate(&items, &m, 0.92).unwrap();

        assert_eq!(out.unique.len(), 1);
        assert_eq!(out.unique[0].id, 1);
        assert_eq!(out.duplicate_of.get(&0), Some(&1));
        assert_eq!(out.duplicate_of.get(&2), Some(&1));
    }

    #[test]
    fn equal_tokens_keep_lowest_id()
    {
        let items = vec![item(7, 12), item(3, 12)];
        let m = matrix(2, &[(0, 1, 0.99)]);
        for _ in 0..5
        {
            let out = deduplicate(&items, &m, 0.92).unwrap();
            assert_eq!(out.unique[0].id, 3);
            assert!(out.is_duplicate(7));
        }
    }

    #[test]
    fn threshold_is_inclusive()
    {
        let items = vec![item(0, 5), item(1, 4)];
        let m = matrix(2, &[(0, 1, 0.92)]);
        let out = deduplicate(&items, &m, 0.92).unwrap();
        assert_eq!(out.unique.len(), 1);
    }

    #[test]
    fn trivial_inputs_pass_through()
    {
        let empty = deduplicate(&[], &SimilarityMatrix::identity(0), 0.5).unwrap();
        assert!(empty.unique.is_empty());

        let one = vec![item(0, 1)];
        let out = deduplicate(&one, &SimilarityMatrix::identity(1), 0.0).unwrap();
        assert_eq!(out.unique, one);
        assert_eq!(out.duplicate_count(), 0);
    }

    #[test]
    fn dimension_mismatch_is_reported()
    {
        let items = vec![item(0, 1), item(1, 1)];
        let err = deduplicate(&items, &SimilarityMatrix::identity(3), 0.9).unwrap_err();
        assert_eq!(err, EngineError::DimensionMismatch { items: 2, dim: 3 });
    }

    #[test]
    fn flagged_marks_only_non_representatives()
    {
        let items = vec![item(0, 9), item(1, 3), item(2, 4)];
        let m = matrix(3, &[(0, 1, 0.97)]);
        let out = deduplicate(&items, &m, 0.92).unwrap();
        let flagged = out.flagged(&items);

        assert!(!flagged[0].is_duplicate);
        assert!(flagged[1].is_duplicate);
        assert!(!flagged[2].is_duplicate);
        // input records untouched
        assert!(!items[1].is_duplicate);
    }
}
