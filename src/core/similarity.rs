//! Pairwise similarity matrices and the providers that build them.
//!
//! The engine never computes embeddings itself: it consumes a square,
//! symmetric [`SimilarityMatrix`]. Two distinct matrices are used per run,
//! one over items (dedup, clustering) and one over group summaries (merge
//! detection). [`LexicalProvider`] is the built-in deterministic provider;
//! model-backed providers plug in through [`SimilarityProvider`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;

use crate::core::error::{EngineError, EngineResult};

/// Tolerance for the symmetry check on float matrices
const SYMMETRY_EPSILON: f64 = 1e-6;

/// Alphanumeric runs; apostrophes and symbols split tokens
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("token regex compiles"));

/// Square, symmetric matrix of pairwise similarities
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix
{
    /// Dimension (row and column count)
    n: usize,

    /// Row-major values, `n * n` entries
    values: Vec<f64>,
}

impl SimilarityMatrix
{
    /// Build from nested rows, validating shape and symmetry
    pub fn from_rows(rows: Vec<Vec<f64>>) -> EngineResult<Self>
    {
        let n = rows.len();
        let mut values = Vec::with_capacity(n * n);

        for (row, r) in rows
            .into_iter()
            .enumerate()
        {
            if r.len() != n
            {
                return Err(EngineError::NotSquare { rows: n, row, cols: r.len() });
            }
            values.extend(r);
        }

        let m = Self { n, values };

        for i in 0..n
        {
            for j in (i + 1)..n
            {
                let (a, b) = (m.get(i, j), m.get(j, i));
                if (a - b).abs() > SYMMETRY_EPSILON
                {
                    return Err(EngineError::Asymmetric { i, j, a, b });
                }
            }
        }

        Ok(m)
    }

    /// Identity matrix: every item only similar to itself
    pub fn identity(n: usize) -> Self
    {
        let mut values = vec![0.0; n * n];
        for i in 0..n
        {
            values[i * n + i] = 1.0;
        }
        Self { n, values }
    }

    /// Dimension of the matrix
    pub fn len(&self) -> usize
    {
        self.n
    }

    pub fn is_empty(&self) -> bool
    {
        self.n == 0
    }

    /// Value at (i, j)
    #[inline]
    pub fn get(
        &self,
        i: usize,
        j: usize,
    ) -> f64
    {
        self.values[i * self.n + j]
    }

    /// Row view at index `i`
    pub fn row(
        &self,
        i: usize,
    ) -> &[f64]
    {
        &self.values[i * self.n..(i + 1) * self.n]
    }

    /// Submatrix over the given indices, in the given order
    pub fn select(
        &self,
        indices: &[usize],
    ) -> Self
    {
        let n = indices.len();
        let mut values = Vec::with_capacity(n * n);
        for &i in indices
        {
            for &j in indices
            {
                values.push(self.get(i, j));
            }
        }
        Self { n, values }
    }

    /// Affinity view: values clipped to [0, 1] with the diagonal forced to 1
    pub fn clipped_affinity(&self) -> Self
    {
        let n = self.n;
        let mut values: Vec<f64> = self
            .values
            .iter()
            .map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) })
            .collect();
        for i in 0..n
        {
            values[i * n + i] = 1.0;
        }
        Self { n, values }
    }

    /// Distance view `1 - value`, used with an affinity for silhouette scoring
    pub fn complement(&self) -> Self
    {
        Self {
            n: self.n,
            values: self
                .values
                .iter()
                .map(|v| 1.0 - v)
                .collect(),
        }
    }
}

/// External collaborator turning texts into a similarity matrix.
///
/// Implementations must be deterministic for identical input order.
pub trait SimilarityProvider
{
    /// Pairwise similarity for `texts` in order; values conceptually in [-1, 1]
    fn similarity(
        &self,
        texts: &[&str],
    ) -> SimilarityMatrix;

    /// Per-text vectors for providers that work from embeddings
    fn embeddings(
        &self,
        _texts: &[&str],
    ) -> Option<Vec<Vec<f32>>>
    {
        None
    }
}

/// Cosine similarity over dense vectors
pub fn cosine(
    a: &[f32],
    b: &[f32],
) -> f64
{
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;

    for (x, y) in a
        .iter()
        .zip(b.iter())
    {
        dot += f64::from(*x) * f64::from(*y);
        na += f64::from(*x) * f64::from(*x);
        nb += f64::from(*y) * f64::from(*y);
    }

    if na == 0.0 || nb == 0.0
    {
        return 0.0;
    }

    dot / (na.sqrt() * nb.sqrt())
}

/// Pairwise cosine matrix for precomputed embeddings
pub fn cosine_matrix(embeddings: &[Vec<f32>]) -> SimilarityMatrix
{
    let n = embeddings.len();
    let mut values = vec![0.0; n * n];

    for i in 0..n
    {
        values[i * n + i] = 1.0;
        for j in (i + 1)..n
        {
            let s = cosine(&embeddings[i], &embeddings[j]);
            values[i * n + j] = s;
            values[j * n + i] = s;
        }
    }

    SimilarityMatrix { n, values }
}

/// Sparse TF-IDF vector: `(term id, weight)` by ascending id, with its norm
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermVector
{
    weights: Vec<(usize, f64)>,
    norm: f64,
}

impl TermVector
{
    fn new(weights: Vec<(usize, f64)>) -> Self
    {
        let norm = weights
            .iter()
            .map(|(_, w)| w * w)
            .sum::<f64>()
            .sqrt();
        Self { weights, norm }
    }

    /// Distinct terms carried
    pub fn len(&self) -> usize
    {
        self.weights
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.weights
            .is_empty()
    }

    /// Cosine similarity by merge-joining the sorted term ids
    pub fn cosine(
        &self,
        other: &Self,
    ) -> f64
    {
        if self.norm == 0.0 || other.norm == 0.0
        {
            return 0.0;
        }

        let (a, b) = (&self.weights, &other.weights);
        let (mut i, mut j) = (0, 0);
        let mut dot = 0.0;
        while i < a.len() && j < b.len()
        {
            match a[i]
                .0
                .cmp(&b[j].0)
            {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal =>
                {
                    dot += a[i].1 * b[j].1;
                    i += 1;
                    j += 1;
                }
            }
        }

        dot / (self.norm * other.norm)
    }
}

/// Deterministic TF-IDF cosine provider over lowercase word tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalProvider;

impl LexicalProvider
{
    pub fn new() -> Self
    {
        Self
    }

    /// Sparse TF-IDF vectors over the joint vocabulary of `texts`.
    ///
    /// Term ids follow first appearance, so vectors are stable for a stable
    /// input order.
    pub fn vectorize(
        &self,
        texts: &[&str],
    ) -> Vec<TermVector>
    {
        let mut vocab: HashMap<String, usize> = HashMap::new();

        // Term frequencies per document, keyed by term id
        let counts: Vec<BTreeMap<usize, usize>> = texts
            .iter()
            .map(|t| {
                let mut tf = BTreeMap::new();
                for m in TOKEN_RE.find_iter(t)
                {
                    let next = vocab.len();
                    let id = *vocab
                        .entry(
                            m.as_str()
                                .to_lowercase(),
                        )
                        .or_insert(next);
                    *tf.entry(id)
                        .or_insert(0) += 1;
                }
                tf
            })
            .collect();

        let mut df = vec![0usize; vocab.len()];
        for tf in &counts
        {
            for &id in tf.keys()
            {
                df[id] += 1;
            }
        }

        // Smoothed idf keeps terms shared by every document non-zero
        let n_docs = texts.len() as f64;
        let idf: Vec<f64> = df
            .iter()
            .map(|&d| ((1.0 + n_docs) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        counts
            .into_iter()
            .map(|tf| {
                TermVector::new(
                    tf.into_iter()
                        .map(|(id, c)| (id, c as f64 * idf[id]))
                        .collect(),
                )
            })
            .collect()
    }
}

impl SimilarityProvider for LexicalProvider
{
    fn similarity(
        &self,
        texts: &[&str],
    ) -> SimilarityMatrix
    {
        let vectors = self.vectorize(texts);
        let n = vectors.len();

        let upper: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                vectors[i + 1..]
                    .iter()
                    .map(|v| vectors[i].cosine(v))
                    .collect()
            })
            .collect();

        let mut values = vec![0.0; n * n];
        for (i, row) in upper
            .into_iter()
            .enumerate()
        {
            values[i * n + i] = 1.0;
            for (offset, s) in row
                .into_iter()
                .enumerate()
            {
                let j = i + 1 + offset;
                values[i * n + j] = s;
                values[j * n + i] = s;
            }
        }

        SimilarityMatrix { n, values }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn rejects_non_square()
    {
        let err = SimilarityMatrix::from_rows(vec![vec![1.0, 0.5], vec![0.5]]).unwrap_err();
        assert!(matches!(err, EngineError::NotSquare { row: 1, cols: 1, .. }));
    }

    #[test]
    fn rejects_asymmetric()
    {
        let err = SimilarityMatrix::from_rows(vec![vec![1.0, 0.2], vec![0.7, 1.0]]).unwrap_err();
        assert!(matches!(err, EngineError::Asymmetric { i: 0, j: 1, .. }));
    }

    #[test]
    fn clipped_affinity_forces_unit_diagonal()
    {
        let m = SimilarityMatrix::from_rows(vec![vec![0.3, -0.4], vec![-0.4, 0.9]]).unwrap();
        let a = m.clipped_affinity();
        assert_eq!(a.get(0, 0), 1.0);
        assert_eq!(a.get(1, 1), 1.0);
        assert_eq!(a.get(0, 1), 0.0);
    }

    #[test]
    fn select_reorders_rows_and_columns()
    {
        let m = SimilarityMatrix::from_rows(vec![
            vec![1.0, 0.1, 0.2],
            vec![0.1, 1.0, 0.3],
            vec![0.2, 0.3, 1.0],
        ])
        .unwrap();
        let s = m.select(&[2, 0]);
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(0, 1), 0.2);
        assert_eq!(s.get(1, 0), 0.2);
    }

    #[test]
    fn lexical_identical_texts_score_one()
    {
        let p = LexicalProvider::new();
        let m = p.similarity(&["Rust ownership rules", "rust OWNERSHIP rules", "tomato soup"]);
        assert!((m.get(0, 1) - 1.0).abs() < 1e-6);
        assert!(m.get(0, 2) < 0.01);
        assert_eq!(m.get(2, 2), 1.0);
    }

    #[test]
    fn shared_term_weighting_follows_smoothed_idf()
    {
        let p = LexicalProvider::new();
        let m = p.similarity(&["alpha beta", "alpha gamma"]);
        // idf(alpha) = 1, idf(beta) = idf(gamma) = ln(3 / 2) + 1
        let w = 1.5f64.ln() + 1.0;
        assert!((m.get(0, 1) - 1.0 / (1.0 + w * w)).abs() < 1e-9);
    }

    #[test]
    fn vectors_hold_only_their_own_terms()
    {
        let p = LexicalProvider::new();
        let v = p.vectorize(&["one two two", "three four five six", ""]);
        assert_eq!(v[0].len(), 2);
        assert_eq!(v[1].len(), 4);
        assert!(v[2].is_empty());
        assert_eq!(v[0].cosine(&v[1]), 0.0);
    }

    #[test]
    fn empty_text_has_zero_similarity()
    {
        let p = LexicalProvider::new();
        let m = p.similarity(&["", "something"]);
        assert_eq!(m.get(0, 1), 0.0);
    }
}
