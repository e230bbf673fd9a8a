//! Silhouette coefficient over a precomputed distance matrix.
//!
//! s(i) = (b(i) - a(i)) / max(a(i), b(i))
//!
//! Where a(i) is the mean distance to the other members of i's group and
//! b(i) is the smallest mean distance to the members of any other group.
//! Points in singleton groups score 0.

use crate::core::similarity::SimilarityMatrix;

/// Silhouette of a single point
pub fn silhouette_coefficient(
    point: usize,
    labels: &[usize],
    distance: &SimilarityMatrix,
    n_labels: usize,
) -> f64
{
    let own = labels[point];

    // Per-label distance sums and counts, excluding the point itself
    let mut sums = vec![0.0f64; n_labels];
    let mut counts = vec![0usize; n_labels];

    for (j, &l) in labels
        .iter()
        .enumerate()
    {
        if j == point
        {
            continue;
        }
        sums[l] += distance.get(point, j);
        counts[l] += 1;
    }

    if counts[own] == 0
    {
        return 0.0;
    }

    let a = sums[own] / counts[own] as f64;
    let b = (0..n_labels)
        .filter(|&l| l != own && counts[l] > 0)
        .map(|l| sums[l] / counts[l] as f64)
        .fold(f64::INFINITY, f64::min);

    if !b.is_finite()
    {
        return 0.0;
    }

    let max_ab = a.max(b);
    if max_ab < f64::EPSILON { 0.0 } else { (b - a) / max_ab }
}

/// Mean silhouette over all points.
///
/// `None` when the labelling is not scorable: fewer than 2 distinct labels
/// or one label per point.
pub fn silhouette_score(
    labels: &[usize],
    distance: &SimilarityMatrix,
) -> Option<f64>
{
    let n = labels.len();
    let n_labels = labels
        .iter()
        .max()
        .map_or(0, |m| m + 1);

    let mut distinct = vec![false; n_labels];
    for &l in labels
    {
        distinct[l] = true;
    }
    let used = distinct
        .iter()
        .filter(|&&d| d)
        .count();

    if used < 2 || used >= n
    {
        return None;
    }

    let sum: f64 = (0..n)
        .map(|i| silhouette_coefficient(i, labels, distance, n_labels))
        .sum();

    Some(sum / n as f64)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn distances(rows: Vec<Vec<f64>>) -> SimilarityMatrix
    {
        SimilarityMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn well_separated_groups_score_high()
    {
        let d = distances(vec![
            vec![0.0, 0.1, 0.9, 0.9],
            vec![0.1, 0.0, 0.9, 0.9],
            vec![0.9, 0.9, 0.0, 0.1],
            vec![0.9, 0.9, 0.1, 0.0],
        ]);
        let s = silhouette_score(&[0, 0, 1, 1], &d).unwrap();
        assert!((s - (0.8 / 0.9)).abs() < 1e-9);
    }

    #[test]
    fn bad_grouping_scores_negative()
    {
        let d = distances(vec![
            vec![0.0, 0.1, 0.9, 0.9],
            vec![0.1, 0.0, 0.9, 0.9],
            vec![0.9, 0.9, 0.0, 0.1],
            vec![0.9, 0.9, 0.1, 0.0],
        ]);
        let s = silhouette_score(&[0, 1, 0, 1], &d).unwrap();
        assert!(s < 0.0);
    }

    #[test]
    fn singleton_point_scores_zero()
    {
        let d = distances(vec![
            vec![0.0, 0.2, 0.8],
            vec![0.2, 0.0, 0.7],
            vec![0.8, 0.7, 0.0],
        ]);
        assert_eq!(silhouette_coefficient(2, &[0, 0, 1], &d, 2), 0.0);
    }

    #[test]
    fn unscorable_labellings()
    {
        let d = distances(vec![vec![0.0, 0.5], vec![0.5, 0.0]]);
        assert_eq!(silhouette_score(&[0, 0], &d), None);
        assert_eq!(silhouette_score(&[0, 1], &d), None);
    }
}
