//! Spectral partitioning over a precomputed affinity matrix.
//!
//! # Algorithm
//!
//! 1. Normalise the affinity `M = D^-1/2 A D^-1/2` (D = row degrees)
//! 2. Compute the leading `rank` eigenpairs of `M` once: dense Jacobi when
//!    the matrix is small, otherwise Rayleigh-Ritz subspace iteration on the
//!    shifted operator `M + I`
//! 3. For a target k, embed each item as its row of the top-k eigenvectors,
//!    scaled by `D^-1/2`, with a deterministic sign per eigenvector
//! 4. Run seeded k-means++ / Lloyd with several restarts; lowest inertia wins
//!
//! The eigenpairs do not depend on k, so the model-order search computes
//! them once and re-partitions per candidate. All matrices are flat
//! row-major `Vec<f64>`.

use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use tracing::debug;

use crate::core::{
    error::{EngineError, EngineResult},
    similarity::SimilarityMatrix,
};

/// Restarts per k-means run; the lowest-inertia labelling is kept
const N_INIT: usize = 10;

/// Lloyd iteration cap per restart
const MAX_ITER: usize = 300;

/// Jacobi sweep cap before declaring non-convergence
const MAX_SWEEPS: usize = 100;

/// Off-diagonal Frobenius norm below which Jacobi stops
const JACOBI_TOLERANCE: f64 = 1e-12;

/// Extra basis vectors carried by subspace iteration beyond `rank`
const OVERSAMPLE: usize = 8;

/// Subspace iteration cap; the last Ritz pairs are used if reached
const MAX_SUBSPACE_ITER: usize = 300;

/// Residual norm below which a Ritz pair counts as converged
const SUBSPACE_TOLERANCE: f64 = 1e-6;

/// Seed of the starting block; fixed so the embedding is reproducible
const SUBSPACE_SEED: u64 = 0x5eed;

/// Column norm under which Gram-Schmidt treats a vector as dependent
const DEPENDENT_NORM: f64 = 1e-10;

/// Leading eigenvectors of the normalised affinity, by descending eigenvalue
#[derive(Debug, Clone)]
pub struct SpectralEmbedding
{
    n: usize,

    /// Number of stored eigenpairs
    rank: usize,

    /// Eigenvalues, descending
    eigenvalues: Vec<f64>,

    /// Row-major `n x rank`: column c is the c-th eigenvector
    vectors: Vec<f64>,

    /// `1 / sqrt(degree)` per item
    inv_sqrt_degree: Vec<f64>,
}

impl SpectralEmbedding
{
    /// Leading `rank` eigenpairs of a clipped affinity matrix (non-negative,
    /// unit diagonal). `rank` is clipped to the item count.
    pub fn compute(
        affinity: &SimilarityMatrix,
        rank: usize,
    ) -> EngineResult<Self>
    {
        let n = affinity.len();
        if n == 0
        {
            return Err(EngineError::Partition { k: 0, reason: "empty affinity".into() });
        }
        let rank = rank.clamp(1, n);

        let inv_sqrt_degree: Vec<f64> = (0..n)
            .map(|i| {
                let d: f64 = affinity
                    .row(i)
                    .iter()
                    .sum();
                if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 }
            })
            .collect();

        let mut m = vec![0.0; n * n];
        for (i, row) in m
            .chunks_mut(n)
            .enumerate()
        {
            let aff = affinity.row(i);
            for (j, v) in row
                .iter_mut()
                .enumerate()
            {
                *v = inv_sqrt_degree[i] * aff[j] * inv_sqrt_degree[j];
            }
        }

        let width = (rank + OVERSAMPLE).min(n);
        let (eigenvalues, mut vectors) = if width == n
        {
            leading_dense(m, n, rank)?
        }
        else
        {
            leading_subspace(&m, n, rank, width)?
        };

        for c in 0..rank
        {
            flip_sign_deterministic(&mut vectors, rank, c);
        }

        debug!(n, rank, leading = ?&eigenvalues[..rank.min(4)], "spectral embedding");
        Ok(Self { n, rank, eigenvalues, vectors, inv_sqrt_degree })
    }

    pub fn len(&self) -> usize
    {
        self.n
    }

    pub fn is_empty(&self) -> bool
    {
        self.n == 0
    }

    /// Largest k this embedding can partition into
    pub fn rank(&self) -> usize
    {
        self.rank
    }

    pub(crate) fn eigenvalues(&self) -> &[f64]
    {
        &self.eigenvalues
    }

    /// Row embedding using the leading `k` eigenvectors
    fn embed(
        &self,
        k: usize,
    ) -> Vec<Vec<f64>>
    {
        (0..self.n)
            .map(|i| {
                self.vectors[i * self.rank..i * self.rank + k]
                    .iter()
                    .map(|v| v * self.inv_sqrt_degree[i])
                    .collect()
            })
            .collect()
    }

    /// Partition into exactly `k` labels (canonicalised to first-appearance order)
    pub fn partition(
        &self,
        k: usize,
        seed: u64,
    ) -> EngineResult<Vec<usize>>
    {
        if k == 0 || k > self.n
        {
            return Err(EngineError::Partition {
                k,
                reason: format!("k must be in 1..={}", self.n),
            });
        }
        if k > self.rank
        {
            return Err(EngineError::Partition {
                k,
                reason: format!("only {} eigenvectors were computed", self.rank),
            });
        }

        let points = self.embed(k);
        let labels = kmeans(&points, k, seed);

        Ok(canonicalize(&labels))
    }
}

/// Column order by descending eigenvalue; index breaks ties
fn descending(values: &[f64]) -> Vec<usize>
{
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .total_cmp(&values[a])
            .then(a.cmp(&b))
    });
    order
}

/// Copy the given columns of a row-major `rows x cols` matrix
fn take_columns(
    a: &[f64],
    cols: usize,
    picked: &[usize],
) -> Vec<f64>
{
    a.chunks(cols)
        .flat_map(|row| {
            picked
                .iter()
                .map(move |&c| row[c])
        })
        .collect()
}

/// All eigenpairs by Jacobi, keeping the leading `rank`
fn leading_dense(
    m: Vec<f64>,
    n: usize,
    rank: usize,
) -> EngineResult<(Vec<f64>, Vec<f64>)>
{
    let (values, vecs) = jacobi_eigen(m, n)?;
    let order = descending(&values);
    let picked = &order[..rank];

    let eigenvalues = picked
        .iter()
        .map(|&c| values[c])
        .collect();
    Ok((eigenvalues, take_columns(&vecs, n, picked)))
}

/// Leading `rank` eigenpairs by subspace iteration with a `width`-column block.
///
/// Iterates on `M + I`, whose spectrum lies in [0, 2], so the largest
/// algebraic eigenvalues of `M` dominate.
fn leading_subspace(
    m: &[f64],
    n: usize,
    rank: usize,
    width: usize,
) -> EngineResult<(Vec<f64>, Vec<f64>)>
{
    let mut shifted = m.to_vec();
    for i in 0..n
    {
        shifted[i * n + i] += 1.0;
    }

    let mut rng = StdRng::seed_from_u64(SUBSPACE_SEED);
    let mut q: Vec<f64> = (0..n * width)
        .map(|_| rng.random::<f64>() - 0.5)
        .collect();
    orthonormalize(&mut q, n, width, &mut rng);

    let mut last = None;
    for iter in 0..MAX_SUBSPACE_ITER
    {
        let z = multiply(&shifted, n, &q, width);

        // Rayleigh-Ritz on span(Q)
        let h = gram(&q, &z, n, width);
        let (theta, w) = jacobi_eigen(h, width)?;
        let order = descending(&theta);
        let w = take_columns(&w, width, &order);
        let theta: Vec<f64> = order
            .iter()
            .map(|&c| theta[c])
            .collect();

        let x = rotate(&q, &w, n, width);
        let sx = rotate(&z, &w, n, width);

        let residual = (0..rank)
            .map(|c| {
                (0..n)
                    .map(|i| {
                        let r = sx[i * width + c] - theta[c] * x[i * width + c];
                        r * r
                    })
                    .sum::<f64>()
                    .sqrt()
            })
            .fold(0.0f64, f64::max);

        let picked: Vec<usize> = (0..rank).collect();
        let pairs = (
            theta[..rank]
                .iter()
                .map(|t| t - 1.0)
                .collect::<Vec<_>>(),
            take_columns(&x, width, &picked),
        );

        if residual < SUBSPACE_TOLERANCE
        {
            debug!(iterations = iter + 1, "subspace iteration converged");
            return Ok(pairs);
        }
        last = Some((residual, pairs));

        q = sx;
        orthonormalize(&mut q, n, width, &mut rng);
    }

    let Some((residual, pairs)) = last
    else
    {
        return Err(EngineError::Partition { k: 0, reason: "no subspace iterations ran".into() });
    };
    debug!(residual, "subspace iteration stopped before convergence");
    Ok(pairs)
}

/// `A * B` for row-major `n x n` A and `n x width` B, rows in parallel
fn multiply(
    a: &[f64],
    n: usize,
    b: &[f64],
    width: usize,
) -> Vec<f64>
{
    let mut out = vec![0.0; n * width];
    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(i, row)| {
            for (j, &aij) in a[i * n..(i + 1) * n]
                .iter()
                .enumerate()
            {
                if aij == 0.0
                {
                    continue;
                }
                for (o, &bj) in row
                    .iter_mut()
                    .zip(&b[j * width..(j + 1) * width])
                {
                    *o += aij * bj;
                }
            }
        });
    out
}

/// Symmetrised `Q^T Z` for row-major `n x width` Q and Z
fn gram(
    q: &[f64],
    z: &[f64],
    n: usize,
    width: usize,
) -> Vec<f64>
{
    let mut h = vec![0.0; width * width];
    for i in 0..n
    {
        let qi = &q[i * width..(i + 1) * width];
        let zi = &z[i * width..(i + 1) * width];
        for (r, &qr) in qi
            .iter()
            .enumerate()
        {
            for (c, &zc) in zi
                .iter()
                .enumerate()
            {
                h[r * width + c] += qr * zc;
            }
        }
    }
    for r in 0..width
    {
        for c in (r + 1)..width
        {
            let avg = 0.5 * (h[r * width + c] + h[c * width + r]);
            h[r * width + c] = avg;
            h[c * width + r] = avg;
        }
    }
    h
}

/// `A * W` for row-major `n x width` A and `width x width` W
fn rotate(
    a: &[f64],
    w: &[f64],
    n: usize,
    width: usize,
) -> Vec<f64>
{
    let mut out = vec![0.0; n * width];
    for i in 0..n
    {
        let ai = &a[i * width..(i + 1) * width];
        let oi = &mut out[i * width..(i + 1) * width];
        for (r, &ar) in ai
            .iter()
            .enumerate()
        {
            for (o, &wr) in oi
                .iter_mut()
                .zip(&w[r * width..(r + 1) * width])
            {
                *o += ar * wr;
            }
        }
    }
    out
}

/// Modified Gram-Schmidt over the columns of a row-major `n x width` block.
///
/// Two projection passes per column; a dependent column is replaced by a
/// fresh random vector.
fn orthonormalize(
    q: &mut [f64],
    n: usize,
    width: usize,
    rng: &mut StdRng,
)
{
    for c in 0..width
    {
        for _attempt in 0..3
        {
            for _pass in 0..2
            {
                for prev in 0..c
                {
                    let dot: f64 = (0..n)
                        .map(|i| q[i * width + c] * q[i * width + prev])
                        .sum();
                    for i in 0..n
                    {
                        q[i * width + c] -= dot * q[i * width + prev];
                    }
                }
            }

            let norm = (0..n)
                .map(|i| q[i * width + c] * q[i * width + c])
                .sum::<f64>()
                .sqrt();
            if norm > DEPENDENT_NORM
            {
                for i in 0..n
                {
                    q[i * width + c] /= norm;
                }
                break;
            }
            for i in 0..n
            {
                q[i * width + c] = rng.random::<f64>() - 0.5;
            }
        }
    }
}

/// Make the largest-magnitude component of column `c` positive
fn flip_sign_deterministic(
    v: &mut [f64],
    cols: usize,
    c: usize,
)
{
    let mut pivot = 0.0f64;
    for row in v.chunks(cols)
    {
        if row[c].abs() > pivot.abs()
        {
            pivot = row[c];
        }
    }
    if pivot < 0.0
    {
        for row in v.chunks_mut(cols)
        {
            row[c] = -row[c];
        }
    }
}

/// Cyclic Jacobi eigendecomposition of a symmetric row-major `n x n` matrix.
///
/// Returns `(eigenvalues, eigenvectors)` with eigenvectors stored as columns
/// of the returned row-major matrix.
fn jacobi_eigen(
    mut a: Vec<f64>,
    n: usize,
) -> EngineResult<(Vec<f64>, Vec<f64>)>
{
    let mut v = vec![0.0; n * n];
    for i in 0..n
    {
        v[i * n + i] = 1.0;
    }

    for _ in 0..MAX_SWEEPS
    {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .filter(|(i, j)| i != j)
            .map(|(i, j)| a[i * n + j] * a[i * n + j])
            .sum();

        if off.sqrt() < JACOBI_TOLERANCE
        {
            let values = (0..n)
                .map(|i| a[i * n + i])
                .collect();
            return Ok((values, v));
        }

        for p in 0..n
        {
            for q in (p + 1)..n
            {
                let apq = a[p * n + q];
                if apq.abs() < f64::MIN_POSITIVE
                {
                    continue;
                }

                let theta = (a[q * n + q] - a[p * n + p]) / (2.0 * apq);
                // signum(0.0) is 1.0, so theta == 0 rotates by 45 degrees
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.chunks_mut(n)
                {
                    let akp = row[p];
                    let akq = row[q];
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..n
                {
                    let apk = a[p * n + k];
                    let aqk = a[q * n + k];
                    a[p * n + k] = c * apk - s * aqk;
                    a[q * n + k] = s * apk + c * aqk;
                }
                for row in v.chunks_mut(n)
                {
                    let vkp = row[p];
                    let vkq = row[q];
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    Err(EngineError::Partition {
        k: 0,
        reason: format!("eigen solver did not converge in {MAX_SWEEPS} sweeps"),
    })
}

#[inline]
fn dist2(
    a: &[f64],
    b: &[f64],
) -> f64
{
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// Index of the nearest centroid; lowest index on ties
fn nearest(
    p: &[f64],
    centroids: &[Vec<f64>],
) -> (usize, f64)
{
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids
        .iter()
        .enumerate()
    {
        let d = dist2(p, centroid);
        if d < best.1
        {
            best = (c, d);
        }
    }
    best
}

/// Seeded k-means with `N_INIT` k-means++ restarts; requires `k <= points.len()`
fn kmeans(
    points: &[Vec<f64>],
    k: usize,
    seed: u64,
) -> Vec<usize>
{
    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<(f64, Vec<usize>)> = None;

    for _ in 0..N_INIT
    {
        let centroids = kmeans_plus_plus_init(points, k, &mut rng);
        let (labels, inertia) = lloyd(points, centroids);

        let better = match &best
        {
            Some((b, _)) => inertia < *b,
            None => true,
        };
        if better
        {
            best = Some((inertia, labels));
        }
    }

    best.map(|(_, l)| l)
        .unwrap_or_else(|| vec![0; points.len()])
}

/// k-means++ seeding: first centre uniform, then proportional to D^2
fn kmeans_plus_plus_init(
    points: &[Vec<f64>],
    k: usize,
    rng: &mut StdRng,
) -> Vec<Vec<f64>>
{
    let n = points.len();
    let mut chosen: Vec<usize> = vec![rng.random_range(0..n)];
    let mut min_d2: Vec<f64> = points
        .iter()
        .map(|p| dist2(p, &points[chosen[0]]))
        .collect();

    while chosen.len() < k
    {
        let total: f64 = min_d2
            .iter()
            .sum();

        let next = if total <= 0.0
        {
            // Every point sits on a centre; take the first unused index
            (0..n)
                .find(|i| !chosen.contains(i))
                .unwrap_or(0)
        }
        else
        {
            let mut target = rng.random::<f64>() * total;
            let mut pick = n - 1;
            for (i, d) in min_d2
                .iter()
                .enumerate()
            {
                if target < *d
                {
                    pick = i;
                    break;
                }
                target -= d;
            }
            pick
        };

        chosen.push(next);
        for (i, p) in points
            .iter()
            .enumerate()
        {
            let d = dist2(p, &points[next]);
            if d < min_d2[i]
            {
                min_d2[i] = d;
            }
        }
    }

    chosen
        .into_iter()
        .map(|i| points[i].clone())
        .collect()
}

/// Lloyd iterations until labels stabilise; returns labels and inertia
fn lloyd(
    points: &[Vec<f64>],
    mut centroids: Vec<Vec<f64>>,
) -> (Vec<usize>, f64)
{
    let k = centroids.len();
    let mut labels: Vec<usize> = Vec::new();

    for _ in 0..MAX_ITER
    {
        let mut next: Vec<usize> = points
            .iter()
            .map(|p| nearest(p, &centroids).0)
            .collect();

        fill_empty_clusters(points, &mut centroids, &mut next, k);

        let stable = next == labels;
        labels = next;
        centroids = recompute_centroids(points, &labels, k, &centroids);

        if stable
        {
            break;
        }
    }

    let inertia = points
        .iter()
        .zip(labels.iter())
        .map(|(p, &l)| dist2(p, &centroids[l]))
        .sum();

    (labels, inertia)
}

/// Move the worst-fitting point of a multi-member cluster into each empty one
fn fill_empty_clusters(
    points: &[Vec<f64>],
    centroids: &mut [Vec<f64>],
    labels: &mut [usize],
    k: usize,
)
{
    loop
    {
        let mut sizes = vec![0usize; k];
        for &l in labels.iter()
        {
            sizes[l] += 1;
        }

        let Some(empty) = sizes
            .iter()
            .position(|&s| s == 0)
        else
        {
            return;
        };

        let donor = (0..points.len())
            .filter(|&i| sizes[labels[i]] > 1)
            .max_by(|&a, &b| {
                let da = dist2(&points[a], &centroids[labels[a]]);
                let db = dist2(&points[b], &centroids[labels[b]]);
                // later index loses ties so the lowest index is moved
                da.total_cmp(&db)
                    .then(b.cmp(&a))
            });

        match donor
        {
            Some(i) =>
            {
                labels[i] = empty;
                centroids[empty] = points[i].clone();
            }
            None => return,
        }
    }
}

fn recompute_centroids(
    points: &[Vec<f64>],
    labels: &[usize],
    k: usize,
    previous: &[Vec<f64>],
) -> Vec<Vec<f64>>
{
    let dim = points
        .first()
        .map(|p| p.len())
        .unwrap_or(0);
    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];

    for (p, &l) in points
        .iter()
        .zip(labels.iter())
    {
        counts[l] += 1;
        for (s, x) in sums[l]
            .iter_mut()
            .zip(p.iter())
        {
            *s += x;
        }
    }

    sums.into_iter()
        .enumerate()
        .map(|(c, mut s)| {
            if counts[c] == 0
            {
                return previous[c].clone();
            }
            for x in s.iter_mut()
            {
                *x /= counts[c] as f64;
            }
            s
        })
        .collect()
}

/// Relabel so labels appear as 0, 1, 2, ... in item order
fn canonicalize(labels: &[usize]) -> Vec<usize>
{
    let mut map: Vec<Option<usize>> = vec![None; labels.iter().max().map_or(0, |m| m + 1)];
    let mut next = 0;
    labels
        .iter()
        .map(|&l| {
            *map[l].get_or_insert_with(|| {
                next += 1;
                next - 1
            })
        })
        .collect()
}
