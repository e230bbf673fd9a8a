//! Typed errors raised by the clustering and pruning engine.
//!
//! Command handlers wrap these in `anyhow` with context; the engine itself
//! only fails on caller mistakes (shape mismatches, impossible bounds).

/// Errors surfaced by engine operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError
{
    /// Similarity matrix rows are not all of the same length as the row count
    #[error("similarity matrix is not square: {rows} rows, row {row} has {cols} columns")]
    NotSquare
    {
        rows: usize,
        row: usize,
        cols: usize,
    },

    /// Matrix entry (i, j) differs from (j, i)
    #[error("similarity matrix is not symmetric at ({i}, {j}): {a} vs {b}")]
    Asymmetric
    {
        i: usize,
        j: usize,
        a: f64,
        b: f64,
    },

    /// Item count does not match the matrix dimension
    #[error("{items} items supplied for a {dim}x{dim} similarity matrix")]
    DimensionMismatch
    {
        items: usize,
        dim: usize,
    },

    /// Cluster count bounds cannot be satisfied
    #[error("invalid cluster bounds: min_k={min_k}, max_k={max_k}")]
    InvalidBounds
    {
        min_k: usize,
        max_k: usize,
    },

    /// Spectral partitioning could not produce a labelling
    #[error("spectral partition failed for k={k}: {reason}")]
    Partition
    {
        k: usize,
        reason: String,
    },
}

/// Convenience alias for engine results
pub type EngineResult<T> = Result<T, EngineError>;
