use thiserror::Error;

/// Error taxonomy for a single chain, per spec.md §7.
///
/// All of these abort the *chain* they occur in; they never propagate to or
/// affect sibling chains running with a different K/β/replicate (spec.md
/// §5, §7).
#[derive(Error, Debug)]
pub enum ChainError {
    /// Inconsistent K range, non-positive λ, α outside (0,10], or a
    /// ploidy/J[l] ≤ 0. Detected before chain start.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A numeric hazard that the sampler cannot recover from in-place, e.g.
    /// a categorical weight vector summing to zero.
    #[error("numeric hazard: {0}")]
    Numeric(String),

    /// The Hungarian solver failed to return a valid permutation.
    #[error("label alignment failed: {0}")]
    Hungarian(String),

    /// An output stream (likelihood trace, posterior grouping) failed to
    /// write or flush.
    #[error("output error: {0}")]
    Output(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> ChainError {
        ChainError::Output(err.to_string())
    }
}

impl From<csv::Error> for ChainError {
    fn from(err: csv::Error) -> ChainError {
        ChainError::Output(err.to_string())
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
