use crate::config::Resolution;
use std::collections::TryReserveError;

/// Errors produced while generating or committing lattice geometry.
///
/// Configuration problems never show up here: out-of-range values are clamped
/// when they are assigned (see [`crate::config::LatticeConfig`]).
#[derive(Debug, thiserror::Error)]
pub enum LatticeError {
    /// A per-tick scratch buffer or a persistent mesh buffer could not be allocated.
    #[error("failed to allocate {what} ({len} elements)")]
    Allocation {
        what: &'static str,
        len: usize,
        #[source]
        source: TryReserveError,
    },

    /// The buffer lengths a resolution implies do not fit in `usize`.
    #[error("{what} count overflows for a {resolution} lattice")]
    Overflow {
        what: &'static str,
        resolution: Resolution,
    },

    /// The worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A scheduled job panicked or was dropped before publishing its result.
    #[error("job '{0}' did not complete")]
    JobFailed(&'static str),

    /// Buffer lengths disagree with the committed resolution.
    #[error("malformed pipeline: {what} has {actual} elements, expected {expected}")]
    Malformed {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The mesh resource rejected an upload.
    #[error("mesh resource error: {0}")]
    Resource(String),
}

pub type Result<T> = std::result::Result<T, LatticeError>;

/// Allocates a zero-filled vector of `len` elements, reporting failure instead of aborting.
pub(crate) fn try_zeroed_vec<T: bytemuck::Zeroable + Clone>(
    what: &'static str,
    len: usize,
) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|source| LatticeError::Allocation { what, len, source })?;
    buf.resize(len, T::zeroed());
    Ok(buf)
}
