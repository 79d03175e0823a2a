//! Index buffer for the triangle soup.

use crate::error::{LatticeError, Result};

/// `0, 1, …, n-1`: the soup is already laid out triangle by triangle, so the
/// index buffer is an identity permutation.
pub fn identity_indices(n: usize) -> Result<Vec<u32>> {
    if n > u32::MAX as usize + 1 {
        return Err(LatticeError::Resource(format!(
            "{n} vertices do not fit a 32-bit index buffer"
        )));
    }

    let mut indices = Vec::new();
    indices
        .try_reserve_exact(n)
        .map_err(|source| LatticeError::Allocation { what: "indices", len: n, source })?;
    indices.extend((0..n).map(|i| i as u32));
    Ok(indices)
}
