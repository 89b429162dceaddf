/// Layout conversion between host (column-major) and engine (row-major)
/// dense arrays.
///
/// The rules, in both directions:
///   - Element (i, j) is the same logical element in either view; only the
///     physical stride order differs. Conversion is an O(rows*cols) copy.
///   - Symmetric engine matrices get a fast path: their full row-major
///     storage already reads back identically in column-major order, so a
///     raw linear copy suffices. The symmetry that justifies the shortcut is
///     asserted, never assumed.
///   - Stacked per-atom results become a rank-3 host array; fully
///     materialized four-index buffers become a rank-4 host array copied
///     verbatim (they are flat scalar blocks, not row/column matrices).
///
/// Any disagreement between declared dimensions and available data is a
/// `ShapeError` — never a partial or garbled copy.
use std::fmt;

use super::host::HostArray;
use super::matrix::Matrix;

/// Tolerance used when asserting that a matrix routed through the symmetric
/// fast path really is symmetric.
const SYMMETRY_TOL: f64 = 1e-10;

// ── Error type ────────────────────────────────────────────────────────────

/// Dimension mismatch discovered during a layout conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeError {
    pub msg: String,
}

impl ShapeError {
    fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape error: {}", self.msg)
    }
}

impl std::error::Error for ShapeError {}

// ── Host → engine ─────────────────────────────────────────────────────────

/// Convert a host column-major matrix to an engine row-major matrix.
///
/// Logical row/column identity is preserved; only the storage order changes.
/// The input must be rank 2.
pub fn to_engine(host: &HostArray) -> Result<Matrix, ShapeError> {
    if host.dims().len() != 2 {
        return Err(ShapeError::new(format!(
            "expected a 2-D array, got rank {}",
            host.dims().len()
        )));
    }
    let (rows, cols) = (host.rows(), host.cols());
    let mut m = Matrix::zeros(rows, cols);
    for j in 0..cols {
        for i in 0..rows {
            m.set(i, j, host.get2(i, j));
        }
    }
    Ok(m)
}

// ── Engine → host ─────────────────────────────────────────────────────────

/// Convert an engine row-major matrix to a freshly allocated host
/// column-major matrix. Inverse of `to_engine`.
pub fn to_host(m: &Matrix) -> HostArray {
    let (rows, cols) = (m.rows(), m.cols());
    let mut data = Vec::with_capacity(rows * cols);
    for j in 0..cols {
        for i in 0..rows {
            data.push(m.get(i, j));
        }
    }
    HostArray::matrix(rows, cols, data)
}

/// Convert a symmetric engine matrix to host layout via a raw linear copy.
///
/// A symmetric matrix equals its own transpose, so its row-major storage is
/// byte-for-byte a valid column-major storage of the same logical matrix.
/// Fails if the matrix is not square or not symmetric within tolerance;
/// handing a general matrix to this path would silently transpose it.
pub fn to_host_symmetric_full(m: &Matrix) -> Result<HostArray, ShapeError> {
    if !m.is_square() {
        return Err(ShapeError::new(format!(
            "symmetric output requires a square matrix, got {}x{}",
            m.rows(),
            m.cols()
        )));
    }
    if !m.is_symmetric(SYMMETRY_TOL) {
        return Err(ShapeError::new(format!(
            "matrix {0}x{0} is not symmetric within {SYMMETRY_TOL:e}",
            m.rows()
        )));
    }
    Ok(HostArray::matrix(m.rows(), m.cols(), m.as_slice().to_vec()))
}

/// Convert an engine vector to a 1×n host row vector.
pub fn to_host_vector(v: &[f64]) -> HostArray {
    HostArray::row_vector(v.to_vec())
}

// ── Tensor packing ────────────────────────────────────────────────────────

/// Stack n equally shaped engine matrices into a rank-3 host array of
/// dimensions [rows, cols, n]. Each slice is transposed into host layout by
/// the same rule as `to_host`.
pub fn pack_by_leading_index(slices: &[Matrix]) -> Result<HostArray, ShapeError> {
    let first = slices
        .first()
        .ok_or_else(|| ShapeError::new("cannot stack an empty slice list"))?;
    let (rows, cols) = (first.rows(), first.cols());
    for (idx, s) in slices.iter().enumerate() {
        if s.rows() != rows || s.cols() != cols {
            return Err(ShapeError::new(format!(
                "slice {idx} is {}x{} but slice 0 is {rows}x{cols}",
                s.rows(),
                s.cols()
            )));
        }
    }

    let mut data = Vec::with_capacity(rows * cols * slices.len());
    for s in slices {
        for j in 0..cols {
            for i in 0..rows {
                data.push(s.get(i, j));
            }
        }
    }
    Ok(HostArray::with_dims(vec![rows, cols, slices.len()], data))
}

/// Wrap a fully materialized four-index buffer as a dim⁴ host array.
///
/// The buffer is a flat scalar block in the engine's documented index order;
/// no transposition is applied. Fails if the length is not exactly dim⁴.
pub fn pack_tensor4_full(flat: Vec<f64>, dim: usize) -> Result<HostArray, ShapeError> {
    let expect = dim * dim * dim * dim;
    if flat.len() != expect {
        return Err(ShapeError::new(format!(
            "four-index buffer has {} elements, expected {dim}^4 = {expect}",
            flat.len()
        )));
    }
    Ok(HostArray::with_dims(vec![dim, dim, dim, dim], flat))
}

// ── Tests ─────────────────────────────────────────────────────────────────
