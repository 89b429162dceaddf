/// Host-side numeric array in column-major storage.
///
/// The calling environment understands exactly one data type: an
/// N-dimensional array of doubles whose leading axis varies fastest
/// (column-major). Scalars are 1×1 arrays, row vectors are 1×n, matrices are
/// r×c, and higher-rank results use a third or fourth axis. Every array the
/// bridge hands to the host is an independently owned `HostArray`; the bridge
/// never exposes a view into engine storage.
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct HostArray {
    dims: Vec<usize>,
    data: Vec<f64>,
}

impl HostArray {
    /// A 1×1 scalar.
    pub fn scalar(v: f64) -> Self {
        Self {
            dims: vec![1, 1],
            data: vec![v],
        }
    }

    /// A 1×n row vector.
    pub fn row_vector(data: Vec<f64>) -> Self {
        let n = data.len();
        Self {
            dims: vec![1, n],
            data,
        }
    }

    /// An r×c matrix from a column-major buffer.
    ///
    /// Panics if the buffer length does not match — host arrays are built by
    /// the codec (or by tests), which size their buffers exactly.
    pub fn matrix(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "column-major buffer length {} does not match {}x{}",
            data.len(),
            rows,
            cols
        );
        Self {
            dims: vec![rows, cols],
            data,
        }
    }

    /// An arbitrary-rank array from explicit dimensions and a column-major
    /// buffer. Panics if the element count disagrees with the dimensions.
    pub fn with_dims(dims: Vec<usize>, data: Vec<f64>) -> Self {
        let expect: usize = dims.iter().product();
        assert_eq!(
            data.len(),
            expect,
            "buffer length {} does not match dims {:?}",
            data.len(),
            dims
        );
        Self { dims, data }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of rows; for any rank this is the extent of the leading axis.
    pub fn rows(&self) -> usize {
        self.dims.first().copied().unwrap_or(0)
    }

    /// Number of columns (extent of the second axis), 1 if rank < 2.
    pub fn cols(&self) -> usize {
        self.dims.get(1).copied().unwrap_or(1)
    }

    pub fn is_scalar(&self) -> bool {
        self.data.len() == 1
    }

    /// The single element of a 1×1 array. `None` for anything larger.
    pub fn scalar_value(&self) -> Option<f64> {
        if self.is_scalar() {
            Some(self.data[0])
        } else {
            None
        }
    }

    /// Element (i, j) of a rank-2 array: `data[i + j * rows]`.
    #[inline(always)]
    pub fn get2(&self, i: usize, j: usize) -> f64 {
        debug_assert_eq!(self.dims.len(), 2);
        self.data[i + j * self.dims[0]]
    }

    /// Raw column-major storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

impl fmt::Display for HostArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        write!(f, "HostArray[{}]", dims.join("x"))?;
        if let Some(v) = self.scalar_value() {
            write!(f, " = {v}")?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
