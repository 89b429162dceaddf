/// Index-convention translation between the host and the engine.
///
/// The host counts from 1 (inclusive); the engine counts from 0. Exactly two
/// conversions exist: a bounds-checked −1 shift on indices flowing inward,
/// and a +1 shift on index vectors flowing outward. No unit or ordering
/// adaptation happens here; that is engine territory.

/// Convert one host-side index to the engine's 0-based convention.
///
/// `limit` is the inclusive upper bound in host terms (for a basis-function
/// index, the current nbasis). Non-integral and out-of-range values are
/// rejected with a message ready for an argument error; the engine is never
/// reached with a bad index.
pub fn index_to_engine(v: f64, limit: usize, what: &str) -> Result<usize, String> {
    if !v.is_finite() || v.fract() != 0.0 {
        return Err(format!("{what} index must be an integer, got {v}"));
    }
    if v < 1.0 || v > limit as f64 {
        return Err(format!("{what} index {v} is out of range [1, {limit}]"));
    }
    Ok(v as usize - 1)
}

/// Shift a vector of engine-side indices to the host's 1-based convention.
pub fn indices_to_host(indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| (i + 1) as f64).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inward_shift() {
        assert_eq!(index_to_engine(1.0, 7, "basis function"), Ok(0));
        assert_eq!(index_to_engine(7.0, 7, "basis function"), Ok(6));
    }

    #[test]
    fn test_inward_bounds() {
        assert!(index_to_engine(0.0, 7, "basis function").is_err());
        assert!(index_to_engine(-1.0, 7, "basis function").is_err());
        assert!(index_to_engine(8.0, 7, "basis function").is_err());
    }

    #[test]
    fn test_inward_rejects_non_integers() {
        assert!(index_to_engine(1.5, 7, "basis function").is_err());
        assert!(index_to_engine(f64::NAN, 7, "basis function").is_err());
        assert!(index_to_engine(f64::INFINITY, 7, "basis function").is_err());
    }

    #[test]
    fn test_error_names_the_index_kind() {
        let err = index_to_engine(99.0, 7, "basis function").unwrap_err();
        assert!(err.contains("basis function"));
        assert!(err.contains("[1, 7]"));
    }

    #[test]
    fn test_outward_shift() {
        assert_eq!(indices_to_host(&[0, 1, 4]), vec![1.0, 2.0, 5.0]);
        assert!(indices_to_host(&[]).is_empty());
    }
}
