//! NumPy-style broadcasting that reports failures instead of panicking.

use derest_core::{DerestError, Result};
use ndarray::{ArrayD, ArrayViewD, IxDyn};

/// Shape obtained by broadcasting `a` against `b`.
///
/// Trailing axes are aligned; an axis of length 1 stretches to match the
/// other operand.
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let rank = a.len().max(b.len());
    let (off_a, off_b) = (rank - a.len(), rank - b.len());
    let mut out = Vec::with_capacity(rank);
    for i in 0..rank {
        let da = if i >= off_a { a[i - off_a] } else { 1 };
        let db = if i >= off_b { b[i - off_b] } else { 1 };
        let d = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => return Err(DerestError::shape_mismatch(a.to_vec(), b.to_vec())),
        };
        out.push(d);
    }
    Ok(out)
}

/// View `array` with `shape`, stretching unit axes.
pub(crate) fn view_as<'a>(array: &'a ArrayD<f64>, shape: &[usize]) -> Result<ArrayViewD<'a, f64>> {
    array
        .broadcast(IxDyn(shape))
        .ok_or_else(|| DerestError::shape_mismatch(shape.to_vec(), array.shape().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_shapes() {
        assert_eq!(broadcast_shapes(&[2, 3], &[3]).unwrap(), vec![2, 3]);
        assert_eq!(broadcast_shapes(&[1, 3], &[4, 1]).unwrap(), vec![4, 3]);
        assert_eq!(broadcast_shapes(&[], &[5]).unwrap(), vec![5]);
        assert!(broadcast_shapes(&[2, 3], &[4]).is_err());
    }

    #[test]
    fn test_view_as_rejects_incompatible() {
        let a = ArrayD::<f64>::zeros(IxDyn(&[3]));
        assert!(view_as(&a, &[2, 3]).is_ok());
        assert!(matches!(
            view_as(&a, &[2, 4]),
            Err(DerestError::ShapeMismatch { .. })
        ));
    }
}
