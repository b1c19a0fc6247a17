use smallvec::SmallVec;
use std::fmt;

/// Buffer shape with stack-allocated storage for ≤4 dimensions.
///
/// Every buffer the scan touches is rank 2, 3 or 4, so the common case
/// never allocates.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: SmallVec<[usize; 4]>,
}

impl Shape {
    /// Create a new shape from dimensions.
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: SmallVec::from_slice(dims),
        }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements. A rank-0 shape holds one element.
    ///
    /// Saturates at `usize::MAX`; buffer constructors reject such shapes
    /// through [`Shape::checked_numel`].
    pub fn numel(&self) -> usize {
        self.checked_numel().unwrap_or(usize::MAX)
    }

    /// Element count, `None` when it does not fit in `usize`.
    /// Any zero extent makes the count 0 whatever the other extents are.
    pub fn checked_numel(&self) -> Option<usize> {
        if self.dims.contains(&0) {
            return Some(0);
        }
        self.dims.iter().try_fold(1usize, |n, &d| n.checked_mul(d))
    }

    /// Get dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Get size of a specific dimension.
    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied()
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape({:?})", self.dims.as_slice())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape {
            dims: SmallVec::from_vec(dims),
        }
    }
}

macro_rules! impl_shape_from_array {
    ($($n:expr),*) => {
        $(
            impl From<[usize; $n]> for Shape {
                fn from(dims: [usize; $n]) -> Self {
                    Shape::new(&dims)
                }
            }
        )*
    };
}

impl_shape_from_array!(1, 2, 3, 4);

/// Extents of one scan invocation.
///
/// A *column* is one (batch, feature) pair; there are `batch * feature`
/// of them and each owns a contiguous run of `time` steps in every
/// sequence buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SruDims {
    pub batch: usize,
    pub feature: usize,
    pub time: usize,
}

impl SruDims {
    /// Pre-activation planes per step: update, forget, reset.
    pub const GATES: usize = 3;

    pub fn new(batch: usize, feature: usize, time: usize) -> Self {
        Self {
            batch,
            feature,
            time,
        }
    }

    /// Number of independent columns.
    ///
    /// Saturates on overflow; validated extents never overflow.
    pub fn columns(&self) -> usize {
        self.checked_columns().unwrap_or(usize::MAX)
    }

    pub fn checked_columns(&self) -> Option<usize> {
        self.batch.checked_mul(self.feature)
    }

    /// (batch, feature, time): X, C and H.
    pub fn seq_shape(&self) -> Shape {
        Shape::new(&[self.batch, self.feature, self.time])
    }

    /// (batch, feature, time, 3): U.
    pub fn gate_shape(&self) -> Shape {
        Shape::new(&[self.batch, self.feature, self.time, Self::GATES])
    }

    /// (2, feature): forget bias row, then reset bias row.
    pub fn bias_shape(&self) -> Shape {
        Shape::new(&[2, self.feature])
    }

    /// (batch, feature): C0 and C_last.
    pub fn state_shape(&self) -> Shape {
        Shape::new(&[self.batch, self.feature])
    }
}

impl fmt::Display for SruDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch={} feature={} time={}", self.batch, self.feature, self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_shape() {
        let s = Shape::new(&[2, 3, 4]);
        assert_eq!(s.ndim(), 3);
        assert_eq!(s.numel(), 24);
        assert_eq!(s.dim(0), Some(2));
        assert_eq!(s.dim(2), Some(4));
        assert_eq!(s.dim(3), None);
    }

    #[test]
    fn test_zero_extent() {
        let s = Shape::new(&[2, 0, 4]);
        assert_eq!(s.numel(), 0);
        // a zero extent wins even when the others would overflow
        assert_eq!(Shape::new(&[usize::MAX, 2, 0]).checked_numel(), Some(0));
    }

    #[test]
    fn test_numel_overflow() {
        let s = Shape::new(&[usize::MAX, 2, 1]);
        assert_eq!(s.checked_numel(), None);
        assert_eq!(s.numel(), usize::MAX);

        let d = SruDims::new(usize::MAX, 2, 0);
        assert_eq!(d.checked_columns(), None);
        assert_eq!(SruDims::new(3, 4, 0).checked_columns(), Some(12));
    }

    #[test]
    fn test_display() {
        let s: Shape = [2, 3].into();
        assert_eq!(format!("{s}"), "[2, 3]");
        assert_eq!(format!("{s:?}"), "Shape([2, 3])");
    }

    #[test]
    fn test_sru_dims_shapes() {
        let d = SruDims::new(2, 5, 7);
        assert_eq!(d.columns(), 10);
        assert_eq!(d.seq_shape().dims(), &[2, 5, 7]);
        assert_eq!(d.gate_shape().dims(), &[2, 5, 7, 3]);
        assert_eq!(d.bias_shape().dims(), &[2, 5]);
        assert_eq!(d.state_shape().dims(), &[2, 5]);
    }
}
