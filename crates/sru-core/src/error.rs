/// Errors returned by the SRU crates.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SruError {
    #[error("Shape mismatch for {name}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        name: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("CUDA error: {0}")]
    CudaError(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl SruError {
    /// Shorthand for a `ShapeMismatch` built from slices.
    pub fn shape(name: &'static str, expected: &[usize], got: &[usize]) -> Self {
        SruError::ShapeMismatch {
            name,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}

impl From<std::io::Error> for SruError {
    fn from(e: std::io::Error) -> Self {
        SruError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = SruError::shape("bias", &[2, 4], &[2, 3]);
        assert_eq!(
            e.to_string(),
            "Shape mismatch for bias: expected [2, 4], got [2, 3]"
        );
        let e = SruError::UnsupportedBackend("cuda:0".into());
        assert_eq!(e.to_string(), "Unsupported backend: cuda:0");
    }
}
