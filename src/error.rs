// src/error.rs
//
// Typed failures for tensor setup and convolution calls.
// Every variant is fatal to the call that raised it; no output is touched on failure.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvError>;

#[derive(Debug, Error)]
pub enum ConvError {
    /// Non-positive dimensions, padded size smaller than the logical size,
    /// or an axis order that does not fit the grid.
    #[error("invalid dimensions: {0}")]
    InvalidDimension(String),

    /// A field handed to an executor does not match its configured grid.
    #[error("shape mismatch for {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: [usize; 3],
        got: [usize; 3],
    },

    /// Tensor component count is not what the setup/executor was built for.
    #[error("expected {expected} tensor components, got {got}")]
    InvalidComponentCount { expected: &'static str, got: usize },

    #[error("allocation of {bytes} bytes failed on device {device}")]
    Allocation { device: String, bytes: usize },

    /// Requested execution backend cannot be brought up.
    #[error("backend unavailable: {0}")]
    Backend(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_names_both_shapes() {
        let err = ConvError::ShapeMismatch {
            what: "rhs",
            expected: [4, 4, 1],
            got: [4, 2, 1],
        };
        let msg = err.to_string();
        assert!(msg.contains("rhs"));
        assert!(msg.contains("[4, 4, 1]"));
        assert!(msg.contains("[4, 2, 1]"));
    }

    #[test]
    fn io_errors_convert_via_question_mark() {
        fn fails() -> Result<()> {
            Err::<(), _>(std::io::Error::other("disk gone"))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, ConvError::Io(_)));
        assert_eq!(err.to_string(), "disk gone");
    }
}
