//! Error types for ml-resample crate.

use thiserror::Error;

/// Errors that can occur in resampling operations.
#[derive(Debug, Error)]
pub enum ResampleError {
    /// A tensor does not have the required four dimensions.
    #[error("{role} must be 4-dimensional (got {ndim} dimensions)")]
    NotFourDimensional {
        /// Which argument violated the contract.
        role: &'static str,
        /// The dimensionality that was supplied.
        ndim: usize,
    },

    /// Image and grid batch sizes differ.
    #[error("batch size mismatch: image has {image}, grid has {grid}")]
    BatchMismatch {
        /// Image batch size.
        image: usize,
        /// Grid batch size.
        grid: usize,
    },

    /// The grid's innermost axis does not hold `(x, y)` pairs.
    #[error("grid innermost axis must have extent 2, got {0}")]
    BadGridAxis(usize),

    /// A tensor has a different shape than the operation requires.
    #[error("shape mismatch for {role}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Which tensor violated the contract.
        role: &'static str,
        /// The required shape.
        expected: Vec<usize>,
        /// The shape that was supplied.
        actual: Vec<usize>,
    },

    /// Two operands of an elementwise operation have different shapes.
    #[error("operand shapes differ: {left:?} vs {right:?}")]
    OperandMismatch {
        /// Left operand shape.
        left: Vec<usize>,
        /// Right operand shape.
        right: Vec<usize>,
    },
}

impl ResampleError {
    /// Creates a dimensionality error.
    #[must_use]
    pub const fn not_four_dimensional(role: &'static str, ndim: usize) -> Self {
        Self::NotFourDimensional { role, ndim }
    }

    /// Creates a shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(role: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            role,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Creates an operand mismatch error.
    #[must_use]
    pub fn operand_mismatch(left: &[usize], right: &[usize]) -> Self {
        Self::OperandMismatch {
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }
}

/// Result type for ml-resample operations.
pub type Result<T> = std::result::Result<T, ResampleError>;
