//! Error types for volumetric unfold/fold kernels
//!
//! Every kernel validates its preconditions before touching either buffer,
//! so an `Err` always means that neither the volume nor the column was read
//! or written.

use thiserror::Error;

/// Error type for vol2col / col2vol operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// A buffer does not have the rank the kernel requires
    #[error(
        "{operation}: {tensor} must have rank {expected_rank}, got rank {actual_rank} (shape {shape:?})"
    )]
    ShapeMismatch {
        operation: String,
        tensor: String,
        expected_rank: usize,
        actual_rank: usize,
        shape: Vec<usize>,
    },

    /// Volume and column disagree on the number of input channels
    #[error("{operation}: volume has {volume_channels} channels but column has {column_channels}")]
    ChannelMismatch {
        operation: String,
        volume_channels: usize,
        column_channels: usize,
    },

    /// Column output extents differ from the convolution output-size formula
    #[error("{operation}: column output dims {actual:?} disagree with geometry, expected {expected:?}")]
    OutputShapeMismatch {
        operation: String,
        expected: [usize; 3],
        actual: [usize; 3],
    },

    /// A writable buffer is not stored contiguously in row-major order
    #[error("{operation}: {tensor} buffer is not contiguous in row-major order")]
    NonContiguous { operation: String, tensor: String },

    /// Stride, filter or padding values that admit no convolution output
    #[error("invalid geometry: {reason}")]
    InvalidGeometry { reason: String },
}

/// Result type for kernel operations
pub type KernelResult<T> = Result<T, KernelError>;

impl KernelError {
    /// Create a rank mismatch error
    pub fn shape_mismatch(
        operation: impl Into<String>,
        tensor: impl Into<String>,
        expected_rank: usize,
        shape: &[usize],
    ) -> Self {
        KernelError::ShapeMismatch {
            operation: operation.into(),
            tensor: tensor.into(),
            expected_rank,
            actual_rank: shape.len(),
            shape: shape.to_vec(),
        }
    }

    /// Create a channel mismatch error
    pub fn channel_mismatch(
        operation: impl Into<String>,
        volume_channels: usize,
        column_channels: usize,
    ) -> Self {
        KernelError::ChannelMismatch {
            operation: operation.into(),
            volume_channels,
            column_channels,
        }
    }

    /// Create an output shape mismatch error
    pub fn output_shape_mismatch(
        operation: impl Into<String>,
        expected: [usize; 3],
        actual: [usize; 3],
    ) -> Self {
        KernelError::OutputShapeMismatch {
            operation: operation.into(),
            expected,
            actual,
        }
    }

    /// Create a non-contiguous buffer error
    pub fn non_contiguous(operation: impl Into<String>, tensor: impl Into<String>) -> Self {
        KernelError::NonContiguous {
            operation: operation.into(),
            tensor: tensor.into(),
        }
    }

    /// Create an invalid geometry error
    pub fn invalid_geometry(reason: impl Into<String>) -> Self {
        KernelError::InvalidGeometry {
            reason: reason.into(),
        }
    }

    /// Whether this is the rank precondition failure
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, KernelError::ShapeMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_display() {
        let err = KernelError::shape_mismatch("vol2col", "volume", 4, &[2, 3, 4]);

        let msg = format!("{}", err);
        assert!(msg.contains("vol2col"));
        assert!(msg.contains("volume must have rank 4"));
        assert!(msg.contains("got rank 3"));
        assert!(msg.contains("[2, 3, 4]"));
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_channel_mismatch_display() {
        let err = KernelError::channel_mismatch("col2vol", 3, 2);

        let msg = format!("{}", err);
        assert!(msg.contains("col2vol"));
        assert!(msg.contains("volume has 3 channels"));
        assert!(msg.contains("column has 2"));
        assert!(!err.is_shape_mismatch());
    }

    #[test]
    fn test_output_shape_mismatch_display() {
        let err = KernelError::output_shape_mismatch("vol2col", [3, 3, 3], [4, 3, 3]);

        let msg = format!("{}", err);
        assert!(msg.contains("[4, 3, 3]"));
        assert!(msg.contains("expected [3, 3, 3]"));
    }

    #[test]
    fn test_non_contiguous_display() {
        let err = KernelError::non_contiguous("vol2col", "column");
        assert_eq!(
            format!("{}", err),
            "vol2col: column buffer is not contiguous in row-major order"
        );
    }

    #[test]
    fn test_invalid_geometry_display() {
        let err = KernelError::invalid_geometry("stride must be positive");
        assert_eq!(format!("{}", err), "invalid geometry: stride must be positive");
    }
}
