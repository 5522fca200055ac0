//! Helpers around the unfold/fold kernels
//!
//! Matrix views of column buffers for the GEMM step, comparison helpers for
//! checking kernel output, and a timing wrapper used by the examples.

use crate::error::{KernelError, KernelResult};
use crate::geometry::ColumnDims;
use scirs2_core::ndarray_ext::{ArrayView, ArrayView2, IxDyn};
use scirs2_core::numeric::Float;
use std::time::Instant;

/// Performance timing result for kernel operations
#[derive(Debug, Clone)]
pub struct TimingResult {
    /// Operation name
    pub operation: String,
    /// Elapsed time in milliseconds
    pub elapsed_ms: f64,
    /// Throughput in Gelem/s (if applicable)
    pub throughput_gelem_s: Option<f64>,
    /// Number of elements processed
    pub elements: usize,
}

impl TimingResult {
    /// Create a new timing result
    pub fn new(operation: impl Into<String>, elapsed_ms: f64, elements: usize) -> Self {
        let throughput_gelem_s = if elapsed_ms > 0.0 && elements > 0 {
            Some((elements as f64) / (elapsed_ms * 1e6))
        } else {
            None
        };

        TimingResult {
            operation: operation.into(),
            elapsed_ms,
            throughput_gelem_s,
            elements,
        }
    }

    /// Print timing result in a human-readable format
    pub fn print(&self) {
        print!("{}: {:.3} ms", self.operation, self.elapsed_ms);
        if let Some(throughput) = self.throughput_gelem_s {
            print!(" ({:.2} Gelem/s)", throughput);
        }
        println!();
    }
}

/// Time an operation that touches `elements` column entries
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
/// use volfold_kernels::{time_operation, unfold_volume, UnfoldParams};
///
/// let volume = ArrayD::<f64>::ones(IxDyn(&[4, 8, 8, 8]));
/// let (column, timing) = time_operation("unfold_volume", 4 * 27 * 216, || {
///     unfold_volume(&volume.view(), [3, 3, 3], &UnfoldParams::default())
/// });
///
/// assert_eq!(column.unwrap().shape(), &[4, 3, 3, 3, 6, 6, 6]);
/// assert!(timing.elapsed_ms >= 0.0);
/// ```
pub fn time_operation<F, T>(name: impl Into<String>, elements: usize, op: F) -> (T, TimingResult)
where
    F: FnOnce() -> T,
{
    let start = Instant::now();
    let result = op();
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    (result, TimingResult::new(name, elapsed_ms, elements))
}

/// View a column buffer as its `[C*fd*fh*fw, od*oh*ow]` matrix
///
/// The buffer must be rank 7 and contiguous row-major.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
/// use volfold_kernels::column_matrix;
///
/// let column = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 3, 3, 4, 4, 4]));
/// let matrix = column_matrix(&column.view()).unwrap();
/// assert_eq!(matrix.shape(), &[54, 64]);
/// ```
pub fn column_matrix<'a, T>(column: &ArrayView<'a, T, IxDyn>) -> KernelResult<ArrayView2<'a, T>> {
    let dims = ColumnDims::from_shape("column_matrix", column.shape())?;
    column
        .clone()
        .into_shape_with_order((dims.rows(), dims.row_len()))
        .map_err(|_| KernelError::non_contiguous("column_matrix", "column"))
}

/// Sum of element-wise products of two equally shaped tensors
///
/// Returns `None` when the shapes differ.
///
/// ```
/// use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
/// use volfold_kernels::inner_product;
///
/// let a = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
/// let b = ArrayD::from_elem(IxDyn(&[2, 2]), 2.0);
/// assert_eq!(inner_product(&a.view(), &b.view()), Some(20.0));
/// ```
pub fn inner_product<T: Float>(a: &ArrayView<T, IxDyn>, b: &ArrayView<T, IxDyn>) -> Option<T> {
    if a.shape() != b.shape() {
        return None;
    }
    Some(
        a.iter()
            .zip(b.iter())
            .fold(T::zero(), |acc, (&x, &y)| acc + x * y),
    )
}

/// Check if two tensors are approximately equal within a tolerance
///
/// ```
/// use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
/// use volfold_kernels::approx_equal;
///
/// let a = ArrayD::from_elem(IxDyn(&[1, 2, 2, 2]), 1.0);
/// let b = ArrayD::from_elem(IxDyn(&[1, 2, 2, 2]), 1.0 + 1e-12);
/// assert!(approx_equal(&a.view(), &b.view(), 1e-10));
/// ```
pub fn approx_equal<T: Float>(a: &ArrayView<T, IxDyn>, b: &ArrayView<T, IxDyn>, tol: T) -> bool {
    a.shape() == b.shape()
        && a
            .iter()
            .zip(b.iter())
            .all(|(&x, &y)| (x - y).abs() <= tol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::ArrayD;

    #[test]
    fn test_timing_result_throughput() {
        let timing = TimingResult::new("vol2col", 2.0, 4_000_000);
        assert_eq!(timing.throughput_gelem_s, Some(2.0));

        let timing = TimingResult::new("vol2col", 0.0, 100);
        assert_eq!(timing.throughput_gelem_s, None);
    }

    #[test]
    fn test_column_matrix_row_major() {
        let column = ArrayD::from_shape_fn(IxDyn(&[1, 1, 1, 2, 1, 1, 3]), |ix| {
            (ix[3] * 10 + ix[6]) as f64
        });
        let matrix = column_matrix(&column.view()).unwrap();

        assert_eq!(matrix.shape(), &[2, 3]);
        assert_eq!(matrix[[0, 2]], 2.0);
        assert_eq!(matrix[[1, 0]], 10.0);
    }

    #[test]
    fn test_column_matrix_rejects_rank() {
        let column = ArrayD::<f64>::zeros(IxDyn(&[2, 3]));
        assert!(column_matrix(&column.view()).unwrap_err().is_shape_mismatch());
    }

    #[test]
    fn test_inner_product_shape_mismatch() {
        let a = ArrayD::<f64>::ones(IxDyn(&[2, 2]));
        let b = ArrayD::<f64>::ones(IxDyn(&[4]));
        assert_eq!(inner_product(&a.view(), &b.view()), None);
        assert!(!approx_equal(&a.view(), &b.view(), 1.0));
    }
}
