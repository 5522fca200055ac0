//! Volume-to-column unfolding (vol2col)
//!
//! `vol2col` rewrites a `[C, D, H, W]` volume as a `[C, fd, fh, fw, od, oh, ow]`
//! column buffer, so that a 3-D convolution becomes one matrix product of the
//! `[out_channels, C*fd*fh*fw]` filter matrix with the
//! `[C*fd*fh*fw, od*oh*ow]` column matrix.
//!
//! Every element of the column is written exactly once. Taps that land in
//! the virtual padding border are written as zero.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.
//! Direct use of `ndarray` is not permitted.

use crate::device::{Cpu, Device};
use crate::error::{KernelError, KernelResult};
use crate::geometry::{column_shape, Geometry, PatchIndex, UnfoldParams};
use scirs2_core::ndarray_ext::{ArrayD, ArrayView, ArrayViewMut, IxDyn};
use scirs2_core::numeric::Float;

const VOL2COL: &str = "vol2col";

/// Unfold a volume into a caller-allocated column buffer
///
/// # Arguments
///
/// * `volume` - Input of shape `[C, D, H, W]`
/// * `column` - Output of shape `[C, fd, fh, fw, od, oh, ow]`; the filter and
///   output extents are taken from this shape
/// * `params` - Stride, padding and dilation per spatial axis
///
/// # Errors
///
/// * [`KernelError::ShapeMismatch`] if `volume` is not rank 4 or `column` is not rank 7
/// * [`KernelError::ChannelMismatch`] if the channel extents differ
/// * [`KernelError::OutputShapeMismatch`] under [`ShapeCheck::Strict`](crate::ShapeCheck)
/// * [`KernelError::NonContiguous`] if `column` is not row-major contiguous
///
/// No buffer is read or written when an error is returned.
///
/// # Complexity
///
/// Time: O(C * fd * fh * fw * od * oh * ow)
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
/// use volfold_kernels::{vol2col, UnfoldParams};
///
/// // One 1x3x3 channel, 1x2x2 filter: four taps, four output positions
/// let volume = ArrayD::from_shape_vec(IxDyn(&[1, 1, 3, 3]), (0..9).map(|x| x as f64).collect())
///     .unwrap();
/// let mut column = ArrayD::<f64>::zeros(IxDyn(&[1, 1, 2, 2, 1, 2, 2]));
///
/// vol2col(&volume.view(), &mut column.view_mut(), &UnfoldParams::default()).unwrap();
///
/// let rows: Vec<f64> = column.iter().cloned().collect();
/// assert_eq!(&rows[0..4], &[0.0, 1.0, 3.0, 4.0]); // tap (0, 0)
/// assert_eq!(&rows[12..16], &[4.0, 5.0, 7.0, 8.0]); // tap (1, 1)
/// ```
pub fn vol2col<T>(
    volume: &ArrayView<T, IxDyn>,
    column: &mut ArrayViewMut<T, IxDyn>,
    params: &UnfoldParams,
) -> KernelResult<()>
where
    T: Float,
{
    let geom = Geometry::prepare(VOL2COL, volume.shape(), column.shape(), params)?;

    let col_data = column
        .as_slice_mut()
        .ok_or_else(|| Geometry::reject(VOL2COL, KernelError::non_contiguous(VOL2COL, "column")))?;
    let volume = volume.as_standard_layout();
    let vol_data = volume
        .as_slice()
        .ok_or_else(|| Geometry::reject(VOL2COL, KernelError::non_contiguous(VOL2COL, "volume")))?;

    geom.record_call(VOL2COL, Cpu::NAME);

    let row_len = geom.column.row_len();
    if row_len == 0 {
        return Ok(());
    }

    let channel_len = geom.volume.channel_len();
    for (row, col_row) in col_data.chunks_exact_mut(row_len).enumerate() {
        let patch = PatchIndex::decompose(row, geom.column.filter);
        let start = patch.channel * channel_len;
        unfold_row(&vol_data[start..start + channel_len], col_row, patch, &geom);
    }

    Ok(())
}

/// Unfold a volume with column rows distributed across worker threads
///
/// Each row of the column matrix is an independent write target, so rows are
/// processed in parallel. The result is identical to [`vol2col`].
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
/// use volfold_kernels::{vol2col, vol2col_parallel, UnfoldParams};
///
/// let volume = ArrayD::from_shape_fn(IxDyn(&[2, 4, 4, 4]), |ix| (ix[1] * 16 + ix[2] * 4 + ix[3]) as f32);
/// let params = UnfoldParams::uniform(1, 1);
///
/// let mut serial = ArrayD::<f32>::zeros(IxDyn(&[2, 3, 3, 3, 4, 4, 4]));
/// let mut parallel = serial.clone();
/// vol2col(&volume.view(), &mut serial.view_mut(), &params).unwrap();
/// vol2col_parallel(&volume.view(), &mut parallel.view_mut(), &params).unwrap();
/// assert_eq!(serial, parallel);
/// ```
#[cfg(feature = "parallel")]
pub fn vol2col_parallel<T>(
    volume: &ArrayView<T, IxDyn>,
    column: &mut ArrayViewMut<T, IxDyn>,
    params: &UnfoldParams,
) -> KernelResult<()>
where
    T: Float + Send + Sync,
{
    use crate::device::CpuParallel;
    use scirs2_core::parallel_ops::*;

    const OP: &str = "vol2col_parallel";
    let geom = Geometry::prepare(OP, volume.shape(), column.shape(), params)?;

    let col_data = column
        .as_slice_mut()
        .ok_or_else(|| Geometry::reject(OP, KernelError::non_contiguous(OP, "column")))?;
    let volume = volume.as_standard_layout();
    let vol_data = volume
        .as_slice()
        .ok_or_else(|| Geometry::reject(OP, KernelError::non_contiguous(OP, "volume")))?;

    geom.record_call(OP, CpuParallel::NAME);

    let row_len = geom.column.row_len();
    if row_len == 0 {
        return Ok(());
    }

    let channel_len = geom.volume.channel_len();
    col_data
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(row, col_row)| {
            let patch = PatchIndex::decompose(row, geom.column.filter);
            let start = patch.channel * channel_len;
            unfold_row(&vol_data[start..start + channel_len], col_row, patch, &geom);
        });

    Ok(())
}

/// Allocate a column buffer for `filter` and unfold `volume` into it
///
/// The output extents follow [`conv_output_size`](crate::conv_output_size).
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
/// use volfold_kernels::{unfold_volume, UnfoldParams};
///
/// let volume = ArrayD::<f64>::ones(IxDyn(&[3, 4, 4, 4]));
/// let column = unfold_volume(&volume.view(), [2, 2, 2], &UnfoldParams::default()).unwrap();
/// assert_eq!(column.shape(), &[3, 2, 2, 2, 3, 3, 3]);
/// ```
pub fn unfold_volume<T>(
    volume: &ArrayView<T, IxDyn>,
    filter: [usize; 3],
    params: &UnfoldParams,
) -> KernelResult<ArrayD<T>>
where
    T: Float,
{
    let shape = column_shape(volume.shape(), filter, params)
        .map_err(|e| Geometry::reject("unfold_volume", e))?;
    let mut column = ArrayD::<T>::zeros(IxDyn(&shape));
    vol2col(volume, &mut column.view_mut(), params)?;
    Ok(column)
}

/// Fill one column row (one input channel, one filter tap) from its channel slice
#[inline]
fn unfold_row<T: Float>(vol_channel: &[T], col_row: &mut [T], patch: PatchIndex, geom: &Geometry) {
    let [od, oh, ow] = geom.column.output;
    let [_, ih, iw] = geom.volume.spatial();
    let [kd, kh, kw] = patch.offsets();

    let mut idx = 0;
    for d in 0..od {
        let d_src = geom.source(0, d, kd);
        for h in 0..oh {
            let h_src = geom.source(1, h, kh);
            for w in 0..ow {
                col_row[idx] = match (d_src, h_src, geom.source(2, w, kw)) {
                    (Some(d), Some(h), Some(w)) => vol_channel[(d * ih + h) * iw + w],
                    _ => T::zero(),
                };
                idx += 1;
            }
        }
    }
}
