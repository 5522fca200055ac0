//! Column-to-volume folding (col2vol)
//!
//! `col2vol` is the adjoint of [`vol2col`](crate::vol2col): every in-range
//! column entry is **added** to the voxel it was read from, and entries that
//! fall into the padding border are dropped. Whenever the stride is smaller
//! than the (dilated) filter extent, several column entries map onto the same
//! voxel and their contributions sum. This is what the backward pass of a
//! GEMM-based 3-D convolution needs to turn column gradients into input
//! gradients.
//!
//! # Accumulation contract
//!
//! The target volume is never cleared. Callers that want a fresh gradient
//! must zero it first or use [`fold_columns`]. A volume that still holds stale
//! data is silently accumulated onto.
//!
//! # SciRS2 Integration
//!
//! All array operations use `scirs2_core::ndarray_ext`.
//! Direct use of `ndarray` is not permitted.

use crate::device::{Cpu, Device};
use crate::error::{KernelError, KernelResult};
use crate::geometry::{checked_len, Geometry, PatchIndex, UnfoldParams, VolumeDims};
use scirs2_core::ndarray_ext::{ArrayD, ArrayView, ArrayViewMut, IxDyn};
use scirs2_core::numeric::Float;

const COL2VOL: &str = "col2vol";

/// Accumulate a column buffer into a caller-allocated volume
///
/// # Arguments
///
/// * `volume` - Accumulation target of shape `[C, D, H, W]`, usually zeroed
/// * `column` - Input of shape `[C, fd, fh, fw, od, oh, ow]`
/// * `params` - Stride, padding and dilation the column was unfolded with
///
/// # Errors
///
/// Same preconditions as [`vol2col`](crate::vol2col); `NonContiguous` refers
/// to `volume` here. No buffer is read or written when an error is returned.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
/// use volfold_kernels::{col2vol, UnfoldParams};
///
/// // Two overlapping 2-wide windows over a width-3 row: the middle voxel is hit twice
/// let column = ArrayD::<f64>::ones(IxDyn(&[1, 1, 1, 2, 1, 1, 2]));
/// let mut volume = ArrayD::<f64>::zeros(IxDyn(&[1, 1, 1, 3]));
///
/// col2vol(&mut volume.view_mut(), &column.view(), &UnfoldParams::default()).unwrap();
///
/// let voxels: Vec<f64> = volume.iter().cloned().collect();
/// assert_eq!(voxels, vec![1.0, 2.0, 1.0]);
/// ```
pub fn col2vol<T>(
    volume: &mut ArrayViewMut<T, IxDyn>,
    column: &ArrayView<T, IxDyn>,
    params: &UnfoldParams,
) -> KernelResult<()>
where
    T: Float,
{
    let geom = Geometry::prepare(COL2VOL, volume.shape(), column.shape(), params)?;

    let vol_data = volume
        .as_slice_mut()
        .ok_or_else(|| Geometry::reject(COL2VOL, KernelError::non_contiguous(COL2VOL, "volume")))?;
    let column = column.as_standard_layout();
    let col_data = column
        .as_slice()
        .ok_or_else(|| Geometry::reject(COL2VOL, KernelError::non_contiguous(COL2VOL, "column")))?;

    geom.record_call(COL2VOL, Cpu::NAME);

    let row_len = geom.column.row_len();
    if row_len == 0 {
        return Ok(());
    }

    let channel_len = geom.volume.channel_len();
    for (row, col_row) in col_data.chunks_exact(row_len).enumerate() {
        let patch = PatchIndex::decompose(row, geom.column.filter);
        let start = patch.channel * channel_len;
        fold_row(&mut vol_data[start..start + channel_len], col_row, patch, &geom);
    }

    Ok(())
}

/// Accumulate a column buffer with volume channels distributed across worker threads
///
/// Rows of one input channel only ever write into that channel's slice of the
/// volume, so each worker owns whole channels and no voxel is updated by two
/// threads. Within a channel rows are folded in the same order as
/// [`col2vol`], so the result is bit-identical to the serial kernel.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
/// use volfold_kernels::{col2vol, col2vol_parallel, UnfoldParams};
///
/// let column = ArrayD::from_shape_fn(IxDyn(&[3, 2, 2, 2, 3, 3, 3]), |ix| ix[0] as f64 + 0.25);
/// let mut serial = ArrayD::<f64>::zeros(IxDyn(&[3, 4, 4, 4]));
/// let mut parallel = serial.clone();
///
/// col2vol(&mut serial.view_mut(), &column.view(), &UnfoldParams::default()).unwrap();
/// col2vol_parallel(&mut parallel.view_mut(), &column.view(), &UnfoldParams::default()).unwrap();
/// assert_eq!(serial, parallel);
/// ```
#[cfg(feature = "parallel")]
pub fn col2vol_parallel<T>(
    volume: &mut ArrayViewMut<T, IxDyn>,
    column: &ArrayView<T, IxDyn>,
    params: &UnfoldParams,
) -> KernelResult<()>
where
    T: Float + Send + Sync,
{
    use crate::device::CpuParallel;
    use scirs2_core::parallel_ops::*;

    const OP: &str = "col2vol_parallel";
    let geom = Geometry::prepare(OP, volume.shape(), column.shape(), params)?;

    let vol_data = volume
        .as_slice_mut()
        .ok_or_else(|| Geometry::reject(OP, KernelError::non_contiguous(OP, "volume")))?;
    let column = column.as_standard_layout();
    let col_data = column
        .as_slice()
        .ok_or_else(|| Geometry::reject(OP, KernelError::non_contiguous(OP, "column")))?;

    geom.record_call(OP, CpuParallel::NAME);

    let row_len = geom.column.row_len();
    let channel_len = geom.volume.channel_len();
    if row_len == 0 || channel_len == 0 {
        return Ok(());
    }

    let filter_len = geom.column.filter_len();
    vol_data
        .par_chunks_mut(channel_len)
        .enumerate()
        .for_each(|(channel, vol_channel)| {
            let first_row = channel * filter_len;
            for row in first_row..first_row + filter_len {
                let patch = PatchIndex::decompose(row, geom.column.filter);
                let col_row = &col_data[row * row_len..(row + 1) * row_len];
                fold_row(vol_channel, col_row, patch, &geom);
            }
        });

    Ok(())
}

/// Fold a column buffer into a freshly zeroed volume of `volume_shape`
///
/// Equivalent to zeroing a volume and calling [`col2vol`], without the
/// accumulation contract.
///
/// # Examples
///
/// ```
/// use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
/// use volfold_kernels::{fold_columns, UnfoldParams};
///
/// let column = ArrayD::<f64>::ones(IxDyn(&[1, 2, 2, 2, 3, 3, 3]));
/// let volume = fold_columns(&column.view(), &[1, 4, 4, 4], &UnfoldParams::default()).unwrap();
///
/// // A corner voxel is covered by a single window, an interior voxel by all eight taps
/// assert_eq!(volume[IxDyn(&[0, 0, 0, 0])], 1.0);
/// assert_eq!(volume[IxDyn(&[0, 1, 1, 1])], 8.0);
/// ```
pub fn fold_columns<T>(
    column: &ArrayView<T, IxDyn>,
    volume_shape: &[usize],
    params: &UnfoldParams,
) -> KernelResult<ArrayD<T>>
where
    T: Float,
{
    let dims = VolumeDims::from_shape("fold_columns", volume_shape)
        .map_err(|e| Geometry::reject("fold_columns", e))?;
    checked_len(&dims.shape()).map_err(|e| Geometry::reject("fold_columns", e))?;
    let mut volume = ArrayD::<T>::zeros(IxDyn(&dims.shape()));
    col2vol(&mut volume.view_mut(), column, params)?;
    Ok(volume)
}

/// Add one column row (one input channel, one filter tap) into its channel slice
#[inline]
fn fold_row<T: Float>(vol_channel: &mut [T], col_row: &[T], patch: PatchIndex, geom: &Geometry) {
    let [od, oh, ow] = geom.column.output;
    let [_, ih, iw] = geom.volume.spatial();
    let [kd, kh, kw] = patch.offsets();

    let mut idx = 0;
    for d in 0..od {
        let d_src = geom.source(0, d, kd);
        for h in 0..oh {
            let h_src = geom.source(1, h, kh);
            for w in 0..ow {
                if let (Some(d), Some(h), Some(w)) = (d_src, h_src, geom.source(2, w, kw)) {
                    let voxel = (d * ih + h) * iw + w;
                    vol_channel[voxel] = vol_channel[voxel] + col_row[idx];
                }
                idx += 1;
            }
        }
    }
}
