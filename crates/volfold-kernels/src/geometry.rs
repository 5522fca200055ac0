//! Convolution geometry shared by the unfold and fold kernels
//!
//! A volume is laid out as `[channels, depth, height, width]` and a column
//! buffer as `[channels, filter_d, filter_h, filter_w, out_d, out_h, out_w]`,
//! both row-major. The column is read as a matrix with
//! `channels * filter_d * filter_h * filter_w` rows (one per patch tap) and
//! `out_d * out_h * out_w` columns (one per output position).
//!
//! Row `c` of that matrix is split back into its patch tap by mixed-radix
//! division, filter width varying fastest:
//!
//! ```text
//! w_offset = c % fw
//! h_offset = (c / fw) % fh
//! d_offset = (c / fw / fh) % fd
//! channel  =  c / fw / fh / fd
//! ```
//!
//! and an output position `o` along an axis reads the source coordinate
//! `o * stride - padding + offset * dilation`, which may fall into the
//! virtual zero border.

use crate::error::{KernelError, KernelResult};
use crate::tracing_support::{record_kernel_call, record_rejection};

/// Rank of a volume buffer: `[channels, depth, height, width]`
pub const VOLUME_RANK: usize = 4;

/// Rank of a column buffer: `[channels, fd, fh, fw, od, oh, ow]`
pub const COLUMN_RANK: usize = 7;

/// How much the kernels trust the column's declared output extents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapeCheck {
    /// Iterate over whatever output extents the column declares
    #[default]
    Trusted,
    /// Require the output extents to match [`conv_output_size`] on every axis
    Strict,
}

/// Stride, padding and dilation of a 3-D convolution, per `[depth, height, width]` axis
///
/// Padding is signed: negative padding crops the volume, and padding large
/// enough to push every tap out of range is legal (those rows unfold to zeros).
///
/// # Examples
///
/// ```
/// use volfold_kernels::{ShapeCheck, UnfoldParams};
///
/// let params = UnfoldParams::uniform(2, 1).with_shape_check(ShapeCheck::Strict);
/// assert_eq!(params.stride, [2, 2, 2]);
/// assert_eq!(params.padding, [1, 1, 1]);
/// assert_eq!(params.dilation, [1, 1, 1]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnfoldParams {
    /// Step between consecutive output positions
    pub stride: [usize; 3],
    /// Virtual zero border added before the first element of each axis
    pub padding: [isize; 3],
    /// Spacing between filter taps (1 = dense filter)
    pub dilation: [usize; 3],
    /// Output extent validation policy
    pub shape_check: ShapeCheck,
}

impl Default for UnfoldParams {
    fn default() -> Self {
        Self {
            stride: [1, 1, 1],
            padding: [0, 0, 0],
            dilation: [1, 1, 1],
            shape_check: ShapeCheck::Trusted,
        }
    }
}

impl UnfoldParams {
    /// Per-axis stride and padding with dense (undilated) filters
    pub fn new(stride: [usize; 3], padding: [isize; 3]) -> Self {
        Self {
            stride,
            padding,
            ..Self::default()
        }
    }

    /// Same stride and padding on all three axes
    pub fn uniform(stride: usize, padding: isize) -> Self {
        Self::new([stride; 3], [padding; 3])
    }

    pub fn with_stride(mut self, stride: [usize; 3]) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: [isize; 3]) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_dilation(mut self, dilation: [usize; 3]) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn with_shape_check(mut self, shape_check: ShapeCheck) -> Self {
        self.shape_check = shape_check;
        self
    }

    /// Output extents `[od, oh, ow]` for a volume with spatial extents `spatial`
    pub fn output_dims(&self, spatial: [usize; 3], filter: [usize; 3]) -> KernelResult<[usize; 3]> {
        let mut out = [0; 3];
        for axis in 0..3 {
            out[axis] = conv_output_size(
                spatial[axis],
                filter[axis],
                self.stride[axis],
                self.padding[axis],
                self.dilation[axis],
            )?;
        }
        Ok(out)
    }
}

/// Number of output positions along one axis of a convolution
///
/// Computes `(input + 2 * padding - ((filter - 1) * dilation + 1)) / stride + 1`.
///
/// # Errors
///
/// Returns [`KernelError::InvalidGeometry`] when stride, filter or dilation is
/// zero, or when the padded input is shorter than the dilated filter.
///
/// # Examples
///
/// ```
/// use volfold_kernels::conv_output_size;
///
/// assert_eq!(conv_output_size(4, 2, 1, 0, 1).unwrap(), 3);
/// assert_eq!(conv_output_size(5, 3, 2, 1, 1).unwrap(), 3);
/// assert!(conv_output_size(2, 3, 1, 0, 1).is_err());
/// ```
pub fn conv_output_size(
    input: usize,
    filter: usize,
    stride: usize,
    padding: isize,
    dilation: usize,
) -> KernelResult<usize> {
    if stride == 0 {
        return Err(KernelError::invalid_geometry("stride must be positive"));
    }
    if filter == 0 {
        return Err(KernelError::invalid_geometry("filter extent must be positive"));
    }
    if dilation == 0 {
        return Err(KernelError::invalid_geometry("dilation must be positive"));
    }

    let effective_filter = ((filter - 1) as i128)
        .checked_mul(dilation as i128)
        .and_then(|taps| taps.checked_add(1))
        .ok_or_else(|| KernelError::invalid_geometry("dilated filter extent overflows"))?;
    let span = (input as i128 + 2 * padding as i128)
        .checked_sub(effective_filter)
        // only underflow is possible
        .unwrap_or(-1);
    if span < 0 {
        return Err(KernelError::invalid_geometry(format!(
            "input extent {} with padding {} is smaller than dilated filter extent {}",
            input, padding, effective_filter
        )));
    }

    let output = span / stride as i128 + 1;
    if output > isize::MAX as i128 {
        return Err(KernelError::invalid_geometry(format!(
            "output extent {} with padding {} exceeds isize::MAX",
            output, padding
        )));
    }
    Ok(output as usize)
}

/// Number of elements in a buffer of `shape`, if it fits in an allocation
///
/// # Errors
///
/// Returns [`KernelError::InvalidGeometry`] when the product overflows `isize`.
pub fn checked_len(shape: &[usize]) -> KernelResult<usize> {
    shape
        .iter()
        .try_fold(1usize, |len, &dim| len.checked_mul(dim))
        .filter(|&len| len <= isize::MAX as usize)
        .ok_or_else(|| {
            KernelError::invalid_geometry(format!("shape {:?} has too many elements", shape))
        })
}

/// Extents of a `[channels, depth, height, width]` volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeDims {
    pub channels: usize,
    pub depth: usize,
    pub height: usize,
    pub width: usize,
}

impl VolumeDims {
    /// Parse a rank-4 shape
    pub fn from_shape(operation: &str, shape: &[usize]) -> KernelResult<Self> {
        match *shape {
            [channels, depth, height, width] => Ok(Self {
                channels,
                depth,
                height,
                width,
            }),
            _ => Err(KernelError::shape_mismatch(
                operation,
                "volume",
                VOLUME_RANK,
                shape,
            )),
        }
    }

    pub fn spatial(&self) -> [usize; 3] {
        [self.depth, self.height, self.width]
    }

    /// Elements in one channel slice
    pub fn channel_len(&self) -> usize {
        self.depth * self.height * self.width
    }

    pub fn shape(&self) -> [usize; VOLUME_RANK] {
        [self.channels, self.depth, self.height, self.width]
    }
}

/// Extents of a `[channels, fd, fh, fw, od, oh, ow]` column buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDims {
    pub channels: usize,
    pub filter: [usize; 3],
    pub output: [usize; 3],
}

impl ColumnDims {
    /// Parse a rank-7 shape
    pub fn from_shape(operation: &str, shape: &[usize]) -> KernelResult<Self> {
        match *shape {
            [channels, fd, fh, fw, od, oh, ow] => Ok(Self {
                channels,
                filter: [fd, fh, fw],
                output: [od, oh, ow],
            }),
            _ => Err(KernelError::shape_mismatch(
                operation,
                "column",
                COLUMN_RANK,
                shape,
            )),
        }
    }

    /// Taps in one filter window (`fd * fh * fw`)
    pub fn filter_len(&self) -> usize {
        self.filter.iter().product()
    }

    /// Rows of the column matrix (`channels * fd * fh * fw`)
    pub fn rows(&self) -> usize {
        self.channels * self.filter_len()
    }

    /// Length of one row (`od * oh * ow`)
    pub fn row_len(&self) -> usize {
        self.output.iter().product()
    }

    pub fn shape(&self) -> [usize; COLUMN_RANK] {
        let [fd, fh, fw] = self.filter;
        let [od, oh, ow] = self.output;
        [self.channels, fd, fh, fw, od, oh, ow]
    }
}

/// Shape of the column buffer that unfolds `volume_shape` with `filter`
///
/// # Examples
///
/// ```
/// use volfold_kernels::{column_shape, UnfoldParams};
///
/// let shape = column_shape(&[3, 4, 4, 4], [2, 2, 2], &UnfoldParams::default()).unwrap();
/// assert_eq!(shape, vec![3, 2, 2, 2, 3, 3, 3]);
/// ```
pub fn column_shape(
    volume_shape: &[usize],
    filter: [usize; 3],
    params: &UnfoldParams,
) -> KernelResult<Vec<usize>> {
    let volume = VolumeDims::from_shape("column_shape", volume_shape)?;
    let output = params.output_dims(volume.spatial(), filter)?;
    let column = ColumnDims {
        channels: volume.channels,
        filter,
        output,
    };
    let shape = column.shape();
    checked_len(&shape)?;
    Ok(shape.to_vec())
}

/// One row of the column matrix, split into input channel and filter tap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchIndex {
    pub channel: usize,
    pub d_offset: usize,
    pub h_offset: usize,
    pub w_offset: usize,
}

impl PatchIndex {
    /// Mixed-radix split of `row` with filter width varying fastest
    ///
    /// `filter` must have no zero extent.
    ///
    /// ```
    /// use volfold_kernels::PatchIndex;
    ///
    /// // 2x3x4 filter: row 23 is the last tap of channel 0, row 24 the first of channel 1
    /// let last = PatchIndex::decompose(23, [2, 3, 4]);
    /// assert_eq!((last.channel, last.d_offset, last.h_offset, last.w_offset), (0, 1, 2, 3));
    /// let next = PatchIndex::decompose(24, [2, 3, 4]);
    /// assert_eq!((next.channel, next.d_offset, next.h_offset, next.w_offset), (1, 0, 0, 0));
    /// ```
    pub fn decompose(row: usize, filter: [usize; 3]) -> Self {
        let [fd, fh, fw] = filter;
        Self {
            w_offset: row % fw,
            h_offset: (row / fw) % fh,
            d_offset: (row / fw / fh) % fd,
            channel: row / fw / fh / fd,
        }
    }

    pub fn offsets(&self) -> [usize; 3] {
        [self.d_offset, self.h_offset, self.w_offset]
    }
}

/// Source coordinate read by output position `out` for filter tap `tap`
///
/// May be negative or past the input extent; see [`source_index`]. The sum
/// is taken in `i128` and saturates, so any padding is representable.
#[inline]
pub fn padded_coordinate(
    out: usize,
    stride: usize,
    padding: isize,
    tap: usize,
    dilation: usize,
) -> i128 {
    (out as i128)
        .saturating_mul(stride as i128)
        .saturating_sub(padding as i128)
        .saturating_add((tap as i128).saturating_mul(dilation as i128))
}

/// `Some(coord)` if `coord` lies in `[0, extent)`, `None` for the virtual border
#[inline]
pub fn source_index(coord: i128, extent: usize) -> Option<usize> {
    if coord >= 0 && coord < extent as i128 {
        Some(coord as usize)
    } else {
        None
    }
}

/// Validated shapes of one kernel call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub volume: VolumeDims,
    pub column: ColumnDims,
    pub params: UnfoldParams,
}

impl Geometry {
    /// Check every precondition of a vol2col/col2vol call
    ///
    /// Runs before either buffer is touched.
    pub fn validate(
        operation: &str,
        volume_shape: &[usize],
        column_shape: &[usize],
        params: &UnfoldParams,
    ) -> KernelResult<Self> {
        let volume = VolumeDims::from_shape(operation, volume_shape)?;
        let column = ColumnDims::from_shape(operation, column_shape)?;

        if volume.channels != column.channels {
            return Err(KernelError::channel_mismatch(
                operation,
                volume.channels,
                column.channels,
            ));
        }

        if params.shape_check == ShapeCheck::Strict {
            let expected = params.output_dims(volume.spatial(), column.filter)?;
            if expected != column.output {
                return Err(KernelError::output_shape_mismatch(
                    operation,
                    expected,
                    column.output,
                ));
            }
        }

        Ok(Self {
            volume,
            column,
            params: *params,
        })
    }

    /// Validate a call, logging a rejection
    pub fn prepare(
        operation: &str,
        volume_shape: &[usize],
        column_shape: &[usize],
        params: &UnfoldParams,
    ) -> KernelResult<Self> {
        Self::validate(operation, volume_shape, column_shape, params)
            .map_err(|e| Self::reject(operation, e))
    }

    /// Log an accepted call once both buffers are bound
    pub fn record_call(&self, operation: &str, device: &str) {
        record_kernel_call(operation, &self.volume.shape(), &self.column.shape(), device);
    }

    /// Log a rejected call and hand the error back
    pub fn reject(operation: &str, error: KernelError) -> KernelError {
        record_rejection(operation, &error);
        error
    }

    /// Source index along `axis` for output position `out` and tap `tap`
    #[inline]
    pub fn source(&self, axis: usize, out: usize, tap: usize) -> Option<usize> {
        let coord = padded_coordinate(
            out,
            self.params.stride[axis],
            self.params.padding[axis],
            tap,
            self.params.dilation[axis],
        );
        source_index(coord, self.volume.spatial()[axis])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv_output_size_basic() {
        assert_eq!(conv_output_size(4, 2, 1, 0, 1).unwrap(), 3);
        assert_eq!(conv_output_size(4, 1, 1, 0, 1).unwrap(), 4);
        assert_eq!(conv_output_size(7, 3, 2, 0, 1).unwrap(), 3);
        assert_eq!(conv_output_size(4, 3, 1, 1, 1).unwrap(), 4);
    }

    #[test]
    fn test_conv_output_size_dilation() {
        // Dilated 3-tap filter spans 5 elements
        assert_eq!(conv_output_size(7, 3, 1, 0, 2).unwrap(), 3);
    }

    #[test]
    fn test_conv_output_size_negative_padding() {
        assert_eq!(conv_output_size(6, 1, 1, -1, 1).unwrap(), 4);
    }

    #[test]
    fn test_conv_output_size_rejects_degenerate() {
        assert!(conv_output_size(4, 2, 0, 0, 1).is_err());
        assert!(conv_output_size(4, 0, 1, 0, 1).is_err());
        assert!(conv_output_size(4, 2, 1, 0, 0).is_err());
        assert!(conv_output_size(1, 2, 1, 0, 1).is_err());
    }

    #[test]
    fn test_patch_index_decompose_order() {
        let filter = [2, 2, 3];
        let taps: Vec<_> = (0..12)
            .map(|c| PatchIndex::decompose(c, filter).offsets())
            .collect();

        assert_eq!(taps[0], [0, 0, 0]);
        assert_eq!(taps[1], [0, 0, 1]);
        assert_eq!(taps[2], [0, 0, 2]);
        assert_eq!(taps[3], [0, 1, 0]);
        assert_eq!(taps[6], [1, 0, 0]);
        assert_eq!(taps[11], [1, 1, 2]);
        assert_eq!(PatchIndex::decompose(12, filter).channel, 1);
    }

    #[test]
    fn test_padded_coordinate_and_source_index() {
        assert_eq!(padded_coordinate(0, 1, 1, 0, 1), -1);
        assert_eq!(padded_coordinate(2, 2, 1, 1, 1), 4);
        assert_eq!(padded_coordinate(1, 1, 0, 2, 3), 7);

        assert_eq!(source_index(-1, 4), None);
        assert_eq!(source_index(0, 4), Some(0));
        assert_eq!(source_index(3, 4), Some(3));
        assert_eq!(source_index(4, 4), None);
    }

    #[test]
    fn test_padded_coordinate_extreme_padding_stays_out_of_range() {
        let high = padded_coordinate(3, 2, -isize::MAX, 1, 1);
        assert_eq!(high, 6 + isize::MAX as i128 + 1);
        assert_eq!(source_index(high, usize::MAX), None);

        assert_eq!(source_index(padded_coordinate(0, 1, isize::MAX, 1, 1), 4), None);
        assert_eq!(source_index(padded_coordinate(0, 1, isize::MIN, 0, 1), 4), None);

        let saturated = padded_coordinate(usize::MAX, usize::MAX, isize::MIN, usize::MAX, usize::MAX);
        assert_eq!(saturated, i128::MAX);
        assert_eq!(source_index(saturated, usize::MAX), None);
    }

    #[test]
    fn test_conv_output_size_extreme_padding_is_an_error() {
        let huge = isize::MAX / 2 + 1;
        assert!(matches!(
            conv_output_size(2, 1, 1, huge, 1),
            Err(KernelError::InvalidGeometry { .. })
        ));
        assert!(conv_output_size(2, 1, 1, isize::MAX, 1).is_err());
        assert!(conv_output_size(2, 1, 1, -isize::MAX, 1).is_err());
        assert!(conv_output_size(2, 1, 1, isize::MIN, 1).is_err());
        assert!(conv_output_size(2, usize::MAX, 1, 0, usize::MAX).is_err());

        // Large but representable padding is still a plain output size
        assert_eq!(conv_output_size(2, 1, 1, 1 << 40, 1).unwrap(), 2 + (1 << 41));
    }

    #[test]
    fn test_checked_len() {
        assert_eq!(checked_len(&[2, 3, 4]).unwrap(), 24);
        assert_eq!(checked_len(&[]).unwrap(), 1);
        assert_eq!(checked_len(&[0, usize::MAX]).unwrap(), 0);
        assert!(checked_len(&[usize::MAX, 2]).is_err());
        assert!(checked_len(&[isize::MAX as usize + 1]).is_err());

        let params = UnfoldParams::uniform(1, 1 << 40);
        assert!(column_shape(&[4, 2, 2, 2], [1, 1, 1], &params).is_err());
    }

    #[test]
    fn test_dims_from_shape() {
        let vol = VolumeDims::from_shape("test", &[2, 3, 4, 5]).unwrap();
        assert_eq!(vol.spatial(), [3, 4, 5]);
        assert_eq!(vol.channel_len(), 60);

        let col = ColumnDims::from_shape("test", &[2, 1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(col.filter_len(), 6);
        assert_eq!(col.rows(), 12);
        assert_eq!(col.row_len(), 120);
        assert_eq!(col.shape(), [2, 1, 2, 3, 4, 5, 6]);

        let err = VolumeDims::from_shape("test", &[2, 3, 4]).unwrap_err();
        assert!(err.is_shape_mismatch());
        let err = ColumnDims::from_shape("test", &[2, 3, 4, 5]).unwrap_err();
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_column_shape_with_stride_and_padding() {
        let params = UnfoldParams::new([2, 1, 1], [1, 0, 2]);
        let shape = column_shape(&[1, 5, 4, 3], [3, 2, 1], &params).unwrap();
        assert_eq!(shape, vec![1, 3, 2, 1, 3, 3, 7]);
    }

    #[test]
    fn test_validate_strict_output_dims() {
        let strict = UnfoldParams::default().with_shape_check(ShapeCheck::Strict);

        assert!(Geometry::validate("test", &[1, 4, 4, 4], &[1, 2, 2, 2, 3, 3, 3], &strict).is_ok());

        let err =
            Geometry::validate("test", &[1, 4, 4, 4], &[1, 2, 2, 2, 3, 3, 2], &strict).unwrap_err();
        assert_eq!(
            err,
            KernelError::output_shape_mismatch("test", [3, 3, 3], [3, 3, 2])
        );

        // Trusted mode iterates whatever the column declares
        let trusted = UnfoldParams::default();
        assert!(Geometry::validate("test", &[1, 4, 4, 4], &[1, 2, 2, 2, 3, 3, 2], &trusted).is_ok());
    }

    #[test]
    fn test_validate_channel_mismatch() {
        let err = Geometry::validate(
            "test",
            &[2, 4, 4, 4],
            &[3, 1, 1, 1, 4, 4, 4],
            &UnfoldParams::default(),
        )
        .unwrap_err();
        assert_eq!(err, KernelError::channel_mismatch("test", 2, 3));
    }
}
