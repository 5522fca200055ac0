//! Execution targets for the unfold/fold kernels
//!
//! A device is a zero-sized marker value. The caller picks the implementation
//! by the device it holds; the kernels never inspect the marker itself.
//! Accelerator backends live outside this crate and implement
//! [`VolumeUnfold`] and [`VolumeFold`] for their own marker types with the
//! same shape contract as the CPU kernels.
//!
//! # Examples
//!
//! ```
//! use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
//! use volfold_kernels::{Cpu, UnfoldParams, VolumeFold, VolumeUnfold};
//!
//! fn roundtrip<D: VolumeUnfold<f32> + VolumeFold<f32>>(device: D) -> ArrayD<f32> {
//!     let volume = ArrayD::<f32>::ones(IxDyn(&[1, 2, 2, 2]));
//!     let mut column = ArrayD::<f32>::zeros(IxDyn(&[1, 1, 1, 1, 2, 2, 2]));
//!     let mut grad = ArrayD::<f32>::zeros(IxDyn(&[1, 2, 2, 2]));
//!     let params = UnfoldParams::default();
//!
//!     device.vol2col(&volume.view(), &mut column.view_mut(), &params).unwrap();
//!     device.col2vol(&mut grad.view_mut(), &column.view(), &params).unwrap();
//!     grad
//! }
//!
//! assert_eq!(roundtrip(Cpu), ArrayD::<f32>::ones(IxDyn(&[1, 2, 2, 2])));
//! ```

use crate::col2vol::col2vol;
use crate::error::KernelResult;
use crate::geometry::UnfoldParams;
use crate::vol2col::vol2col;
use scirs2_core::ndarray_ext::{ArrayView, ArrayViewMut, IxDyn};
use scirs2_core::numeric::Float;
use std::fmt;

/// Marker for where a kernel runs
pub trait Device: fmt::Debug + Copy + Default + Send + Sync + 'static {
    /// Short name recorded as the `device` field of kernel-call trace events
    const NAME: &'static str;
}

/// Single-threaded CPU kernels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Cpu;

impl Device for Cpu {
    const NAME: &'static str = "cpu";
}

/// CPU kernels parallelized over column rows (unfold) or channels (fold)
#[cfg(feature = "parallel")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CpuParallel;

#[cfg(feature = "parallel")]
impl Device for CpuParallel {
    const NAME: &'static str = "cpu-parallel";
}

/// Volume-to-column unfolding on a device
pub trait VolumeUnfold<T> {
    /// Write every element of `column` from `volume`; see [`vol2col`](crate::vol2col)
    fn vol2col(
        &self,
        volume: &ArrayView<T, IxDyn>,
        column: &mut ArrayViewMut<T, IxDyn>,
        params: &UnfoldParams,
    ) -> KernelResult<()>;
}

/// Column-to-volume accumulation on a device
pub trait VolumeFold<T> {
    /// Add every in-range element of `column` into `volume`; see [`col2vol`](crate::col2vol)
    fn col2vol(
        &self,
        volume: &mut ArrayViewMut<T, IxDyn>,
        column: &ArrayView<T, IxDyn>,
        params: &UnfoldParams,
    ) -> KernelResult<()>;
}

impl<T: Float> VolumeUnfold<T> for Cpu {
    fn vol2col(
        &self,
        volume: &ArrayView<T, IxDyn>,
        column: &mut ArrayViewMut<T, IxDyn>,
        params: &UnfoldParams,
    ) -> KernelResult<()> {
        vol2col(volume, column, params)
    }
}

impl<T: Float> VolumeFold<T> for Cpu {
    fn col2vol(
        &self,
        volume: &mut ArrayViewMut<T, IxDyn>,
        column: &ArrayView<T, IxDyn>,
        params: &UnfoldParams,
    ) -> KernelResult<()> {
        col2vol(volume, column, params)
    }
}

#[cfg(feature = "parallel")]
impl<T: Float + Send + Sync> VolumeUnfold<T> for CpuParallel {
    fn vol2col(
        &self,
        volume: &ArrayView<T, IxDyn>,
        column: &mut ArrayViewMut<T, IxDyn>,
        params: &UnfoldParams,
    ) -> KernelResult<()> {
        crate::vol2col::vol2col_parallel(volume, column, params)
    }
}

#[cfg(feature = "parallel")]
impl<T: Float + Send + Sync> VolumeFold<T> for CpuParallel {
    fn col2vol(
        &self,
        volume: &mut ArrayViewMut<T, IxDyn>,
        column: &ArrayView<T, IxDyn>,
        params: &UnfoldParams,
    ) -> KernelResult<()> {
        crate::col2vol::col2vol_parallel(volume, column, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::ArrayD;

    fn unfold_on<D: VolumeUnfold<f64>>(device: D, volume: &ArrayD<f64>, shape: &[usize]) -> ArrayD<f64> {
        let mut column = ArrayD::<f64>::zeros(IxDyn(shape));
        device
            .vol2col(&volume.view(), &mut column.view_mut(), &UnfoldParams::uniform(1, 1))
            .unwrap();
        column
    }

    #[test]
    fn test_device_names() {
        assert_eq!(Cpu::NAME, "cpu");
        #[cfg(feature = "parallel")]
        assert_eq!(CpuParallel::NAME, "cpu-parallel");
    }

    #[test]
    fn test_cpu_dispatch_matches_free_function() {
        let volume = ArrayD::from_shape_fn(IxDyn(&[2, 3, 3, 3]), |ix| (ix[1] + ix[2] * ix[3]) as f64);
        let shape = [2, 3, 3, 3, 3, 3, 3];

        let via_device = unfold_on(Cpu, &volume, &shape);
        let mut direct = ArrayD::<f64>::zeros(IxDyn(&shape));
        vol2col(&volume.view(), &mut direct.view_mut(), &UnfoldParams::uniform(1, 1)).unwrap();

        assert_eq!(via_device, direct);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_devices_agree() {
        let volume = ArrayD::from_shape_fn(IxDyn(&[2, 3, 3, 3]), |ix| (ix[0] * 7 + ix[3]) as f64);
        let shape = [2, 3, 3, 3, 3, 3, 3];
        assert_eq!(
            unfold_on(Cpu, &volume, &shape),
            unfold_on(CpuParallel, &volume, &shape)
        );

        let column = unfold_on(Cpu, &volume, &shape);
        let mut serial = ArrayD::<f64>::zeros(IxDyn(&[2, 3, 3, 3]));
        let mut parallel = serial.clone();
        let params = UnfoldParams::uniform(1, 1);
        Cpu.col2vol(&mut serial.view_mut(), &column.view(), &params).unwrap();
        CpuParallel
            .col2vol(&mut parallel.view_mut(), &column.view(), &params)
            .unwrap();
        assert_eq!(serial, parallel);
    }
}
