//! # volfold-kernels
//!
//! Volumetric unfold/fold kernels for GEMM-based 3-D convolution.
//!
//! **Version:** 0.1.0-alpha.1
//!
//! ## Overview
//!
//! A 3-D convolution over a `[C, D, H, W]` volume becomes a single matrix
//! product once every receptive field is laid out as a row of a column
//! buffer `[C, fd, fh, fw, od, oh, ow]`:
//!
//! - ✅ **vol2col** - Forward unfold, zero-filling taps in the padding border
//! - ✅ **col2vol** - Adjoint fold, summing overlapping taps back into the volume
//! - ✅ **Parallel variants** - Row-parallel unfold, channel-parallel fold (bit-identical)
//! - ✅ **Allocating wrappers** - `unfold_volume`, `fold_columns`
//! - ✅ **Geometry helpers** - Output-size formula, column shapes, tap decomposition
//! - ✅ **Device dispatch** - `VolumeUnfold` / `VolumeFold` per execution target
//!
//! ## Quick Start
//!
//! ```rust
//! use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
//! use volfold_kernels::{col2vol, column_shape, vol2col, UnfoldParams};
//!
//! // One channel, 4x4x4 volume, 2x2x2 filter, stride 1, no padding
//! let volume = ArrayD::<f64>::ones(IxDyn(&[1, 4, 4, 4]));
//! let params = UnfoldParams::default();
//!
//! let shape = column_shape(volume.shape(), [2, 2, 2], &params).unwrap();
//! assert_eq!(shape, vec![1, 2, 2, 2, 3, 3, 3]);
//!
//! let mut column = ArrayD::<f64>::zeros(IxDyn(&shape));
//! vol2col(&volume.view(), &mut column.view_mut(), &params).unwrap();
//!
//! // Fold back into a zeroed volume: each voxel counts the windows covering it
//! let mut grad = ArrayD::<f64>::zeros(IxDyn(&[1, 4, 4, 4]));
//! col2vol(&mut grad.view_mut(), &column.view(), &params).unwrap();
//! assert_eq!(grad[IxDyn(&[0, 0, 0, 0])], 1.0);
//! assert_eq!(grad[IxDyn(&[0, 1, 2, 1])], 8.0);
//! ```
//!
//! ## Caller contract
//!
//! The kernels check buffer ranks, channel agreement and (under
//! [`ShapeCheck::Strict`]) the output extents. They do **not** clear the
//! col2vol target: [`col2vol`] adds into whatever the volume already holds.
//!
//! ## Features
//!
//! - `parallel` (default) - Enable parallel implementations using rayon
//! - `tracing` - Emit `tracing` events for kernel calls and rejected preconditions
//!
//! ## SciRS2 Integration
//!
//! This crate uses `scirs2-core` for all array operations and numerical computations.
//! Direct use of `ndarray`, `rayon`, or `num-traits` is not permitted.

#![deny(warnings)]

pub mod col2vol;
pub mod device;
pub mod error;
pub mod geometry;
pub mod tracing_support;
pub mod utils;
pub mod vol2col;


// Re-exports
pub use col2vol::*;
pub use device::*;
pub use error::{KernelError, KernelResult};
pub use geometry::{
    checked_len, column_shape, conv_output_size, padded_coordinate, source_index, ColumnDims,
    PatchIndex, ShapeCheck, UnfoldParams, VolumeDims, COLUMN_RANK, VOLUME_RANK,
};
pub use utils::*;
pub use vol2col::*;
