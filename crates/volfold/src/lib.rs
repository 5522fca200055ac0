//! # volfold - Volumetric unfold/fold for GEMM-based 3-D convolution
//!
//! **Version:** 0.1.0-alpha.1
//!
//! This is the **meta crate** that re-exports the volfold kernels for convenient access.
//!
//! ## Quick Start
//!
//! ```
//! use volfold::prelude::*;
//! use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
//!
//! // Two channels, 4x4x4 volume, 3x3x3 filter with "same" padding
//! let volume = ArrayD::<f64>::ones(IxDyn(&[2, 4, 4, 4]));
//! let params = UnfoldParams::uniform(1, 1);
//!
//! let column = unfold_volume(&volume.view(), [3, 3, 3], &params)?;
//! assert_eq!(column.shape(), &[2, 3, 3, 3, 4, 4, 4]);
//!
//! let matrix = column_matrix(&column.view())?;
//! assert_eq!(matrix.shape(), &[54, 64]);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! ### Kernels ([`kernels`])
//!
//! `vol2col` / `col2vol`, their parallel variants, the allocating wrappers
//! and the geometry helpers.
//!
//! ```
//! use volfold::kernels::conv_output_size;
//!
//! // 8 voxels, 3 taps, stride 2, padding 1
//! assert_eq!(conv_output_size(8, 3, 2, 1, 1).unwrap(), 4);
//! ```
//!
//! ### Backward pass
//!
//! Folding the column gradient accumulates every tap back into the voxel it
//! was read from.
//!
//! ```
//! use volfold::prelude::*;
//! use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
//!
//! let grad_column = ArrayD::<f32>::ones(IxDyn(&[1, 2, 2, 2, 3, 3, 3]));
//! let grad_input = fold_columns(&grad_column.view(), &[1, 4, 4, 4], &UnfoldParams::default())?;
//!
//! // Corner voxel sits in one window, centre voxels in eight
//! assert_eq!(grad_input[IxDyn(&[0, 0, 0, 0])], 1.0);
//! assert_eq!(grad_input[IxDyn(&[0, 1, 1, 1])], 8.0);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): Row-parallel unfold and channel-parallel fold
//! - `tracing`: Structured events for kernel calls and rejected buffers

#![deny(warnings)]

/// Unfold/fold kernels, geometry and device dispatch
pub use volfold_kernels as kernels;

/// Prelude module for convenient imports
///
/// Import everything with:
/// ```
/// use volfold::prelude::*;
/// ```
pub mod prelude {
    pub use volfold_kernels::{
        col2vol, column_matrix, column_shape, conv_output_size, fold_columns, unfold_volume,
        vol2col, Cpu, Device, KernelError, KernelResult, ShapeCheck, UnfoldParams, VolumeFold,
        VolumeUnfold,
    };

    #[cfg(feature = "parallel")]
    pub use volfold_kernels::{col2vol_parallel, vol2col_parallel, CpuParallel};

    pub use volfold_kernels::tracing_support::{init_tracing, TracingConfig};
}
