//! Example of a 3-D convolution layer built on vol2col and GEMM
//!
//! Forward:  out = W * vol2col(x)
//! Backward: dx  = col2vol(W^T * dout)
//!
//! Run with: cargo run --example conv3d_gemm --features tracing
//! (set `RUST_LOG=volfold_kernels=trace` to see every kernel call)

use anyhow::{Context, Result};
use scirs2_core::ndarray_ext::{Array2, ArrayD, IxDyn};
use volfold_kernels::tracing_support::{init_tracing, TracingConfig};
use volfold_kernels::{
    approx_equal, column_matrix, fold_columns, inner_product, unfold_volume, UnfoldParams,
};

fn main() -> Result<()> {
    init_tracing(TracingConfig::default())?;

    println!("=== Conv3d via vol2col + GEMM ===\n");

    let (in_channels, out_channels) = (3, 4);
    let spatial = [6, 6, 6];
    let filter = [3, 3, 3];
    let params = UnfoldParams::new([2, 1, 1], [1, 1, 1]);

    let input = ArrayD::from_shape_fn(
        IxDyn(&[in_channels, spatial[0], spatial[1], spatial[2]]),
        |ix| ((ix[0] * 7 + ix[1] * 5 + ix[2] * 3 + ix[3]) % 13) as f64 / 13.0,
    );
    let patch = in_channels * filter.iter().product::<usize>();
    let weights = Array2::from_shape_fn((out_channels, patch), |(o, p)| {
        ((o * 17 + p * 3) % 9) as f64 / 9.0 - 0.5
    });

    // Forward
    println!("1. Forward Pass");
    println!("---------------");

    let column = unfold_volume(&input.view(), filter, &params).context("unfolding input")?;
    let out_dims = params.output_dims(spatial, filter)?;
    println!("Input:   {:?}", input.shape());
    println!("Column:  {:?}", column.shape());

    let matrix = column_matrix(&column.view())?;
    let output = weights
        .dot(&matrix)
        .into_shape_with_order(IxDyn(&[out_channels, out_dims[0], out_dims[1], out_dims[2]]))
        .context("reshaping GEMM output")?;
    println!("Weights: {:?}", weights.shape());
    println!("Output:  {:?}", output.shape());
    println!();

    // Backward w.r.t. the input
    println!("2. Backward Pass");
    println!("----------------");

    let grad_output = output.mapv(|x| 2.0 * x);
    let grad_matrix = grad_output
        .view()
        .into_shape_with_order((out_channels, out_dims.iter().product::<usize>()))
        .context("viewing output gradient as a matrix")?;
    let grad_column = weights
        .t()
        .dot(&grad_matrix)
        .into_shape_with_order(IxDyn(column.shape()))
        .context("reshaping column gradient")?;
    let grad_input = fold_columns(&grad_column.view(), input.shape(), &params)
        .context("folding column gradient")?;
    println!("Input gradient: {:?}", grad_input.shape());
    println!();

    // Adjoint check
    println!("3. Adjoint Check");
    println!("----------------");

    let lhs = inner_product(&output.view(), &grad_output.view()).context("output shapes")?;
    let rhs = inner_product(&input.view(), &grad_input.view()).context("input shapes")?;
    println!("<conv(x), g>   = {:.12}", lhs);
    println!("<x, conv^T(g)> = {:.12}", rhs);

    let scale = lhs.abs().max(1.0);
    let lhs_arr = ArrayD::from_elem(IxDyn(&[1]), lhs / scale);
    let rhs_arr = ArrayD::from_elem(IxDyn(&[1]), rhs / scale);
    anyhow::ensure!(
        approx_equal(&lhs_arr.view(), &rhs_arr.view(), 1e-10),
        "adjoint identity violated: {} vs {}",
        lhs,
        rhs
    );
    println!("Adjoint identity holds");

    println!("\n=== Example Complete ===");
    Ok(())
}
