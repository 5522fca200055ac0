//! Performance benchmarks for volfold-kernels
//!
//! Run with: cargo bench -p volfold-kernels
//!
//! Benchmarks cover:
//! - vol2col (serial & parallel)
//! - col2vol (serial & parallel)
//! - Unfold + GEMM, the forward pass of a 3-D convolution

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scirs2_core::ndarray_ext::{Array2, ArrayD, IxDyn};
use volfold_kernels::*;

const FILTER: [usize; 3] = [3, 3, 3];

fn volume(channels: usize, size: usize) -> ArrayD<f64> {
    ArrayD::from_shape_fn(IxDyn(&[channels, size, size, size]), |ix| {
        ((ix[0] + ix[1] * 3 + ix[2] * 5 + ix[3] * 7) % 11) as f64
    })
}

fn bench_vol2col(c: &mut Criterion) {
    let mut group = c.benchmark_group("vol2col");
    let params = UnfoldParams::uniform(1, 1);

    for &(channels, size) in [(1, 16), (4, 16), (8, 32), (16, 32)].iter() {
        let volume = volume(channels, size);
        let shape = column_shape(volume.shape(), FILTER, &params).unwrap();
        let mut column = ArrayD::<f64>::zeros(IxDyn(&shape));

        group.throughput(Throughput::Elements(column.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("serial", format!("{}x{}^3", channels, size)),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    vol2col(&volume.view(), &mut column.view_mut(), &params).unwrap();
                    black_box(&column);
                });
            },
        );

        #[cfg(feature = "parallel")]
        group.bench_with_input(
            BenchmarkId::new("parallel", format!("{}x{}^3", channels, size)),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    vol2col_parallel(&volume.view(), &mut column.view_mut(), &params).unwrap();
                    black_box(&column);
                });
            },
        );
    }
    group.finish();
}

fn bench_col2vol(c: &mut Criterion) {
    let mut group = c.benchmark_group("col2vol");
    let params = UnfoldParams::uniform(1, 1);

    for &(channels, size) in [(1, 16), (4, 16), (8, 32), (16, 32)].iter() {
        let volume_shape = [channels, size, size, size];
        let shape = column_shape(&volume_shape, FILTER, &params).unwrap();
        let column = ArrayD::<f64>::from_elem(IxDyn(&shape), 0.5);
        let mut grad = ArrayD::<f64>::zeros(IxDyn(&volume_shape));

        group.throughput(Throughput::Elements(column.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("serial", format!("{}x{}^3", channels, size)),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    grad.fill(0.0);
                    col2vol(&mut grad.view_mut(), &column.view(), &params).unwrap();
                    black_box(&grad);
                });
            },
        );

        #[cfg(feature = "parallel")]
        group.bench_with_input(
            BenchmarkId::new("parallel", format!("{}x{}^3", channels, size)),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    grad.fill(0.0);
                    col2vol_parallel(&mut grad.view_mut(), &column.view(), &params).unwrap();
                    black_box(&grad);
                });
            },
        );
    }
    group.finish();
}

fn bench_conv3d_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("conv3d_forward");
    let params = UnfoldParams::uniform(1, 1);

    for &(channels, size, out_channels) in [(4, 16, 8), (8, 16, 16), (16, 16, 32)].iter() {
        let volume = volume(channels, size);
        let patch = channels * FILTER.iter().product::<usize>();
        let weights = Array2::<f64>::from_shape_fn((out_channels, patch), |(i, j)| {
            ((i * 13 + j) % 7) as f64 - 3.0
        });

        // multiply + add per weight per output voxel
        let ops = out_channels * patch * size * size * size * 2;
        group.throughput(Throughput::Elements(ops as u64));

        group.bench_with_input(
            BenchmarkId::new("unfold_gemm", format!("{}->{}x{}^3", channels, out_channels, size)),
            &size,
            |bencher, _| {
                bencher.iter(|| {
                    let column = unfold_volume(&volume.view(), FILTER, &params).unwrap();
                    let matrix = column_matrix(&column.view()).unwrap();
                    black_box(weights.dot(&matrix));
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_vol2col, bench_col2vol, bench_conv3d_forward);
criterion_main!(benches);
