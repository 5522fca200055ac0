//! Example walking through vol2col and col2vol on small volumes
//!
//! vol2col lays every receptive field of a volume out as a column row;
//! col2vol sums column rows back into the voxels they were read from.
//!
//! Run with: cargo run --example unfold_fold --features parallel

use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
use volfold_kernels::{
    col2vol, column_shape, conv_output_size, fold_columns, time_operation, unfold_volume, vol2col,
    PatchIndex, UnfoldParams,
};

fn main() {
    println!("=== Volumetric Unfold/Fold Example ===\n");

    // Example 1: Output extents
    println!("1. Output Extents");
    println!("-----------------");

    for &(input, filter, stride, padding) in [(4, 2, 1, 0), (5, 3, 1, 1), (8, 3, 2, 1)].iter() {
        let out = conv_output_size(input, filter, stride, padding, 1)
            .map(|n| n.to_string())
            .unwrap_or_else(|e| e.to_string());
        println!(
            "  input {}, filter {}, stride {}, padding {} -> {}",
            input, filter, stride, padding, out
        );
    }
    println!();

    // Example 2: Unfolding a single-channel volume
    println!("2. Unfolding a 1x3x3x3 Volume with a 2x2x2 Filter");
    println!("-------------------------------------------------");

    let volume = ArrayD::from_shape_fn(IxDyn(&[1, 3, 3, 3]), |ix| {
        (ix[1] * 9 + ix[2] * 3 + ix[3]) as f64
    });
    let params = UnfoldParams::default();
    let shape = match column_shape(volume.shape(), [2, 2, 2], &params) {
        Ok(shape) => shape,
        Err(e) => {
            println!("  rejected: {}", e);
            return;
        }
    };
    println!("Column shape: {:?}", shape);

    let mut column = ArrayD::<f64>::zeros(IxDyn(&shape));
    if let Err(e) = vol2col(&volume.view(), &mut column.view_mut(), &params) {
        println!("  rejected: {}", e);
        return;
    }

    for row in 0..8 {
        let patch = PatchIndex::decompose(row, [2, 2, 2]);
        let values: Vec<f64> = column
            .iter()
            .skip(row * 8)
            .take(8)
            .cloned()
            .collect();
        println!("  tap {:?}: {:?}", patch.offsets(), values);
    }
    println!();

    // Example 3: Zero padding
    println!("3. Zero Padding");
    println!("---------------");

    let padded = UnfoldParams::uniform(1, 1);
    match unfold_volume(&volume.view(), [3, 3, 3], &padded) {
        Ok(column) => {
            let zeros = column.iter().filter(|&&x| x == 0.0).count();
            println!("Column shape: {:?}", column.shape());
            println!(
                "Entries from the padding border (plus voxel 0): {} of {}",
                zeros,
                column.len()
            );
        }
        Err(e) => println!("  rejected: {}", e),
    }
    println!();

    // Example 4: Folding counts overlapping windows
    println!("4. Folding Counts Overlapping Windows");
    println!("-------------------------------------");

    let ones = ArrayD::<f64>::ones(IxDyn(&[1, 2, 2, 2, 3, 3, 3]));
    match fold_columns(&ones.view(), &[1, 4, 4, 4], &params) {
        Ok(counts) => {
            for d in 0..4 {
                let plane: Vec<f64> = (0..16)
                    .map(|i| counts[IxDyn(&[0, d, i / 4, i % 4])])
                    .collect();
                println!("  depth {}: {:?}", d, plane);
            }
        }
        Err(e) => println!("  rejected: {}", e),
    }
    println!();

    // Example 5: col2vol accumulates into existing contents
    println!("5. Accumulating Into a Non-Zero Volume");
    println!("--------------------------------------");

    let mut grad = ArrayD::<f64>::from_elem(IxDyn(&[1, 3, 3, 3]), 100.0);
    if col2vol(&mut grad.view_mut(), &column.view(), &params).is_ok() {
        println!(
            "Voxel (0, 0, 0): 100 + {} = {}",
            volume[IxDyn(&[0, 0, 0, 0])],
            grad[IxDyn(&[0, 0, 0, 0])]
        );
        println!(
            "Voxel (1, 1, 1): 100 + 8 * {} = {}",
            volume[IxDyn(&[0, 1, 1, 1])],
            grad[IxDyn(&[0, 1, 1, 1])]
        );
    }
    println!();

    // Example 6: Timing
    println!("6. Timing");
    println!("---------");

    let large = ArrayD::<f64>::ones(IxDyn(&[8, 32, 32, 32]));
    let elements = 8 * 27 * 32 * 32 * 32;
    let (result, timing) = time_operation("unfold_volume 8x32^3, 3x3x3", elements, || {
        unfold_volume(&large.view(), [3, 3, 3], &padded)
    });
    match result {
        Ok(_) => timing.print(),
        Err(e) => println!("  rejected: {}", e),
    }

    #[cfg(feature = "parallel")]
    {
        use volfold_kernels::vol2col_parallel;

        let mut column = ArrayD::<f64>::zeros(IxDyn(&[8, 3, 3, 3, 32, 32, 32]));
        let (result, timing) = time_operation("vol2col_parallel 8x32^3, 3x3x3", elements, || {
            vol2col_parallel(&large.view(), &mut column.view_mut(), &padded)
        });
        match result {
            Ok(()) => timing.print(),
            Err(e) => println!("  rejected: {}", e),
        }
    }

    println!("\n=== Example Complete ===");
}
