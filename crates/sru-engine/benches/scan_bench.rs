//! Benchmark: SRU forward scan, sequential vs rayon column fan-out.
//!
//! Shapes follow the usual (batch=48, feature=128) layer at several
//! sequence lengths.

use std::time::Instant;

use sru_engine::{scan_chunked, BufferView, RecurrenceEngine, ScanConfig, ScanInputs, SruDims};

fn time_it(iters: usize, mut f: impl FnMut()) -> f64 {
    f(); // warm-up
    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    start.elapsed().as_secs_f64() / iters as f64
}

fn wave(n: usize, k: usize) -> Vec<f32> {
    (0..n).map(|i| ((i * k + 3) % 29) as f32 * 0.07 - 1.0).collect()
}

fn main() {
    let sequential = RecurrenceEngine::new(ScanConfig {
        min_parallel_columns: usize::MAX,
        ..ScanConfig::default()
    })
    .expect("valid config");
    let parallel = RecurrenceEngine::new(ScanConfig {
        min_parallel_columns: 1,
        ..ScanConfig::default()
    })
    .expect("valid config");
    parallel.init().expect("cpu runtime");

    println!(
        "{:<22} {:>12} {:>12} {:>9} {:>14}",
        "shape", "sequential", "parallel", "speedup", "chunked(16)"
    );

    for &time in &[16usize, 50, 128, 512] {
        let dims = SruDims::new(48, 128, time);
        let x = wave(dims.seq_shape().numel(), 7);
        let u = wave(dims.gate_shape().numel(), 5);
        let bias = wave(dims.bias_shape().numel(), 3);
        let inputs = ScanInputs::new(
            BufferView::new(&x, dims.seq_shape().dims()).expect("x"),
            BufferView::new(&u, dims.gate_shape().dims()).expect("u"),
            BufferView::new(&bias, dims.bias_shape().dims()).expect("bias"),
        );

        let iters = if time <= 128 { 50 } else { 10 };
        let seq_s = time_it(iters, || {
            let _ = sequential.scan(&inputs).expect("scan");
        });
        let par_s = time_it(iters, || {
            let _ = parallel.scan(&inputs).expect("scan");
        });
        let chunk_s = time_it(iters, || {
            let _ = scan_chunked(&parallel, &inputs, 16).expect("scan");
        });

        println!(
            "{:<22} {:>10.3}ms {:>10.3}ms {:>8.1}x {:>12.3}ms",
            format!("48x128x{}", time),
            seq_s * 1000.0,
            par_s * 1000.0,
            seq_s / par_s,
            chunk_s * 1000.0,
        );
    }
}
