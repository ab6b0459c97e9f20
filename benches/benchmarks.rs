// benches/benchmarks.rs — CPU reference blur benchmarks.
//
//   cargo bench
//
// The GPU path is not benchmarked here: criterion's sampling would be
// dominated by device setup, and timing it meaningfully needs a real
// adapter the bench machines may not have. The demo prints per-stage
// timings for that instead.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use blurforge::convolution::{gaussian_blur, gaussian_kernel_1d};
use blurforge::frame::RgbaFrame;

fn noise_frame(w: usize, h: usize) -> RgbaFrame {
    // Deterministic LCG so runs are comparable.
    let mut rng = 0x2545f491u32;
    let mut f = RgbaFrame::new(w, h);
    for y in 0..h {
        for x in 0..w {
            rng = rng.wrapping_mul(1664525).wrapping_add(1013904223);
            let b = rng.to_le_bytes();
            f.set(x, y, [b[0], b[1], b[2], 255]);
        }
    }
    f
}

fn bench_kernel_generation(c: &mut Criterion) {
    c.bench_function("gaussian_kernel_1d sigma=1.5", |b| {
        b.iter(|| gaussian_kernel_1d(std::hint::black_box(1.5)))
    });
}

fn bench_blur(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_blur 512x512");
    let frame = noise_frame(512, 512);
    for sigma in [0.85f32, 1.5, 3.0] {
        group.bench_with_input(
            BenchmarkId::from_parameter(sigma),
            &sigma,
            |b, &sigma| b.iter(|| gaussian_blur(&frame, sigma)),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_kernel_generation, bench_blur);
criterion_main!(benches);
