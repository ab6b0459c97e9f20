// tests/test_convolution.rs — Integration tests for the CPU reference blur.

use blurforge::convolution::{gaussian_blur, gaussian_kernel_1d};
use blurforge::frame::RgbaFrame;

fn gradient_frame(w: usize, h: usize) -> RgbaFrame {
    let mut f = RgbaFrame::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let v = ((x * 255) / w.max(1)) as u8;
            f.set(x, y, [v, v, v, 255]);
        }
    }
    f
}

#[test]
fn blur_preserves_mean_intensity() {
    // The kernel sums to 1, so blurring should preserve the average
    // intensity up to clamp-border effects.
    let mut src = RgbaFrame::new(48, 48);
    for y in 0..48 {
        for x in 0..48 {
            let v = ((x * 5 + y * 11) % 256) as u8;
            src.set(x, y, [v, v, v, 255]);
        }
    }
    let n = (src.width() * src.height()) as f32;
    let before: f32 = src.pixels().map(|(_, _, p)| p[0] as f32).sum::<f32>() / n;

    let out = gaussian_blur(&src, 1.5);
    let after: f32 = out.pixels().map(|(_, _, p)| p[0] as f32).sum::<f32>() / n;

    assert!(
        (before - after).abs() < 2.0,
        "mean shifted too much: {before} → {after}"
    );
}

#[test]
fn horizontal_gradient_rows_stay_identical() {
    // A pure horizontal gradient is constant along y, so the vertical
    // pass changes nothing: every row of the result must be identical.
    let src = gradient_frame(40, 20);
    let out = gaussian_blur(&src, 1.0);
    for y in 1..20 {
        for x in 0..40 {
            assert_eq!(
                out.get(x, y),
                out.get(x, 0),
                "row {y} differs from row 0 at x={x}"
            );
        }
    }
}

#[test]
fn blur_reduces_contrast_of_an_edge() {
    // A hard step edge must soften: the pixel just left of the edge gets
    // brighter, the pixel just right gets darker.
    let mut src = RgbaFrame::new(32, 8);
    for y in 0..8 {
        for x in 0..32 {
            let v = if x < 16 { 0 } else { 255 };
            src.set(x, y, [v, v, v, 255]);
        }
    }
    let out = gaussian_blur(&src, 1.0);
    assert!(out.get(15, 4)[0] > 0, "left of edge stayed black");
    assert!(out.get(16, 4)[0] < 255, "right of edge stayed white");
    // Far from the edge nothing changes.
    assert_eq!(out.get(0, 4)[0], 0);
    assert_eq!(out.get(31, 4)[0], 255);
}

#[test]
fn larger_sigma_blurs_more() {
    // Measured as the residual step height across the edge.
    let mut src = RgbaFrame::new(64, 4);
    for y in 0..4 {
        for x in 0..64 {
            let v = if x < 32 { 0 } else { 255 };
            src.set(x, y, [v, v, v, 255]);
        }
    }
    let step = |f: &RgbaFrame| f.get(33, 2)[0] as i32 - f.get(30, 2)[0] as i32;
    let narrow = gaussian_blur(&src, 0.85);
    let wide = gaussian_blur(&src, 3.0);
    assert!(
        step(&wide) < step(&narrow),
        "sigma 3.0 should flatten the edge more: {} vs {}",
        step(&wide),
        step(&narrow)
    );
}

#[test]
fn one_pixel_frame_is_a_fixed_point() {
    // Clamp-to-edge makes every tap read the same pixel.
    let mut src = RgbaFrame::new(1, 1);
    src.set(0, 0, [12, 34, 56, 78]);
    let out = gaussian_blur(&src, 2.0);
    assert_eq!(out.get(0, 0), [12, 34, 56, 78]);
}

#[test]
fn kernel_width_tracks_sigma() {
    assert!(gaussian_kernel_1d(0.5).len() < gaussian_kernel_1d(2.0).len());
    assert_eq!(gaussian_kernel_1d(2.0).len(), 13); // half = 6
}
