// convolution.rs — CPU reference gaussian blur.
//
// This is the authoritative implementation: the GPU kernel in
// shaders/gaussian.wgsl computes the same weights from the same sigma and
// is validated against this code pixel-for-pixel (within float
// associativity).
//
// Border policy is clamp-to-edge, matching the GPU sampler configuration:
// a sample at x = -2 reads the pixel at x = 0.

use crate::frame::RgbaFrame;

/// Largest supported kernel half-size. Bounded by the 16-coefficient
/// uniform array the GPU kernel reads; ceil(3σ) hits this at σ = 5.
pub const MAX_HALF_SIZE: usize = 15;

/// Compute a normalized 1D gaussian kernel for the given sigma.
///
/// half_size = ceil(3σ).max(1), capped at [`MAX_HALF_SIZE`]; the returned
/// kernel has length `2 * half_size + 1`, is symmetric, and sums to 1.
///
/// k[half + i] = exp(−i² / (2σ²)) / Σ
pub fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    assert!(sigma > 0.0, "sigma must be positive, got {sigma}");
    let half = ((3.0 * sigma).ceil().max(1.0) as usize).min(MAX_HALF_SIZE);
    let len = 2 * half + 1;
    let mut k = vec![0.0f32; len];
    let two_sigma_sq = 2.0 * sigma * sigma;
    for i in 0..=half {
        let v = (-((i * i) as f32) / two_sigma_sq).exp();
        k[half - i] = v;
        k[half + i] = v;
    }
    let sum: f32 = k.iter().sum();
    for v in &mut k {
        *v /= sum;
    }
    k
}

/// Gaussian-blur an RGBA frame on the CPU.
///
/// Separable implementation: one horizontal pass and one vertical pass
/// over f32 channel values, clamp-to-edge at the borders, all four
/// channels filtered (alpha included — the filter treats the image as
/// four independent planes, as the GPU kernel does).
///
/// The result is a compact frame (stride == width).
pub fn gaussian_blur(src: &RgbaFrame, sigma: f32) -> RgbaFrame {
    let kernel = gaussian_kernel_1d(sigma);
    let half = (kernel.len() / 2) as isize;
    let w = src.width();
    let h = src.height();

    // Horizontal pass into an f32 plane set.
    let mut mid = vec![0.0f32; w * h * 4];
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (t, &coeff) in kernel.iter().enumerate() {
                let sx = clamp_coord(x as isize + t as isize - half, w);
                let px = src.get(sx, y);
                for c in 0..4 {
                    acc[c] += px[c] as f32 * coeff;
                }
            }
            let base = (y * w + x) * 4;
            mid[base..base + 4].copy_from_slice(&acc);
        }
    }

    // Vertical pass back to u8.
    let mut out = RgbaFrame::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (t, &coeff) in kernel.iter().enumerate() {
                let sy = clamp_coord(y as isize + t as isize - half, h);
                let base = (sy * w + x) * 4;
                for c in 0..4 {
                    acc[c] += mid[base + c] * coeff;
                }
            }
            let px = [
                quantize(acc[0]),
                quantize(acc[1]),
                quantize(acc[2]),
                quantize(acc[3]),
            ];
            out.set(x, y, px);
        }
    }
    out
}

/// Clamp-to-edge: map a possibly out-of-range coordinate into [0, len).
#[inline]
fn clamp_coord(v: isize, len: usize) -> usize {
    v.clamp(0, len as isize - 1) as usize
}

/// f32 channel value back to u8, matching the GPU's unorm8 write
/// (round-to-nearest after clamping to [0, 255]).
#[inline]
fn quantize(v: f32) -> u8 {
    v.clamp(0.0, 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        for &sigma in &[0.5f32, 0.85, 1.0, 1.5, 3.0] {
            let k = gaussian_kernel_1d(sigma);
            assert_eq!(k.len() % 2, 1, "kernel length must be odd");
            let sum: f32 = k.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6, "sigma {sigma}: sum = {sum}");
            let half = k.len() / 2;
            for i in 0..half {
                assert!(
                    (k[i] - k[k.len() - 1 - i]).abs() < 1e-7,
                    "sigma {sigma}: asymmetric at index {i}"
                );
            }
            // Centre weight dominates.
            assert!(k[half] >= k[half + 1]);
        }
    }

    #[test]
    fn kernel_half_size_formula() {
        // half = ceil(3σ).max(1), so σ=1.0 → 3 → 7 taps.
        assert_eq!(gaussian_kernel_1d(1.0).len(), 7);
        // σ=0.85 → ceil(2.55)=3 → 7 taps.
        assert_eq!(gaussian_kernel_1d(0.85).len(), 7);
        // Tiny sigma still gets at least 3 taps.
        assert_eq!(gaussian_kernel_1d(0.1).len(), 3);
        // Huge sigma caps at MAX_HALF_SIZE.
        assert_eq!(gaussian_kernel_1d(100.0).len(), 2 * MAX_HALF_SIZE + 1);
    }

    #[test]
    #[should_panic(expected = "sigma must be positive")]
    fn kernel_rejects_nonpositive_sigma() {
        let _ = gaussian_kernel_1d(0.0);
    }

    #[test]
    fn constant_image_is_unchanged() {
        // The kernel sums to 1, so a flat image stays flat — including the
        // border pixels, because clamp-to-edge reads the same value there.
        let mut src = RgbaFrame::new(16, 16);
        for y in 0..16 {
            for x in 0..16 {
                src.set(x, y, [90, 120, 200, 255]);
            }
        }
        let out = gaussian_blur(&src, 1.0);
        for (x, y, px) in out.pixels() {
            assert_eq!(px, [90, 120, 200, 255], "changed at ({x},{y})");
        }
    }

    #[test]
    fn blur_preserves_mean() {
        let mut src = RgbaFrame::new(32, 32);
        for y in 0..32 {
            for x in 0..32 {
                let v = ((x * 7 + y * 13) % 256) as u8;
                src.set(x, y, [v, v, v, 255]);
            }
        }
        let n = (src.width() * src.height()) as f32;
        let mean_before: f32 =
            src.pixels().map(|(_, _, px)| px[0] as f32).sum::<f32>() / n;

        let out = gaussian_blur(&src, 1.0);
        let mean_after: f32 =
            out.pixels().map(|(_, _, px)| px[0] as f32).sum::<f32>() / n;

        // Clamp borders pull edge pixels toward the edge value; the global
        // mean should still be very close.
        assert!(
            (mean_before - mean_after).abs() < 2.0,
            "mean shifted too much: {mean_before} → {mean_after}"
        );
    }

    #[test]
    fn blur_smooths_an_impulse() {
        // A single bright pixel must spread into its neighbourhood and the
        // centre must lose energy.
        let mut src = RgbaFrame::new(9, 9);
        src.set(4, 4, [255, 255, 255, 255]);
        let out = gaussian_blur(&src, 1.0);

        let centre = out.get(4, 4)[0];
        let neighbour = out.get(5, 4)[0];
        assert!(centre < 255, "centre kept full energy: {centre}");
        assert!(neighbour > 0, "energy did not spread");
        assert!(centre > neighbour, "centre should stay brightest");
        // Far corner is beyond a 7-tap kernel's reach from (4,4).
        assert_eq!(out.get(0, 0)[0], 0);
    }

    #[test]
    fn alpha_channel_is_filtered_too() {
        // The filter runs over all four channels; a hard alpha edge must
        // soften like any other channel.
        let mut src = RgbaFrame::new(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                let a = if x < 4 { 0 } else { 255 };
                src.set(x, y, [0, 0, 0, a]);
            }
        }
        let out = gaussian_blur(&src, 1.0);
        let a_mid = out.get(4, 4)[3];
        assert!(
            a_mid > 0 && a_mid < 255,
            "alpha edge did not blur: {a_mid}"
        );
    }
}
