//! Percentile normalization ceiling.
//!
//! Colormap overlays normalize intensities against a high percentile of the
//! slide's non-zero samples rather than the maximum, so a few saturated
//! pixels do not wash out the ramp.

use image::DynamicImage;

/// Percentile used for the per-slide normalization ceiling.
pub const CEILING_PERCENTILE: f64 = 99.9;

/// Percentile of the non-zero samples of `image`, across all channels.
///
/// Uses linear interpolation between the two closest ranks. Returns 0.0
/// when the image has no non-zero samples.
pub fn percentile_nonzero(image: &DynamicImage, percentile: f64) -> f64 {
    let samples = nonzero_samples(image);
    percentile_of(samples, percentile)
}

fn nonzero_samples(image: &DynamicImage) -> Vec<f64> {
    fn collect<T: Copy + Into<f64>>(raw: &[T]) -> Vec<f64> {
        raw.iter()
            .map(|&v| v.into())
            .filter(|&v: &f64| v > 0.0)
            .collect()
    }

    match image {
        DynamicImage::ImageLuma8(img) => collect(img.as_raw()),
        DynamicImage::ImageLumaA8(img) => collect(img.as_raw()),
        DynamicImage::ImageRgb8(img) => collect(img.as_raw()),
        DynamicImage::ImageRgba8(img) => collect(img.as_raw()),
        DynamicImage::ImageLuma16(img) => collect(img.as_raw()),
        DynamicImage::ImageLumaA16(img) => collect(img.as_raw()),
        DynamicImage::ImageRgb16(img) => collect(img.as_raw()),
        DynamicImage::ImageRgba16(img) => collect(img.as_raw()),
        DynamicImage::ImageRgb32F(img) => collect(img.as_raw()),
        DynamicImage::ImageRgba32F(img) => collect(img.as_raw()),
        other => collect(other.to_rgba32f().as_raw()),
    }
}

fn percentile_of(mut samples: Vec<f64>, percentile: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    samples.sort_unstable_by(f64::total_cmp);

    let rank = (percentile.clamp(0.0, 100.0) / 100.0) * (samples.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    samples[lower] + (samples[upper] - samples[lower]) * fraction
}
