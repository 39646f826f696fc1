use image::{DynamicImage, Rgb, RgbImage};

use crate::error::OverlayError;

use super::ramp::ColorRamp;

/// Recolour `image` through `ramp`, normalizing intensities by `ceiling`.
///
/// Each pixel's intensity is the unweighted mean of all its channels (alpha
/// included), clamped to `[0, ceiling]` and rescaled to `[0, 1]`. A ceiling
/// that is not positive rescales every pixel to 0. The output always has
/// the input's dimensions.
pub fn apply_colormap(
    image: &DynamicImage,
    ramp: &ColorRamp,
    ceiling: f64,
) -> Result<RgbImage, OverlayError> {
    let (width, height) = (image.width(), image.height());

    match ramp.colors() {
        [] => return Err(OverlayError::DegenerateRamp),
        [only] => return Ok(RgbImage::from_pixel(width, height, Rgb(*only))),
        _ => {}
    }

    let intensities = mean_intensities(image)?;
    let mut output = RgbImage::new(width, height);

    for (pixel, intensity) in output.pixels_mut().zip(intensities) {
        let t = normalize(intensity, ceiling);
        if let Some(color) = ramp.color_at(t) {
            *pixel = Rgb(color);
        }
    }

    Ok(output)
}

fn normalize(intensity: f64, ceiling: f64) -> f64 {
    if ceiling.is_nan() || ceiling <= 0.0 || intensity.is_nan() {
        return 0.0;
    }
    intensity.clamp(0.0, ceiling) / ceiling
}

fn mean_intensities(image: &DynamicImage) -> Result<Vec<f64>, OverlayError> {
    fn means<T: Copy + Into<f64>>(raw: &[T], channels: usize) -> Vec<f64> {
        raw.chunks_exact(channels)
            .map(|px| px.iter().map(|&v| v.into()).sum::<f64>() / channels as f64)
            .collect()
    }

    let intensities = match image {
        DynamicImage::ImageLuma8(img) => means(img.as_raw(), 1),
        DynamicImage::ImageLumaA8(img) => means(img.as_raw(), 2),
        DynamicImage::ImageRgb8(img) => means(img.as_raw(), 3),
        DynamicImage::ImageRgba8(img) => means(img.as_raw(), 4),
        DynamicImage::ImageLuma16(img) => means(img.as_raw(), 1),
        DynamicImage::ImageLumaA16(img) => means(img.as_raw(), 2),
        DynamicImage::ImageRgb16(img) => means(img.as_raw(), 3),
        DynamicImage::ImageRgba16(img) => means(img.as_raw(), 4),
        DynamicImage::ImageRgb32F(img) => means(img.as_raw(), 3),
        DynamicImage::ImageRgba32F(img) => means(img.as_raw(), 4),
        other => {
            return Err(OverlayError::UnsupportedPixelLayout(format!(
                "{:?}",
                other.color()
            )))
        }
    };
    Ok(intensities)
}
