use anyhow::{Context, Result};
use base64::Engine;
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder};

/// Render a surface-value vector as an RGB PNG data URL.
///
/// The vertex vector is wrapped into `width`-pixel rows (the tail of the
/// last row is padded with zeros) and every value is mapped through a
/// diverging blue-white-red ramp, symmetric about zero and scaled to the
/// vector's absolute maximum. Zero-valued vertices render white, matching
/// the unlabelled background of a surface map.
pub fn encode_surface_png_data_url(values: &[f32], width: u32) -> Result<String> {
    if width == 0 {
        anyhow::bail!("surface strip width must be at least 1 pixel");
    }
    if values.is_empty() {
        anyhow::bail!("surface value vector is empty");
    }

    let height = (values.len() as u32 + width - 1) / width;
    let limit = values.iter().fold(0.0f32, |max, v| max.max(v.abs()));
    let scale = if limit > 0.0 { limit } else { 1.0 };

    let mut encoded = Vec::with_capacity((width * height * 3) as usize);
    for row in 0..height {
        for col in 0..width {
            let index = (row * width + col) as usize;
            let value = values.get(index).copied().unwrap_or(0.0) / scale;
            let (r, g, b) = diverging_rgb(value);
            encoded.extend_from_slice(&[r, g, b]);
        }
    }

    let mut buffer = Vec::new();
    let encoder = PngEncoder::new(&mut buffer);
    encoder
        .write_image(&encoded, width, height, ColorType::Rgb8)
        .context("failed to encode PNG data")?;

    let base64 = base64::engine::general_purpose::STANDARD.encode(&buffer);
    Ok(format!("data:image/png;base64,{base64}"))
}

/// Blue for negative, red for positive, white at zero.
fn diverging_rgb(value: f32) -> (u8, u8, u8) {
    let clamped = value.clamp(-1.0, 1.0);
    let t = clamped.abs();
    let ramp = |channel: f32| ((1.0 - t) * 255.0 + t * channel).round() as u8;
    if clamped < 0.0 {
        (ramp(30.0), ramp(60.0), ramp(200.0))
    } else {
        (ramp(200.0), ramp(40.0), ramp(40.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_a_png_data_url() {
        let values = vec![0.0, 1.5, -1.5, 0.3];
        let url = encode_surface_png_data_url(&values, 2).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn partial_last_row_is_padded() {
        // 5 values over width 3 still encode (two rows).
        encode_surface_png_data_url(&[1.0, 2.0, 3.0, 4.0, 5.0], 3).unwrap();
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert!(encode_surface_png_data_url(&[], 8).is_err());
        assert!(encode_surface_png_data_url(&[1.0], 0).is_err());
    }

    #[test]
    fn ramp_is_white_at_zero_and_saturated_at_the_ends() {
        assert_eq!(diverging_rgb(0.0), (255, 255, 255));
        assert_eq!(diverging_rgb(1.0), (200, 40, 40));
        assert_eq!(diverging_rgb(-1.0), (30, 60, 200));
        // Out-of-range values clamp instead of wrapping.
        assert_eq!(diverging_rgb(7.0), diverging_rgb(1.0));
    }
}
