//! Padding and PNG encoding

use tiny_skia::{Color, IntSize, Pixmap, PixmapPaint, Transform};

use crate::artifact::RenderArtifact;
use crate::error::{RenderError, Result};
use crate::rasterizer::RasterPage;

/// Place the page on a white canvas with `padding` pixels on every side
pub fn pad(page: &RasterPage, padding: u32) -> Result<Pixmap> {
    let width = padded(page.width, padding)?;
    let height = padded(page.height, padding)?;

    let mut canvas = Pixmap::new(width, height).ok_or_else(|| {
        RenderError::Encoding(format!("Failed to create canvas ({}x{})", width, height))
    })?;
    canvas.fill(Color::WHITE);

    let content = to_pixmap(page)?;
    let offset = i32::try_from(padding)
        .map_err(|_| RenderError::Encoding(format!("padding {padding} out of range")))?;
    canvas.draw_pixmap(
        offset,
        offset,
        content.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );

    Ok(canvas)
}

/// Pad the page and encode it as PNG
pub fn pad_and_encode(page: &RasterPage, padding: u32) -> Result<RenderArtifact> {
    let canvas = pad(page, padding)?;
    let png = encode_optimized(&canvas)?;
    Ok(RenderArtifact::new(png, canvas.width(), canvas.height()))
}

/// Encode an opaque canvas as 8-bit RGB PNG with maximum compression
///
/// The canvas is fully opaque, so premultiplied channels equal straight
/// ones and the alpha channel can be dropped.
pub fn encode_optimized(canvas: &Pixmap) -> Result<Vec<u8>> {
    let rgb: Vec<u8> = canvas
        .pixels()
        .iter()
        .flat_map(|p| [p.red(), p.green(), p.blue()])
        .collect();

    let mut png_data = Vec::new();
    let mut encoder = png::Encoder::new(&mut png_data, canvas.width(), canvas.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Best);
    encoder.set_adaptive_filter(png::AdaptiveFilterType::Adaptive);

    let mut writer = encoder.write_header().map_err(encoding_error)?;
    writer.write_image_data(&rgb).map_err(encoding_error)?;
    writer.finish().map_err(encoding_error)?;

    Ok(png_data)
}

fn encoding_error(err: png::EncodingError) -> RenderError {
    RenderError::Encoding(format!("PNG encoding failed: {}", err))
}

fn padded(extent: u32, padding: u32) -> Result<u32> {
    padding
        .checked_mul(2)
        .and_then(|p| extent.checked_add(p))
        .ok_or_else(|| RenderError::Encoding(format!("canvas too large: {extent} + 2x{padding}")))
}

/// Opaque RGB is valid premultiplied RGBA once alpha is 255
fn to_pixmap(page: &RasterPage) -> Result<Pixmap> {
    let size = IntSize::from_wh(page.width, page.height)
        .ok_or_else(|| RenderError::Encoding("empty page".to_string()))?;
    let rgba: Vec<u8> = page
        .rgb
        .chunks_exact(3)
        .flat_map(|px| [px[0], px[1], px[2], 255])
        .collect();
    Pixmap::from_vec(rgba, size).ok_or_else(|| {
        RenderError::Encoding(format!(
            "pixel buffer does not match {}x{}",
            page.width, page.height
        ))
    })
}
