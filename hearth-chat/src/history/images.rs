//! Image downsizing for the one image forwarded per generation.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError, Rgba, RgbaImage};
use tracing::debug;

use crate::types::{Attachment, TurnImage};

const JPEG_QUALITY: u8 = 90;

/// Decode an attachment and shrink it so neither edge exceeds `max_dim`.
///
/// Images already inside the bound are forwarded with their original bytes.
/// Larger images are flattened onto white and re-encoded as JPEG.
pub fn downsize(attachment: &Attachment, max_dim: u32) -> Result<TurnImage, ImageError> {
    let decoded = image::load_from_memory(&attachment.data)?;
    let (width, height) = decoded.dimensions();

    if width <= max_dim && height <= max_dim {
        return Ok(TurnImage {
            mime_type: attachment.mime_type.clone(),
            data: attachment.data.clone(),
            width,
            height,
        });
    }

    let resized = DynamicImage::ImageRgba8(flatten_alpha(&decoded))
        .resize(max_dim, max_dim, FilterType::Triangle)
        .to_rgb8();
    let (new_width, new_height) = resized.dimensions();

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&DynamicImage::ImageRgb8(resized))?;

    debug!(
        "Downsized image {}x{} -> {}x{} ({} bytes)",
        width,
        height,
        new_width,
        new_height,
        bytes.len()
    );

    Ok(TurnImage {
        mime_type: "image/jpeg".to_string(),
        data: bytes,
        width: new_width,
        height: new_height,
    })
}

fn flatten_alpha(image: &DynamicImage) -> RgbaImage {
    let rgba = image.to_rgba8();
    let mut flattened = RgbaImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        flattened.put_pixel(
            x,
            y,
            Rgba([blend(pixel[0]), blend(pixel[1]), blend(pixel[2]), 255]),
        );
    }
    flattened
}

#[cfg(test)]
pub(crate) fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    let image = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}
