use image::{codecs::jpeg::JpegEncoder, imageops, imageops::FilterType, DynamicImage, RgbImage};

use crate::types::AppError;

pub const THUMBNAIL_WIDTH: u32 = 400;
pub const THUMBNAIL_QUALITY: u8 = 85;

/// Rotates, auto-levels and shrinks an image, then encodes it as JPEG.
pub fn thumbnail(bytes: &[u8], rotation: i32) -> Result<Vec<u8>, AppError> {
    let img = decode(bytes)?;
    let rotated = match quarter_turns(rotation) {
        1 => img.rotate90(),
        2 => img.rotate180(),
        3 => img.rotate270(),
        _ => img,
    };
    let mut rgb = rotated.to_rgb8();
    auto_levels(&mut rgb);
    let (width, height) = rgb.dimensions();
    let rgb = if width > THUMBNAIL_WIDTH {
        let scaled = ((height as u64 * THUMBNAIL_WIDTH as u64) / width as u64).max(1) as u32;
        imageops::resize(&rgb, THUMBNAIL_WIDTH, scaled, FilterType::Triangle)
    } else {
        rgb
    };
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, THUMBNAIL_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| {
            tracing::error!("error encoding thumbnail: {:?}", e);
            AppError::ImageError
        })?;
    Ok(out)
}

pub async fn thumbnail_blocking(bytes: Vec<u8>, rotation: i32) -> Result<Vec<u8>, AppError> {
    tokio::task::spawn_blocking(move || thumbnail(&bytes, rotation))
        .await
        .map_err(|e| {
            tracing::error!("thumbnail task failed: {:?}", e);
            AppError::InternalServerError
        })?
}

/// Width and height of an encoded image.
pub fn dimensions(bytes: &[u8]) -> Result<(u32, u32), AppError> {
    let img = decode(bytes)?;
    Ok((img.width(), img.height()))
}

pub async fn dimensions_blocking(bytes: Vec<u8>) -> Result<(u32, u32), AppError> {
    tokio::task::spawn_blocking(move || dimensions(&bytes))
        .await
        .map_err(|e| {
            tracing::error!("dimensions task failed: {:?}", e);
            AppError::InternalServerError
        })?
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, AppError> {
    image::load_from_memory(bytes).map_err(|e| {
        tracing::error!("error decoding image: {:?}", e);
        AppError::ImageError
    })
}

/// Clockwise quarter turns closest to `rotation` degrees.
fn quarter_turns(rotation: i32) -> i32 {
    ((rotation.rem_euclid(360) + 45) / 90) % 4
}

/// Stretches every channel so its darkest value maps to 0 and its brightest to 255.
fn auto_levels(img: &mut RgbImage) {
    let mut low = [u8::MAX; 3];
    let mut high = [u8::MIN; 3];
    for pixel in img.pixels() {
        for c in 0..3 {
            low[c] = low[c].min(pixel[c]);
            high[c] = high[c].max(pixel[c]);
        }
    }
    for pixel in img.pixels_mut() {
        for c in 0..3 {
            if high[c] > low[c] {
                let span = (high[c] - low[c]) as u32;
                pixel[c] = (((pixel[c] - low[c]) as u32 * 255 + span / 2) / span) as u8;
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 200 + 20) as u8, (y % 200 + 20) as u8, 128])
    });
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_turns_snap() {
        assert_eq!(quarter_turns(0), 0);
        assert_eq!(quarter_turns(90), 1);
        assert_eq!(quarter_turns(180), 2);
        assert_eq!(quarter_turns(270), 3);
        assert_eq!(quarter_turns(330), 0);
        assert_eq!(quarter_turns(100), 1);
        assert_eq!(quarter_turns(-90), 3);
    }

    #[test]
    fn wide_images_are_shrunk() {
        let thumb = thumbnail(&png(800, 200), 0).unwrap();
        assert_eq!(&thumb[..2], &[0xFF, 0xD8]);
        assert_eq!(dimensions(&thumb).unwrap(), (400, 100));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let thumb = thumbnail(&png(120, 80), 0).unwrap();
        assert_eq!(dimensions(&thumb).unwrap(), (120, 80));
    }

    #[test]
    fn rotation_applies_before_resize() {
        let thumb = thumbnail(&png(200, 800), 90).unwrap();
        assert_eq!(dimensions(&thumb).unwrap(), (400, 100));
    }

    #[test]
    fn levels_stretch_full_range() {
        let mut img = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgb([50, 100, 7])
            } else {
                image::Rgb([150, 200, 7])
            }
        });
        auto_levels(&mut img);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 7]);
        assert_eq!(img.get_pixel(1, 0).0, [255, 255, 7]);
    }

    #[test]
    fn garbage_is_an_image_error() {
        assert_eq!(thumbnail(b"not an image", 0).unwrap_err(), AppError::ImageError);
    }
}
