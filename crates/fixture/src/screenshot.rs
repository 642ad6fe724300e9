//! Decoding of `screen_capture` payloads into addressable pixels.

use base64::Engine as _;
use tp_client::{ImageContent, ToolResult};

use crate::color::Rgb;
use crate::error::{FixtureError, Result};
use crate::geometry::Point;

/// A decoded screenshot, one [`Rgb`] per pixel in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pixels: Vec<Rgb>,
}

impl Screenshot {
    pub fn from_content(content: &ImageContent) -> Result<Self> {
        if content.mime_type != "image/png" {
            return Err(FixtureError::InvalidImage(format!(
                "unsupported mime type {}",
                content.mime_type
            )));
        }
        let bytes = base64::engine::general_purpose::STANDARD.decode(content.data.trim())?;
        let (width, height, pixels) = decode_png(&bytes)?;
        Ok(Self {
            mime_type: content.mime_type.clone(),
            width,
            height,
            pixels,
        })
    }

    /// Decode the first image item of a tool result.
    pub fn from_result(result: &ToolResult) -> Result<Self> {
        let image = result
            .image()
            .ok_or_else(|| FixtureError::InvalidImage("result has no image content".into()))?;
        Self::from_content(image)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Whether any pixel is within `tolerance` of `target`.
    pub fn contains_color(&self, target: Rgb, tolerance: u8) -> bool {
        self.pixels.iter().any(|p| p.is_near(target, tolerance))
    }

    /// Mean color of the `size`x`size` square around `center`, clipped to
    /// the image. Black if the square lies entirely outside.
    pub fn average_color(&self, center: Point, size: u32) -> Rgb {
        let half = (size / 2) as i64;
        let (mut r, mut g, mut b, mut count) = (0u64, 0u64, 0u64, 0u64);
        for dy in -half..=half {
            for dx in -half..=half {
                let (x, y) = (center.x as i64 + dx, center.y as i64 + dy);
                if x < 0 || y < 0 {
                    continue;
                }
                if let Some(p) = self.pixel(x as u32, y as u32) {
                    r += u64::from(p.r);
                    g += u64::from(p.g);
                    b += u64::from(p.b);
                    count += 1;
                }
            }
        }
        if count == 0 {
            return Rgb::new(0, 0, 0);
        }
        Rgb::new((r / count) as u8, (g / count) as u8, (b / count) as u8)
    }
}

/// Decode to 8-bit RGB, dropping any alpha channel.
fn decode_png(bytes: &[u8]) -> Result<(u32, u32, Vec<Rgb>)> {
    let mut decoder = png::Decoder::new(std::io::Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf)?;
    let data = &buf[..frame.buffer_size()];

    let channels = match frame.color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        png::ColorType::Indexed => {
            return Err(FixtureError::InvalidImage("palette was not expanded".into()))
        }
    };
    let row_len = frame.line_size;
    let pixels = data
        .chunks(row_len)
        .take(frame.height as usize)
        .flat_map(|row| row[..frame.width as usize * channels].chunks_exact(channels))
        .map(|px| match channels {
            1 | 2 => Rgb::new(px[0], px[0], px[0]),
            _ => Rgb::new(px[0], px[1], px[2]),
        })
        .collect();
    Ok((frame.width, frame.height, pixels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::COLOR_TOLERANCE;

    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    fn image(data: &str, mime: &str) -> ImageContent {
        ImageContent {
            data: data.into(),
            mime_type: mime.into(),
        }
    }

    /// 4x2 RGB: top row red, red, blue, blue; bottom row green, green, white, white.
    fn quadrants() -> ImageContent {
        let row_top = [[255, 0, 0], [255, 0, 0], [0, 0, 255], [0, 0, 255]];
        let row_bottom = [[0, 128, 0], [0, 128, 0], [255, 255, 255], [255, 255, 255]];
        let data: Vec<u8> = row_top
            .iter()
            .chain(row_bottom.iter())
            .flatten()
            .copied()
            .collect();

        let mut encoded = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut encoded, 4, 2);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&data).unwrap();
        }
        image(
            &base64::engine::general_purpose::STANDARD.encode(encoded),
            "image/png",
        )
    }

    #[test]
    fn decodes_single_pixel_capture() {
        let shot = Screenshot::from_content(&image(PIXEL, "image/png")).unwrap();
        assert_eq!((shot.width, shot.height), (1, 1));
        assert!(shot.pixel(0, 0).is_some());
        assert!(shot.pixel(1, 0).is_none());
    }

    #[test]
    fn pixels_are_addressable() {
        let shot = Screenshot::from_content(&quadrants()).unwrap();
        assert_eq!((shot.width, shot.height), (4, 2));
        assert_eq!(shot.pixel(0, 0), Some(Rgb::RED));
        assert_eq!(shot.pixel(3, 0), Some(Rgb::BLUE));
        assert_eq!(shot.pixel(1, 1), Some(Rgb::GREEN));
        assert_eq!(shot.pixel(3, 1), Some(Rgb::WHITE));
        assert_eq!(shot.pixel(4, 1), None);
        assert_eq!(shot.pixel(0, 2), None);
    }

    #[test]
    fn finds_colors_within_tolerance() {
        let shot = Screenshot::from_content(&quadrants()).unwrap();
        assert!(shot.contains_color(Rgb::new(240, 10, 5), COLOR_TOLERANCE));
        assert!(shot.contains_color(Rgb::GREEN, 0));
        assert!(!shot.contains_color(Rgb::new(255, 255, 0), COLOR_TOLERANCE));
    }

    #[test]
    fn average_color_clips_to_image() {
        let shot = Screenshot::from_content(&quadrants()).unwrap();

        // Top-left corner, clipped to (0,0),(1,0),(0,1),(1,1): two red, two green.
        assert_eq!(shot.average_color(Point::new(0, 0), 3), Rgb::new(127, 64, 0));

        // A single-pixel region is that pixel.
        assert_eq!(shot.average_color(Point::new(2, 0), 1), Rgb::BLUE);

        // Entirely outside the image.
        assert_eq!(shot.average_color(Point::new(50, 50), 5), Rgb::new(0, 0, 0));
        assert_eq!(shot.average_color(Point::new(-10, -10), 3), Rgb::new(0, 0, 0));
    }

    #[test]
    fn rejects_non_png_bytes() {
        let err = Screenshot::from_content(&image("aGVsbG8gd29ybGQgaGVsbG8gd29ybGQ=", "image/png"))
            .unwrap_err();
        assert!(matches!(err, FixtureError::Png(_)), "{err:?}");
    }

    #[test]
    fn rejects_bad_base64() {
        let err = Screenshot::from_content(&image("***", "image/png")).unwrap_err();
        assert!(matches!(err, FixtureError::Base64(_)));
    }

    #[test]
    fn rejects_other_mime_types() {
        let err = Screenshot::from_content(&image(PIXEL, "image/jpeg")).unwrap_err();
        assert!(matches!(err, FixtureError::InvalidImage(_)));
    }
}
