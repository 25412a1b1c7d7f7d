//! Decoded image buffers handed between decoders and consumers.
//!
//! The engine never touches pixels beyond allocating black frames; images
//! are passed around behind an `Arc` so that repeating a frame is free.

use crate::types::Size;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA (32 bits per pixel)
    #[default]
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
        }
    }
}

/// A plane of packed pixel data.
#[derive(Debug, Clone)]
pub struct ImagePlane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Bytes per row
    pub stride: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl ImagePlane {
    /// Create a zeroed plane with the given dimensions.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        let stride = width as usize * bytes_per_pixel;
        Self {
            data: vec![0u8; stride * height as usize],
            stride,
            width,
            height,
        }
    }

    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        &mut self.data[start..start + self.stride]
    }
}

/// A decoded video image in CPU memory.
#[derive(Debug, Clone)]
pub struct Image {
    pub format: PixelFormat,
    /// Size in pixels
    pub size: Size,
    pub plane: ImagePlane,
}

/// Images are shared, never copied, once decoded.
pub type SharedImage = Arc<Image>;

impl Image {
    /// Create a zeroed image.
    pub fn new(size: Size, format: PixelFormat) -> Self {
        Self {
            format,
            size,
            plane: ImagePlane::new(size.width, size.height, format.bytes_per_pixel()),
        }
    }

    /// A black frame used to fill regions with no video.
    pub fn black(size: Size, format: PixelFormat) -> Self {
        let mut image = Self::new(size, format);
        match format {
            PixelFormat::Rgba8 => {
                for y in 0..size.height {
                    for px in image.plane.row_mut(y).chunks_exact_mut(4) {
                        px[3] = 255;
                    }
                }
            }
        }
        image
    }

    /// Create a test pattern image (8 vertical color bars) in RGBA8.
    pub fn test_pattern(size: Size) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255],
            [255, 255, 0, 255],
            [0, 255, 255, 255],
            [0, 255, 0, 255],
            [255, 0, 255, 255],
            [255, 0, 0, 255],
            [0, 0, 255, 255],
            [0, 0, 0, 255],
        ];

        let mut image = Self::new(size, PixelFormat::Rgba8);
        let width = size.width.max(1);
        for y in 0..size.height {
            let row = image.plane.row_mut(y);
            for x in 0..size.width {
                let i = (x * 4) as usize;
                let bar = (x * 8 / width) as usize;
                row[i..i + 4].copy_from_slice(&BARS[bar]);
            }
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_black_rgba_is_opaque() {
        let image = Image::black(Size::new(8, 2), PixelFormat::Rgba8);
        let plane = &image.plane;
        assert_eq!(plane.stride, 32);
        assert_eq!(&plane.data[0..4], &[0, 0, 0, 255]);
        assert_eq!(&plane.data[plane.stride..plane.stride + 4], &[0, 0, 0, 255]);
    }

    #[test]
    fn test_test_pattern_first_bar_is_white() {
        let image = Image::test_pattern(Size::new(64, 4));
        assert_eq!(&image.plane.data[0..4], &[255, 255, 255, 255]);
        assert_eq!(&image.plane.data[252..256], &[0, 0, 0, 255]);
    }
}
