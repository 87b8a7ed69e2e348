//! Image preprocessing module
//!
//! Normalizes a surface's pixels before OCR:
//! - Bilinear upscaling by a fixed factor
//! - Binarization on the average of the color channels (alpha untouched)
//! - Lossless PNG encoding for the engine

use crate::config::ReaderConfig;
use crate::types::Surface;
use base64::{engine::general_purpose, Engine as _};
use image::error::{ParameterError, ParameterErrorKind};
use image::imageops::{self, FilterType};
use image::{ImageError, ImageFormat, RgbaImage};
use std::io::Cursor;

/// A surface image ready to hand to an OCR engine
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Processed pixel buffer
    pub pixels: RgbaImage,
    /// PNG encoding of `pixels`
    pub png: Vec<u8>,
}

impl PreparedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn to_data_url(&self) -> String {
        to_data_url(&self.png)
    }
}

/// Preprocess a surface for OCR: upscale, binarize, encode as PNG
pub fn preprocess_surface(
    surface: &Surface,
    config: &ReaderConfig,
) -> Result<PreparedImage, ImageError> {
    let scaled = upscale(&surface.pixels, config.scale_factor)?;
    let pixels = binarize(&scaled, config.threshold);
    let png = encode_png(&pixels)?;
    Ok(PreparedImage { pixels, png })
}

/// Resize to exactly `factor` times the input size in each axis
pub fn upscale(input: &RgbaImage, factor: u32) -> Result<RgbaImage, ImageError> {
    let (width, height) = input.dimensions();
    let scaled = width
        .checked_mul(factor)
        .zip(height.checked_mul(factor))
        .filter(|&(w, h)| w > 0 && h > 0);

    match scaled {
        Some((w, h)) => Ok(imageops::resize(input, w, h, FilterType::Triangle)),
        None => Err(dimension_error()),
    }
}

/// Convert each pixel to pure black or white
///
/// A pixel whose red, green and blue average is above `threshold` becomes
/// white (255), everything else black (0). Alpha is copied as is.
pub fn binarize(input: &RgbaImage, threshold: u8) -> RgbaImage {
    let mut output = input.clone();
    let limit = u16::from(threshold) * 3;

    for pixel in output.pixels_mut() {
        let sum = u16::from(pixel[0]) + u16::from(pixel[1]) + u16::from(pixel[2]);
        let value = if sum > limit { 255 } else { 0 };
        pixel[0] = value;
        pixel[1] = value;
        pixel[2] = value;
    }

    output
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(dimension_error());
    }
    let mut png_bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(png_bytes)
}

/// Format PNG bytes as a `data:` URL
pub fn to_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png))
}

fn dimension_error() -> ImageError {
    ImageError::Parameter(ParameterError::from_kind(
        ParameterErrorKind::DimensionMismatch,
    ))
}
