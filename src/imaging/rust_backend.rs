//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image` crate (pure Rust decoders) |
//! | Identify | `image::image_dimensions` / `ImageReader::into_dimensions` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Fit | `DynamicImage::resize_to_fill` (cover + centre crop) |
//! | Sharpening | `DynamicImage::unsharpen` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG / GIF / WebP (lossless) | `DynamicImage::write_to` |

use super::actions::Action;
use super::backend::{BackendError, Dimensions, Encoded, ImageBackend};
use super::calculations::{fit_dimensions, resize_dimensions};
use super::params::{FlipDirection, Quality};
use super::resource::Resource;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, ImageReader};
use std::io::Cursor;

/// Largest output a sizing action may produce, in pixels.
pub const DEFAULT_MAX_PIXELS: u64 = 100_000_000;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    max_pixels: u64,
}

impl RustBackend {
    pub fn new() -> Self {
        Self::with_max_pixels(DEFAULT_MAX_PIXELS)
    }

    /// Backend that refuses to resize or fit past `max_pixels` output pixels.
    pub fn with_max_pixels(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    /// Reject a target size before the resampler allocates for it.
    fn check_size(&self, width: u32, height: u32) -> Result<(), BackendError> {
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.max_pixels {
            return Err(BackendError::ProcessingFailed(format!(
                "Output {width}x{height} exceeds the {} pixel limit",
                self.max_pixels
            )));
        }
        Ok(())
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode a resource.
fn load_image(resource: &Resource) -> Result<DynamicImage, BackendError> {
    let decoded = match resource {
        Resource::File(path) => ImageReader::open(path)?.with_guessed_format()?.decode(),
        Resource::Binary(_) | Resource::Base64(_) => image::load_from_memory(&resource.bytes()?),
    };
    decoded.map_err(|e| BackendError::ProcessingFailed(format!("Failed to decode {resource}: {e}")))
}

/// Gamma correction: `out = 255 * (in / 255) ^ (1 / gamma)`, alpha untouched.
fn adjust_gamma(img: DynamicImage, gamma: f32) -> DynamicImage {
    let exponent = 1.0 / gamma;
    let lut: Vec<u8> = (0..=255u16)
        .map(|v| ((v as f32 / 255.0).powf(exponent) * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect();

    let mut rgba = img.to_rgba8();
    for pixel in rgba.pixels_mut() {
        for channel in &mut pixel.0[..3] {
            *channel = lut[*channel as usize];
        }
    }
    DynamicImage::ImageRgba8(rgba)
}

fn rotate(img: DynamicImage, degrees: u32) -> DynamicImage {
    match degrees % 360 {
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        _ => img,
    }
}

/// Encode to the format named by `mime_type`.
fn encode(
    img: &DynamicImage,
    mime_type: &str,
    quality: Option<Quality>,
) -> Result<(Vec<u8>, ImageFormat), BackendError> {
    let format = ImageFormat::from_mime_type(mime_type)
        .ok_or_else(|| BackendError::UnsupportedOutput(mime_type.to_string()))?;
    let encode_err =
        |e: image::ImageError| BackendError::ProcessingFailed(format!("{mime_type} encode failed: {e}"));

    let mut data = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = img.to_rgb8();
            let quality = quality.unwrap_or_default().value() as u8;
            JpegEncoder::new_with_quality(&mut data, quality)
                .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                .map_err(encode_err)?;
        }
        ImageFormat::Png => {
            img.write_to(&mut Cursor::new(&mut data), format)
                .map_err(encode_err)?;
        }
        ImageFormat::Gif | ImageFormat::WebP => {
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_to(&mut Cursor::new(&mut data), format)
                .map_err(encode_err)?;
        }
        _ => return Err(BackendError::UnsupportedOutput(mime_type.to_string())),
    }
    Ok((data, format))
}

impl ImageBackend for RustBackend {
    fn identify(&self, resource: &Resource) -> Result<Dimensions, BackendError> {
        let dimensions = match resource {
            Resource::File(path) => image::image_dimensions(path),
            Resource::Binary(_) | Resource::Base64(_) => {
                ImageReader::new(Cursor::new(resource.bytes()?))
                    .with_guessed_format()?
                    .into_dimensions()
            }
        };
        let (width, height) = dimensions.map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn apply(&self, resource: &Resource, actions: &[Action]) -> Result<Encoded, BackendError> {
        let mut img = load_image(resource)?;
        let mut encoded: Option<Encoded> = None;

        for action in actions {
            img = match action {
                Action::Crop {
                    width,
                    height,
                    x,
                    y,
                } => img.crop_imm(*x, *y, *width, *height),
                Action::Greyscale => img.grayscale(),
                Action::Gamma { gamma } => adjust_gamma(img, *gamma),
                Action::Blur { sigma } => img.blur(*sigma),
                Action::Brighten { value } => img.brighten(*value),
                Action::Contrast { value } => img.adjust_contrast(*value),
                Action::Flip {
                    direction: FlipDirection::Horizontal,
                } => img.fliph(),
                Action::Flip {
                    direction: FlipDirection::Vertical,
                } => img.flipv(),
                Action::Rotate { degrees } => rotate(img, *degrees),
                Action::Sharpen(sharpening) => img.unsharpen(sharpening.sigma, sharpening.threshold),
                Action::Resize {
                    width,
                    height,
                    upsize,
                } => {
                    let (w, h) =
                        resize_dimensions((img.width(), img.height()), *width, *height, *upsize);
                    if (w, h) == (img.width(), img.height()) {
                        img
                    } else {
                        self.check_size(w, h)?;
                        img.resize_exact(w, h, FilterType::Lanczos3)
                    }
                }
                Action::Fit {
                    width,
                    height,
                    upsize,
                } => {
                    let (w, h) = fit_dimensions((img.width(), img.height()), (*width, *height), *upsize);
                    self.check_size(w, h)?;
                    img.resize_to_fill(w, h, FilterType::Lanczos3)
                }
                Action::Encode { mime_type, quality } => {
                    let (data, format) = encode(&img, mime_type, *quality)?;
                    encoded = Some(Encoded {
                        size: data.len(),
                        data,
                        mime_type: format.to_mime_type().to_string(),
                        extension: format.extensions_str().first().copied().unwrap_or_default().to_string(),
                        width: img.width(),
                        height: img.height(),
                        actions: Vec::new(),
                    });
                    img
                }
                Action::Save { path } => {
                    let Some(encoded) = &encoded else {
                        return Err(BackendError::ProcessingFailed(
                            "save requires a preceding encode".into(),
                        ));
                    };
                    std::fs::write(path, &encoded.data)?;
                    img
                }
            };
        }

        let mut encoded =
            encoded.ok_or_else(|| BackendError::ProcessingFailed("no encode action".into()))?;
        encoded.actions = actions.to_vec();
        Ok(encoded)
    }
}
