//! Shared test utilities for the picture-forge test suite.
//!
//! Provides synthetic image fixtures, JSON helpers for building definitions,
//! and srcset lookups that panic with a readable message on miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let resource = Resource::binary(create_test_jpeg_bytes(200, 150));
//! let definition = array_definition("hero", json!({"img": {"src": [50]}}));
//! let picture = creator.create_from_resource(&resource, &definition).unwrap();
//!
//! assert_eq!(srcset_widths(picture.img.srcset.as_ref().unwrap()), vec![Some(80)]);
//! ```

use image::{ImageEncoder, RgbImage};
use std::path::Path;

use crate::definition::ArrayDefinition;
use crate::types::{Src, Srcset};

// =========================================================================
// Image fixtures
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Encode a small gradient JPEG with the given dimensions.
pub fn create_test_jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut data = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut data)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    data
}

/// Encode a small gradient PNG with the given dimensions.
pub fn create_test_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut data = Vec::new();
    image::codecs::png::PngEncoder::new(&mut data)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    data
}

/// Write a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    std::fs::write(path, create_test_jpeg_bytes(width, height)).unwrap();
}

// =========================================================================
// Definitions
// =========================================================================

/// Positional-convention definition from a `json!` literal.
pub fn array_definition(name: &str, definition: serde_json::Value) -> ArrayDefinition {
    ArrayDefinition::new(name, definition)
}

// =========================================================================
// Srcset lookups
// =========================================================================

/// Requested widths, in srcset order.
pub fn srcset_widths(srcset: &Srcset) -> Vec<Option<u32>> {
    srcset.iter().map(|src| src.width).collect()
}

/// Find a variant by descriptor. Panics if not found.
pub fn find_src<'a>(srcset: &'a Srcset, descriptor: &str) -> &'a Src {
    srcset
        .iter()
        .find(|src| src.descriptor.as_deref() == Some(descriptor))
        .unwrap_or_else(|| {
            let all: Vec<_> = srcset.iter().map(|src| src.descriptor.clone()).collect();
            panic!("src '{descriptor}' not found. Available: {all:?}")
        })
}
