//! Mime type detection for source resources.
//!
//! Detection sniffs magic bytes; file extensions are never trusted. Only the
//! head of a file is read, since every supported signature sits in the first
//! few bytes.

use super::backend::BackendError;
use super::resource::Resource;
use image::ImageFormat;
use std::io::Read;
use std::path::Path;

const SNIFF_LEN: u64 = 512;

/// Trait for mime type detectors.
pub trait MimeDetector: Send + Sync {
    fn detect_from_bytes(&self, bytes: &[u8]) -> Result<String, BackendError>;

    fn detect_from_file(&self, path: &Path) -> Result<String, BackendError>;

    /// Detect the mime type of any resource form.
    fn detect(&self, resource: &Resource) -> Result<String, BackendError> {
        match resource {
            Resource::File(path) => self.detect_from_file(path),
            Resource::Binary(_) | Resource::Base64(_) => {
                self.detect_from_bytes(&resource.bytes()?)
            }
        }
    }
}

/// Magic-byte sniffer backed by `image::guess_format`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SniffingDetector;

impl MimeDetector for SniffingDetector {
    fn detect_from_bytes(&self, bytes: &[u8]) -> Result<String, BackendError> {
        let format = image::guess_format(bytes).map_err(|_| BackendError::UnknownFormat)?;
        Ok(format.to_mime_type().to_string())
    }

    fn detect_from_file(&self, path: &Path) -> Result<String, BackendError> {
        let mut head = Vec::new();
        std::fs::File::open(path)?
            .take(SNIFF_LEN)
            .read_to_end(&mut head)?;
        self.detect_from_bytes(&head)
    }
}

/// The image format for a mime type, if the `image` crate knows it.
pub fn known_format(mime_type: &str) -> Option<ImageFormat> {
    ImageFormat::from_mime_type(mime_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_test_jpeg_bytes, create_test_png_bytes};

    #[test]
    fn detects_jpeg_bytes() {
        let bytes = create_test_jpeg_bytes(20, 10);
        assert_eq!(
            SniffingDetector.detect_from_bytes(&bytes).unwrap(),
            "image/jpeg"
        );
    }

    #[test]
    fn detects_png_base64() {
        use base64::Engine;
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(create_test_png_bytes(8, 8));
        let resource = Resource::base64(encoded);
        assert_eq!(SniffingDetector.detect(&resource).unwrap(), "image/png");
    }

    #[test]
    fn detects_file_by_content_not_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("image.gif");
        std::fs::write(&path, create_test_jpeg_bytes(20, 10)).unwrap();
        assert_eq!(
            SniffingDetector.detect(&Resource::file(&path)).unwrap(),
            "image/jpeg"
        );
    }

    #[test]
    fn non_image_bytes_fail() {
        let result = SniffingDetector.detect(&Resource::binary(b"plain text".to_vec()));
        assert!(matches!(result, Err(BackendError::UnknownFormat)));
    }

    #[test]
    fn missing_file_fails() {
        let result = SniffingDetector.detect(&Resource::file("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn known_formats() {
        assert_eq!(known_format("image/jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(known_format("image/webp"), Some(ImageFormat::WebP));
        assert_eq!(known_format("text/plain"), None);
    }
}
