//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the picture creator
//! needs from an image engine: identify (read pixel dimensions) and apply (run
//! an ordered action list that ends in an encode).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust on top of the
//! `image` crate. Tests use the recording `MockBackend` below so creator logic
//! can be exercised without touching pixels.

use super::actions::Action;
use super::resource::Resource;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid base64 resource: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("Unknown image format")]
    UnknownFormat,
    #[error("Unsupported output format: {0}")]
    UnsupportedOutput(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// An encoded image produced by [`ImageBackend::apply`].
///
/// Only backends construct these; the creator attaches them to variants and
/// the tag projector reads them back.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub extension: String,
    pub width: u32,
    pub height: u32,
    /// Size of `data` in bytes.
    pub size: usize,
    /// Every action the backend applied, in order, including the final encode.
    pub actions: Vec<Action>,
}

impl Encoded {
    /// `data:<mime>;base64,<payload>` form, usable directly as `src`.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

/// Trait for image processing backends.
///
/// `apply` receives the complete pipeline: processing actions first, then
/// exactly one sizing action, then the encode. Backends must fail rather than
/// return an [`Encoded`] when the list holds no encode action.
pub trait ImageBackend: Sync {
    /// Get the natural pixel dimensions of the resource.
    fn identify(&self, resource: &Resource) -> Result<Dimensions, BackendError>;

    /// Decode the resource, run `actions` in order and return the encoded result.
    fn apply(&self, resource: &Resource, actions: &[Action]) -> Result<Encoded, BackendError>;
}
