//! Image processing: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Mime sniffing** | `image::guess_format` |
//! | **Resize / Fit** | Lanczos3, `resize_to_fill` for fit |
//! | **Encode** | JPEG (with quality), PNG, GIF, lossless WebP |
//!
//! The module is split into:
//! - **Resource**: where the source pixels come from ([`Resource`])
//! - **Actions**: typed pipeline steps and the factory building them from definitions
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Value types shared by actions
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Mime**: [`MimeDetector`] trait + [`SniffingDetector`]

pub mod actions;
pub mod backend;
mod calculations;
pub mod mime;
mod params;
pub mod resource;
pub mod rust_backend;

pub use actions::{Action, ActionCreateError, ActionFactory, ActionKind, DefaultActionFactory};
pub use backend::{BackendError, Dimensions, Encoded, ImageBackend};
pub use calculations::{fit_dimensions, resize_dimensions};
pub use mime::{MimeDetector, SniffingDetector, known_format};
pub use params::{FlipDirection, Quality, Sharpening};
pub use resource::Resource;
pub use rust_backend::{DEFAULT_MAX_PIXELS, RustBackend};
