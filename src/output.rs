//! CLI output formatting.
//!
//! # Output Format
//!
//! ## List
//!
//! ```text
//! 001 hero
//!     img: 800 x auto, 2 srcset, 1 source
//! 002 thumb
//!     Error: Invalid src at img.src: invalid type: string "x", expected u32
//! ```
//!
//! ## Create summary
//!
//! ```text
//! img 800x600 image/jpeg (48.2 KB)
//!     2x 1600x1200 image/jpeg (151.0 KB)
//! source 1 type=image/webp
//!     1x 800x600 image/webp (31.9 KB)
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::definition::Definition;
use crate::types::{CreatedPicture, Picture, Src};
use std::sync::Arc;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < KB * KB {
        format!("{:.1} KB", bytes / KB)
    } else {
        format!("{:.1} MB", bytes / (KB * KB))
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

fn dimension(value: Option<u32>) -> String {
    value.map_or_else(|| "auto".to_string(), |v| v.to_string())
}

/// One line per variant: `[descriptor ]WxH mime (size)`.
fn variant_line(src: &Src) -> String {
    let prefix = src
        .descriptor
        .as_deref()
        .filter(|d| !d.is_empty())
        .map(|d| format!("{d} "))
        .unwrap_or_default();
    match &src.encoded {
        Some(encoded) => format!(
            "{prefix}{}x{} {} ({})",
            encoded.width,
            encoded.height,
            encoded.mime_type,
            format_bytes(encoded.size)
        ),
        None => format!(
            "{prefix}{} x {} {}",
            dimension(src.width),
            dimension(src.height),
            src.mime_type.as_deref().unwrap_or("")
        )
        .trim_end()
        .to_string(),
    }
}

// ============================================================================
// List
// ============================================================================

fn picture_summary(picture: &Picture) -> String {
    let srcset = picture.img.srcset.as_ref().map_or(0, |s| s.len());
    format!(
        "img: {} x {}, {} srcset, {}",
        dimension(picture.img.src.width),
        dimension(picture.img.src.height),
        srcset,
        plural(picture.sources.len(), "source")
    )
}

/// Format every definition with a one-line summary of its resolved picture.
pub fn format_definition_list(definitions: &[Arc<dyn Definition>]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, definition) in definitions.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), definition.name()));
        let detail = match definition.to_picture() {
            Ok(picture) => picture_summary(&picture),
            Err(err) => format!("Error: {err}"),
        };
        lines.push(format!("{}{}", indent(1), detail));
    }
    if lines.is_empty() {
        lines.push("No definitions found".to_string());
    }
    lines
}

pub fn print_definition_list(definitions: &[Arc<dyn Definition>]) {
    for line in format_definition_list(definitions) {
        println!("{}", line);
    }
}

// ============================================================================
// Create summary
// ============================================================================

/// Format a created picture as a variant tree.
pub fn format_created_summary(picture: &CreatedPicture) -> Vec<String> {
    let mut lines = vec![format!("img {}", variant_line(&picture.img.src))];
    for src in picture.img.srcset.iter().flatten() {
        lines.push(format!("{}{}", indent(1), variant_line(src)));
    }

    for (i, source) in picture.sources.iter().enumerate() {
        let attributes: Vec<String> = source
            .attributes
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        let header = format!("source {} {}", i + 1, attributes.join(" "));
        lines.push(header.trim_end().to_string());
        if source.srcset.is_empty() {
            lines.push(format!("{}(all variants skipped)", indent(1)));
        }
        for src in &source.srcset {
            lines.push(format!("{}{}", indent(1), variant_line(src)));
        }
    }
    lines
}

pub fn print_created_summary(picture: &CreatedPicture) {
    for line in format_created_summary(picture) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create::{CreateSettings, PictureCreator};
    use crate::definition::PictureDefinition;
    use crate::imaging::Resource;
    use crate::test_helpers::*;
    use crate::types::Img;
    use serde_json::json;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn variant_line_before_encoding() {
        let src = Src::sized(Some(300), None).with_descriptor("2x");
        assert_eq!(variant_line(&src), "2x 300 x auto");
    }

    // =========================================================================
    // List tests
    // =========================================================================

    #[test]
    fn definition_list_shows_summary_and_errors() {
        let definitions: Vec<Arc<dyn Definition>> = vec![
            Arc::new(array_definition(
                "hero",
                json!({"img": {"src": [800], "srcset": {"2x": [1600]}},
                       "sources": [{"media": "m", "srcset": {"1x": [400]}}]}),
            )),
            Arc::new(array_definition("broken", json!({"img": {}}))),
            Arc::new(PictureDefinition::new(
                "static",
                Picture::new(Img::new(Src::new().with_url("/a.jpg"))),
            )),
        ];

        let lines = format_definition_list(&definitions);
        assert_eq!(lines[0], "001 hero");
        assert_eq!(lines[1], "    img: 800 x auto, 1 srcset, 1 source");
        assert_eq!(lines[2], "002 broken");
        assert!(lines[3].starts_with("    Error: "));
        assert_eq!(lines[5], "    img: auto x auto, 0 srcset, 0 sources");
    }

    #[test]
    fn definition_list_empty() {
        assert_eq!(format_definition_list(&[]), vec!["No definitions found"]);
    }

    // =========================================================================
    // Create summary tests
    // =========================================================================

    #[test]
    fn created_summary_lists_variants() {
        let creator = PictureCreator::new(CreateSettings::default());
        let resource = Resource::binary(create_test_jpeg_bytes(200, 150));
        let picture = creator
            .create_from_resource(
                &resource,
                &array_definition(
                    "t",
                    json!({"img": {"src": [50], "srcset": {"2x": [100]}},
                           "sources": [{"type": "image/png", "srcset": {"1x": [40, 40]}}]}),
                ),
            )
            .unwrap();

        let lines = format_created_summary(&picture);
        assert!(lines[0].starts_with("img 50x38 image/jpeg ("));
        assert!(lines[1].starts_with("    2x 100x75 image/jpeg ("));
        assert_eq!(lines[2], "source 1 type=image/png");
        assert!(lines[3].starts_with("    1x 40x40 image/png ("));
    }
}
