//! Configuration module.
//!
//! Handles loading, validating, and merging `picture-forge.toml`. Stock
//! defaults are the base layer; the user file only needs the keys it wants to
//! override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [creator]
//! supported_mime_types = ["image/png", "image/jpeg", "image/gif", "image/webp"]
//! # upsize = 1.5                # Max scale past the source size (omit for unbounded)
//! skip_smaller_sized_src = false # Drop variants that miss their requested size
//! verify_sizes = false           # Fail when a request exceeds the source image
//! disallowed_actions = []        # e.g. ["blur", "rotate"]; save/encode always refused
//! max_pixels = 100000000         # Largest variant a resize or fit may produce
//!
//! [definitions]
//! dirs = ["definitions"]         # Searched in order for <name>.json
//! strict = false                 # Reject malformed definition parts
//!
//! [processing]
//! max_processes = 4              # Parallel encode workers (omit for auto = CPU cores)
//! ```
//!
//! ## Validation
//!
//! Unknown keys are rejected. Values are checked after merging: every
//! supported mime type must be an encodable image format, `upsize` must be a
//! positive number, `max_pixels` and `max_processes` must be at least 1.

use crate::create::CreateSettings;
use crate::definition::DefinitionResolver;
use crate::imaging::known_format;
use crate::registry::JsonFileRegistry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "picture-forge.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `picture-forge.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PictureConfig {
    /// Variant generation policy.
    pub creator: CreateSettings,
    /// Where named definitions are looked up.
    pub definitions: DefinitionsConfig,
    /// Parallel encoding settings.
    pub processing: ProcessingConfig,
}

impl PictureConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(unknown) = self
            .creator
            .supported_mime_types
            .iter()
            .find(|mime_type| known_format(mime_type).is_none())
        {
            return Err(ConfigError::Validation(format!(
                "creator.supported_mime_types: {unknown} is not an image format"
            )));
        }
        if let Some(upsize) = self.creator.upsize
            && !(upsize.is_finite() && upsize > 0.0)
        {
            return Err(ConfigError::Validation(
                "creator.upsize must be greater than 0".into(),
            ));
        }
        if self.creator.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "creator.max_pixels must be at least 1".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Definition lookup settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefinitionsConfig {
    /// Directories searched in order for `<name>.json`.
    pub dirs: Vec<PathBuf>,
    /// Turn malformed definition parts into errors instead of skipping them.
    pub strict: bool,
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self {
            dirs: vec![PathBuf::from("definitions")],
            strict: false,
        }
    }
}

impl DefinitionsConfig {
    /// File registry over `extra_dirs` followed by the configured dirs.
    pub fn registry(&self, extra_dirs: &[PathBuf]) -> JsonFileRegistry {
        let dirs = extra_dirs.iter().chain(&self.dirs).cloned();
        JsonFileRegistry::new("files", dirs)
            .with_resolver(DefinitionResolver::qualified().strict(self.strict))
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel encode workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PictureConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PictureConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PictureConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// A missing file yields the stock defaults. User values are merged on top
/// of stock defaults, unknown keys are rejected and the result is validated.
pub fn load_config(path: &Path) -> Result<PictureConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `picture-forge.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Picture Forge Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Variant generation
# ---------------------------------------------------------------------------
[creator]
# Formats variants may be encoded in. A variant asking for anything else
# falls back to the source image's format. A <source> whose declared type is
# not listed here is skipped entirely.
supported_mime_types = ["image/png", "image/jpeg", "image/gif", "image/webp"]

# Maximum factor a variant may be scaled past the source's native size.
# Omit for unbounded upscaling. 1.0 disables upscaling.
# upsize = 1.0

# Drop srcset variants whose encoded size differs from the requested size.
# When enabled and upsize is omitted (or below 1.0), upsize becomes 1.0.
# The primary <img> src is always kept.
skip_smaller_sized_src = false

# Fail the whole picture when any requested width or height exceeds the
# source image.
verify_sizes = false

# Action names refused in definitions, on top of save and encode which are
# never allowed. Known actions: crop, greyscale, gamma, blur, brighten,
# contrast, flip, rotate, sharpen, resize, fit.
disallowed_actions = []

# Largest variant, in pixels, a resize or fit may produce. A definition
# asking for more fails instead of exhausting memory.
max_pixels = 100000000

# ---------------------------------------------------------------------------
# Definitions
# ---------------------------------------------------------------------------
[definitions]
# Directories searched in order for <name>.json. The first match wins.
# Directories given with --definitions are searched before these.
dirs = ["definitions"]

# Report malformed definition parts as errors instead of skipping them.
strict = false

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of parallel encode workers.
# Omit to auto-detect (uses all CPU cores).
# Values larger than the number of cores are clamped down.
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::ActionKind;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_creator_settings() {
        let config = PictureConfig::default();
        assert_eq!(
            config.creator.supported_mime_types,
            vec!["image/png", "image/jpeg", "image/gif", "image/webp"]
        );
        assert_eq!(config.creator.upsize, None);
        assert!(!config.creator.skip_smaller_sized_src);
        assert_eq!(config.definitions.dirs, vec![PathBuf::from("definitions")]);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[creator]
upsize = 1.5
disallowed_actions = ["rotate"]
"#;
        let config: PictureConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.creator.upsize, Some(1.5));
        assert_eq!(config.creator.disallowed_actions, vec![ActionKind::Rotate]);
        assert_eq!(config.creator.supported_mime_types.len(), 4);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, PictureConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
[creator]
skip_smaller_sized_src = true

[definitions]
dirs = ["pictures", "shared/pictures"]
strict = true
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert!(config.creator.skip_smaller_sized_src);
        assert_eq!(config.creator.effective_upsize(), Some(1.0));
        assert_eq!(
            config.definitions.dirs,
            vec![PathBuf::from("pictures"), PathBuf::from("shared/pictures")]
        );
        assert!(config.definitions.strict);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, "[creator\nupsize = ").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn registry_searches_extra_dirs_first() {
        let config = DefinitionsConfig::default();
        let registry = config.registry(&[PathBuf::from("override")]);
        assert_eq!(
            registry.dirs(),
            &[PathBuf::from("override"), PathBuf::from("definitions")]
        );
    }

    // =========================================================================
    // Processing
    // =========================================================================

    #[test]
    fn default_processing_config() {
        let config = ProcessingConfig::default();
        assert_eq!(config.max_processes, None);
    }

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let threads = effective_threads(&config);
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let threads = effective_threads(&config);
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"strict = false"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"strict = true"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("strict").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[creator]
verify_sizes = true
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let creator = merged.get("creator").unwrap();
        assert_eq!(creator.get("verify_sizes").unwrap().as_bool(), Some(true));
        assert_eq!(
            creator
                .get("supported_mime_types")
                .unwrap()
                .as_array()
                .unwrap()
                .len(),
            4
        );
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str(r#"dirs = ["a", "b"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"dirs = ["c"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("dirs").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[creator]
upsise = 1.0
"#;
        let result: Result<PictureConfig, _> = toml::from_str(toml_str);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<PictureConfig, _> = toml::from_str("[images]\nquality = 90\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_action_name_rejected() {
        let result: Result<PictureConfig, _> =
            toml::from_str("[creator]\ndisallowed_actions = [\"sparkle\"]\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(PictureConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_image_mime_type() {
        let mut config = PictureConfig::default();
        config.creator.supported_mime_types.push("text/plain".into());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_non_positive_upsize() {
        let mut config = PictureConfig::default();
        config.creator.upsize = Some(0.0);
        assert!(config.validate().is_err());
        config.creator.upsize = Some(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_max_pixels() {
        let mut config = PictureConfig::default();
        config.creator.max_pixels = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn max_pixels_overrides_default() {
        let config: PictureConfig = toml::from_str("[creator]\nmax_pixels = 4000000\n").unwrap();
        assert_eq!(config.creator.max_pixels, 4_000_000);
        assert_eq!(
            PictureConfig::default().creator.max_pixels,
            crate::imaging::DEFAULT_MAX_PIXELS
        );
    }

    #[test]
    fn validate_rejects_zero_processes() {
        let mut config = PictureConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let base = stock_defaults_value().unwrap();
        let overlay: toml::Value = toml::from_str("[creator]\nupsize = -1.0\n").unwrap();
        let result = resolve_config(base, Some(overlay));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: PictureConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, PictureConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        assert!(content.contains("[creator]"));
        assert!(content.contains("[definitions]"));
        assert!(content.contains("[processing]"));
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        assert!(val.get("creator").is_some());
        assert!(val.get("definitions").is_some());
        assert!(val.get("processing").is_some());
    }
}
