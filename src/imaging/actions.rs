//! Typed image actions and the factory that builds them from definitions.
//!
//! Definitions name actions as an ordered map of `name -> params`:
//!
//! ```json
//! "actions": { "crop": { "width": 100, "height": 80, "x": 10 }, "greyscale": {} }
//! ```
//!
//! [`DefaultActionFactory`] turns each entry into an [`Action`], deserializing
//! the parameter map with serde so typos in parameter names are rejected
//! instead of silently ignored.

use super::params::{FlipDirection, Quality, Sharpening};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// One step of an image pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Crop {
        width: u32,
        height: u32,
        x: u32,
        y: u32,
    },
    Greyscale,
    Gamma {
        gamma: f32,
    },
    Blur {
        sigma: f32,
    },
    Brighten {
        value: i32,
    },
    Contrast {
        value: f32,
    },
    Flip {
        direction: FlipDirection,
    },
    /// Clockwise; only quarter turns.
    Rotate {
        degrees: u32,
    },
    Sharpen(Sharpening),
    /// Aspect-preserving resize. `None` on an axis follows the other axis.
    Resize {
        width: Option<u32>,
        height: Option<u32>,
        upsize: Option<f32>,
    },
    /// Cover then centre-crop to the exact box.
    Fit {
        width: u32,
        height: u32,
        upsize: Option<f32>,
    },
    /// `quality: None` leaves the choice to the backend.
    Encode {
        mime_type: String,
        quality: Option<Quality>,
    },
    Save {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Crop,
    Greyscale,
    Gamma,
    Blur,
    Brighten,
    Contrast,
    Flip,
    Rotate,
    Sharpen,
    Resize,
    Fit,
    Encode,
    Save,
}

impl ActionKind {
    pub const ALL: [ActionKind; 13] = [
        Self::Crop,
        Self::Greyscale,
        Self::Gamma,
        Self::Blur,
        Self::Brighten,
        Self::Contrast,
        Self::Flip,
        Self::Rotate,
        Self::Sharpen,
        Self::Resize,
        Self::Fit,
        Self::Encode,
        Self::Save,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Crop => "crop",
            Self::Greyscale => "greyscale",
            Self::Gamma => "gamma",
            Self::Blur => "blur",
            Self::Brighten => "brighten",
            Self::Contrast => "contrast",
            Self::Flip => "flip",
            Self::Rotate => "rotate",
            Self::Sharpen => "sharpen",
            Self::Resize => "resize",
            Self::Fit => "fit",
            Self::Encode => "encode",
            Self::Save => "save",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Crop { .. } => ActionKind::Crop,
            Self::Greyscale => ActionKind::Greyscale,
            Self::Gamma { .. } => ActionKind::Gamma,
            Self::Blur { .. } => ActionKind::Blur,
            Self::Brighten { .. } => ActionKind::Brighten,
            Self::Contrast { .. } => ActionKind::Contrast,
            Self::Flip { .. } => ActionKind::Flip,
            Self::Rotate { .. } => ActionKind::Rotate,
            Self::Sharpen(_) => ActionKind::Sharpen,
            Self::Resize { .. } => ActionKind::Resize,
            Self::Fit { .. } => ActionKind::Fit,
            Self::Encode { .. } => ActionKind::Encode,
            Self::Save { .. } => ActionKind::Save,
        }
    }
}

#[derive(Error, Debug)]
pub enum ActionCreateError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Invalid parameters for action {name}: {source}")]
    InvalidParameters {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid parameters for action {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Builds actions from their definition form.
pub trait ActionFactory: Send + Sync {
    fn create_action(&self, name: &str, params: &Map<String, Value>)
    -> Result<Action, ActionCreateError>;
}

/// Factory for every [`ActionKind`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultActionFactory;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CropParams {
    width: u32,
    height: u32,
    #[serde(default)]
    x: u32,
    #[serde(default)]
    y: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GammaParams {
    gamma: f32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BlurParams {
    sigma: f32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BrightenParams {
    value: i32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ContrastParams {
    value: f32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FlipParams {
    #[serde(default = "default_flip")]
    direction: FlipDirection,
}

fn default_flip() -> FlipDirection {
    FlipDirection::Horizontal
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RotateParams {
    degrees: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ResizeParams {
    width: Option<u32>,
    height: Option<u32>,
    upsize: Option<f32>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FitParams {
    width: u32,
    height: u32,
    upsize: Option<f32>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct EncodeParams {
    mime_type: String,
    quality: Option<Quality>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SaveParams {
    path: PathBuf,
}

fn parse<T: DeserializeOwned>(name: &str, params: &Map<String, Value>) -> Result<T, ActionCreateError> {
    serde_json::from_value(Value::Object(params.clone())).map_err(|source| {
        ActionCreateError::InvalidParameters {
            name: name.to_string(),
            source,
        }
    })
}

fn invalid(name: &str, reason: impl Into<String>) -> ActionCreateError {
    ActionCreateError::InvalidValue {
        name: name.to_string(),
        reason: reason.into(),
    }
}

// The image crate panics on a non-positive blur radius.
fn check_sigma(name: &str, sigma: f32) -> Result<(), ActionCreateError> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(invalid(name, "sigma must be positive"));
    }
    Ok(())
}

impl ActionFactory for DefaultActionFactory {
    fn create_action(
        &self,
        name: &str,
        params: &Map<String, Value>,
    ) -> Result<Action, ActionCreateError> {
        let kind =
            ActionKind::from_name(name).ok_or_else(|| ActionCreateError::UnknownAction(name.into()))?;

        let action = match kind {
            ActionKind::Crop => {
                let p: CropParams = parse(name, params)?;
                if p.width == 0 || p.height == 0 {
                    return Err(invalid(name, "width and height must be positive"));
                }
                Action::Crop {
                    width: p.width,
                    height: p.height,
                    x: p.x,
                    y: p.y,
                }
            }
            ActionKind::Greyscale => {
                parse::<NoParams>(name, params)?;
                Action::Greyscale
            }
            ActionKind::Gamma => {
                let p: GammaParams = parse(name, params)?;
                if p.gamma.is_nan() || p.gamma <= 0.0 {
                    return Err(invalid(name, "gamma must be positive"));
                }
                Action::Gamma { gamma: p.gamma }
            }
            ActionKind::Blur => {
                let p: BlurParams = parse(name, params)?;
                check_sigma(name, p.sigma)?;
                Action::Blur { sigma: p.sigma }
            }
            ActionKind::Brighten => {
                let p: BrightenParams = parse(name, params)?;
                Action::Brighten { value: p.value }
            }
            ActionKind::Contrast => {
                let p: ContrastParams = parse(name, params)?;
                Action::Contrast { value: p.value }
            }
            ActionKind::Flip => {
                let p: FlipParams = parse(name, params)?;
                Action::Flip {
                    direction: p.direction,
                }
            }
            ActionKind::Rotate => {
                let p: RotateParams = parse(name, params)?;
                if p.degrees % 90 != 0 {
                    return Err(invalid(name, "degrees must be a multiple of 90"));
                }
                Action::Rotate {
                    degrees: p.degrees % 360,
                }
            }
            ActionKind::Sharpen => {
                let p: Sharpening = parse(name, params)?;
                check_sigma(name, p.sigma)?;
                Action::Sharpen(p)
            }
            ActionKind::Resize => {
                let p: ResizeParams = parse(name, params)?;
                Action::Resize {
                    width: p.width,
                    height: p.height,
                    upsize: p.upsize,
                }
            }
            ActionKind::Fit => {
                let p: FitParams = parse(name, params)?;
                Action::Fit {
                    width: p.width,
                    height: p.height,
                    upsize: p.upsize,
                }
            }
            ActionKind::Encode => {
                let p: EncodeParams = parse(name, params)?;
                Action::Encode {
                    mime_type: p.mime_type,
                    quality: p.quality,
                }
            }
            ActionKind::Save => {
                let p: SaveParams = parse(name, params)?;
                Action::Save { path: p.path }
            }
        };
        Ok(action)
    }
}
