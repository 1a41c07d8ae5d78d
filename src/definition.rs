//! Picture definitions and the resolver that turns loose JSON into a [`Picture`].
//!
//! Two conventions are understood:
//!
//! - **Positional**, for hand-written definitions. Sizes are `[width, height]`
//!   arrays and a srcset maps descriptors to sizes:
//!
//!   ```json
//!   {
//!     "img": {"src": [600], "srcset": {"480w": [480], "768w": [768, 400]}, "alt": "Hero"},
//!     "sources": [{"srcset": {"": [600]}, "type": "image/webp", "media": "(min-width: 800px)"}],
//!     "options": {"quality": {"image/webp": 80}}
//!   }
//!   ```
//!
//!   Leftover keys of `img` and of each source entry become HTML attributes.
//!
//! - **Qualified**, the JSON projection of [`Picture`] itself. Variants use
//!   their named fields and attributes live under explicit `attributes` keys.
//!   This is what definition files on disk contain, and serializing a resolved
//!   picture reproduces its input.
//!
//! Malformed parts are dropped by default. A strict resolver reports them as
//! [`ResolveError`] instead. Either way, a source whose srcset ends up empty is
//! left out: it could not render anything.

use crate::types::{Attributes, Img, Options, Picture, Source, Src, Srcset};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Undefined img src")]
    MissingPrimarySource,
    #[error("Invalid src at {location}: {reason}")]
    InvalidSrc { location: String, reason: String },
    #[error("Invalid source at index {index}: {reason}")]
    InvalidSource { index: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Convention {
    #[default]
    Positional,
    Qualified,
}

/// Maps loosely-typed definition JSON onto a [`Picture`]. Pure; no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionResolver {
    convention: Convention,
    strict: bool,
}

impl DefinitionResolver {
    pub fn positional() -> Self {
        Self {
            convention: Convention::Positional,
            strict: false,
        }
    }

    pub fn qualified() -> Self {
        Self {
            convention: Convention::Qualified,
            strict: false,
        }
    }

    pub fn strict(self, strict: bool) -> Self {
        Self { strict, ..self }
    }

    pub fn convention(&self) -> Convention {
        self.convention
    }

    pub fn resolve(&self, definition: &Value) -> Result<Picture, ResolveError> {
        let empty = Map::new();
        let def = definition.as_object().unwrap_or(&empty);
        let img_def = def.get("img").and_then(Value::as_object).unwrap_or(&empty);

        let img = match self.convention {
            Convention::Positional => self.positional_img(img_def)?,
            Convention::Qualified => self.qualified_img(img_def)?,
        };

        Ok(Picture::new(img)
            .with_sources(self.sources(def.get("sources"))?)
            .with_attributes(attributes(def.get("attributes")))
            .with_options(options(def.get("options"))))
    }

    fn positional_img(&self, img_def: &Map<String, Value>) -> Result<Img, ResolveError> {
        let src = match img_def.get("src") {
            None | Some(Value::Null) => return Err(ResolveError::MissingPrimarySource),
            Some(Value::Array(dims)) => positional_src(dims),
            Some(value) if value.is_object() => {
                self.qualified_src(value, "img.src")?.unwrap_or_default()
            }
            Some(other) => {
                self.reject_src("img.src", format!("expected [width, height], got {other}"))?;
                Src::new()
            }
        };

        Ok(Img::new(src)
            .with_srcset(self.srcset(img_def.get("srcset"), "img.srcset")?)
            .with_attributes(attribute_map(img_def, &["src", "srcset"])))
    }

    fn qualified_img(&self, img_def: &Map<String, Value>) -> Result<Img, ResolveError> {
        let src = match img_def.get("src") {
            None | Some(Value::Null) => Src::new(),
            Some(value) => self.qualified_src(value, "img.src")?.unwrap_or_default(),
        };

        Ok(Img::new(src)
            .with_srcset(self.srcset(img_def.get("srcset"), "img.srcset")?)
            .with_attributes(attributes(img_def.get("attributes"))))
    }

    fn sources(&self, value: Option<&Value>) -> Result<Vec<Source>, ResolveError> {
        let Some(Value::Array(entries)) = value else {
            return Ok(Vec::new());
        };

        let mut sources = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let Some(entry) = entry.as_object() else {
                if self.strict {
                    return Err(ResolveError::InvalidSource {
                        index,
                        reason: format!("expected an object, got {entry}"),
                    });
                }
                continue;
            };

            let location = format!("sources[{index}].srcset");
            let Some(srcset) = self.srcset(entry.get("srcset"), &location)? else {
                continue;
            };
            if srcset.is_empty() {
                continue;
            }

            let attrs = match self.convention {
                Convention::Positional => attribute_map(entry, &["srcset"]),
                Convention::Qualified => attributes(entry.get("attributes")),
            };
            sources.push(Source::new(srcset).with_attributes(attrs));
        }
        Ok(sources)
    }

    /// `None` when there is no srcset at all; `Some` (possibly empty) otherwise.
    fn srcset(&self, value: Option<&Value>, location: &str) -> Result<Option<Srcset>, ResolveError> {
        let mut srces = Vec::new();
        match (self.convention, value) {
            (Convention::Positional, Some(Value::Object(entries))) => {
                for (descriptor, dims) in entries {
                    let at = format!("{location}.{descriptor}");
                    match dims {
                        Value::Array(dims) => {
                            srces.push(positional_src(dims).with_descriptor(descriptor.as_str()))
                        }
                        Value::Object(_) => srces.extend(self.qualified_src(dims, &at)?),
                        other => self.reject_src(&at, format!("expected [width, height], got {other}"))?,
                    }
                }
            }
            // A list has no descriptor keys; only fully specified variants survive.
            (Convention::Positional, Some(Value::Array(items))) => {
                for (index, item) in items.iter().enumerate() {
                    let at = format!("{location}[{index}]");
                    match item {
                        Value::Object(_) => srces.extend(self.qualified_src(item, &at)?),
                        _ => self.reject_src(&at, "srcset entries need a descriptor key".into())?,
                    }
                }
            }
            (Convention::Qualified, Some(Value::Array(items))) => {
                for (index, item) in items.iter().enumerate() {
                    srces.extend(self.qualified_src(item, &format!("{location}[{index}]"))?);
                }
            }
            (Convention::Qualified, Some(Value::Object(items))) => {
                for (key, item) in items {
                    srces.extend(self.qualified_src(item, &format!("{location}.{key}"))?);
                }
            }
            _ => return Ok(None),
        }
        Ok(Some(Srcset::new(srces)))
    }

    /// A variant in its serialized form. `Ok(None)` when tolerated as invalid.
    fn qualified_src(&self, value: &Value, location: &str) -> Result<Option<Src>, ResolveError> {
        match serde_json::from_value::<Src>(value.clone()) {
            Ok(src) => Ok(Some(src)),
            Err(e) => {
                self.reject_src(location, e.to_string())?;
                Ok(None)
            }
        }
    }

    fn reject_src(&self, location: &str, reason: String) -> Result<(), ResolveError> {
        if self.strict {
            return Err(ResolveError::InvalidSrc {
                location: location.to_string(),
                reason,
            });
        }
        Ok(())
    }
}

/// `[width, height]`; anything but a non-negative integer becomes `None`.
fn positional_src(dims: &[Value]) -> Src {
    Src::sized(int_or_none(dims.first()), int_or_none(dims.get(1)))
}

fn int_or_none(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

fn attributes(value: Option<&Value>) -> Attributes {
    value
        .and_then(Value::as_object)
        .map(|map| attribute_map(map, &[]))
        .unwrap_or_default()
}

/// Strings pass through, numbers are stringified and `true` becomes a boolean
/// attribute (`hidden="hidden"`). Everything else has no attribute form.
fn attribute_map(map: &Map<String, Value>, skip: &[&str]) -> Attributes {
    map.iter()
        .filter(|(name, _)| !skip.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(true) => name.clone(),
                _ => return None,
            };
            Some((name.clone(), value))
        })
        .collect()
}

fn options(value: Option<&Value>) -> Options {
    value.and_then(Value::as_object).cloned().unwrap_or_default()
}

// =========================================================================
// Definitions
// =========================================================================

/// A named, lazily resolved picture definition.
pub trait Definition: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn to_picture(&self) -> Result<Picture, ResolveError>;
}

/// Definition held as JSON and resolved on demand.
#[derive(Debug, Clone)]
pub struct ArrayDefinition {
    name: String,
    definition: Value,
    resolver: DefinitionResolver,
}

impl ArrayDefinition {
    /// Positional convention.
    pub fn new(name: impl Into<String>, definition: Value) -> Self {
        Self {
            name: name.into(),
            definition,
            resolver: DefinitionResolver::positional(),
        }
    }

    pub fn with_resolver(self, resolver: DefinitionResolver) -> Self {
        Self { resolver, ..self }
    }

    pub fn definition(&self) -> &Value {
        &self.definition
    }
}

impl Definition for ArrayDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn to_picture(&self) -> Result<Picture, ResolveError> {
        self.resolver.resolve(&self.definition)
    }
}

/// Definition wrapping an already resolved picture.
#[derive(Debug, Clone)]
pub struct PictureDefinition {
    name: String,
    picture: Picture,
}

impl PictureDefinition {
    pub fn new(name: impl Into<String>, picture: Picture) -> Self {
        Self {
            name: name.into(),
            picture,
        }
    }
}

impl Definition for PictureDefinition {
    fn name(&self) -> &str {
        &self.name
    }

    fn to_picture(&self) -> Result<Picture, ResolveError> {
        Ok(self.picture.clone())
    }
}
