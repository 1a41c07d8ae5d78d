//! Variant generation: definition + source image → encoded picture.
//!
//! [`PictureCreator`] resolves every variant's options against the picture's
//! tables, builds one action pipeline per variant and hands it to an
//! [`ImageBackend`]. Each pipeline has the same shape:
//!
//! ```text
//! [user actions...]  →  Fit | Resize  →  Encode(mime, quality)
//! ```
//!
//! Option resolution for a variant, in order:
//!
//! | Step | Rule |
//! |---|---|
//! | **Mime** | explicit and supported, else `convert[source]` if supported, else source mime |
//! | **Quality** | variant `quality`, else `quality[mime]` from the picture |
//! | **Actions** | variant `actions`, else the picture's `actions` wholesale |
//!
//! Once options are resolved, variants are independent of each other. The
//! primary `img.src` is encoded first, the rest run on the rayon pool and are
//! reassembled in declaration order.
//!
//! Detection, size verification and encode failures abort the whole call.
//! Actions that cannot be created and `<source>` groups whose declared type is
//! unsupported are logged and skipped.

use crate::definition::{Definition, ResolveError};
use crate::imaging::{
    Action, ActionFactory, ActionKind, BackendError, DefaultActionFactory, ImageBackend,
    DEFAULT_MAX_PIXELS, MimeDetector, Resource, RustBackend, SniffingDetector, known_format,
};
use crate::types::{CreatedPicture, Img, Picture, Source, Src, Srcset};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::io::Read;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CreateError {
    #[error(transparent)]
    Definition(#[from] ResolveError),
    #[error("Unsupported mime type {} for resource {resource}", .mime_type.as_deref().unwrap_or("unknown"))]
    UnsupportedMimeType {
        resource: Resource,
        mime_type: Option<String>,
    },
    #[error("Resource {resource} too small: requested {axis} {requested}, image has {actual}")]
    ResourceTooSmall {
        resource: Resource,
        axis: Axis,
        requested: u32,
        actual: u32,
    },
    #[error("Unable to create picture from resource {resource}: {source}")]
    PictureCreateFailed {
        resource: Resource,
        source: BackendError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Width,
    Height,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::Width => "width",
            Axis::Height => "height",
        })
    }
}

/// Generator policy. Also the `[creator]` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreateSettings {
    /// Output formats the generator may produce. Must also be known to the
    /// image backend to count as supported.
    pub supported_mime_types: Vec<String>,
    /// Maximum scale factor past the source's native size.
    pub upsize: Option<f32>,
    /// Drop variants whose encoded size misses the requested size.
    pub skip_smaller_sized_src: bool,
    /// Fail when any requested dimension exceeds the source image.
    pub verify_sizes: bool,
    /// Action kinds refused on top of `save` and `encode`.
    pub disallowed_actions: Vec<ActionKind>,
    /// Largest variant the image backend will resize or fit to, in pixels.
    pub max_pixels: u64,
}

impl Default for CreateSettings {
    fn default() -> Self {
        Self {
            supported_mime_types: ["image/png", "image/jpeg", "image/gif", "image/webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            upsize: None,
            skip_smaller_sized_src: false,
            verify_sizes: false,
            disallowed_actions: Vec::new(),
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

impl CreateSettings {
    /// Upsize ratio handed to every sizing action.
    ///
    /// Skipping undersized variants only works when upscaling is capped, so
    /// enabling it raises a missing or sub-unity ratio to `1.0`.
    pub fn effective_upsize(&self) -> Option<f32> {
        if self.skip_smaller_sized_src && self.upsize.is_none_or(|upsize| upsize < 1.0) {
            return Some(1.0);
        }
        self.upsize
    }
}

/// Turns definitions into encoded pictures.
pub struct PictureCreator<B: ImageBackend = RustBackend> {
    backend: B,
    detector: Box<dyn MimeDetector>,
    action_factory: Box<dyn ActionFactory>,
    settings: CreateSettings,
}

impl PictureCreator<RustBackend> {
    pub fn new(settings: CreateSettings) -> Self {
        Self::with_backend(RustBackend::with_max_pixels(settings.max_pixels), settings)
    }
}

impl<B: ImageBackend> PictureCreator<B> {
    pub fn with_backend(backend: B, settings: CreateSettings) -> Self {
        Self {
            backend,
            detector: Box::new(SniffingDetector),
            action_factory: Box::new(DefaultActionFactory),
            settings,
        }
    }

    pub fn with_detector(self, detector: impl MimeDetector + 'static) -> Self {
        Self {
            detector: Box::new(detector),
            ..self
        }
    }

    pub fn with_action_factory(self, factory: impl ActionFactory + 'static) -> Self {
        Self {
            action_factory: Box::new(factory),
            ..self
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &CreateSettings {
        &self.settings
    }

    /// Buffer a stream and create from the bytes.
    pub fn create_from_reader(
        &self,
        reader: impl Read,
        definition: &dyn Definition,
    ) -> Result<CreatedPicture, CreateError> {
        let resource = Resource::from_reader(reader)?;
        self.create_from_resource(&resource, definition)
    }

    pub fn create_from_resource(
        &self,
        resource: &Resource,
        definition: &dyn Definition,
    ) -> Result<CreatedPicture, CreateError> {
        let picture = definition.to_picture()?;
        let source_mime = self.verify_mime_type(resource)?;

        if self.settings.verify_sizes {
            self.verify_sizes(resource, &picture)?;
        }

        let upsize = self.settings.effective_upsize();

        let img_src = self.resolve_src(picture.img.src.clone(), &picture, &source_mime);
        let img_srcset: Option<Vec<Src>> = picture.img.srcset.as_ref().map(|srcset| {
            srcset
                .iter()
                .map(|src| self.resolve_src(src.clone(), &picture, &source_mime))
                .collect()
        });
        let groups = self.resolve_sources(&picture, &source_mime);

        let img_src = self.encode_src(resource, img_src, upsize)?;
        if let (Some(width), Some(encoded)) = (img_src.width, &img_src.encoded)
            && width != encoded.width
        {
            tracing::debug!(
                "Img src with width {width} larger than original, encoded at {}",
                encoded.width
            );
        }

        let pending: Vec<Src> = img_srcset
            .iter()
            .flatten()
            .chain(groups.iter().flat_map(|(_, srces)| srces))
            .cloned()
            .collect();
        let encoded: Vec<Src> = pending
            .into_par_iter()
            .map(|src| self.encode_src(resource, src, upsize))
            .collect::<Result<_, _>>()?;
        let mut encoded = encoded.into_iter();

        let img_srcset = img_srcset.map(|srces| self.retain_encoded(encoded.by_ref().take(srces.len())));
        let sources = groups
            .into_iter()
            .map(|(source, srces)| {
                let srcset = self.retain_encoded(encoded.by_ref().take(srces.len()));
                Source::new(srcset).with_attributes(source.attributes.clone())
            })
            .collect();

        let img = Img::new(img_src)
            .with_srcset(img_srcset)
            .with_attributes(picture.img.attributes.clone());

        Ok(CreatedPicture::new(
            Picture::new(img)
                .with_sources(sources)
                .with_attributes(picture.attributes.clone())
                .with_options(picture.options.clone()),
        ))
    }

    // =========================================================================
    // Verification
    // =========================================================================

    fn is_supported(&self, mime_type: &str) -> bool {
        known_format(mime_type).is_some()
            && self
                .settings
                .supported_mime_types
                .iter()
                .any(|supported| supported == mime_type)
    }

    fn verify_mime_type(&self, resource: &Resource) -> Result<String, CreateError> {
        let mime_type = self.detector.detect(resource).map_err(|err| {
            tracing::debug!("Unable to detect mime type of {resource}: {err}");
            CreateError::UnsupportedMimeType {
                resource: resource.clone(),
                mime_type: None,
            }
        })?;

        if !self.is_supported(&mime_type) {
            return Err(CreateError::UnsupportedMimeType {
                resource: resource.clone(),
                mime_type: Some(mime_type),
            });
        }
        Ok(mime_type)
    }

    fn verify_sizes(&self, resource: &Resource, picture: &Picture) -> Result<(), CreateError> {
        let actual = self.backend.identify(resource).map_err(|source| {
            CreateError::PictureCreateFailed {
                resource: resource.clone(),
                source,
            }
        })?;

        for src in picture.srces() {
            let checks = [
                (Axis::Width, src.width, actual.width),
                (Axis::Height, src.height, actual.height),
            ];
            for (axis, requested, actual) in checks {
                if let Some(requested) = requested
                    && requested > actual
                {
                    return Err(CreateError::ResourceTooSmall {
                        resource: resource.clone(),
                        axis,
                        requested,
                        actual,
                    });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Option resolution
    // =========================================================================

    fn resolve_src(&self, src: Src, picture: &Picture, source_mime: &str) -> Src {
        let mime_type = match src.mime_type.as_deref() {
            Some(mime_type) if self.is_supported(mime_type) => mime_type.to_string(),
            Some(_) => source_mime.to_string(),
            None => picture
                .convert_table()
                .and_then(|convert| convert.get(source_mime))
                .and_then(Value::as_str)
                .filter(|target| self.is_supported(target))
                .unwrap_or(source_mime)
                .to_string(),
        };

        let mut src = src.with_mime_type(mime_type.as_str());

        if !src.has_option("quality")
            && let Some(table) = picture.quality_table()
        {
            let quality = table.get(&mime_type).cloned().unwrap_or(Value::Null);
            src = src.with_option("quality", quality);
        }

        if !src.has_option("actions")
            && let Some(actions) = picture.actions()
        {
            src = src.with_option("actions", Value::Object(actions.clone()));
        }

        src
    }

    /// Resolve `<source>` groups, dropping those whose declared type is unsupported.
    fn resolve_sources<'p>(
        &self,
        picture: &'p Picture,
        source_mime: &str,
    ) -> Vec<(&'p Source, Vec<Src>)> {
        picture
            .sources
            .iter()
            .enumerate()
            .filter_map(|(index, source)| {
                let declared = source.declared_type();
                if let Some(declared) = declared
                    && !self.is_supported(declared)
                {
                    tracing::debug!("Skipped source {index} as unsupported mime type {declared}");
                    return None;
                }

                let srces = source
                    .srcset
                    .iter()
                    .map(|src| {
                        let src = match declared {
                            Some(declared) => src.clone().with_mime_type(declared),
                            None => src.clone(),
                        };
                        self.resolve_src(src, picture, source_mime)
                    })
                    .collect();
                Some((source, srces))
            })
            .collect()
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    fn is_disallowed(&self, kind: ActionKind) -> bool {
        matches!(kind, ActionKind::Save | ActionKind::Encode)
            || self.settings.disallowed_actions.contains(&kind)
    }

    /// User actions of a variant. Unknown, invalid and disallowed ones are dropped.
    fn create_actions(&self, src: &Src) -> Vec<Action> {
        let Some(definitions) = src.actions() else {
            return Vec::new();
        };

        let no_params = Map::new();
        definitions
            .iter()
            .filter_map(|(name, params)| {
                let params = match params {
                    Value::Object(params) => params,
                    Value::Null => &no_params,
                    _ => {
                        tracing::warn!("Unable to create action {name}: parameters must be a map");
                        return None;
                    }
                };
                match self.action_factory.create_action(name, params) {
                    Ok(action) if self.is_disallowed(action.kind()) => {
                        tracing::debug!("Disallowed action {name}");
                        None
                    }
                    Ok(action) => Some(action),
                    Err(err) => {
                        tracing::warn!("Unable to create action {name}: {err}");
                        None
                    }
                }
            })
            .collect()
    }

    fn encode_src(
        &self,
        resource: &Resource,
        src: Src,
        upsize: Option<f32>,
    ) -> Result<Src, CreateError> {
        let mut actions = self.create_actions(&src);

        actions.push(match (src.width, src.height) {
            (Some(width), Some(height)) => Action::Fit {
                width,
                height,
                upsize,
            },
            (width, height) => Action::Resize {
                width,
                height,
                upsize,
            },
        });
        actions.push(Action::Encode {
            mime_type: src.mime_type.clone().unwrap_or_default(),
            quality: src.quality(),
        });

        let encoded = self.backend.apply(resource, &actions).map_err(|source| {
            CreateError::PictureCreateFailed {
                resource: resource.clone(),
                source,
            }
        })?;
        Ok(src.with_encoded(encoded))
    }

    fn retain_encoded(&self, srces: impl Iterator<Item = Src>) -> Srcset {
        srces.filter(|src| !self.skip_encoded_src(src)).collect()
    }

    fn skip_encoded_src(&self, src: &Src) -> bool {
        let Some(encoded) = &src.encoded else {
            return true;
        };
        if !self.settings.skip_smaller_sized_src {
            return false;
        }

        if let Some(width) = src.width
            && width != encoded.width
        {
            tracing::debug!("Skipped src with width {width} as lower sized");
            return true;
        }
        if let Some(height) = src.height
            && height != encoded.height
        {
            tracing::debug!("Skipped src with height {height} as lower sized");
            return true;
        }
        false
    }
}
