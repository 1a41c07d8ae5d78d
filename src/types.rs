//! The picture data model.
//!
//! These are plain values. Every `with_*` method consumes `self` and returns
//! the updated value, so a resolved [`Picture`] can be cloned and reshaped
//! without anything being mutated behind a caller's back. Encoded results are
//! held behind `Arc`, which keeps clones of created pictures cheap.
//!
//! Every type serializes to the JSON projection used by definition files:
//!
//! ```json
//! {
//!   "img": {
//!     "src": {"width": 50, "height": null, "descriptor": null, "mimeType": null,
//!             "url": null, "path": null, "options": {}},
//!     "srcset": null,
//!     "attributes": {"alt": "Hero"}
//!   },
//!   "sources": [],
//!   "attributes": {},
//!   "options": {}
//! }
//! ```

use crate::imaging::{Encoded, Quality};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::ops::Deref;
use std::sync::Arc;

/// HTML attributes in declaration order.
pub type Attributes = IndexMap<String, String>;

/// Free-form options (`quality`, `convert`, `actions`).
pub type Options = Map<String, Value>;

// =========================================================================
// Src
// =========================================================================

/// One candidate output image.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "SrcFields")]
pub struct Src {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// srcset descriptor such as `2x` or `480w`.
    pub descriptor: Option<String>,
    pub mime_type: Option<String>,
    pub url: Option<String>,
    pub path: Option<String>,
    pub encoded: Option<Arc<Encoded>>,
    pub options: Options,
}

/// Wire form of [`Src`]. Accepts both named fields and the positional
/// `[width, height, descriptor, mimeType, url, path, options]` sequence.
#[derive(Deserialize, Default)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
struct SrcFields {
    width: Option<u32>,
    height: Option<u32>,
    descriptor: Option<String>,
    mime_type: Option<String>,
    url: Option<String>,
    path: Option<String>,
    options: Options,
}

impl From<SrcFields> for Src {
    fn from(fields: SrcFields) -> Self {
        Self {
            width: fields.width,
            height: fields.height,
            descriptor: fields.descriptor,
            mime_type: fields.mime_type,
            url: fields.url,
            path: fields.path,
            encoded: None,
            options: fields.options,
        }
    }
}

impl Src {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sized(width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_width(self, width: Option<u32>) -> Self {
        Self { width, ..self }
    }

    pub fn with_height(self, height: Option<u32>) -> Self {
        Self { height, ..self }
    }

    pub fn with_descriptor(self, descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: Some(descriptor.into()),
            ..self
        }
    }

    pub fn with_mime_type(self, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            ..self
        }
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..self
        }
    }

    pub fn with_path(self, path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..self
        }
    }

    pub fn with_encoded(self, encoded: Encoded) -> Self {
        Self {
            encoded: Some(Arc::new(encoded)),
            ..self
        }
    }

    pub fn with_options(self, options: Options) -> Self {
        Self { options, ..self }
    }

    /// Set a single option key, keeping the others.
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Whether `options.<key>` is present and not null.
    pub fn has_option(&self, key: &str) -> bool {
        self.options.get(key).is_some_and(|value| !value.is_null())
    }

    /// `options.quality`, clamped to the valid range.
    ///
    /// Whole numbers are accepted in integer or float form (`80`, `80.0`).
    /// Anything else is logged and leaves the backend default in place.
    pub fn quality(&self) -> Option<Quality> {
        let value = self.options.get("quality").filter(|value| !value.is_null())?;
        let whole = value.as_u64().or_else(|| {
            value
                .as_f64()
                .filter(|q| q.fract() == 0.0 && *q >= 0.0)
                .map(|q| q as u64)
        });
        match whole {
            Some(q) => Some(Quality::new(q.min(u32::MAX as u64) as u32)),
            None => {
                tracing::warn!("Ignoring quality {value}: expected a whole number");
                None
            }
        }
    }

    /// `options.actions` as an ordered `name -> params` map.
    pub fn actions(&self) -> Option<&Map<String, Value>> {
        self.options.get("actions").and_then(Value::as_object)
    }

    /// Mime type of the encoded result if there is one, else the requested one.
    pub fn effective_mime_type(&self) -> Option<&str> {
        match &self.encoded {
            Some(encoded) => Some(&encoded.mime_type),
            None => self.mime_type.as_deref(),
        }
    }

    /// Output dimensions: encoded if present, else requested.
    pub fn effective_size(&self) -> (Option<u32>, Option<u32>) {
        match &self.encoded {
            Some(encoded) => (Some(encoded.width), Some(encoded.height)),
            None => (self.width, self.height),
        }
    }

    /// What goes into `src`/`srcset`: url, then encoded data URL, then path.
    pub fn location(&self) -> Cow<'_, str> {
        if let Some(url) = &self.url {
            return Cow::Borrowed(url);
        }
        if let Some(encoded) = &self.encoded {
            return Cow::Owned(encoded.data_url());
        }
        Cow::Borrowed(self.path.as_deref().unwrap_or(""))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SrcView<'a> {
    width: Option<u32>,
    height: Option<u32>,
    descriptor: Option<&'a str>,
    mime_type: Option<&'a str>,
    url: Option<Cow<'a, str>>,
    path: Option<&'a str>,
    options: &'a Options,
}

// An encoded src reports what was produced, not what was requested.
impl Serialize for Src {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (width, height) = self.effective_size();
        let url = match &self.encoded {
            Some(encoded) => Some(Cow::Owned(encoded.data_url())),
            None => self.url.as_deref().map(Cow::Borrowed),
        };
        SrcView {
            width,
            height,
            descriptor: self.descriptor.as_deref(),
            mime_type: self.effective_mime_type(),
            url,
            path: self.path.as_deref(),
            options: &self.options,
        }
        .serialize(serializer)
    }
}

// =========================================================================
// Srcset / Source / Img
// =========================================================================

/// Ordered variants; rendering order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Srcset(Vec<Src>);

impl Srcset {
    pub fn new(srces: Vec<Src>) -> Self {
        Self(srces)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Src> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn with_src(mut self, src: Src) -> Self {
        self.0.push(src);
        self
    }

    pub fn into_vec(self) -> Vec<Src> {
        self.0
    }
}

impl FromIterator<Src> for Srcset {
    fn from_iter<I: IntoIterator<Item = Src>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Srcset {
    type Item = Src;
    type IntoIter = std::vec::IntoIter<Src>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Srcset {
    type Item = &'a Src;
    type IntoIter = std::slice::Iter<'a, Src>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A `<source>` alternative.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Source {
    pub srcset: Srcset,
    /// Pass-through attributes such as `media` and `type`.
    pub attributes: Attributes,
}

impl Source {
    pub fn new(srcset: Srcset) -> Self {
        Self {
            srcset,
            attributes: Attributes::new(),
        }
    }

    pub fn with_srcset(self, srcset: Srcset) -> Self {
        Self { srcset, ..self }
    }

    pub fn with_attributes(self, attributes: Attributes) -> Self {
        Self { attributes, ..self }
    }

    /// The declared `type` attribute.
    pub fn declared_type(&self) -> Option<&str> {
        self.attributes.get("type").map(String::as_str)
    }
}

/// The primary `<img>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Img {
    pub src: Src,
    pub srcset: Option<Srcset>,
    /// Never contains `src` or `srcset`; those are computed.
    pub attributes: Attributes,
}

impl Img {
    pub fn new(src: Src) -> Self {
        Self {
            src,
            srcset: None,
            attributes: Attributes::new(),
        }
    }

    pub fn with_src(self, src: Src) -> Self {
        Self { src, ..self }
    }

    pub fn with_srcset(self, srcset: Option<Srcset>) -> Self {
        Self { srcset, ..self }
    }

    pub fn with_attributes(mut self, mut attributes: Attributes) -> Self {
        attributes.shift_remove("src");
        attributes.shift_remove("srcset");
        self.attributes = attributes;
        self
    }
}

// =========================================================================
// Picture
// =========================================================================

/// A resolved picture definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Picture {
    pub img: Img,
    pub sources: Vec<Source>,
    /// Applied to the `<picture>` tag.
    pub attributes: Attributes,
    /// Picture-wide `quality`, `convert` and `actions` tables.
    pub options: Options,
}

impl Picture {
    pub fn new(img: Img) -> Self {
        Self {
            img,
            ..Self::default()
        }
    }

    pub fn with_img(self, img: Img) -> Self {
        Self { img, ..self }
    }

    pub fn with_sources(self, sources: Vec<Source>) -> Self {
        Self { sources, ..self }
    }

    pub fn with_attributes(self, attributes: Attributes) -> Self {
        Self { attributes, ..self }
    }

    pub fn with_options(self, options: Options) -> Self {
        Self { options, ..self }
    }

    /// Every variant: `img.src`, then `img.srcset`, then each source's srcset.
    pub fn srces(&self) -> impl Iterator<Item = &Src> {
        std::iter::once(&self.img.src)
            .chain(self.img.srcset.iter().flatten())
            .chain(self.sources.iter().flat_map(|source| source.srcset.iter()))
    }

    fn option_table(&self, key: &str) -> Option<&Map<String, Value>> {
        self.options.get(key).and_then(Value::as_object)
    }

    /// `options.quality`: mime type to quality.
    pub fn quality_table(&self) -> Option<&Map<String, Value>> {
        self.option_table("quality")
    }

    /// `options.convert`: source mime type to target mime type.
    pub fn convert_table(&self) -> Option<&Map<String, Value>> {
        self.option_table("convert")
    }

    /// `options.actions`, inherited by variants that set none.
    pub fn actions(&self) -> Option<&Map<String, Value>> {
        self.option_table("actions")
    }
}

/// A picture whose retained variants all carry an encoded result.
///
/// Only the picture creator builds these.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CreatedPicture(Picture);

impl CreatedPicture {
    pub(crate) fn new(picture: Picture) -> Self {
        Self(picture)
    }

    pub fn into_picture(self) -> Picture {
        self.0
    }
}

impl Deref for CreatedPicture {
    type Target = Picture;

    fn deref(&self) -> &Picture {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encoded(width: u32, height: u32) -> Encoded {
        Encoded {
            data: b"imgdata".to_vec(),
            mime_type: "image/webp".into(),
            extension: "webp".into(),
            width,
            height,
            size: 7,
            actions: Vec::new(),
        }
    }

    #[test]
    fn with_methods_leave_other_fields() {
        let src = Src::sized(Some(50), None)
            .with_descriptor("2x")
            .with_mime_type("image/png");
        let updated = src.clone().with_width(Some(100));

        assert_eq!(src.width, Some(50));
        assert_eq!(updated.width, Some(100));
        assert_eq!(updated.descriptor.as_deref(), Some("2x"));
        assert_eq!(updated.mime_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn src_serializes_every_field_in_order() {
        let src = Src::sized(Some(50), None).with_path("img/a.jpg");
        assert_eq!(
            serde_json::to_string(&src).unwrap(),
            r#"{"width":50,"height":null,"descriptor":null,"mimeType":null,"url":null,"path":"img/a.jpg","options":{}}"#
        );
    }

    #[test]
    fn encoded_src_serializes_produced_values() {
        let src = Src::sized(Some(500), None)
            .with_mime_type("image/jpeg")
            .with_encoded(encoded(200, 150));
        let value = serde_json::to_value(&src).unwrap();

        assert_eq!(value["width"], 200);
        assert_eq!(value["height"], 150);
        assert_eq!(value["mimeType"], "image/webp");
        assert_eq!(value["url"], "data:image/webp;base64,aW1nZGF0YQ==");
    }

    #[test]
    fn src_deserializes_named_and_positional() {
        let named: Src = serde_json::from_value(json!({"width": 300, "mimeType": "image/png"})).unwrap();
        assert_eq!(named.width, Some(300));
        assert_eq!(named.mime_type.as_deref(), Some("image/png"));

        let positional: Src = serde_json::from_value(json!([300, null, "2x"])).unwrap();
        assert_eq!(positional.width, Some(300));
        assert_eq!(positional.height, None);
        assert_eq!(positional.descriptor.as_deref(), Some("2x"));
    }

    #[test]
    fn src_rejects_unknown_fields() {
        assert!(serde_json::from_value::<Src>(json!({"widht": 300})).is_err());
    }

    #[test]
    fn location_priority() {
        let src = Src::new().with_path("a.jpg");
        assert_eq!(src.location(), "a.jpg");

        let src = src.with_encoded(encoded(1, 1));
        assert_eq!(src.location(), "data:image/webp;base64,aW1nZGF0YQ==");

        let src = src.with_url("https://example.com/a.jpg");
        assert_eq!(src.location(), "https://example.com/a.jpg");

        assert_eq!(Src::new().location(), "");
    }

    #[test]
    fn option_helpers() {
        let src = Src::new()
            .with_option("quality", json!(250))
            .with_option("actions", json!({"greyscale": {}}));
        assert_eq!(src.quality(), Some(Quality::new(100)));
        assert!(src.actions().unwrap().contains_key("greyscale"));
        assert!(!Src::new().with_option("quality", Value::Null).has_option("quality"));
    }

    #[test]
    fn quality_accepts_whole_floats_only() {
        let quality = |value: Value| Src::new().with_option("quality", value).quality();
        assert_eq!(quality(json!(80.0)), Some(Quality::new(80)));
        assert_eq!(quality(json!(1e12)), Some(Quality::new(100)));
        assert_eq!(quality(json!(80.5)), None);
        assert_eq!(quality(json!(-20)), None);
        assert_eq!(quality(json!("80")), None);
        assert_eq!(quality(Value::Null), None);
        assert_eq!(Src::new().quality(), None);
    }

    #[test]
    fn img_attributes_drop_computed_keys() {
        let attributes: Attributes = [("alt", "x"), ("src", "y"), ("srcset", "z")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let img = Img::new(Src::new()).with_attributes(attributes);
        assert_eq!(img.attributes.keys().collect::<Vec<_>>(), vec!["alt"]);
    }

    #[test]
    fn srces_order_is_src_img_srcset_then_sources() {
        let picture = Picture::new(
            Img::new(Src::sized(Some(1), None)).with_srcset(Some(Srcset::new(vec![
                Src::sized(Some(2), None),
                Src::sized(Some(3), None),
            ]))),
        )
        .with_sources(vec![
            Source::new(Srcset::new(vec![Src::sized(Some(4), None)])),
            Source::new(Srcset::new(vec![Src::sized(Some(5), None)])),
        ]);

        let widths: Vec<_> = picture.srces().map(|src| src.width).collect();
        assert_eq!(widths, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
    }

    #[test]
    fn picture_serializes_nested_shape() {
        let picture = Picture::new(Img::new(Src::sized(Some(50), None)))
            .with_options(json!({"quality": {"image/jpeg": 80}}).as_object().unwrap().clone());
        let value = serde_json::to_value(&picture).unwrap();

        assert_eq!(value["img"]["srcset"], Value::Null);
        assert_eq!(value["img"]["src"]["width"], 50);
        assert_eq!(value["sources"], json!([]));
        assert_eq!(value["options"]["quality"]["image/jpeg"], 80);
        assert_eq!(picture.quality_table().unwrap()["image/jpeg"], 80);
    }
}
