//! Markup projection: picture → `<picture>` tag tree → HTML.
//!
//! Works on created pictures and on hand-built ones that only carry urls or
//! paths. The projection has a single emptiness gate: when the primary `<img>`
//! has no resolvable `src`, the whole structure renders as the empty string.
//!
//! Attribute order is stable. Declared attributes come first, computed ones
//! (`src`, `width`, `height`, `srcset`) are appended after them. Values are
//! escaped with maud; empty values are omitted.

use crate::types::{Attributes, CreatedPicture, Picture, Src, Srcset};
use indexmap::IndexSet;
use maud::{Markup, PreEscaped, Render};
use std::fmt;

/// An HTML element without children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    name: String,
    attributes: Attributes,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(self, attributes: Attributes) -> Self {
        Self { attributes, ..self }
    }

    /// Set an attribute, keeping its position if already present.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Append to the `class` attribute.
    pub fn class(self, class: &str) -> Self {
        let classes = match self.get("class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.attr("class", classes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn is_void(&self) -> bool {
        matches!(self.name.as_str(), "img" | "source")
    }

    fn render_open(&self, buffer: &mut String) {
        buffer.push('<');
        buffer.push_str(&self.name);
        for (name, value) in &self.attributes {
            if value.is_empty() {
                continue;
            }
            buffer.push(' ');
            name.as_str().render_to(buffer);
            buffer.push_str("=\"");
            value.as_str().render_to(buffer);
            buffer.push('"');
        }
        buffer.push('>');
    }

    fn render_close(&self, buffer: &mut String) {
        if !self.is_void() {
            buffer.push_str("</");
            buffer.push_str(&self.name);
            buffer.push('>');
        }
    }
}

impl Render for Tag {
    fn render_to(&self, buffer: &mut String) {
        self.render_open(buffer);
        self.render_close(buffer);
    }
}

// =========================================================================
// Picture tag
// =========================================================================

/// Projected `<picture>` structure, or nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PictureTag {
    /// Renders as the empty string.
    #[default]
    Empty,
    Picture {
        tag: Tag,
        sources: Vec<Tag>,
        img: Tag,
    },
}

impl PictureTag {
    pub fn empty() -> Self {
        Self::Empty
    }

    pub fn from_picture(picture: &Picture) -> Self {
        let src = picture.img.src.location();
        if src.is_empty() {
            return Self::Empty;
        }

        let mut img = Tag::new("img")
            .with_attributes(picture.img.attributes.clone())
            .attr("src", src);

        let (width, height) = picture.img.src.effective_size();
        if let Some(width) = width
            && !img.attributes.contains_key("width")
        {
            img = img.attr("width", width.to_string());
        }
        if let Some(height) = height
            && !img.attributes.contains_key("height")
        {
            img = img.attr("height", height.to_string());
        }

        if let Some(srcset) = &picture.img.srcset
            && !srcset.is_empty()
        {
            img = img.attr("srcset", srcset_attribute(srcset));
        }

        let sources = picture
            .sources
            .iter()
            .filter(|source| !source.srcset.is_empty())
            .map(|source| {
                let mut attributes = source.attributes.clone();
                if attributes.contains_key("type") {
                    let mime_types: IndexSet<&str> = source
                        .srcset
                        .iter()
                        .filter_map(Src::effective_mime_type)
                        .collect();
                    match mime_types.len() {
                        0 => {}
                        1 => {
                            attributes.insert("type".into(), mime_types[0].to_string());
                        }
                        _ => {
                            attributes.shift_remove("type");
                        }
                    }
                }
                Tag::new("source")
                    .with_attributes(attributes)
                    .attr("srcset", srcset_attribute(&source.srcset))
            })
            .collect();

        Self::Picture {
            tag: Tag::new("picture").with_attributes(picture.attributes.clone()),
            sources,
            img,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Picture { img, .. } => img.get("src").is_none_or(str::is_empty),
        }
    }

    pub fn tag(&self) -> Option<&Tag> {
        match self {
            Self::Empty => None,
            Self::Picture { tag, .. } => Some(tag),
        }
    }

    pub fn img(&self) -> Option<&Tag> {
        match self {
            Self::Empty => None,
            Self::Picture { img, .. } => Some(img),
        }
    }

    pub fn sources(&self) -> &[Tag] {
        match self {
            Self::Empty => &[],
            Self::Picture { sources, .. } => sources,
        }
    }

    /// Set an attribute on `<picture>`. `class` appends.
    pub fn attr(self, name: &str, value: impl Into<String>) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Picture { tag, sources, img } => Self::Picture {
                tag: set_attr(tag, name, value.into()),
                sources,
                img,
            },
        }
    }

    /// Set an attribute on `<img>`. `class` appends.
    pub fn img_attr(self, name: &str, value: impl Into<String>) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Picture { tag, sources, img } => Self::Picture {
                tag,
                sources,
                img: set_attr(img, name, value.into()),
            },
        }
    }

    pub fn render(&self) -> Markup {
        let mut buffer = String::new();
        self.render_to(&mut buffer);
        PreEscaped(buffer)
    }
}

fn set_attr(tag: Tag, name: &str, value: String) -> Tag {
    if name == "class" {
        tag.class(&value)
    } else {
        tag.attr(name, value)
    }
}

/// `"<location>[ <descriptor>]"` per variant, comma separated.
fn srcset_attribute(srcset: &Srcset) -> String {
    srcset
        .iter()
        .map(|src| match src.descriptor.as_deref() {
            Some(descriptor) if !descriptor.is_empty() => format!("{} {descriptor}", src.location()),
            _ => src.location().into_owned(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl Render for PictureTag {
    fn render_to(&self, buffer: &mut String) {
        let Self::Picture { tag, sources, img } = self else {
            return;
        };
        if self.is_empty() {
            return;
        }
        tag.render_open(buffer);
        for source in sources {
            source.render_to(buffer);
        }
        img.render_to(buffer);
        tag.render_close(buffer);
    }
}

impl fmt::Display for PictureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render().into_string())
    }
}

impl fmt::Display for Picture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&PictureTag::from_picture(self), f)
    }
}

impl fmt::Display for CreatedPicture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&PictureTag::from_picture(self), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Encoded;
    use crate::types::{Img, Source};

    fn encoded(mime_type: &str, width: u32, height: u32) -> Encoded {
        Encoded {
            data: b"img".to_vec(),
            mime_type: mime_type.into(),
            extension: mime_type.rsplit('/').next().unwrap().into(),
            width,
            height,
            size: 3,
            actions: Vec::new(),
        }
    }

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn url_picture() -> Picture {
        Picture::new(Img::new(Src::new().with_url("/a.jpg")))
    }

    // =========================================================================
    // Tag
    // =========================================================================

    #[test]
    fn tag_escapes_and_skips_empty_values() {
        let tag = Tag::new("img")
            .attr("alt", "Tom & \"Jerry\" <3")
            .attr("title", "");
        assert_eq!(
            tag.render().into_string(),
            r#"<img alt="Tom &amp; &quot;Jerry&quot; &lt;3">"#
        );
    }

    #[test]
    fn non_void_tag_closes() {
        assert_eq!(
            Tag::new("picture").render().into_string(),
            "<picture></picture>"
        );
    }

    #[test]
    fn class_appends() {
        let tag = Tag::new("img").class("a").class("b");
        assert_eq!(tag.get("class"), Some("a b"));
    }

    // =========================================================================
    // Projection
    // =========================================================================

    #[test]
    fn encoded_img_uses_data_url_and_backfills_size() {
        let picture = Picture::new(Img::new(
            Src::sized(Some(50), None).with_encoded(encoded("image/jpeg", 50, 38)),
        ));
        assert_eq!(
            picture.to_string(),
            r#"<picture><img src="data:image/jpeg;base64,aW1n" width="50" height="38"></picture>"#
        );
    }

    #[test]
    fn unresolvable_src_renders_nothing() {
        let picture = Picture::new(Img::new(Src::sized(Some(50), None))).with_sources(vec![
            Source::new(Srcset::new(vec![Src::new().with_url("/b.webp")])),
        ]);
        let tag = PictureTag::from_picture(&picture);

        assert!(tag.is_empty());
        assert_eq!(tag.to_string(), "");
    }

    #[test]
    fn declared_size_is_not_overwritten() {
        let picture = Picture::new(
            Img::new(Src::sized(Some(50), Some(40)).with_path("a.jpg"))
                .with_attributes(attrs(&[("width", "100%"), ("alt", "A")])),
        );
        assert_eq!(
            picture.to_string(),
            r#"<picture><img width="100%" alt="A" src="a.jpg" height="40"></picture>"#
        );
    }

    #[test]
    fn location_priority_url_then_encoded_then_path() {
        let src = Src::new()
            .with_path("a.jpg")
            .with_encoded(encoded("image/jpeg", 1, 1))
            .with_url("/a.jpg");
        let tag = PictureTag::from_picture(&Picture::new(Img::new(src)));
        assert_eq!(tag.img().unwrap().get("src"), Some("/a.jpg"));
    }

    #[test]
    fn img_srcset_joins_descriptors() {
        let picture = Picture::new(
            Img::new(Src::new().with_url("/a.jpg")).with_srcset(Some(Srcset::new(vec![
                Src::new().with_url("/a@2x.jpg").with_descriptor("2x"),
                Src::new().with_url("/a@3x.jpg").with_descriptor(""),
            ]))),
        );
        let tag = PictureTag::from_picture(&picture);
        assert_eq!(
            tag.img().unwrap().get("srcset"),
            Some("/a@2x.jpg 2x, /a@3x.jpg")
        );
    }

    #[test]
    fn empty_srcsets_produce_no_attribute_or_source() {
        let picture = url_picture()
            .with_img(Img::new(Src::new().with_url("/a.jpg")).with_srcset(Some(Srcset::default())))
            .with_sources(vec![Source::new(Srcset::default())
                .with_attributes(attrs(&[("media", "(min-width: 1px)")]))]);
        assert_eq!(
            picture.to_string(),
            r#"<picture><img src="/a.jpg"></picture>"#
        );
    }

    #[test]
    fn source_type_follows_variant_mime_types() {
        let source = |type_: &str, srces: Vec<Src>| {
            Source::new(Srcset::new(srces)).with_attributes(attrs(&[("type", type_)]))
        };
        let picture = url_picture().with_sources(vec![
            source(
                "image/webp",
                vec![
                    Src::new().with_url("/a.webp").with_mime_type("image/webp"),
                    Src::new().with_url("/a.png").with_mime_type("image/png"),
                ],
            ),
            source(
                "image/webp",
                vec![Src::new().with_url("/a.jpg").with_encoded(encoded("image/jpeg", 1, 1))],
            ),
            source("image/avif", vec![Src::new().with_url("/a.avif")]),
        ]);

        let tag = PictureTag::from_picture(&picture);
        let types: Vec<_> = tag.sources().iter().map(|s| s.get("type")).collect();
        assert_eq!(types, vec![None, Some("image/jpeg"), Some("image/avif")]);
    }

    #[test]
    fn source_attributes_keep_declaration_order() {
        let picture = url_picture().with_sources(vec![
            Source::new(Srcset::new(vec![Src::new().with_path("b.webp").with_descriptor("1x")]))
                .with_attributes(attrs(&[("media", "(min-width: 800px)"), ("type", "image/webp")])),
        ]);
        assert_eq!(
            picture.to_string(),
            r#"<picture><source media="(min-width: 800px)" type="image/webp" srcset="b.webp 1x"><img src="/a.jpg"></picture>"#
        );
    }

    // =========================================================================
    // Attribute helpers
    // =========================================================================

    #[test]
    fn attr_helpers_return_new_tags() {
        let picture = url_picture()
            .with_attributes(attrs(&[("class", "hero")]))
            .with_img(
                Img::new(Src::new().with_url("/a.jpg")).with_attributes(attrs(&[("class", "fit")])),
            );
        let tag = PictureTag::from_picture(&picture);
        let styled = tag
            .clone()
            .attr("class", "wide")
            .attr("id", "top")
            .img_attr("class", "rounded")
            .img_attr("alt", "A");

        assert_eq!(tag.tag().unwrap().get("class"), Some("hero"));
        assert_eq!(
            styled.to_string(),
            r#"<picture class="hero wide" id="top"><img class="fit rounded" src="/a.jpg" alt="A"></picture>"#
        );
    }

    #[test]
    fn empty_tag_ignores_attributes() {
        let tag = PictureTag::empty().attr("class", "x").img_attr("alt", "y");
        assert_eq!(tag, PictureTag::Empty);
        assert_eq!(tag.render().into_string(), "");
    }
}
