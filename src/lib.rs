//! # Picture Forge
//!
//! Builds responsive `<picture>` markup from declarative definitions. A
//! definition names the primary `<img>` variant, its srcset and any `<source>`
//! alternatives; the forge encodes every variant from one source image and
//! renders the result.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Resolve   definition JSON  →  Picture         (tolerant parsing, no I/O)
//! 2. Create    Picture + image  →  CreatedPicture  (option resolution, encoding)
//! 3. Project   CreatedPicture   →  <picture> HTML  (single emptiness gate)
//! ```
//!
//! Each stage is usable on its own. A hand-built [`types::Picture`] that only
//! carries urls renders without ever touching pixels, and a created picture
//! serializes to the same JSON shape definitions are written in.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`definition`] | Stage 1: positional and qualified definition conventions, the `Definition` trait |
//! | [`registry`] | Named definition lookup: in-memory, JSON files on disk, layered stacks |
//! | [`create`] | Stage 2: variant option resolution, action pipelines, parallel encoding, skip filtering |
//! | [`tag`] | Stage 3: `<picture>`/`<source>`/`<img>` projection and escaping |
//! | [`types`] | The picture data model shared by every stage |
//! | [`imaging`] | Resources, actions, mime sniffing and the pure-Rust image backend |
//! | [`config`] | `picture-forge.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting for definition lists and created pictures |
//!
//! # Example
//!
//! ```no_run
//! use picture_forge::create::{CreateSettings, PictureCreator};
//! use picture_forge::definition::ArrayDefinition;
//! use picture_forge::imaging::Resource;
//! use serde_json::json;
//!
//! let definition = ArrayDefinition::new(
//!     "hero",
//!     json!({"img": {"src": [800], "srcset": {"2x": [1600]}, "alt": "Hero"}}),
//! );
//! let creator = PictureCreator::new(CreateSettings::default());
//! let picture = creator
//!     .create_from_resource(&Resource::file("hero.jpg"), &definition)
//!     .unwrap();
//! println!("{picture}");
//! ```

pub mod config;
pub mod create;
pub mod definition;
pub mod imaging;
pub mod output;
pub mod registry;
pub mod tag;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
