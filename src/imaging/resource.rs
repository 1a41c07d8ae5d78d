//! Source image handles.
//!
//! A [`Resource`] is where the pixels come from. It is a closed set of forms,
//! so every consumer (mime sniffing, dimension probing, decoding) matches on it
//! exhaustively instead of guessing at runtime.
//!
//! | Form | Holds | Typical origin |
//! |---|---|---|
//! | `File` | a path on disk | CLI arguments, upload directories |
//! | `Binary` | raw encoded bytes | request bodies, buffered streams |
//! | `Base64` | base64 text of the encoded bytes | JSON payloads |
//!
//! Resources are cheap to clone (shared buffers), which lets errors carry the
//! offending resource without copying image data.

use super::backend::BackendError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone, PartialEq, Eq)]
pub enum Resource {
    File(PathBuf),
    Binary(Arc<[u8]>),
    Base64(Arc<str>),
}

impl Resource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self::Binary(Arc::from(data))
    }

    pub fn base64(data: impl Into<String>) -> Self {
        let data: String = data.into();
        Self::Base64(Arc::from(data))
    }

    /// Buffer a stream into a `Binary` resource.
    ///
    /// Streams can only be read once, but the creator reads the source several
    /// times (sniff, identify, one decode per variant).
    pub fn from_reader(mut reader: impl Read) -> std::io::Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(Self::binary(data))
    }

    /// The encoded bytes behind this resource.
    ///
    /// Borrowed for `Binary`, read from disk for `File`, decoded for `Base64`.
    pub fn bytes(&self) -> Result<Cow<'_, [u8]>, BackendError> {
        match self {
            Self::File(path) => Ok(Cow::Owned(std::fs::read(path)?)),
            Self::Binary(data) => Ok(Cow::Borrowed(&data[..])),
            Self::Base64(data) => Ok(Cow::Owned(STANDARD.decode(data.trim().as_bytes())?)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            _ => None,
        }
    }
}

// Never dump image bytes into logs or error messages.
impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Binary(data) => write!(f, "Binary(<{} bytes>)", data.len()),
            Self::Base64(data) => write!(f, "Base64(<{} chars>)", data.len()),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Binary(data) => write!(f, "binary data ({} bytes)", data.len()),
            Self::Base64(data) => write!(f, "base64 data ({} chars)", data.len()),
        }
    }
}
