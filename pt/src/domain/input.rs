//! The pin a generation cycle starts from: an uploaded image or a link

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;
use tracing::debug;

/// Source label stored for trips generated from an uploaded image
pub const IMAGE_UPLOAD_LABEL: &str = "Image Upload";

/// Errors building an input reference
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Exactly one of image or link is required, got neither")]
    Missing,

    #[error("Exactly one of image or link is required, got both")]
    Both,

    #[error("Link must not be empty")]
    EmptyLink,

    #[error("Image payload is empty")]
    EmptyImage,

    #[error("Unsupported image type for '{0}'")]
    UnsupportedImage(String),

    #[error("Failed to read image {path}: {message}")]
    Unreadable { path: String, message: String },
}

/// Raw image bytes plus their media type
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("len", &self.bytes.len())
            .field("media_type", &self.media_type)
            .finish()
    }
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Result<Self, InputError> {
        let media_type = media_type.into();
        if bytes.is_empty() {
            return Err(InputError::EmptyImage);
        }
        if media_type.trim().is_empty() {
            return Err(InputError::UnsupportedImage("(no media type)".to_string()));
        }
        Ok(Self { bytes, media_type })
    }

    /// Read an image from disk, inferring its media type from the extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "ImagePayload::from_path: called");
        let media_type =
            media_type_for_path(path).ok_or_else(|| InputError::UnsupportedImage(path.display().to_string()))?;
        let bytes = std::fs::read(path).map_err(|e| InputError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::new(bytes, media_type)
    }

    /// Base64 body as sent inline to the model
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

/// Map a file extension to an image media type
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

/// Exactly one of an image payload or an external link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputReference {
    Image(ImagePayload),
    Link(String),
}

impl InputReference {
    /// Build from optional parts, rejecting both-present and neither-present
    pub fn from_parts(image: Option<ImagePayload>, link: Option<String>) -> Result<Self, InputError> {
        debug!(has_image = image.is_some(), has_link = link.is_some(), "InputReference::from_parts: called");
        match (image, link) {
            (Some(_), Some(_)) => Err(InputError::Both),
            (None, None) => Err(InputError::Missing),
            (Some(image), None) => Ok(Self::Image(image)),
            (None, Some(link)) => Self::link(link),
        }
    }

    pub fn link(link: impl Into<String>) -> Result<Self, InputError> {
        let link = link.into().trim().to_string();
        if link.is_empty() {
            return Err(InputError::EmptyLink);
        }
        Ok(Self::Link(link))
    }

    pub fn as_link(&self) -> Option<&str> {
        match self {
            Self::Link(link) => Some(link),
            Self::Image(_) => None,
        }
    }

    /// What the preview pane shows: a data URI for images, the link itself otherwise
    pub fn preview(&self) -> String {
        match self {
            Self::Image(image) => format!("data:{};base64,{}", image.media_type, image.to_base64()),
            Self::Link(link) => link.clone(),
        }
    }

    /// Value stored as a trip's source
    pub fn source_label(&self) -> String {
        match self {
            Self::Image(_) => IMAGE_UPLOAD_LABEL.to_string(),
            Self::Link(link) => link.clone(),
        }
    }
}
