use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a supported image")]
    Unsupported(String),
    #[error("Not an image data URL")]
    InvalidDataUrl,
}

/// An image ready to be sent inline to a provider, as a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    data_url: String,
}

impl ImagePayload {
    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self, ImageError> {
        let format = image::guess_format(bytes).map_err(|_| ImageError::Unsupported(name.to_string()))?;
        let mime = mime_type(format).ok_or_else(|| ImageError::Unsupported(name.to_string()))?;
        Ok(Self {
            data_url: format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
        })
    }

    /// Accepts an already encoded `data:image/...;base64,` URL.
    pub fn from_data_url(data_url: &str) -> Result<Self, ImageError> {
        let data_url = data_url.trim();
        let (header, body) = data_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or(ImageError::InvalidDataUrl)?;

        if !header.starts_with("image/") || !header.ends_with(";base64") || body.is_empty() {
            return Err(ImageError::InvalidDataUrl);
        }
        STANDARD.decode(body).map_err(|_| ImageError::InvalidDataUrl)?;

        Ok(Self {
            data_url: data_url.to_string(),
        })
    }

    pub fn as_data_url(&self) -> &str {
        &self.data_url
    }

    pub fn mime_type(&self) -> &str {
        self.data_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .unwrap_or("")
    }
}

fn mime_type(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        _ => None,
    }
}

/// Reads a local image file into an inline payload.
pub async fn load_image(path: impl AsRef<Path>) -> Result<ImagePayload, ImageError> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let bytes = tokio::fs::read(path).await.map_err(|source| ImageError::Read {
        path: name.clone(),
        source,
    })?;
    log::info!("Loaded image {} ({} bytes)", name, bytes.len());
    ImagePayload::from_bytes(&bytes, &name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn png_bytes_become_data_url() {
        let payload = ImagePayload::from_bytes(PNG_HEADER, "meal.png").unwrap();
        assert!(payload.as_data_url().starts_with("data:image/png;base64,"));
        assert_eq!(payload.mime_type(), "image/png");
    }

    #[test]
    fn text_is_not_an_image() {
        let err = ImagePayload::from_bytes(b"hello there", "notes.txt").unwrap_err();
        assert!(matches!(err, ImageError::Unsupported(name) if name == "notes.txt"));
    }

    #[test]
    fn data_urls_are_checked() {
        assert!(ImagePayload::from_data_url("data:image/jpeg;base64,/9j/4AAQ").is_ok());
        assert!(ImagePayload::from_data_url("data:text/plain;base64,aGk=").is_err());
        assert!(ImagePayload::from_data_url("https://example.com/pizza.jpg").is_err());
        assert!(ImagePayload::from_data_url("data:image/png;base64,").is_err());
        assert!(ImagePayload::from_data_url("data:image/png;base64,%%%").is_err());
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let err = load_image("/definitely/not/here.png").await.unwrap_err();
        assert!(matches!(err, ImageError::Read { .. }));
    }
}
