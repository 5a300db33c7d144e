//! Local-disk storage for clothing item images.
//!
//! Files live under `<root>/clothing_images/` and are referenced from the
//! database by their path relative to the root.

use axum::body::Bytes;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::auth::random_string;

const IMAGE_DIR: &str = "clothing_images";
const NAME_LENGTH: usize = 20;

const ALLOWED_MIME: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];
pub const ALLOWED_TYPES: &str = "jpeg, png, jpg, gif, webp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Detects the format from the file's leading bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        match data {
            [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(ImageFormat::Png),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(ImageFormat::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ImageFormat::Jpeg => &["jpg", "jpeg"],
            ImageFormat::Png => &["png"],
            ImageFormat::Gif => &["gif"],
            ImageFormat::Webp => &["webp"],
        }
    }
}

/// An uploaded file held in memory until it is validated and written.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub data: Bytes,
}

impl UploadedImage {
    fn extension(&self) -> Option<String> {
        self.file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    max_bytes: usize,
    public_url: String,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, max_kb: usize, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            max_bytes: max_kb * 1024,
            public_url: public_url.into(),
        }
    }

    /// Checks size and type, returning the user-facing message on failure.
    pub fn validate(&self, image: &UploadedImage) -> Result<ImageFormat, String> {
        if image.data.len() > self.max_bytes {
            return Err(format!(
                "The image may not be greater than {} kilobytes.",
                self.max_bytes / 1024
            ));
        }

        let type_error = || format!("The image must be a file of type: {ALLOWED_TYPES}.");

        if let Some(ext) = image.extension() {
            let mime = mime_guess::from_ext(&ext).first_or_octet_stream();
            if !ALLOWED_MIME.contains(&mime.essence_str()) {
                return Err(type_error());
            }
        }

        ImageFormat::sniff(&image.data).ok_or_else(type_error)
    }

    /// Writes the image under a fresh random name and returns its relative path.
    pub async fn store(&self, image: &UploadedImage, format: ImageFormat) -> io::Result<String> {
        let ext = image
            .extension()
            .filter(|ext| format.extensions().contains(&ext.as_str()))
            .unwrap_or_else(|| format.extensions()[0].to_string());

        let relative = format!("{IMAGE_DIR}/{}.{ext}", random_string(NAME_LENGTH));
        let full = self.root.join(&relative);

        tokio::fs::create_dir_all(self.root.join(IMAGE_DIR)).await?;
        tokio::fs::write(&full, &image.data).await?;

        tracing::debug!(path = %relative, bytes = image.data.len(), "Stored image");
        Ok(relative)
    }

    /// Removes a stored file. A file that is already gone counts as `Ok(false)`.
    pub async fn delete(&self, relative: &str) -> io::Result<bool> {
        let Some(full) = self.resolve(relative) else {
            return Ok(false);
        };

        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Deletes a file on a best-effort basis, logging instead of failing.
    pub async fn discard(&self, relative: &str) {
        if let Err(err) = self.delete(relative).await {
            tracing::warn!(path = %relative, error = %err, "Failed to remove stored image");
        }
    }

    pub fn url(&self, relative: &str) -> String {
        format!("{}/storage/{relative}", self.public_url)
    }

    /// Joins a relative path onto the root, refusing anything that escapes it.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let path = Path::new(relative);
        let safe = !relative.is_empty()
            && path
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        safe.then(|| self.root.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn image(name: &str, data: &[u8]) -> UploadedImage {
        UploadedImage {
            file_name: Some(name.into()),
            data: Bytes::copy_from_slice(data),
        }
    }

    #[test]
    fn sniffs_supported_formats() {
        assert_eq!(ImageFormat::sniff(PNG), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::sniff(b"GIF89a...."), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageFormat::Webp));
        assert_eq!(ImageFormat::sniff(b"%PDF-1.7"), None);
    }

    #[test]
    fn rejects_oversized_and_wrong_types() {
        let store = ImageStore::new("unused", 1, "http://localhost");

        let mut big = PNG.to_vec();
        big.extend_from_slice(&[0u8; 1024]);
        assert!(store.validate(&image("a.png", &big)).unwrap_err().contains("1 kilobytes"));
        assert!(store.validate(&image("a.pdf", PNG)).unwrap_err().contains("type"));
        assert!(store.validate(&image("a.png", b"not an image")).is_err());
        assert_eq!(store.validate(&image("a.png", PNG)), Ok(ImageFormat::Png));
    }

    #[test]
    fn resolve_refuses_traversal() {
        let store = ImageStore::new("/srv/storage", 2048, "http://localhost");
        assert_eq!(
            store.resolve("clothing_images/a.png"),
            Some(PathBuf::from("/srv/storage/clothing_images/a.png"))
        );
        assert_eq!(store.resolve("../etc/passwd"), None);
        assert_eq!(store.resolve("/etc/passwd"), None);
        assert_eq!(store.resolve(""), None);
    }

    #[tokio::test]
    async fn store_keeps_extension_and_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), 2048, "http://localhost:8000");

        let path = store.store(&image("Shirt.PNG", PNG), ImageFormat::Png).await.unwrap();
        assert!(path.starts_with("clothing_images/"));
        assert!(path.ends_with(".png"));
        assert!(dir.path().join(&path).is_file());
        assert_eq!(store.url(&path), format!("http://localhost:8000/storage/{path}"));

        assert!(store.delete(&path).await.unwrap());
        assert!(!store.delete(&path).await.unwrap());
        assert!(!dir.path().join(&path).exists());
    }

    #[tokio::test]
    async fn mismatched_extension_uses_detected_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), 2048, "http://localhost:8000");

        let jpeg = image("photo.gif", &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]);
        let path = store.store(&jpeg, ImageFormat::Jpeg).await.unwrap();
        assert!(path.ends_with(".jpg"));
    }
}
