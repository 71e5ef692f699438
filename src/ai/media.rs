//! Loading uploaded photos and writing generated media

use std::path::Path;
use tracing::debug;

use super::types::InlineImage;

/// Largest photo accepted for upload
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Detect image MIME type from magic bytes
pub fn detect_image_mime(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.len() >= 12 && &data[4..8] == b"ftyp" && (&data[8..12] == b"heic" || &data[8..12] == b"heix") {
        Some("image/heic")
    } else {
        None
    }
}

/// Read a photo from disk as an inline image
pub async fn load_image(path: &Path) -> Result<InlineImage, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    if bytes.is_empty() {
        return Err(format!("{} is empty", path.display()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(format!(
            "{} is too large ({} bytes, max {})",
            path.display(),
            bytes.len(),
            MAX_UPLOAD_BYTES
        ));
    }

    let mime = match detect_image_mime(&bytes) {
        Some(mime) => mime.to_string(),
        None => {
            let guess = mime_guess::from_path(path).first_or_octet_stream();
            if guess.type_() != mime_guess::mime::IMAGE {
                return Err(format!("{} is not an image", path.display()));
            }
            guess.essence_str().to_string()
        }
    };

    debug!(path = %path.display(), mime = %mime, size = bytes.len(), "Loaded photo");
    Ok(InlineImage::from_bytes(&bytes, mime))
}

/// File extension for a generated media MIME type
pub fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => "bin",
    }
}

pub async fn write_output(path: &Path, bytes: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn test_detect_image_mime() {
        assert_eq!(detect_image_mime(PNG_HEADER), Some("image/png"));
        assert_eq!(detect_image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(detect_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(detect_image_mime(b"hello world"), None);
    }

    #[tokio::test]
    async fn test_load_image_detects_by_content() {
        let dir = tempdir().unwrap();
        // Wrong extension, right bytes
        let path = dir.path().join("selfie.jpg");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let image = load_image(&path).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_load_image_rejects_non_images() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"just text").unwrap();
        assert!(load_image(&path).await.is_err());

        let empty = dir.path().join("empty.png");
        std::fs::write(&empty, b"").unwrap();
        assert!(load_image(&empty).await.is_err());
    }

    #[tokio::test]
    async fn test_write_output_creates_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("vampire.png");
        write_output(&path, &[1, 2, 3]).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        assert_eq!(extension_for("video/mp4"), "mp4");
    }
}
