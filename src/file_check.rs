//! Checks applied to uploaded invoice files before extraction.
//!
//! These mirror what a real intake service would enforce: a file type
//! allowlist, a size cap, and content-type classification. Classification
//! prefers magic-byte sniffing over the file extension, since scans are
//! frequently misnamed.

use schemars::JsonSchema;

use crate::prelude::*;

/// File extensions we accept for extraction.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "pdf", "tiff"];

/// Default size cap for uploaded files, in megabytes.
pub const DEFAULT_MAX_SIZE_MB: u64 = 10;

/// A coarse classification of an uploaded file.
#[derive(Clone, Copy, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// A raster image (photo or scan).
    Image,
    /// A PDF document.
    Pdf,
    /// Anything else.
    Other,
}

/// Check that a file is acceptable for extraction. Returns an error describing
/// the first problem found; callers report it as a per-record failure.
pub async fn check_file(path: &Path, max_size_mb: u64) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        anyhow::bail!(
            "File type not supported. Please upload: {}",
            ACCEPTED_EXTENSIONS
                .iter()
                .map(|ext| format!(".{ext}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to read metadata for {:?}", path))?;
    let max_size_bytes = max_size_mb * 1024 * 1024;
    if metadata.len() > max_size_bytes {
        anyhow::bail!("File too large. Maximum size is {max_size_mb}MB");
    }

    Ok(())
}

/// Classify a file from its leading bytes, falling back to the extension when
/// the content is unrecognized.
pub fn file_kind(path: &Path, bytes: &[u8]) -> FileKind {
    let mime = match infer::get(bytes) {
        Some(kind) => kind.mime_type().to_owned(),
        None => mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_owned(),
    };
    if mime.starts_with("image/") {
        FileKind::Image
    } else if mime == "application/pdf" {
        FileKind::Pdf
    } else {
        FileKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal PNG header, enough for magic-byte sniffing.
    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[tokio::test]
    async fn test_rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        tokio::fs::write(&path, b"hello").await.unwrap();
        let err = check_file(&path, DEFAULT_MAX_SIZE_MB).await.unwrap_err();
        assert!(err.to_string().contains("File type not supported"));
    }

    #[tokio::test]
    async fn test_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        tokio::fs::write(&path, vec![0u8; 2 * 1024 * 1024]).await.unwrap();
        let err = check_file(&path, 1).await.unwrap_err();
        assert!(err.to_string().contains("File too large"));
    }

    #[tokio::test]
    async fn test_accepts_reasonable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.jpeg");
        tokio::fs::write(&path, b"fake scan").await.unwrap();
        check_file(&path, DEFAULT_MAX_SIZE_MB).await.unwrap();
    }

    #[test]
    fn test_file_kind_prefers_magic_bytes() {
        // Content wins over a misleading extension.
        assert_eq!(file_kind(Path::new("scan.pdf"), PNG_MAGIC), FileKind::Image);
        assert_eq!(
            file_kind(Path::new("scan.png"), b"%PDF-1.4 fake"),
            FileKind::Pdf
        );
    }

    #[test]
    fn test_file_kind_falls_back_to_extension() {
        assert_eq!(file_kind(Path::new("scan.png"), b"????"), FileKind::Image);
        assert_eq!(file_kind(Path::new("scan.xyz"), b"????"), FileKind::Other);
    }
}
