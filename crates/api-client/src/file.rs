//! Locally selected file handed to the upload endpoints.

use std::path::Path;

/// MIME type used when the extension is not recognized.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A file picked by the user, held in memory until the pipeline finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// File name sent in the multipart part (no directories).
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Reads a file from disk, inferring its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".into());
        let mime_type = detect_content_type(&name).unwrap_or(FALLBACK_CONTENT_TYPE);
        Ok(Self::new(name, mime_type, data))
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Detects MIME content type from a file name extension.
pub fn detect_content_type(name: &str) -> Option<&'static str> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("png") => Some("image/png"),
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("gif") => Some("image/gif"),
        Some("webp") => Some("image/webp"),
        Some("ico") => Some("image/x-icon"),
        _ => None,
    }
}
