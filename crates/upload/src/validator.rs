//! Client-side checks applied before any network call.

use photochain_api::CandidateFile;

use crate::error::ValidationError;

/// MIME types accepted for upload.
pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

/// Largest accepted file, in bytes (5 MiB).
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Accepts a file when its MIME type is allowed and it fits the size limit.
#[derive(Debug, Clone)]
pub struct FileValidator {
    allowed: Vec<String>,
    max_size: u64,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(ALLOWED_MIME_TYPES.iter().map(|s| s.to_string()), MAX_FILE_SIZE)
    }
}

impl FileValidator {
    pub fn new(allowed: impl IntoIterator<Item = String>, max_size: u64) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            max_size,
        }
    }

    /// Same MIME types as the default, with a different size limit.
    pub fn with_max_size(max_size: u64) -> Self {
        Self {
            max_size,
            ..Self::default()
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn validate(&self, file: &CandidateFile) -> bool {
        self.check(file).is_ok()
    }

    /// Like [`validate`](Self::validate), reporting which rule failed.
    pub fn check(&self, file: &CandidateFile) -> Result<(), ValidationError> {
        let mime = file.mime_type.trim();
        if !self.allowed.iter().any(|a| a.eq_ignore_ascii_case(mime)) {
            return Err(ValidationError::UnsupportedType(file.mime_type.clone()));
        }
        let size = file.size_bytes();
        if size > self.max_size {
            return Err(ValidationError::TooLarge {
                size,
                limit: self.max_size,
            });
        }
        Ok(())
    }
}
