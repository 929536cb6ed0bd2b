use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::shared::DomainError;

/// Largest attachment a plugin may hand over, in bytes (50 MiB).
pub const MAX_FILE_SIZE: u64 = 52_428_800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    Image,
    Invoice,
    Receipt,
    Contract,
    Notice,
    Other,
}

/// A document attached to a transaction, item or loyalty card.
///
/// `path` points to a temporary local file owned by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub file_type: FileType,
    pub label: Option<String>,
    pub content_type: String,
    pub path: PathBuf,
}

impl FileAttachment {
    /// Builds an attachment for an existing local file, rejecting anything
    /// above [`MAX_FILE_SIZE`].
    pub fn from_path(path: impl AsRef<Path>, file_type: FileType) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)
            .map_err(|e| DomainError::Io(format!("{}: {}", path.display(), e)))?
            .len();

        if size > MAX_FILE_SIZE {
            return Err(DomainError::FileTooLarge {
                path: path.display().to_string(),
                size,
                max: MAX_FILE_SIZE,
            });
        }

        Ok(Self {
            file_type,
            label: None,
            content_type: content_type_for(path).to_string(),
            path: path.to_path_buf(),
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Overrides the type inferred from the extension.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// MIME type guessed from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}
