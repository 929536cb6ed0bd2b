use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait PdfToolsProvider: Send + Sync {
    /// Unreadable or unparsable files surface as I/O errors.
    async fn extract_text(&self, path: &Path) -> std::io::Result<String>;
}
