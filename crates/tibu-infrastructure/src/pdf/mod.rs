use async_trait::async_trait;
use std::io;
use std::path::Path;
use tracing::debug;

use tibu_domain::capability::PdfToolsProvider;

/// Text extraction with `pdf-extract`, run off the async runtime.
#[derive(Debug, Default, Clone)]
pub struct PdfExtractTools;

impl PdfExtractTools {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PdfToolsProvider for PdfExtractTools {
    async fn extract_text(&self, path: &Path) -> io::Result<String> {
        let path = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || {
            let bytes = std::fs::read(&path)?;
            pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))??;

        debug!(chars = text.chars().count(), "PDF text extracted");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file() {
        let err = PdfExtractTools::new()
            .extract_text(Path::new("/nonexistent/statement.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"plain text, no pdf header").unwrap();

        let err = PdfExtractTools::new().extract_text(&path).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
