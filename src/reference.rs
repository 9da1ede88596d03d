use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;
use tracing::info;

use crate::error::MarkError;

/// The single authoritative answer document all submissions are graded
/// against.
#[derive(Debug, Clone)]
pub struct ReferenceKey {
    /// Stable pointer string embedded in every grading request (the source
    /// URL or file path).
    pub pointer: String,
    /// MIME type of the answer document.
    pub mime_type: String,
    /// Resolved document bytes, attached to every request.
    pub bytes: Vec<u8>,
}

/// Where the answer key comes from. Deployment-configured, never
/// per-submission.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Fetchable address.
    Remote(String),
    /// Local file.
    Local(PathBuf),
}

impl KeySource {
    /// Interpret an operator-supplied string as a URL or a file path.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            KeySource::Remote(raw.to_string())
        } else {
            KeySource::Local(PathBuf::from(raw))
        }
    }
}

/// Lazily resolves the answer key and memoizes it for the process lifetime.
///
/// Every submission reuses the same resolved key; a failure here is a
/// deployment misconfiguration and is surfaced as a fatal config error
/// rather than retried.
pub struct KeyResolver {
    source: KeySource,
    cell: OnceCell<ReferenceKey>,
}

impl KeyResolver {
    pub fn new(source: KeySource) -> Self {
        Self {
            source,
            cell: OnceCell::new(),
        }
    }

    /// Resolve the key on first use; subsequent calls return the cached key.
    pub async fn resolve(&self) -> Result<&ReferenceKey, MarkError> {
        self.cell
            .get_or_try_init(|| async { resolve_source(&self.source).await })
            .await
    }
}

async fn resolve_source(source: &KeySource) -> Result<ReferenceKey, MarkError> {
    match source {
        KeySource::Remote(url) => {
            info!("Resolving answer key from {}", url);
            let response = reqwest::get(url).await.map_err(|e| {
                MarkError::Config(format!("failed to fetch answer key {}: {}", url, e))
            })?;
            if !response.status().is_success() {
                return Err(MarkError::Config(format!(
                    "answer key fetch {} returned {}",
                    url,
                    response.status()
                )));
            }
            let bytes = response.bytes().await.map_err(|e| {
                MarkError::Config(format!("failed to read answer key body: {}", e))
            })?;
            Ok(ReferenceKey {
                pointer: url.clone(),
                mime_type: guess_mime(url),
                bytes: bytes.to_vec(),
            })
        }
        KeySource::Local(path) => {
            info!("Resolving answer key from {:?}", path);
            let bytes = std::fs::read(path).map_err(|e| {
                MarkError::Config(format!("failed to read answer key {:?}: {}", path, e))
            })?;
            Ok(ReferenceKey {
                pointer: path.display().to_string(),
                mime_type: guess_mime(&path.display().to_string()),
                bytes,
            })
        }
    }
}

/// Guess the answer document's MIME type from its extension.
fn guess_mime(pointer: &str) -> String {
    let ext = Path::new(pointer)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png".to_string(),
        Some("jpg") | Some("jpeg") => "image/jpeg".to_string(),
        _ => "application/pdf".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_key_source_parse() {
        assert!(matches!(
            KeySource::parse("https://example.com/memo.pdf"),
            KeySource::Remote(_)
        ));
        assert!(matches!(
            KeySource::parse("keys/memo.pdf"),
            KeySource::Local(_)
        ));
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime("memo.PNG"), "image/png");
        assert_eq!(guess_mime("memo.jpg"), "image/jpeg");
        assert_eq!(guess_mime("memo.pdf"), "application/pdf");
    }

    #[tokio::test]
    async fn test_resolve_local_is_memoized() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"answer key bytes").unwrap();

        let resolver = KeyResolver::new(KeySource::Local(file.path().to_path_buf()));
        let first = resolver.resolve().await.unwrap();
        assert_eq!(first.bytes, b"answer key bytes");

        // Delete the backing file; the memoized key must still be served.
        let path = file.path().to_path_buf();
        file.close().unwrap();
        assert!(!path.exists());

        let second = resolver.resolve().await.unwrap();
        assert_eq!(second.bytes, b"answer key bytes");
    }

    #[tokio::test]
    async fn test_resolve_missing_file_is_config_error() {
        let resolver = KeyResolver::new(KeySource::Local(PathBuf::from("/no/such/key.pdf")));
        let result = resolver.resolve().await;
        assert!(matches!(result, Err(MarkError::Config(_))));
    }
}
