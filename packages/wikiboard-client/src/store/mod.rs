pub mod http;
pub mod local;

use std::future::Future;

pub use http::HttpStore;
pub use local::LocalStore;

/// Where the markdown of a document lives.
/// Implementations: HttpStore (the wiki's source/save API), LocalStore (a directory).
pub trait DocumentStore: Send + Sync {
    /// Fetch the current raw markdown of a document.
    fn fetch_source(&self, path: &str) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Replace the raw markdown of a document.
    fn save(
        &self,
        path: &str,
        markdown: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server answered {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Refusing to overwrite non-empty document {0} with empty content")]
    EmptyOverwrite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check a document path: relative, `/`-separated, no empty, `.` or `..`
/// segments and no backslashes. Percent-encoded input is decoded first.
pub fn validate_document_path(path: &str) -> Result<(), StoreError> {
    let decoded = percent_encoding::percent_decode_str(path).decode_utf8_lossy();
    let bad = decoded.is_empty()
        || decoded.starts_with('/')
        || decoded.contains('\\')
        || decoded
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if bad {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Store chosen at runtime from the configuration.
pub enum AnyStore {
    Http(HttpStore),
    Local(LocalStore),
}

impl DocumentStore for AnyStore {
    async fn fetch_source(&self, path: &str) -> Result<String, StoreError> {
        match self {
            AnyStore::Http(store) => store.fetch_source(path).await,
            AnyStore::Local(store) => store.fetch_source(path).await,
        }
    }

    async fn save(&self, path: &str, markdown: &str) -> Result<(), StoreError> {
        match self {
            AnyStore::Http(store) => store.save(path, markdown).await,
            AnyStore::Local(store) => store.save(path, markdown).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        for path in ["Sprint.md", "Projects/Sprint 12.md", "a/b/c.md", "%C3%BCber.md"] {
            assert!(validate_document_path(path).is_ok(), "{}", path);
        }
    }

    #[test]
    fn test_traversal_is_rejected() {
        for path in [
            "",
            "/etc/passwd",
            "../secret.md",
            "a/../../b.md",
            "a//b.md",
            "./a.md",
            "a\\b.md",
            "%2E%2E/secret.md",
        ] {
            assert!(
                matches!(validate_document_path(path), Err(StoreError::InvalidPath(_))),
                "{}",
                path
            );
        }
    }
}
