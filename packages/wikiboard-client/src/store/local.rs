/// Local filesystem document store.
///
/// Documents are files below a root directory, addressed by the same
/// relative paths the wiki API uses. A save goes to a sibling temp file that
/// is synced and then renamed over the document.
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use super::{validate_document_path, DocumentStore, StoreError};

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        validate_document_path(path)?;
        let decoded = percent_encoding::percent_decode_str(path).decode_utf8_lossy();
        Ok(decoded
            .split('/')
            .fold(self.root.clone(), |full, segment| full.join(segment)))
    }
}

impl DocumentStore for LocalStore {
    async fn fetch_source(&self, path: &str) -> Result<String, StoreError> {
        let full = self.resolve(path)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, path: &str, markdown: &str) -> Result<(), StoreError> {
        let full = self.resolve(path)?;
        if markdown.trim().is_empty() && holds_content(&full).await {
            return Err(StoreError::EmptyOverwrite(path.to_string()));
        }
        if let Some(dir) = full.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let staged = full.with_extension("wikiboard.tmp");
        if let Err(e) = replace_with(&staged, &full, markdown).await {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(e.into());
        }
        log::debug!(
            target: "wikiboard.store.local",
            "Saved {} ({} bytes)",
            path,
            markdown.len()
        );
        Ok(())
    }
}

async fn holds_content(path: &Path) -> bool {
    tokio::fs::read_to_string(path)
        .await
        .is_ok_and(|existing| !existing.trim().is_empty())
}

/// Write `staged`, sync it, rename it over `target`, then sync the directory
/// so the rename itself is durable.
async fn replace_with(staged: &Path, target: &Path, content: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(staged).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(staged, target).await?;
    if let Some(dir) = target.parent() {
        if let Ok(dir) = tokio::fs::File::open(dir).await {
            let _ = dir.sync_all().await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_save_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.save("Projects/Sprint.md", "## Todo\n").await.unwrap();
        assert_eq!(
            store.fetch_source("Projects/Sprint.md").await.unwrap(),
            "## Todo\n"
        );
        assert!(!dir.path().join("Projects/Sprint.wikiboard.tmp").exists());
    }

    #[tokio::test]
    async fn test_percent_encoded_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Sprint 12.md"), "x\n").unwrap();
        let store = LocalStore::new(dir.path());
        assert_eq!(store.fetch_source("Sprint%2012.md").await.unwrap(), "x\n");
    }

    #[tokio::test]
    async fn test_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(matches!(
            store.fetch_source("nope.md").await,
            Err(StoreError::NotFound(path)) if path == "nope.md"
        ));
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("root"));
        assert!(matches!(
            store.save("../escape.md", "x").await,
            Err(StoreError::InvalidPath(_))
        ));
        assert!(!dir.path().join("escape.md").exists());
    }

    #[tokio::test]
    async fn test_refuses_to_empty_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.save("a.md", "- [ ] keep me\n").await.unwrap();
        assert!(matches!(
            store.save("a.md", "  \n").await,
            Err(StoreError::EmptyOverwrite(_))
        ));
        assert_eq!(store.fetch_source("a.md").await.unwrap(), "- [ ] keep me\n");
    }

    #[tokio::test]
    async fn test_failed_replace_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("board.md").join("keep")).unwrap();
        let store = LocalStore::new(dir.path());
        assert!(matches!(
            store.save("board.md", "## Todo\n").await,
            Err(StoreError::Io(_))
        ));
        assert!(!dir.path().join("board.wikiboard.tmp").exists());
        assert!(dir.path().join("board.md").join("keep").is_dir());
    }
}
