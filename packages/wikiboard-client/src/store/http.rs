/// Document store backed by the wiki's HTTP API.
///
///   GET  {base}/api/source/{path}  -> raw markdown
///   POST {base}/api/save/{path}    body = raw markdown, Content-Type: text/markdown
///
/// Any non-2xx answer is a failure. No retry, no timeout.
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use super::{validate_document_path, DocumentStore, StoreError};

const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, endpoint: &str, path: &str) -> Result<String, StoreError> {
        validate_document_path(path)?;
        let decoded = percent_decode_str(path).decode_utf8_lossy();
        let encoded: Vec<String> = decoded
            .split('/')
            .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
            .collect();
        Ok(format!(
            "{}/api/{}/{}",
            self.base_url,
            endpoint,
            encoded.join("/")
        ))
    }

    fn check_status(status: StatusCode, path: &str) -> Result<(), StoreError> {
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::NOT_FOUND {
            Err(StoreError::NotFound(path.to_string()))
        } else {
            Err(StoreError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            })
        }
    }
}

impl DocumentStore for HttpStore {
    async fn fetch_source(&self, path: &str) -> Result<String, StoreError> {
        let url = self.url("source", path)?;
        let resp = self.client.get(&url).send().await?;
        Self::check_status(resp.status(), path)?;
        let text = resp.text().await?;
        log::debug!(
            target: "wikiboard.store.http",
            "Fetched {} ({} bytes)",
            url,
            text.len()
        );
        Ok(text)
    }

    async fn save(&self, path: &str, markdown: &str) -> Result<(), StoreError> {
        let url = self.url("save", path)?;
        let resp = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "text/markdown")
            .body(markdown.to_string())
            .send()
            .await?;
        Self::check_status(resp.status(), path)?;
        log::debug!(
            target: "wikiboard.store.http",
            "Saved {} ({} bytes)",
            url,
            markdown.len()
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use axum::extract::{Path, State};
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Documents held by a throwaway wiki server.
    #[derive(Clone, Default)]
    pub struct Docs {
        pub files: Arc<Mutex<HashMap<String, String>>>,
        /// When set, every save answers with this status.
        pub fail_saves: Arc<Mutex<Option<StatusCode>>>,
        pub saves: Arc<Mutex<usize>>,
    }

    impl Docs {
        pub fn with(path: &str, markdown: &str) -> Self {
            let docs = Docs::default();
            docs.files
                .lock()
                .unwrap()
                .insert(path.to_string(), markdown.to_string());
            docs
        }

        pub fn get(&self, path: &str) -> Option<String> {
            self.files.lock().unwrap().get(path).cloned()
        }

        pub fn set(&self, path: &str, markdown: &str) {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), markdown.to_string());
        }
    }

    async fn source(State(docs): State<Docs>, Path(path): Path<String>) -> Result<String, StatusCode> {
        docs.get(&path).ok_or(StatusCode::NOT_FOUND)
    }

    async fn save(
        State(docs): State<Docs>,
        Path(path): Path<String>,
        headers: HeaderMap,
        body: String,
    ) -> StatusCode {
        if let Some(status) = *docs.fail_saves.lock().unwrap() {
            return status;
        }
        if headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) != Some("text/markdown") {
            return StatusCode::UNSUPPORTED_MEDIA_TYPE;
        }
        docs.set(&path, &body);
        *docs.saves.lock().unwrap() += 1;
        StatusCode::OK
    }

    /// Serve `docs` on an ephemeral port and return the base URL.
    pub async fn spawn(docs: Docs) -> String {
        let app = Router::new()
            .route("/api/source/{*path}", get(source))
            .route("/api/save/{*path}", post(save))
            .with_state(docs);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::test_server::{spawn, Docs};
    use super::*;

    #[test]
    fn test_url_encodes_segments() {
        let store = HttpStore::new("http://wiki.local/");
        assert_eq!(
            store.url("source", "Projects/Sprint 12#b.md").unwrap(),
            "http://wiki.local/api/source/Projects/Sprint%2012%23b.md"
        );
        assert_eq!(
            store.url("save", "Sprint%2012.md").unwrap(),
            "http://wiki.local/api/save/Sprint%2012.md"
        );
        assert!(store.url("source", "../x.md").is_err());
    }

    #[tokio::test]
    async fn test_fetch_and_save() {
        let docs = Docs::with("Projects/Sprint 12.md", "## Todo\n");
        let store = HttpStore::new(&spawn(docs.clone()).await);

        assert_eq!(
            store.fetch_source("Projects/Sprint 12.md").await.unwrap(),
            "## Todo\n"
        );
        store
            .save("Projects/Sprint 12.md", "## Todo\n- [ ] new\n")
            .await
            .unwrap();
        assert_eq!(
            docs.get("Projects/Sprint 12.md").as_deref(),
            Some("## Todo\n- [ ] new\n")
        );
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let store = HttpStore::new(&spawn(Docs::default()).await);
        assert!(matches!(
            store.fetch_source("nope.md").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_save_reports_status() {
        let docs = Docs::with("a.md", "x\n");
        *docs.fail_saves.lock().unwrap() = Some(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let store = HttpStore::new(&spawn(docs.clone()).await);
        assert!(matches!(
            store.save("a.md", "y\n").await,
            Err(StoreError::Status { status: 500, .. })
        ));
        assert_eq!(docs.get("a.md").as_deref(), Some("x\n"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let store = HttpStore::new(&format!("http://{}", addr));
        assert!(matches!(
            store.fetch_source("a.md").await,
            Err(StoreError::Network(_))
        ));
    }
}
