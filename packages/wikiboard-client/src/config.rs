/// Client configuration.
/// Reads client.json from ~/.config/wikiboard/client.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the wiki serving `/api/source` and `/api/save`.
    #[serde(default = "default_server")]
    pub server: String,
    /// When set, documents are read from and written to this directory
    /// instead of the server.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub documents: Vec<DocumentEntry>,
}

/// A named shortcut for a document path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub name: String,
    pub path: String,
}

fn default_server() -> String {
    "http://127.0.0.1:8080".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            root: None,
            documents: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Resolve a document argument: a configured name maps to its path,
    /// anything else is taken as a path.
    pub fn resolve_document<'a>(&'a self, name_or_path: &'a str) -> &'a str {
        self.documents
            .iter()
            .find(|d| d.name == name_or_path)
            .map_or(name_or_path, |d| d.path.as_str())
    }
}

/// Default config path: ~/.config/wikiboard/client.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wikiboard")
        .join("client.json")
}

/// Load config from path. Returns default if the file doesn't exist or
/// cannot be parsed.
pub fn load_config(path: &Path) -> ClientConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                target: "wikiboard.config",
                "Failed to parse config {}: {}",
                path.display(),
                e
            );
            ClientConfig::default()
        }),
        Err(_) => {
            log::info!(
                target: "wikiboard.config",
                "No config at {}, using defaults",
                path.display()
            );
            ClientConfig::default()
        }
    }
}
