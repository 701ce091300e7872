/// Client logger: `env_logger` filtering and formatting to stderr, plus a
/// bounded in-memory ring of recent entries and an append-only log file
/// under `<config dir>/wikiboard/logs/client.log`.
use env_logger::{Logger, Target};
use log::{Log, Metadata, Record, SetLoggerError};
use serde::Serialize;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

const MAX_LOG_ENTRIES: usize = 2000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp_ms: i64,
    pub level: String,
    pub target: String,
    pub message: String,
}

static RECENT: LazyLock<Mutex<VecDeque<LogEntry>>> =
    LazyLock::new(|| Mutex::new(VecDeque::with_capacity(MAX_LOG_ENTRIES)));

fn remember(entry: LogEntry) {
    if let Ok(mut entries) = RECENT.lock() {
        entries.push_back(entry);
        while entries.len() > MAX_LOG_ENTRIES {
            entries.pop_front();
        }
    }
}

struct LogFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogFile {
    fn new() -> Self {
        let path = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wikiboard")
            .join("logs")
            .join("client.log");
        Self {
            path,
            file: Mutex::new(None),
        }
    }

    fn open(path: &Path) -> io::Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    }

    /// The file is opened lazily on the first entry so runs that log nothing
    /// never touch the config directory.
    fn append(&self, entry: &LogEntry) {
        let Ok(mut guard) = self.file.lock() else {
            return;
        };
        if guard.is_none() {
            match Self::open(&self.path) {
                Ok(file) => *guard = Some(file),
                Err(_) => return,
            }
        }
        if let Some(file) = guard.as_mut() {
            let _ = writeln!(file, "{}", format_line(entry));
            let _ = file.flush();
        }
    }
}

static LOG_FILE: LazyLock<LogFile> = LazyLock::new(LogFile::new);

fn format_line(entry: &LogEntry) -> String {
    let time = chrono::DateTime::from_timestamp_millis(entry.timestamp_ms)
        .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(|| entry.timestamp_ms.to_string());
    format!(
        "{} [{}] [{}] {}",
        time,
        entry.level.to_uppercase(),
        entry.target,
        entry.message.replace('\n', "\\n")
    )
}

struct BridgeLogger {
    inner: Logger,
}

impl Log for BridgeLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.inner.log(record);

        let entry = LogEntry {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            level: record.level().to_string().to_lowercase(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        };
        LOG_FILE.append(&entry);
        remember(entry);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Install the logger. The filter comes from `RUST_LOG` and defaults to
/// `warn`; `verbose` raises the default to `debug`.
pub fn init(verbose: bool) -> Result<(), SetLoggerError> {
    let default_filter = if verbose { "debug" } else { "warn" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    builder.target(Target::Stderr);
    let inner = builder.build();
    let max_level = inner.filter();
    let logger = Box::leak(Box::new(BridgeLogger { inner }));
    log::set_logger(logger)?;
    log::set_max_level(max_level);
    Ok(())
}

/// Recent entries, oldest first.
pub fn recent_entries() -> Vec<LogEntry> {
    RECENT
        .lock()
        .map(|entries| entries.iter().cloned().collect())
        .unwrap_or_default()
}

/// Recent entries at warning level or above.
pub fn recent_problems() -> Vec<LogEntry> {
    recent_entries()
        .into_iter()
        .filter(|e| e.level == "warn" || e.level == "error")
        .collect()
}

pub fn log_file_path() -> PathBuf {
    LOG_FILE.path.clone()
}

/// Record a line when the logger itself could not be installed.
pub fn write_fallback_line(message: &str) {
    let entry = LogEntry {
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
        level: "error".to_string(),
        target: "wikiboard.log_bridge".to_string(),
        message: message.to_string(),
    };
    LOG_FILE.append(&entry);
    remember(entry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_is_bounded() {
        for i in 0..MAX_LOG_ENTRIES + 10 {
            remember(LogEntry {
                timestamp_ms: i as i64,
                level: "info".to_string(),
                target: "test".to_string(),
                message: format!("entry {}", i),
            });
        }
        let entries = recent_entries();
        assert_eq!(entries.len(), MAX_LOG_ENTRIES);
        assert!(entries.iter().all(|e| e.message != "entry 0"));
    }

    #[test]
    fn test_format_line_escapes_newlines() {
        let line = format_line(&LogEntry {
            timestamp_ms: 0,
            level: "warn".to_string(),
            target: "wikiboard.sync".to_string(),
            message: "two\nlines".to_string(),
        });
        assert_eq!(
            line,
            "1970-01-01T00:00:00.000Z [WARN] [wikiboard.sync] two\\nlines"
        );
    }
}
