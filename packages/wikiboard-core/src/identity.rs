/// Task identity comments.
///
/// A task line carries its stable identity as a trailing HTML comment:
/// `- [ ] Buy milk <!-- task-id: task_1718000000000_k3j9x0a2b -->`.
/// Parsing tolerates whitespace around the comment braces and the colon;
/// writing always uses the canonical `<!-- task-id: X -->` form.
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

static TASK_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*<!--\s*task-id\s*:\s*(\S+?)\s*-->\s*$").unwrap());

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const RANDOM_SUFFIX_LEN: usize = 9;

/// Extract the task ID from the trailing comment of a task's content.
pub fn extract_task_id(content: &str) -> Option<String> {
    TASK_ID_RE
        .captures(content)
        .map(|caps| caps[1].to_string())
}

/// Remove the trailing task-id comment (and the whitespace before it).
pub fn strip_task_id(content: &str) -> String {
    TASK_ID_RE.replace(content, "").trim_end().to_string()
}

/// Append the canonical comment, replacing any existing one.
pub fn inject_task_id(content: &str, id: &str) -> String {
    let cleaned = strip_task_id(content);
    if cleaned.is_empty() {
        format_task_id_comment(id)
    } else {
        format!("{} {}", cleaned, format_task_id_comment(id))
    }
}

pub fn format_task_id_comment(id: &str) -> String {
    format!("<!-- task-id: {} -->", id)
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new task ID: `task_<unix millis>_<9 base36 chars>`.
///
/// The suffix is derived from a SHA-256 over a process-wide counter and the
/// nanosecond clock, so IDs minted in the same millisecond still differ.
pub fn generate_task_id() -> String {
    use sha2::{Digest, Sha256};
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let now = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(seq.to_le_bytes());
    hasher.update(now.as_nanos().to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    let hash = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[..8]);
    let mut value = u64::from_le_bytes(bytes);
    let mut suffix = String::with_capacity(RANDOM_SUFFIX_LEN);
    for _ in 0..RANDOM_SUFFIX_LEN {
        suffix.push(BASE36[(value % 36) as usize] as char);
        value /= 36;
    }

    format!("task_{}_{}", now.as_millis(), suffix)
}
