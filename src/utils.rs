//! Small text and file system helpers shared by the scrapers and outputs.
//!
//! - Whitespace collapsing and char-safe truncation for scraped text
//! - Title normalization used as the dedupe key
//! - Log-friendly truncation
//! - Output directory validation

use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Marker appended to text cut by [`truncate_chars`].
pub const TRUNCATION_MARKER: &str = "...";

/// Collapse all runs of whitespace into single spaces and trim the ends.
///
/// ```ignore
/// assert_eq!(collapse_whitespace("  Phone \n X  "), "Phone X");
/// ```
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `s` to at most `max` characters, appending [`TRUNCATION_MARKER`] if
/// anything was removed.
///
/// Counts `char`s rather than bytes so CJK text is never split mid-character.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}{}", &s[..byte_idx], TRUNCATION_MARKER),
        None => s.to_string(),
    }
}

/// Dedupe key for headlines: case-folded with whitespace trimmed and collapsed.
pub fn normalize_title(title: &str) -> String {
    collapse_whitespace(title).to_lowercase()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}…(+{} bytes)", &s[..byte_idx], s.len() - byte_idx),
        None => s.to_string(),
    }
}

/// Ensure the directory that will hold `file` exists and is writable.
///
/// Creates the directory if needed, then writes and removes a scratch file.
#[instrument(level = "info", skip_all, fields(file = %file.display()))]
pub async fn ensure_parent_writable(file: &Path) -> std::io::Result<()> {
    let dir = match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).await?;

    let scratch = dir.join("..__write_check__");
    fs::write(&scratch, b"").await?;
    let _ = fs::remove_file(&scratch).await;
    info!(dir = %dir.display(), "Data directory is writable");
    Ok(())
}
