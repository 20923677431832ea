//! Persisting the last published snapshot.
//!
//! The file holds exactly one [`AggregateSnapshot`] in the handoff format.
//! It is rewritten after every successful publish and read once at start-up
//! so a restart serves the previous data until the first pass completes.
//!
//! Writes go to a sibling temp file that is then renamed over the target, so
//! a reader never sees a half-written file.

use crate::models::AggregateSnapshot;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Write `snapshot` as pretty JSON to `path`.
///
/// Creates the parent directory if needed.
///
/// # Arguments
///
/// * `snapshot` - The published snapshot
/// * `path` - Target file, replaced atomically
///
/// # Returns
///
/// `Ok(())` on success, or the I/O error from creating, writing or renaming.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_snapshot(snapshot: &AggregateSnapshot, path: &Path) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(snapshot)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &json).await?;
    fs::rename(&tmp, path).await?;

    info!(bytes = json.len(), total_items = snapshot.total_items, "Wrote snapshot file");
    Ok(())
}

/// Read a previously written snapshot.
///
/// A missing file is normal on first start and yields `None`; an unreadable or
/// malformed file is logged and also yields `None`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_snapshot(path: &Path) -> Option<AggregateSnapshot> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No snapshot file yet");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Failed to read snapshot file");
            return None;
        }
    };

    match serde_json::from_slice::<AggregateSnapshot>(&bytes) {
        Ok(snapshot) => {
            info!(total_items = snapshot.total_items, "Loaded snapshot file");
            Some(snapshot)
        }
        Err(e) => {
            warn!(error = %e, "Snapshot file is not valid; ignoring it");
            None
        }
    }
}
