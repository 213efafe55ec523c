//! Durable JSON persistence for the paper portfolio.
//!
//! Writes are atomic (temp file + rename) and pretty-printed. A failed
//! write is the caller's to log and swallow — in-memory state stays
//! authoritative for the process. An unreadable file at startup means a
//! fresh portfolio.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::models::paper::PaperState;

pub fn save(path: &Path, state: &PaperState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating state dir {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(state).context("serializing paper state")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

pub fn load(path: &Path) -> Option<PaperState> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("unreadable paper state at {}: {e} — starting fresh", path.display());
            None
        }
    }
}
