//! Session export files on disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};
use vozmetria_core::SessionExport;

const EXPORT_PREFIX: &str = "sesion_voz_";

/// Write `export` as pretty JSON into `dir` and return the file path.
pub fn write_export(dir: &Path, export: &SessionExport) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(export.file_name());
    let json = export.to_json_pretty().context("serialising session export")?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), session_id = %export.session.id, "session exported");
    Ok(path)
}

pub fn read_export(path: &Path) -> Result<SessionExport> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    SessionExport::from_json(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Export files in `dir`, sorted by name. A missing directory is empty.
pub fn list_exports(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("listing {}", dir.display())),
    };

    let mut out = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };
        let path = entry.path();
        let is_export = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(EXPORT_PREFIX) && n.ends_with(".json"));
        if is_export && path.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}
