use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;

use crate::error::CoreError;

/// Replace `path` with `data` so readers never observe a partial file.
///
/// Writes to a temp file in the same directory, then renames it over the
/// target.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), CoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Move `path` aside as `<name>.<timestamp>.bak`. Returns the new path, or
/// `None` if there was nothing to archive.
pub fn archive(path: &Path) -> Result<Option<PathBuf>, CoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
    let target = path.with_file_name(format!("{name}.{stamp}.bak"));
    fs::rename(path, &target)?;
    Ok(Some(target))
}
