//! Symbol store writer.
//!
//! A symbol store is the directory tree a debugger walks to find symbols:
//! `<root>/<file name>/<fingerprint>/<file name>`. The exact shape matters,
//! symbol server clients build these paths themselves.

use anyhow::{Context, Result};
use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};

use crate::fingerprint::Fingerprint;
use crate::utils::{ensure_dir, file_name};

/// Where `symbol_path` lives inside the store rooted at `store_root`.
pub fn symbol_store_path(
    store_root: &Path,
    symbol_path: &Path,
    fingerprint: &Fingerprint,
) -> Result<PathBuf> {
    let name = file_name(symbol_path)?;
    Ok(store_root.join(name).join(fingerprint).join(name))
}

/// Copies `symbol_path` into the store and returns the copy's path.
///
/// Contents, permissions and modification time are carried over. An existing
/// copy is overwritten.
pub fn copy_symbol(
    store_root: &Path,
    symbol_path: &Path,
    fingerprint: &Fingerprint,
) -> Result<PathBuf> {
    let dest = symbol_store_path(store_root, symbol_path, fingerprint)?;
    if let Some(dir) = dest.parent() {
        ensure_dir(dir)?;
    }
    fs::copy(symbol_path, &dest).with_context(|| {
        format!("failed to copy {} to {}", symbol_path.display(), dest.display())
    })?;

    let modified = fs::metadata(symbol_path)
        .and_then(|metadata| metadata.modified())
        .with_context(|| format!("failed to read times of {}", symbol_path.display()))?;
    File::options()
        .write(true)
        .open(&dest)
        .and_then(|file| file.set_times(FileTimes::new().set_modified(modified)))
        .with_context(|| format!("failed to set times on {}", dest.display()))?;

    tracing::debug!("Copied {} to {}", symbol_path.display(), dest.display());
    Ok(dest)
}

/// Deletes a whole store. Best effort: nothing here fails the run.
pub fn clear_store(store_root: &Path) {
    match fs::remove_dir_all(store_root) {
        Ok(()) => tracing::info!("Cleared {}", store_root.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("{} does not exist, nothing to clear", store_root.display())
        }
        Err(e) => tracing::warn!("Failed to clear {}: {}", store_root.display(), e),
    }
}
