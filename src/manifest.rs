//! Input collection.
//!
//! The installer config lists every file that ships, grouped into sections:
//!
//! ```ini
//! [GENERAL]
//! chrome.exe: %(ChromeDir)s\
//! chrome_elf.dll: %(VersionDir)s\
//! Locales\*.pak: %(VersionDir)s\Locales
//!
//! [GOOGLE_CHROME]
//! chrome_pwa_launcher.exe: %(VersionDir)s\
//! ```
//!
//! Keys are paths relative to the build directory. Only the binaries that have
//! a PDB next to them are of interest; everything else is dropped silently.

use anyhow::{anyhow, Result};
use configparser::ini::Ini;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::toolchain::pdb_sibling;

/// Section that collects keys appearing before the first `[section]` line.
/// Brackets cannot be part of a real section name.
const NO_GROUP: &str = "[no group]";

/// Reads the installer config and returns the section name and file key of
/// every entry, in file order. Keys outside any section are dropped.
///
/// Lines are never joined: values such as `%(ChromeDir)s\` end in a
/// backslash and the next line is still a separate entry.
pub fn read_installer_config(path: &Path) -> Result<Vec<(String, String)>> {
    let mut defaults = Ini::new_cs().defaults();
    defaults.default_section = NO_GROUP.to_string();
    let mut config = Ini::new_from_defaults(defaults);
    let sections = config
        .load(path)
        .map_err(|e| anyhow!("failed to read installer config {}: {}", path.display(), e))?;

    let mut entries = Vec::new();
    for (section, files) in &sections {
        if section == NO_GROUP {
            continue;
        }
        for file in files.keys() {
            entries.push((section.clone(), file.clone()));
        }
    }
    Ok(entries)
}

/// Collects the images to publish.
///
/// Every installer config entry outside `excluded_group`, plus every file in
/// `additional_files`, is resolved against `build_dir` and kept if both the
/// file and its `.pdb` sibling exist. The result is sorted and free of
/// duplicates.
pub fn collect_images(
    installer_config: &Path,
    excluded_group: &str,
    build_dir: &Path,
    additional_files: &[PathBuf],
) -> Result<BTreeSet<PathBuf>> {
    let mut images = BTreeSet::new();
    let mut add_if_has_pdb = |file: PathBuf| {
        let image = build_dir.join(file);
        if !image.is_file() {
            tracing::debug!("Skipping {}: not built", image.display());
            return;
        }
        if !pdb_sibling(&image).is_file() {
            tracing::debug!("Skipping {}: no PDB", image.display());
            return;
        }
        images.insert(image);
    };

    for (group, file) in read_installer_config(installer_config)? {
        if group == excluded_group {
            continue;
        }
        add_if_has_pdb(relative_path(&file));
    }
    for file in additional_files {
        add_if_has_pdb(file.clone());
    }

    Ok(images)
}

/// Installer config keys use `\` separators; accept both on every host.
fn relative_path(key: &str) -> PathBuf {
    key.split(['\\', '/']).filter(|part| !part.is_empty()).collect()
}
