//! Toolchain abstraction.
//!
//! This module defines the `Toolchain` trait, which encapsulates everything that
//! has to look inside a binary or a PDB, or that runs an external tool. The
//! publisher stays generic over it, so validation and store layout can be
//! exercised without real PE files.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::fingerprint::Fingerprint;

pub mod msvc;

/// The PDB reference recorded in a binary's debug directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePdbInfo {
    pub fingerprint: Fingerprint,
    /// The PDB the fingerprint refers to. Always absolute.
    pub pdb_path: PathBuf,
}

/// A trait representing the tools that understand one platform's debug info.
pub trait Toolchain {
    /// Reads the PDB fingerprint and PDB location recorded in an image.
    fn image_pdb_info(&self, image_path: &Path) -> Result<ImagePdbInfo>;

    /// Reads the fingerprint stored inside a PDB.
    fn pdb_fingerprint(&self, pdb_path: &Path) -> Result<Fingerprint>;

    /// Rewrites a PDB in place so debuggers can fetch its sources.
    ///
    /// Must leave the fingerprint debuggers match on untouched.
    fn source_index(&self, build_dir: &Path, pdb_path: &Path) -> Result<()>;
}

/// Suffix appended to an image's file name to find its PDB (`chrome.dll.pdb`).
pub const PDB_SUFFIX: &str = ".pdb";

/// The PDB the linker writes next to `image_path`.
pub fn pdb_sibling(image_path: &Path) -> PathBuf {
    let mut pdb = image_path.as_os_str().to_owned();
    pdb.push(PDB_SUFFIX);
    PathBuf::from(pdb)
}
