//! Configuration module.
//!
//! This module defines the command-line interface (CLI) using `clap`.
//! Everything the run needs (input manifest, output stores, external tools) is
//! carried in `Config` and handed to each component explicitly.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use crate::utils::absolute;

/// Manifest section holding files that only ship in the proprietary build.
pub const DEFAULT_EXCLUDED_GROUP: &str = "GOOGLE_CHROME";

#[cfg(windows)]
const DEFAULT_PYTHON: &str = "vpython3.bat";
#[cfg(not(windows))]
const DEFAULT_PYTHON: &str = "vpython3";

/// Stages exe/dll/pdb files into a symbol server directory layout.
///
/// Every binary listed in the installer config (plus any additional files) that
/// has a sibling `.pdb` is checked against its PDB fingerprint, copied to
/// `<symbols-dir>/<name>/<fingerprint>/<name>` and source indexed.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Installer config that contains files to process
    #[arg(long, value_name = "PATH")]
    pub installer_config: PathBuf,

    /// Additional exe/dll files to process
    #[arg(long, value_name = "PATH", num_args = 0..)]
    pub additional_files: Vec<PathBuf>,

    /// The build output directory
    #[arg(long, value_name = "PATH")]
    pub build_dir: PathBuf,

    /// Directory to output all files for symbol server (exe, dll, pdb)
    #[arg(long, value_name = "PATH")]
    pub symbols_dir: PathBuf,

    /// Directory to output only pdb files
    #[arg(long, value_name = "PATH")]
    pub pdb_only_symbols_dir: Option<PathBuf>,

    /// Clear the symbol directories before writing new symbols
    #[arg(long)]
    pub clear: bool,

    /// Print verbose status output
    #[arg(short, long)]
    pub verbose: bool,

    /// Source checkout root, used to locate the source indexer
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub src_root: PathBuf,

    /// Installer config section to skip
    #[arg(long, value_name = "NAME", default_value = DEFAULT_EXCLUDED_GROUP)]
    pub excluded_group: String,

    /// Python launcher used to run the source indexer
    #[arg(long, value_name = "PATH", default_value = DEFAULT_PYTHON)]
    pub python: PathBuf,

    /// Source indexer script [default: <src-root>/tools/symsrc/source_index.py]
    #[arg(long, value_name = "PATH")]
    pub source_index_script: Option<PathBuf>,

    /// Toolchain directory passed to the source indexer
    #[arg(long, value_name = "PATH", default_value = r"c:\Program Files (x86)")]
    pub toolchain_dir: String,

    /// Do not inject source server information into copied PDBs
    #[arg(long)]
    pub no_source_index: bool,

    /// Read PDB fingerprints from `llvm-pdbutil dump --summary` output
    #[arg(long, value_name = "PATH")]
    pub pdbutil: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", help = "Set the logging level")]
    pub log_level: String,
}

impl Config {
    /// Turns every directory argument into an absolute path.
    ///
    /// Images are identified by absolute paths from here on, so this must run
    /// before any input is collected.
    pub fn resolve(mut self) -> Result<Self> {
        self.installer_config = absolute(&self.installer_config)?;
        self.build_dir = absolute(&self.build_dir)
            .with_context(|| format!("invalid build dir {}", self.build_dir.display()))?;
        self.symbols_dir = absolute(&self.symbols_dir)?;
        self.pdb_only_symbols_dir = self
            .pdb_only_symbols_dir
            .as_deref()
            .map(absolute)
            .transpose()?;
        self.src_root = absolute(&self.src_root)?;
        Ok(self)
    }

    /// Filter directive for the tracing subscriber.
    pub fn log_filter(&self) -> &str {
        if self.verbose && matches!(self.log_level.as_str(), "error" | "warn") {
            "info"
        } else {
            &self.log_level
        }
    }

    pub fn source_index_script(&self) -> PathBuf {
        match &self.source_index_script {
            Some(script) => script.clone(),
            None => self.src_root.join("tools").join("symsrc").join("source_index.py"),
        }
    }

    /// Store roots wiped by `--clear`, primary first.
    pub fn store_roots(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.symbols_dir.as_path()).chain(self.pdb_only_symbols_dir.as_deref())
    }
}
