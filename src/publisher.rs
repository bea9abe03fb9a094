//! Symbol publishing.
//!
//! This module contains the `Publisher` struct which drives a whole run:
//! 1. Clear: optionally wipe the output stores.
//! 2. Collect: find every image that has a PDB next to it.
//! 3. Validate: make sure each image and its PDB come from the same link.
//! 4. Store: copy the image and PDB into the symbol store.
//! 5. Index: inject source server information into the copied PDB.
//! 6. Mirror: copy the indexed PDB into the PDB-only store, if configured.
//!
//! Images are processed one by one and the first failure aborts the run.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::Config;
use crate::error::Error;
use crate::fingerprint::Fingerprint;
use crate::manifest::collect_images;
use crate::store::{clear_store, copy_symbol};
use crate::toolchain::{ImagePdbInfo, Toolchain};

/// Where one image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedImage {
    pub fingerprint: Fingerprint,
    pub image: PathBuf,
    pub pdb: PathBuf,
    pub pdb_only: Option<PathBuf>,
}

pub struct Publisher<T: Toolchain> {
    toolchain: T,
    config: Config,
}

impl<T: Toolchain> Publisher<T> {
    /// `config` is expected to be resolved (see `Config::resolve`).
    pub fn new(toolchain: T, config: Config) -> Self {
        Self { toolchain, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the whole pipeline and returns what was published, in order.
    pub fn run(&self) -> Result<Vec<PublishedImage>> {
        if self.config.clear {
            self.clear();
        }

        let images = collect_images(
            &self.config.installer_config,
            &self.config.excluded_group,
            &self.config.build_dir,
            &self.config.additional_files,
        )?;
        tracing::info!("Found {} images with PDBs", images.len());

        images
            .iter()
            .map(|image| self.process_image(image))
            .collect()
    }

    /// Wipes the primary and PDB-only stores, ignoring failures.
    pub fn clear(&self) {
        for root in self.config.store_roots() {
            clear_store(root);
        }
    }

    /// Reads both fingerprints of `image_path` and fails unless they agree.
    pub fn validate(&self, image_path: &Path) -> Result<ImagePdbInfo> {
        let ImagePdbInfo {
            fingerprint: image_fingerprint,
            pdb_path,
        } = self.toolchain.image_pdb_info(image_path)?;
        tracing::info!("Image PDB fingerprint {}", image_fingerprint);

        assert!(
            pdb_path.is_absolute(),
            "PDB path {} is not absolute",
            pdb_path.display()
        );
        let pdb_fingerprint = self.toolchain.pdb_fingerprint(&pdb_path)?;
        tracing::info!("      PDB fingerprint {}", pdb_fingerprint);

        if pdb_fingerprint != image_fingerprint {
            return Err(Error::FingerprintMismatch {
                image_fingerprint,
                image_path: image_path.to_path_buf(),
                pdb_fingerprint,
                pdb_path,
            }
            .into());
        }
        Ok(ImagePdbInfo {
            fingerprint: image_fingerprint,
            pdb_path,
        })
    }

    /// Validates, stores and indexes one image.
    pub fn process_image(&self, image_path: &Path) -> Result<PublishedImage> {
        assert!(
            image_path.is_absolute(),
            "image path {} is not absolute",
            image_path.display()
        );
        let start = Instant::now();
        tracing::info!("Processing {}", image_path.display());

        let ImagePdbInfo {
            fingerprint,
            pdb_path,
        } = self.validate(image_path)?;

        let symbols_dir = &self.config.symbols_dir;
        let image = copy_symbol(symbols_dir, image_path, &fingerprint)?;
        let pdb = copy_symbol(symbols_dir, &pdb_path, &fingerprint)?;

        // Only the PDB header age changes here, the DBI age that debuggers
        // match on stays, so the fingerprint above remains valid.
        self.toolchain.source_index(&self.config.build_dir, &pdb)?;

        let pdb_only = match &self.config.pdb_only_symbols_dir {
            Some(pdb_only_dir) => Some(copy_symbol(pdb_only_dir, &pdb, &fingerprint)?),
            None => None,
        };

        tracing::info!(
            "Copied symbols for {}: elapsed time {} seconds",
            image_path.display(),
            start.elapsed().as_secs_f64()
        );
        Ok(PublishedImage {
            fingerprint,
            image,
            pdb,
            pdb_only,
        })
    }
}
