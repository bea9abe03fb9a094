//! Symbol server staging library.
//!
//! This library provides the core components for the `symstage` tool.
//! It is organized into several modules:
//! - `config`: CLI configuration.
//! - `error`: Errors callers match on.
//! - `manifest`: Collects the images listed in the installer config.
//! - `fingerprint`: PDB fingerprints and dump tool output parsing.
//! - `toolchain`: Platform backends that read images and PDBs.
//! - `store`: Symbol store layout and copying.
//! - `publisher`: The per-run orchestration.
//! - `utils`: Path helpers.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod manifest;
pub mod publisher;
pub mod store;
pub mod toolchain;
pub mod utils;

pub use error::Error;
