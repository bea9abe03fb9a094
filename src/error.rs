//! Error types that callers need to tell apart.
//!
//! Everything else travels as `anyhow::Error` with context attached.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

use crate::fingerprint::Fingerprint;

#[derive(Debug, Error)]
pub enum Error {
    /// The dump tool output did not contain a field the fingerprint needs.
    #[error("PDB info ({field}) not matched in llvm-pdbutil output for {}:\n{output}", .path.display())]
    MissingField {
        field: &'static str,
        path: PathBuf,
        output: String,
    },

    /// A binary and its PDB were not produced by the same link.
    #[error(
        "Image PDB fingerprint doesn't match PDB fingerprint:\n  {image_fingerprint} : {}\n  {pdb_fingerprint} : {}",
        .image_path.display(),
        .pdb_path.display()
    )]
    FingerprintMismatch {
        image_fingerprint: Fingerprint,
        image_path: PathBuf,
        pdb_fingerprint: Fingerprint,
        pdb_path: PathBuf,
    },

    /// The image has no CodeView debug directory entry.
    #[error("{} has no CodeView PDB reference", .path.display())]
    MissingCodeView { path: PathBuf },

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed with {status}{}", stderr_suffix(.stderr))]
    ToolFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!(":\n{}", stderr.trim_end())
    }
}
