//! PDB fingerprints.
//!
//! A fingerprint is the PDB GUID followed by the PDB age. It is the key a
//! debugger uses to ask a symbol server for the exact PDB matching a binary,
//! and the middle component of every symbol store path.

use std::fmt;
use std::path::Path;
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Symbol server form: 32 uppercase hex digits of the GUID, then the age in
    /// decimal.
    pub fn new(guid: Uuid, age: u32) -> Self {
        Fingerprint(format!("{:X}{}", guid.simple(), age))
    }

    /// Joins a GUID and an age as a dump tool printed them, dropping the dashes
    /// from the GUID and keeping the age text as is.
    pub fn from_parts(guid: &str, age: &str) -> Self {
        Fingerprint(format!("{}{}", guid.replace('-', ""), age))
    }

    /// Builds a fingerprint from the raw GUID bytes of a CodeView record, which
    /// store the first three GUID fields little-endian.
    pub fn from_codeview(guid: [u8; 16], age: u32) -> Self {
        Self::new(Uuid::from_bytes_le(guid), age)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for Fingerprint {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

/// Extracts the fingerprint from `llvm-pdbutil dump --summary` output.
///
/// The first `  Age: …` and the first `  GUID: {…}` lines win. Both values are
/// used exactly as printed; the tool prints the age in decimal, which is also
/// how [`Fingerprint::new`] renders it.
pub fn parse_pdbutil_summary(output: &str, pdb_path: &Path) -> Result<Fingerprint, Error> {
    let mut age = None;
    let mut guid = None;
    for line in output.lines() {
        if age.is_none() {
            age = line.strip_prefix("  Age: ").filter(|age| !age.is_empty());
        }
        if guid.is_none() {
            guid = line
                .strip_prefix("  GUID: {")
                .and_then(|rest| rest.rfind('}').map(|end| &rest[..end]))
                .filter(|guid| !guid.is_empty());
        }
    }

    let missing = |field| Error::MissingField {
        field,
        path: pdb_path.to_path_buf(),
        output: output.to_string(),
    };
    let age = age.ok_or_else(|| missing("Age"))?;
    let guid = guid.ok_or_else(|| missing("GUID"))?;

    Ok(Fingerprint::from_parts(guid, age))
}
