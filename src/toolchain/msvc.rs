//! MSVC (PE/PDB) toolchain backend.
//!
//! Implements the `Toolchain` trait for Windows binaries: the CodeView record is
//! read from the PE debug directory with `object`, the PDB side with `pdb` (or,
//! when configured, by scraping `llvm-pdbutil dump --summary`), and source
//! indexing runs the Python indexer script.

use anyhow::{Context, Result};
use memmap2::Mmap;
use object::Object;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{pdb_sibling, ImagePdbInfo, Toolchain};
use crate::config::Config;
use crate::error::Error;
use crate::fingerprint::{parse_pdbutil_summary, Fingerprint};

/// How the source indexer is launched.
#[derive(Debug, Clone)]
pub struct SourceIndexer {
    pub python: PathBuf,
    pub script: PathBuf,
    pub toolchain_dir: String,
}

/// The MSVC toolchain backend.
#[derive(Debug, Clone, Default)]
pub struct Msvc {
    /// `llvm-pdbutil` binary; the `pdb` crate is used when unset.
    pub pdbutil: Option<PathBuf>,
    /// `None` disables source indexing.
    pub source_indexer: Option<SourceIndexer>,
}

impl Msvc {
    pub fn from_config(config: &Config) -> Self {
        let source_indexer = (!config.no_source_index).then(|| SourceIndexer {
            python: config.python.clone(),
            script: config.source_index_script(),
            toolchain_dir: config.toolchain_dir.clone(),
        });
        Self {
            pdbutil: config.pdbutil.clone(),
            source_indexer,
        }
    }

    fn read_pdb(&self, pdb_path: &Path) -> Result<Fingerprint> {
        let file =
            File::open(pdb_path).with_context(|| format!("failed to open {}", pdb_path.display()))?;
        let mut pdb = pdb::PDB::open(file)
            .with_context(|| format!("failed to parse PDB {}", pdb_path.display()))?;
        let info = pdb.pdb_information()?;
        // Source indexing bumps the header age; debuggers match on the DBI age.
        let age = pdb.debug_information()?.age().unwrap_or(info.age);
        Ok(Fingerprint::new(info.guid, age))
    }

    fn dump_pdb(&self, pdbutil: &Path, pdb_path: &Path) -> Result<Fingerprint> {
        let output = Command::new(pdbutil)
            .args(["dump", "--summary"])
            .arg(pdb_path)
            .output()
            .with_context(|| format!("failed to run {}", pdbutil.display()))?;
        if !output.status.success() {
            return Err(Error::ToolFailed {
                tool: pdbutil.display().to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_pdbutil_summary(&stdout, pdb_path)?)
    }
}

impl Toolchain for Msvc {
    fn image_pdb_info(&self, image_path: &Path) -> Result<ImagePdbInfo> {
        let file = File::open(image_path)
            .with_context(|| format!("failed to open {}", image_path.display()))?;
        let mmap = unsafe { Mmap::map(&file)? };
        let obj = object::File::parse(&*mmap)
            .with_context(|| format!("failed to parse image {}", image_path.display()))?;
        let codeview = obj
            .pdb_info()
            .with_context(|| format!("failed to read debug directory of {}", image_path.display()))?
            .ok_or_else(|| Error::MissingCodeView {
                path: image_path.to_path_buf(),
            })?;

        let fingerprint = Fingerprint::from_codeview(codeview.guid(), codeview.age());
        let recorded = PathBuf::from(String::from_utf8_lossy(codeview.path()).into_owned());
        tracing::debug!("{} records PDB {}", image_path.display(), recorded.display());

        // The recorded path is the link-time location, which only means
        // something when the build ran on this host.
        let pdb_path = if recorded.is_absolute() && recorded.is_file() {
            recorded
        } else {
            pdb_sibling(image_path)
        };
        Ok(ImagePdbInfo {
            fingerprint,
            pdb_path,
        })
    }

    fn pdb_fingerprint(&self, pdb_path: &Path) -> Result<Fingerprint> {
        match &self.pdbutil {
            Some(pdbutil) => self.dump_pdb(pdbutil, pdb_path),
            None => self.read_pdb(pdb_path),
        }
    }

    fn source_index(&self, build_dir: &Path, pdb_path: &Path) -> Result<()> {
        let Some(indexer) = &self.source_indexer else {
            tracing::debug!("Source indexing disabled, leaving {} as is", pdb_path.display());
            return Ok(());
        };

        let status = Command::new(&indexer.python)
            .arg(&indexer.script)
            .arg("--build-dir")
            .arg(build_dir)
            .arg("--toolchain-dir")
            .arg(&indexer.toolchain_dir)
            .arg(pdb_path)
            .status()
            .with_context(|| format!("failed to run {}", indexer.python.display()))?;
        if !status.success() {
            return Err(Error::ToolFailed {
                tool: indexer.script.display().to_string(),
                status,
                stderr: String::new(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use uuid::Uuid;

    const GUID: &str = "abcd1234-ef01-2345-6789-abcdef012345";

    fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
        buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
        buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// A minimal PE32+ image: one `.rdata` section holding a debug directory
    /// with a single CodeView (RSDS) entry.
    fn pe_image(guid: Uuid, age: u32, pdb_path: &str) -> Vec<u8> {
        let mut image = vec![0u8; 0x400];
        image[..2].copy_from_slice(b"MZ");
        put_u32(&mut image, 0x3c, 0x40);
        image[0x40..0x44].copy_from_slice(b"PE\0\0");

        // File header.
        put_u16(&mut image, 0x44, 0x8664);
        put_u16(&mut image, 0x46, 1);
        put_u16(&mut image, 0x54, 240);
        put_u16(&mut image, 0x56, 0x22);

        // Optional header.
        let opt = 0x58;
        put_u16(&mut image, opt, 0x20b);
        image[opt + 24..opt + 32].copy_from_slice(&0x1_4000_0000u64.to_le_bytes());
        put_u32(&mut image, opt + 32, 0x1000);
        put_u32(&mut image, opt + 36, 0x200);
        put_u16(&mut image, opt + 48, 6);
        put_u32(&mut image, opt + 56, 0x2000);
        put_u32(&mut image, opt + 60, 0x200);
        put_u16(&mut image, opt + 68, 3);
        put_u32(&mut image, opt + 108, 16);
        // Debug data directory.
        put_u32(&mut image, opt + 112 + 6 * 8, 0x1000);
        put_u32(&mut image, opt + 112 + 6 * 8 + 4, 28);

        // Section header.
        let section = opt + 240;
        image[section..section + 6].copy_from_slice(b".rdata");
        put_u32(&mut image, section + 8, 0x200);
        put_u32(&mut image, section + 12, 0x1000);
        put_u32(&mut image, section + 16, 0x200);
        put_u32(&mut image, section + 20, 0x200);
        put_u32(&mut image, section + 36, 0x4000_0040);

        // Debug directory entry pointing at the CodeView record right after it.
        let codeview = 0x21c;
        put_u32(&mut image, 0x200 + 12, 2);
        put_u32(&mut image, 0x200 + 16, (24 + pdb_path.len() + 1) as u32);
        put_u32(&mut image, 0x200 + 20, 0x1000 + 0x1c);
        put_u32(&mut image, 0x200 + 24, codeview as u32);

        image[codeview..codeview + 4].copy_from_slice(b"RSDS");
        image[codeview + 4..codeview + 20].copy_from_slice(&guid.to_bytes_le());
        put_u32(&mut image, codeview + 20, age);
        image[codeview + 24..codeview + 24 + pdb_path.len()].copy_from_slice(pdb_path.as_bytes());
        image
    }

    /// A minimal MSF 7.00 file with a PDB info stream and a DBI stream header.
    /// `dbi_age` 0 means the DBI stream does not record an age.
    fn msf_pdb(guid: Uuid, info_age: u32, dbi_age: u32) -> Vec<u8> {
        const PAGE: usize = 0x1000;
        let mut pdb = vec![0u8; 7 * PAGE];

        let mut info = Vec::new();
        info.extend_from_slice(&20000404u32.to_le_bytes());
        info.extend_from_slice(&0x5f00_0000u32.to_le_bytes());
        info.extend_from_slice(&info_age.to_le_bytes());
        info.extend_from_slice(&guid.to_bytes_le());
        info.extend_from_slice(&0u32.to_le_bytes());

        let mut dbi = Vec::new();
        dbi.extend_from_slice(&u32::MAX.to_le_bytes());
        dbi.extend_from_slice(&19990903u32.to_le_bytes());
        dbi.extend_from_slice(&dbi_age.to_le_bytes());
        for value in [0xffffu16, 0, 0xffff, 0, 0xffff, 0] {
            dbi.extend_from_slice(&value.to_le_bytes());
        }
        dbi.extend_from_slice(&[0u8; 32]);
        dbi.extend_from_slice(&0u16.to_le_bytes());
        dbi.extend_from_slice(&0x8664u16.to_le_bytes());
        dbi.extend_from_slice(&0u32.to_le_bytes());

        // Stream directory: stream 1 (info) on page 5, stream 3 (DBI) on page 6.
        let directory = [4, 0, info.len() as u32, 0, dbi.len() as u32, 5, 6];

        pdb[..32].copy_from_slice(b"Microsoft C/C++ MSF 7.00\r\n\x1aDS\0\0\0");
        let header = [PAGE as u32, 1, 7, (directory.len() * 4) as u32, 0, 3];
        for (i, value) in header.iter().enumerate() {
            put_u32(&mut pdb, 32 + i * 4, *value);
        }
        put_u32(&mut pdb, 3 * PAGE, 4);
        for (i, value) in directory.iter().enumerate() {
            put_u32(&mut pdb, 4 * PAGE + i * 4, *value);
        }
        pdb[5 * PAGE..5 * PAGE + info.len()].copy_from_slice(&info);
        pdb[6 * PAGE..6 * PAGE + dbi.len()].copy_from_slice(&dbi);
        pdb
    }

    fn guid() -> Uuid {
        Uuid::parse_str(GUID).unwrap()
    }

    #[test]
    fn test_image_and_pdb_fingerprints_agree() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("a.exe");
        let pdb = tmp.path().join("a.exe.pdb");
        fs::write(&pdb, msf_pdb(guid(), 2, 2)).unwrap();
        fs::write(&image, pe_image(guid(), 2, pdb.to_str().unwrap())).unwrap();

        let msvc = Msvc::default();
        let info = msvc.image_pdb_info(&image).unwrap();
        assert_eq!(info.fingerprint.as_str(), "ABCD1234EF0123456789ABCDEF0123452");
        assert_eq!(info.pdb_path, pdb);
        assert_eq!(msvc.pdb_fingerprint(&pdb).unwrap(), info.fingerprint);
    }

    #[test]
    fn test_dbi_age_is_preferred_over_info_age() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("a.dll");
        let pdb = tmp.path().join("a.dll.pdb");
        // Source indexing rewrote the info stream and bumped its age.
        fs::write(&pdb, msf_pdb(guid(), 5, 2)).unwrap();
        fs::write(&image, pe_image(guid(), 2, "a.dll.pdb")).unwrap();

        let msvc = Msvc::default();
        assert_eq!(
            msvc.pdb_fingerprint(&pdb).unwrap(),
            msvc.image_pdb_info(&image).unwrap().fingerprint
        );
    }

    #[test]
    fn test_info_age_used_when_dbi_has_none() {
        let tmp = tempfile::tempdir().unwrap();
        let pdb = tmp.path().join("a.exe.pdb");
        fs::write(&pdb, msf_pdb(guid(), 12, 0)).unwrap();
        assert_eq!(
            Msvc::default().pdb_fingerprint(&pdb).unwrap().as_str(),
            "ABCD1234EF0123456789ABCDEF01234512"
        );
    }

    #[test]
    fn test_foreign_recorded_path_falls_back_to_sibling() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("a.exe");
        fs::write(
            &image,
            pe_image(guid(), 10, r"C:\b\s\w\ir\cache\builder\src\out\a.exe.pdb"),
        )
        .unwrap();

        let info = Msvc::default().image_pdb_info(&image).unwrap();
        assert_eq!(info.pdb_path, tmp.path().join("a.exe.pdb"));
        assert_eq!(info.fingerprint.as_str(), "ABCD1234EF0123456789ABCDEF01234510");
    }

    #[test]
    fn test_non_pe_image_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("fake.exe");
        fs::write(&image, b"definitely not a PE file").unwrap();
        let err = Msvc::default().image_pdb_info(&image).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse image"));
    }

    #[test]
    fn test_non_pdb_file_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let pdb = tmp.path().join("fake.exe.pdb");
        fs::write(&pdb, vec![0u8; 256]).unwrap();
        assert!(Msvc::default().pdb_fingerprint(&pdb).is_err());
    }

    #[test]
    fn test_missing_pdb_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Msvc::default()
            .pdb_fingerprint(&tmp.path().join("missing.pdb"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to open"));
    }

    #[test]
    fn test_disabled_source_index_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let pdb = tmp.path().join("a.exe.pdb");
        fs::write(&pdb, b"pdb").unwrap();
        Msvc::default().source_index(tmp.path(), &pdb).unwrap();
        assert_eq!(fs::read(&pdb).unwrap(), b"pdb");
    }

    #[cfg(unix)]
    #[test]
    fn test_source_index_arguments() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("args.txt");
        let script = tmp.path().join("source_index.sh");
        fs::write(&script, format!("printf '%s\\n' \"$@\" > '{}'\n", log.display())).unwrap();

        let msvc = Msvc {
            pdbutil: None,
            source_indexer: Some(SourceIndexer {
                python: PathBuf::from("sh"),
                script: script.clone(),
                toolchain_dir: r"c:\Program Files (x86)".to_string(),
            }),
        };
        msvc.source_index(Path::new("/out"), Path::new("/sym/a.exe.pdb"))
            .unwrap();

        let args = fs::read_to_string(&log).unwrap();
        assert_eq!(
            args.lines().collect::<Vec<_>>(),
            [
                "--build-dir",
                "/out",
                "--toolchain-dir",
                r"c:\Program Files (x86)",
                "/sym/a.exe.pdb"
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_source_index_failure_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("source_index.sh");
        fs::write(&script, "exit 3\n").unwrap();
        let msvc = Msvc {
            pdbutil: None,
            source_indexer: Some(SourceIndexer {
                python: PathBuf::from("sh"),
                script,
                toolchain_dir: String::new(),
            }),
        };
        let err = msvc
            .source_index(tmp.path(), &tmp.path().join("a.exe.pdb"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ToolFailed { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_pdbutil_output_without_summary_is_a_parse_error() {
        // `echo` prints its arguments back, which has neither an Age nor a GUID line.
        let msvc = Msvc {
            pdbutil: Some(PathBuf::from("echo")),
            source_indexer: None,
        };
        let err = msvc.pdb_fingerprint(Path::new("/out/a.exe.pdb")).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::MissingField { path, output, .. }) => {
                assert_eq!(path, Path::new("/out/a.exe.pdb"));
                assert!(output.contains("dump --summary /out/a.exe.pdb"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
