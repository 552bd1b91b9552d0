// SPDX-License-Identifier: MIT
//! Batch verification over a directory tree
//!
//! Each file is handled on its own; a failing file is recorded and the scan
//! moves on to the next one.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::ToolConfig;
use crate::error::{FxpError, Result};
use crate::verify::RoundTripVerifier;
use crate::view::HumanReadableView;

/// A file that could not be processed
#[derive(Debug)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub error: FxpError,
}

/// Accumulated outcome of a scan
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files whose round trip was byte-exact
    pub verified: Vec<PathBuf>,
    /// Per-file errors; a file can be verified and still fail extraction
    pub failures: Vec<BatchFailure>,
    /// Sidecars written when extraction is enabled
    pub extracted: Vec<PathBuf>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Walk `root` and verify every file matching the configured extension
pub fn scan(root: impl AsRef<Path>, config: &ToolConfig) -> BatchReport {
    let verifier = RoundTripVerifier::new(config.split_mode);
    let mut report = BatchReport::default();

    for entry in WalkDir::new(root.as_ref()).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                record_failure(&mut report, path, FxpError::Io(e.into()));
                if config.fail_fast {
                    break;
                }
                continue;
            }
        };

        if !entry.file_type().is_file() || !config.matches(entry.path()) {
            continue;
        }

        let path = entry.into_path();
        let outcome = process(&verifier, &path, config, &mut report);
        if let Err(error) = outcome {
            record_failure(&mut report, path, error);
            if config.fail_fast {
                break;
            }
        }
    }

    info!(
        verified = report.verified.len(),
        failed = report.failures.len(),
        extracted = report.extracted.len(),
        "batch finished"
    );
    report
}

fn process(
    verifier: &RoundTripVerifier,
    path: &Path,
    config: &ToolConfig,
    report: &mut BatchReport,
) -> Result<()> {
    let (document, result) = verifier.verify_loaded(path)?;
    result.into_result()?;
    report.verified.push(path.to_path_buf());

    if config.write_extracted {
        let view = HumanReadableView::from_document(&document)?;

        let sidecar = sidecar_path(path);
        std::fs::write(&sidecar, view.to_string())?;
        report.extracted.push(sidecar);
    }
    Ok(())
}

/// `<dir>/<stem>_extracted_data.txt`
pub fn sidecar_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}_extracted_data.txt", stem))
}

fn record_failure(report: &mut BatchReport, path: PathBuf, error: FxpError) {
    warn!(path = %path.display(), kind = error.kind(), "{}", error);
    report.failures.push(BatchFailure { path, error });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FxpHeader, ProgramName};
    use tempfile::TempDir;

    fn preset(xml: &[u8]) -> Vec<u8> {
        let mut header = FxpHeader::new(ProgramName::new("Batch").unwrap());
        header.chunk_size = xml.len() as i32;
        let mut bytes = header.pack().unwrap().to_vec();
        bytes.extend_from_slice(xml);
        bytes.extend_from_slice(&[0xEE; 8]);
        bytes
    }

    #[test]
    fn test_scan_accumulates_failures() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("Basses");
        std::fs::create_dir(&nested).unwrap();

        let good = b"<?xml version=\"1.0\"?><patch><parameters><a type=\"f\" value=\"1\"/></parameters></patch>";
        std::fs::write(dir.path().join("a.fxp"), preset(good)).unwrap();
        std::fs::write(nested.join("b.FXP"), preset(good)).unwrap();
        std::fs::write(dir.path().join("broken.fxp"), b"too short").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let report = scan(dir.path(), &ToolConfig::default());
        assert_eq!(report.verified.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("broken.fxp"));
        assert!(matches!(report.failures[0].error, FxpError::Format(_)));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_scan_writes_sidecars() {
        let dir = TempDir::new().unwrap();
        let good = b"<?xml version=\"1.0\"?><patch><meta name=\"Sq\"/><parameters/></patch>";
        let bad_xml = b"<?xml version=\"1.0\"?><preset></patch>";
        std::fs::write(dir.path().join("good.fxp"), preset(good)).unwrap();
        std::fs::write(dir.path().join("odd.fxp"), preset(bad_xml)).unwrap();

        let config = ToolConfig {
            write_extracted: true,
            ..ToolConfig::default()
        };
        let report = scan(dir.path(), &config);

        // Both round trips succeed; only extraction of the odd one fails
        assert_eq!(report.verified.len(), 2);
        assert_eq!(report.extracted.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, FxpError::MalformedXml(_)));

        let sidecar = std::fs::read_to_string(dir.path().join("good_extracted_data.txt")).unwrap();
        assert!(sidecar.contains("name: Sq"));
    }

    #[test]
    fn test_fail_fast() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.fxp"), b"short").unwrap();
        std::fs::write(dir.path().join("b.fxp"), b"short").unwrap();

        let config = ToolConfig {
            fail_fast: true,
            ..ToolConfig::default()
        };
        let report = scan(dir.path(), &config);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/p/Sqweird.fxp")),
            PathBuf::from("/p/Sqweird_extracted_data.txt")
        );
    }
}
