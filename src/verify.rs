// SPDX-License-Identifier: MIT
//! Round-trip verification
//!
//! Loads a preset, serializes it again and compares the result with the
//! original bytes. On mismatch the first differing offset is reported along
//! with the region it falls in.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, warn};

use crate::document::PatchDocument;
use crate::error::{FxpError, Result};
use crate::splitter::{SplitMode, SplitWarning};

/// Region of a serialized preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Header,
    PreXml,
    XmlPayload,
    PostXml,
    Wavetables,
    /// Past the end of the shorter of the two inputs
    Length,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Header => "header",
            Region::PreXml => "pre-xml",
            Region::XmlPayload => "xml payload",
            Region::PostXml => "post-xml",
            Region::Wavetables => "wavetables",
            Region::Length => "length",
        };
        f.write_str(name)
    }
}

/// Byte lengths of each region, in file order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    pub header: usize,
    pub pre_xml: usize,
    pub xml_payload: usize,
    pub post_xml: usize,
    pub wavetables: usize,
}

impl RegionLayout {
    pub fn total(&self) -> usize {
        self.header + self.pre_xml + self.xml_payload + self.post_xml + self.wavetables
    }

    /// Region containing `offset`
    pub fn region_at(&self, offset: usize) -> Region {
        let bounds = [
            (self.header, Region::Header),
            (self.pre_xml, Region::PreXml),
            (self.xml_payload, Region::XmlPayload),
            (self.post_xml, Region::PostXml),
            (self.wavetables, Region::Wavetables),
        ];

        let mut end = 0;
        for (len, region) in bounds {
            end += len;
            if offset < end {
                return region;
            }
        }
        Region::Length
    }
}

/// Outcome of a round-trip check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub ok: bool,
    pub mismatch_offset: Option<usize>,
    pub region: Option<Region>,
    pub original_len: usize,
    pub serialized_len: usize,
    pub warnings: Vec<SplitWarning>,
}

impl VerificationResult {
    /// Turn a mismatch into `FxpError::RoundTripMismatch`
    pub fn into_result(self) -> Result<Self> {
        match (self.mismatch_offset, self.region) {
            (Some(offset), Some(region)) => Err(FxpError::RoundTripMismatch { offset, region }),
            _ => Ok(self),
        }
    }
}

/// Drives load, serialize and compare
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundTripVerifier {
    mode: SplitMode,
}

impl RoundTripVerifier {
    pub fn new(mode: SplitMode) -> Self {
        Self { mode }
    }

    /// Verify a file on disk; the file is only ever opened for reading
    pub fn verify(&self, path: impl AsRef<Path>) -> Result<VerificationResult> {
        self.verify_loaded(path).map(|(_, result)| result)
    }

    /// Like [`Self::verify`], also returning the loaded document
    pub fn verify_loaded(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(PatchDocument, VerificationResult)> {
        let path = path.as_ref();
        let original = std::fs::read(path)?;
        let document = PatchDocument::load_with_mode(&original, self.mode)?;

        // Serialize through a scoped temp file and read it back
        let mut scratch = tempfile::tempfile()?;
        document.write_to(&mut scratch)?;
        scratch.seek(SeekFrom::Start(0))?;
        let mut serialized = Vec::with_capacity(original.len());
        scratch.read_to_end(&mut serialized)?;

        let result = compare(&document, &original, &serialized);
        if result.ok {
            debug!(path = %path.display(), bytes = original.len(), "round trip ok");
        } else {
            warn!(
                path = %path.display(),
                offset = ?result.mismatch_offset,
                region = ?result.region,
                "round trip mismatch"
            );
        }
        Ok((document, result))
    }

    /// Verify an in-memory preset
    pub fn verify_bytes(&self, original: &[u8]) -> Result<VerificationResult> {
        let document = PatchDocument::load_with_mode(original, self.mode)?;
        let serialized = document.serialize()?;
        Ok(compare(&document, original, &serialized))
    }
}

/// Compare `serialized` against `original`, classifying the first difference
/// by the layout of `document`
pub fn compare(document: &PatchDocument, original: &[u8], serialized: &[u8]) -> VerificationResult {
    let offset = first_difference(original, serialized);
    let layout = document.layout();
    let region = offset.map(|offset| {
        if offset >= original.len().min(serialized.len()) {
            Region::Length
        } else {
            layout.region_at(offset)
        }
    });

    VerificationResult {
        ok: offset.is_none(),
        mismatch_offset: offset,
        region,
        original_len: original.len(),
        serialized_len: serialized.len(),
        warnings: document.warnings().to_vec(),
    }
}

/// Offset of the first differing byte, or the shorter length when one input
/// is a prefix of the other
pub fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .or_else(|| (a.len() != b.len()).then(|| a.len().min(b.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FxpHeader, ProgramName};
    use std::io::Write;

    fn preset(trailer: &[u8]) -> Vec<u8> {
        let xml = b"<?xml version=\"1.0\"?><patch><parameters/></patch>";
        let mut header = FxpHeader::new(ProgramName::new("Verify").unwrap());
        header.chunk_size = xml.len() as i32;
        let mut bytes = header.pack().unwrap().to_vec();
        bytes.extend_from_slice(xml);
        bytes.extend_from_slice(trailer);
        bytes
    }

    #[test]
    fn test_first_difference() {
        assert_eq!(first_difference(b"abc", b"abc"), None);
        assert_eq!(first_difference(b"abc", b"abd"), Some(2));
        assert_eq!(first_difference(b"abc", b"ab"), Some(2));
        assert_eq!(first_difference(b"", b"x"), Some(0));
    }

    #[test]
    fn test_region_at() {
        let layout = RegionLayout {
            header: 60,
            pre_xml: 2,
            xml_payload: 10,
            post_xml: 1,
            wavetables: 5,
        };
        assert_eq!(layout.total(), 78);
        assert_eq!(layout.region_at(0), Region::Header);
        assert_eq!(layout.region_at(59), Region::Header);
        assert_eq!(layout.region_at(60), Region::PreXml);
        assert_eq!(layout.region_at(62), Region::XmlPayload);
        assert_eq!(layout.region_at(72), Region::PostXml);
        assert_eq!(layout.region_at(73), Region::Wavetables);
        assert_eq!(layout.region_at(78), Region::Length);
    }

    #[test]
    fn test_verify_bytes_ok() {
        let result = RoundTripVerifier::default()
            .verify_bytes(&preset(&[0xAB; 16]))
            .unwrap();
        assert!(result.ok);
        assert_eq!(result.mismatch_offset, None);
        assert_eq!(result.original_len, result.serialized_len);
        assert!(result.into_result().is_ok());
    }

    #[test]
    fn test_compare_reports_region() {
        let original = preset(b"WAVE");
        let mut document = PatchDocument::load_raw(&original).unwrap();
        document.set_wavetables(vec![b"WAVF".to_vec()]);
        let serialized = document.serialize().unwrap();

        let result = compare(&document, &original, &serialized);
        assert!(!result.ok);
        assert_eq!(result.mismatch_offset, Some(original.len() - 1));
        assert_eq!(result.region, Some(Region::Wavetables));
        assert!(matches!(
            result.into_result(),
            Err(FxpError::RoundTripMismatch {
                region: Region::Wavetables,
                ..
            })
        ));
    }

    #[test]
    fn test_compare_reports_length() {
        let original = preset(b"WAVE");
        let mut document = PatchDocument::load_raw(&original).unwrap();
        document.set_wavetables(Vec::new());
        let serialized = document.serialize().unwrap();

        let result = compare(&document, &original, &serialized);
        assert_eq!(result.mismatch_offset, Some(serialized.len()));
        assert_eq!(result.region, Some(Region::Length));
    }

    #[test]
    fn test_verify_file_leaves_source_untouched() {
        let bytes = preset(b"\x00\x01\x02");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let result = RoundTripVerifier::new(SplitMode::MarkerScanned)
            .verify(file.path())
            .unwrap();
        assert!(result.ok);
        assert_eq!(std::fs::read(file.path()).unwrap(), bytes);
    }

    #[test]
    fn test_verify_loaded_returns_document() {
        let bytes = preset(b"WAVE");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let (document, result) = RoundTripVerifier::default()
            .verify_loaded(file.path())
            .unwrap();
        assert!(result.ok);
        assert_eq!(document.wavetables(), &[b"WAVE".to_vec()]);
        assert_eq!(document.serialize().unwrap(), bytes);
    }

    #[test]
    fn test_verify_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = RoundTripVerifier::default().verify(dir.path().join("missing.fxp"));
        assert!(matches!(result, Err(FxpError::Io(_))));
    }
}
