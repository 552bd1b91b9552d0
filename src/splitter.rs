// SPDX-License-Identifier: MIT
//! Content boundary detection
//!
//! Partitions the bytes that follow the header into the pre-XML prefix, the
//! XML payload, post-XML padding and trailing wavetable data. Every input
//! byte lands in exactly one region, whichever mode is used.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{FxpError, Result};
use crate::format::FxpHeader;

/// Opening marker of the XML payload
pub const XML_START_MARKER: &[u8] = b"<?xml";

/// Closing marker of the patch root element
pub const XML_END_MARKER: &[u8] = b"</patch>";

/// How chunk boundaries are located
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitMode {
    /// Scan for `<?xml` and `</patch>`; declared sizes are only checked
    #[default]
    MarkerScanned,

    /// Trust `chunkSize`; truncates payloads written by stale-size producers
    LengthDeclared,
}

/// Header field a size check refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeField {
    ByteSize,
    ChunkSize,
}

impl fmt::Display for SizeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeField::ByteSize => f.write_str("byteSize"),
            SizeField::ChunkSize => f.write_str("chunkSize"),
        }
    }
}

/// A declared size that disagrees with the located content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMismatch {
    pub field: SizeField,
    pub declared: i64,
    pub actual: usize,
}

impl fmt::Display for SizeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} declares {} bytes, found {}",
            self.field, self.declared, self.actual
        )
    }
}

/// Recoverable findings recorded while splitting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitWarning {
    SizeMismatch(SizeMismatch),

    /// No `<?xml` marker; all bytes were kept as trailing data
    MissingXmlMarker,

    /// `<?xml` without a following `</patch>`; the payload runs to the end
    UnterminatedPatch,
}

impl fmt::Display for SplitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitWarning::SizeMismatch(m) => write!(f, "size mismatch: {}", m),
            SplitWarning::MissingXmlMarker => f.write_str("no <?xml marker after header"),
            SplitWarning::UnterminatedPatch => f.write_str("no </patch> after <?xml marker"),
        }
    }
}

/// Region boundaries within the post-header content
///
/// The ranges are contiguous and together cover the whole content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRegions {
    pub pre_xml: Range<usize>,
    pub xml_payload: Range<usize>,
    pub post_xml: Range<usize>,
    pub trailing: Range<usize>,
    pub warnings: Vec<SplitWarning>,
}

impl ChunkRegions {
    /// Length of everything between the header and the trailing data
    pub fn chunk_extent(&self) -> usize {
        self.post_xml.end
    }
}

/// Split post-header `content` according to `mode`
pub fn split(header: &FxpHeader, content: &[u8], mode: SplitMode) -> Result<ChunkRegions> {
    let mut regions = match mode {
        SplitMode::MarkerScanned => split_marker_scanned(header, content),
        SplitMode::LengthDeclared => split_length_declared(header, content)?,
    };

    if let Some(mismatch) = check_byte_size(header, &regions, content.len()) {
        regions.warnings.push(SplitWarning::SizeMismatch(mismatch));
    }

    debug_assert_eq!(regions.trailing.end, content.len());
    Ok(regions)
}

fn split_marker_scanned(header: &FxpHeader, content: &[u8]) -> ChunkRegions {
    let mut warnings = Vec::new();

    let Some(start) = find(content, XML_START_MARKER, 0) else {
        warnings.push(SplitWarning::MissingXmlMarker);
        return ChunkRegions {
            pre_xml: 0..0,
            xml_payload: 0..0,
            post_xml: 0..0,
            trailing: 0..content.len(),
            warnings,
        };
    };

    let xml_end = match find(content, XML_END_MARKER, start + XML_START_MARKER.len()) {
        Some(pos) => pos + XML_END_MARKER.len(),
        None => {
            warnings.push(SplitWarning::UnterminatedPatch);
            content.len()
        }
    };

    let declared = header.chunk_size;
    let mut post_end = xml_end;

    if declared != 0 {
        let declared_end = usize::try_from(declared).ok();
        match declared_end {
            // Producers count the chunk either from the end of the header or
            // from the `<?xml` marker
            Some(end) if end == xml_end || end == xml_end - start => {}
            Some(end) if end > xml_end && end <= content.len() && is_padding(&content[xml_end..end]) => {
                post_end = end;
            }
            _ => warnings.push(SplitWarning::SizeMismatch(SizeMismatch {
                field: SizeField::ChunkSize,
                declared: i64::from(declared),
                actual: xml_end,
            })),
        }
    }

    ChunkRegions {
        pre_xml: 0..start,
        xml_payload: start..xml_end,
        post_xml: xml_end..post_end,
        trailing: post_end..content.len(),
        warnings,
    }
}

fn split_length_declared(header: &FxpHeader, content: &[u8]) -> Result<ChunkRegions> {
    let declared = header.chunk_size;
    let end = usize::try_from(declared)
        .ok()
        .filter(|&end| end <= content.len())
        .ok_or(FxpError::SizeMismatch(SizeMismatch {
            field: SizeField::ChunkSize,
            declared: i64::from(declared),
            actual: content.len(),
        }))?;

    let mut warnings = Vec::new();
    let payload = &content[..end];
    if find(payload, XML_START_MARKER, 0).is_none() {
        warnings.push(SplitWarning::MissingXmlMarker);
    } else if find(payload, XML_END_MARKER, 0).is_none() {
        warnings.push(SplitWarning::UnterminatedPatch);
    }

    Ok(ChunkRegions {
        pre_xml: 0..0,
        xml_payload: 0..end,
        post_xml: end..end,
        trailing: end..content.len(),
        warnings,
    })
}

/// byteSize conventions seen in the wild: 0, chunk length, payload length,
/// or everything after the header
fn check_byte_size(
    header: &FxpHeader,
    regions: &ChunkRegions,
    content_len: usize,
) -> Option<SizeMismatch> {
    let declared = header.byte_size;
    if declared == 0 {
        return None;
    }

    let matches_known = usize::try_from(declared)
        .map(|size| {
            size == regions.chunk_extent()
                || size == regions.xml_payload.len()
                || size == content_len
        })
        .unwrap_or(false);

    (!matches_known).then_some(SizeMismatch {
        field: SizeField::ByteSize,
        declared: i64::from(declared),
        actual: content_len,
    })
}

fn is_padding(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0 || b.is_ascii_whitespace())
}

/// First occurrence of `needle` in `haystack` at or after `from`
pub(crate) fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}
