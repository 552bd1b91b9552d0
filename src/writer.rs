// SPDX-License-Identifier: MIT
//! Preset writer for authoring and saving documents

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::PatchDocument;
use crate::error::{FxpError, Result};
use crate::format::{FxpHeader, MagicTag, ProgramName};

/// What gets written to `byteSize`
///
/// Producers disagree on this field; all three conventions load fine, this
/// only decides what we write. `chunkSize` is always the length of the
/// XML chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizePolicy {
    /// `byteSize = 0`
    #[default]
    Zero,

    /// `byteSize = chunkSize`
    XmlLength,

    /// `byteSize = chunkSize + total wavetable length`
    XmlAndWavetables,
}

/// Builder for preset files
pub struct PatchWriter {
    header: FxpHeader,
    xml_payload: Option<Vec<u8>>,
    wavetables: Vec<Vec<u8>>,
    size_policy: SizePolicy,
}

impl PatchWriter {
    /// Start a program-chunk preset with the given name
    pub fn new(prg_name: ProgramName) -> Self {
        Self::with_header(FxpHeader::new(prg_name))
    }

    /// Start from an existing header; sizes are recomputed on build
    pub fn with_header(header: FxpHeader) -> Self {
        Self {
            header,
            xml_payload: None,
            wavetables: Vec::new(),
            size_policy: SizePolicy::default(),
        }
    }

    pub fn size_policy(mut self, policy: SizePolicy) -> Self {
        self.size_policy = policy;
        self
    }

    pub fn magic(mut self, chunk_magic: MagicTag, fx_magic: MagicTag) -> Self {
        self.header.chunk_magic = chunk_magic;
        self.header.fx_magic = fx_magic;
        self
    }

    /// Set the opaque plugin identification fields
    pub fn plugin(mut self, version: i32, fx_id: i32, fx_version: i32, num_programs: i32) -> Self {
        self.header.version = version;
        self.header.fx_id = fx_id;
        self.header.fx_version = fx_version;
        self.header.num_programs = num_programs;
        self
    }

    /// Set the XML payload
    pub fn add_xml_payload(&mut self, data: Vec<u8>) -> Result<()> {
        if self.xml_payload.is_some() {
            return Err(FxpError::Format("XML payload already added".into()));
        }
        self.xml_payload = Some(data);
        Ok(())
    }

    /// Append a wavetable blob; blobs are written in insertion order
    pub fn add_wavetable(&mut self, data: Vec<u8>) {
        self.wavetables.push(data);
    }

    /// Build the document with sizes set under the configured policy
    pub fn build(self) -> Result<PatchDocument> {
        let xml_payload = self
            .xml_payload
            .ok_or_else(|| FxpError::Format("Missing XML payload".into()))?;

        let mut document =
            PatchDocument::from_parts(self.header, Vec::new(), xml_payload, Vec::new(), self.wavetables);
        document.refresh_sizes(self.size_policy)?;
        Ok(document)
    }

    /// Finalize and return the binary data
    pub fn finalize(self) -> Result<Vec<u8>> {
        self.build()?.serialize()
    }
}

/// Write a document to `path`
///
/// The bytes are fully serialized first and land in a temp file next to the
/// destination, which is then moved into place. A failure at any point
/// leaves no partial file behind.
pub fn write_file(document: &PatchDocument, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = document.serialize()?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| FxpError::Io(e.error))?;

    debug!(path = %path.display(), bytes = bytes.len(), "wrote preset");
    Ok(())
}
