// SPDX-License-Identifier: MIT
//! In-memory preset document
//!
//! A `PatchDocument` owns the header and every byte that followed it, split
//! into four ordered regions. Serializing is a plain concatenation of those
//! regions, which is what makes byte-exact round trips possible without ever
//! re-encoding the XML.

use std::io::{Read, Write};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{FxpError, Result};
use crate::format::{FxpHeader, FXP_HEADER_SIZE};
use crate::splitter::{self, SplitMode, SplitWarning};
use crate::verify::RegionLayout;
use crate::writer::SizePolicy;
use crate::xml::XmlTree;

/// How closely a document reflects the bytes it was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fidelity {
    /// Loaded without modification; serializes to the original bytes
    Exact,

    /// XML payload re-printed and sizes recomputed
    Reinterpreted,

    /// Built or modified by the caller
    Edited,
}

/// A parsed preset: header, pre-XML bytes, XML payload, post-XML bytes and
/// trailing wavetable blobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDocument {
    header: FxpHeader,
    pre_xml: Vec<u8>,
    xml_payload: Vec<u8>,
    post_xml: Vec<u8>,
    wavetables: Vec<Vec<u8>>,
    warnings: Vec<SplitWarning>,
    fidelity: Fidelity,
}

impl PatchDocument {
    /// Assemble a document from already separated parts
    pub fn from_parts(
        header: FxpHeader,
        pre_xml: Vec<u8>,
        xml_payload: Vec<u8>,
        post_xml: Vec<u8>,
        wavetables: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            header,
            pre_xml,
            xml_payload,
            post_xml,
            wavetables,
            warnings: Vec::new(),
            fidelity: Fidelity::Edited,
        }
    }

    /// Load from a byte source, locating the XML payload with `mode`
    pub fn load<R: Read>(source: &mut R, mode: SplitMode) -> Result<Self> {
        let header = FxpHeader::read_from(source)?;

        let mut content = Vec::new();
        source.read_to_end(&mut content)?;

        let regions = splitter::split(&header, &content, mode)?;
        for warning in &regions.warnings {
            warn!(program = %header.prg_name, "{}", warning);
        }

        let trailing = &content[regions.trailing.clone()];
        let wavetables = if trailing.is_empty() {
            Vec::new()
        } else {
            vec![trailing.to_vec()]
        };

        let document = Self {
            pre_xml: content[regions.pre_xml].to_vec(),
            xml_payload: content[regions.xml_payload].to_vec(),
            post_xml: content[regions.post_xml].to_vec(),
            wavetables,
            warnings: regions.warnings,
            fidelity: Fidelity::Exact,
            header,
        };

        debug!(
            program = %document.header.prg_name,
            pre_xml = document.pre_xml.len(),
            xml = document.xml_payload.len(),
            post_xml = document.post_xml.len(),
            wavetables = document.wavetable_len(),
            "loaded preset"
        );

        Ok(document)
    }

    /// Byte-preserving load using marker scanning
    pub fn load_raw(bytes: &[u8]) -> Result<Self> {
        Self::load_with_mode(bytes, SplitMode::MarkerScanned)
    }

    pub fn load_with_mode(bytes: &[u8], mode: SplitMode) -> Result<Self> {
        let mut source = bytes;
        Self::load(&mut source, mode)
    }

    /// Structural load: the XML payload is parsed and printed again, and the
    /// declared sizes are rewritten under `policy`
    ///
    /// The result generally does not serialize to the input bytes.
    pub fn load_and_reinterpret(bytes: &[u8], policy: SizePolicy) -> Result<Self> {
        let mut document = Self::load_raw(bytes)?;
        let tree = XmlTree::parse(&document.xml_payload)?;
        document.xml_payload = tree.print()?;
        document.refresh_sizes(policy)?;
        document.fidelity = Fidelity::Reinterpreted;
        Ok(document)
    }

    /// Concatenate header and regions in file order
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.layout().total());
        self.header.write_to_buffer(&mut buffer)?;
        buffer.extend_from_slice(&self.pre_xml);
        buffer.extend_from_slice(&self.xml_payload);
        buffer.extend_from_slice(&self.post_xml);
        for blob in &self.wavetables {
            buffer.extend_from_slice(blob);
        }

        debug_assert_eq!(buffer.len(), self.layout().total());
        Ok(buffer)
    }

    /// Serialize into a writer
    ///
    /// The header is packed before anything is written, so a header error
    /// leaves the sink untouched.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let header = self.header.pack()?;
        writer.write_all(&header)?;
        writer.write_all(&self.pre_xml)?;
        writer.write_all(&self.xml_payload)?;
        writer.write_all(&self.post_xml)?;
        for blob in &self.wavetables {
            writer.write_all(blob)?;
        }
        Ok(())
    }

    /// Rewrite `chunkSize` and `byteSize` from the current regions
    ///
    /// `chunkSize` covers everything between header and wavetables;
    /// `byteSize` follows `policy`.
    pub fn refresh_sizes(&mut self, policy: SizePolicy) -> Result<()> {
        let chunk = self.pre_xml.len() + self.xml_payload.len() + self.post_xml.len();
        let byte_size = match policy {
            SizePolicy::Zero => 0,
            SizePolicy::XmlLength => chunk,
            SizePolicy::XmlAndWavetables => chunk + self.wavetable_len(),
        };

        let new_chunk_size = to_i32(chunk, "chunkSize")?;
        let new_byte_size = to_i32(byte_size, "byteSize")?;
        if new_chunk_size != self.header.chunk_size || new_byte_size != self.header.byte_size {
            self.header.chunk_size = new_chunk_size;
            self.header.byte_size = new_byte_size;
            self.touch();
        }
        Ok(())
    }

    pub fn header(&self) -> &FxpHeader {
        &self.header
    }

    pub fn pre_xml(&self) -> &[u8] {
        &self.pre_xml
    }

    pub fn xml_payload(&self) -> &[u8] {
        &self.xml_payload
    }

    pub fn post_xml(&self) -> &[u8] {
        &self.post_xml
    }

    pub fn wavetables(&self) -> &[Vec<u8>] {
        &self.wavetables
    }

    /// Warnings recorded while splitting the loaded bytes
    pub fn warnings(&self) -> &[SplitWarning] {
        &self.warnings
    }

    pub fn fidelity(&self) -> Fidelity {
        self.fidelity
    }

    /// Replace the header; sizes are not recomputed
    pub fn set_header(&mut self, header: FxpHeader) {
        self.header = header;
        self.touch();
    }

    /// Replace the XML payload wholesale
    ///
    /// Declared sizes stay as they are until `refresh_sizes` is called.
    pub fn set_xml_payload(&mut self, xml_payload: Vec<u8>) {
        self.xml_payload = xml_payload;
        self.touch();
    }

    /// Replace the wavetable blobs wholesale
    pub fn set_wavetables(&mut self, wavetables: Vec<Vec<u8>>) {
        self.wavetables = wavetables;
        self.touch();
    }

    /// Replace the wavetables, keeping the header's size convention
    ///
    /// `chunkSize` is left alone. `byteSize` is rewritten only when it
    /// counted the old wavetables, so it keeps counting them. Identical blobs
    /// leave the document untouched. Returns whether anything changed.
    pub fn swap_wavetables(&mut self, wavetables: Vec<Vec<u8>>) -> Result<bool> {
        if self.wavetables == wavetables {
            return Ok(false);
        }

        let extent = self.pre_xml.len() + self.xml_payload.len() + self.post_xml.len();
        let old_len = self.wavetable_len();
        let counted_wavetables =
            old_len > 0 && usize::try_from(self.header.byte_size).ok() == Some(extent + old_len);

        if counted_wavetables {
            let new_len: usize = wavetables.iter().map(Vec::len).sum();
            self.header.byte_size = to_i32(extent + new_len, "byteSize")?;
        }
        self.wavetables = wavetables;
        self.touch();
        Ok(true)
    }

    /// Total length of all wavetable blobs
    pub fn wavetable_len(&self) -> usize {
        self.wavetables.iter().map(Vec::len).sum()
    }

    /// Region boundaries of the serialized form
    pub fn layout(&self) -> RegionLayout {
        RegionLayout {
            header: FXP_HEADER_SIZE,
            pre_xml: self.pre_xml.len(),
            xml_payload: self.xml_payload.len(),
            post_xml: self.post_xml.len(),
            wavetables: self.wavetable_len(),
        }
    }

    /// SHA-256 of each wavetable blob, hex encoded
    pub fn wavetable_digests(&self) -> Vec<String> {
        self.wavetables
            .iter()
            .map(|blob| hex::encode(Sha256::digest(blob)))
            .collect()
    }

    fn touch(&mut self) {
        if self.fidelity == Fidelity::Exact {
            self.fidelity = Fidelity::Edited;
        }
    }
}

fn to_i32(size: usize, field: &str) -> Result<i32> {
    i32::try_from(size)
        .map_err(|_| FxpError::Format(format!("{} of {} bytes does not fit the header", field, size)))
}
