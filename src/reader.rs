// SPDX-License-Identifier: MIT
//! Preset reader for loading documents from files and byte sources

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::document::PatchDocument;
use crate::error::Result;
use crate::format::FXP_HEADER_SIZE;
use crate::splitter::SplitMode;

/// Loads presets with a fixed split mode
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchReader {
    mode: SplitMode,
}

impl PatchReader {
    pub fn new(mode: SplitMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SplitMode {
        self.mode
    }

    pub fn read_slice(&self, data: &[u8]) -> Result<PatchDocument> {
        PatchDocument::load_with_mode(data, self.mode)
    }

    pub fn read_from<R: Read>(&self, mut source: R) -> Result<PatchDocument> {
        PatchDocument::load(&mut source, self.mode)
    }

    /// Read a whole file; the handle is closed before this returns
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<PatchDocument> {
        let file = File::open(path.as_ref())?;
        self.read_from(BufReader::new(file))
    }
}

/// Region sizes of a loaded preset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetStats {
    pub total_size: usize,
    pub header_size: usize,
    pub pre_xml_size: usize,
    pub xml_size: usize,
    pub post_xml_size: usize,
    pub wavetable_sizes: Vec<usize>,
    pub warning_count: usize,
}

impl PresetStats {
    pub fn of(document: &PatchDocument) -> Self {
        let layout = document.layout();
        Self {
            total_size: layout.total(),
            header_size: FXP_HEADER_SIZE,
            pre_xml_size: layout.pre_xml,
            xml_size: layout.xml_payload,
            post_xml_size: layout.post_xml,
            wavetable_sizes: document.wavetables().iter().map(Vec::len).collect(),
            warning_count: document.warnings().len(),
        }
    }

    /// Share of the file taken by the XML payload
    pub fn xml_ratio(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        self.xml_size as f64 / self.total_size as f64
    }
}
