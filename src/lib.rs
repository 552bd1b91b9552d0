// SPDX-License-Identifier: MIT
//! # FXP Preset Container
//!
//! Byte-exact reader and writer for FXP program-chunk presets: a fixed binary
//! header, an embedded XML document and trailing opaque wavetable data.
//!
//! ## Format Overview
//!
//! A preset is loaded into a [`PatchDocument`] that keeps every byte of the
//! input in one of five regions. Saving concatenates those regions again, so
//! `serialize(load(bytes)) == bytes` for every accepted input, even though the
//! embedded XML is never re-encoded.
//!
//! ## Format Specification
//!
//! ```text
//! FXP Program Chunk
//! =================
//!
//! Header (60 bytes, big-endian):
//! - chunkMagic:  "CcnK" (4 bytes)
//! - byteSize:    i32, producer-specific (0, XML length or XML + wavetables)
//! - fxMagic:     "FPCh" (4 bytes)
//! - version:     i32
//! - fxId:        i32
//! - fxVersion:   i32
//! - numPrograms: i32
//! - prgName:     28 bytes, NUL-padded UTF-8
//! - chunkSize:   i32, declared XML chunk length
//!
//! Content (variable size):
//! - pre-XML bytes (normally empty)
//! - XML payload: "<?xml" ... "</patch>"
//! - post-XML padding (normally empty)
//! - wavetable data (opaque)
//! ```
//!
//! Declared sizes are unreliable in practice, so the default [`SplitMode`]
//! scans for the XML markers and only checks `chunkSize`/`byteSize`, recording
//! a [`SplitWarning`] when they disagree.
//!
//! ## Usage
//!
//! ```rust
//! use fxp_preset::{HumanReadableView, PatchDocument, PatchWriter, ProgramName};
//!
//! let mut writer = PatchWriter::new(ProgramName::new("Lead1").unwrap());
//! writer
//!     .add_xml_payload(br#"<?xml version="1.0"?><patch><parameters><cutoff type="2" value="0.5"/></parameters></patch>"#.to_vec())
//!     .unwrap();
//! writer.add_wavetable(vec![0u8; 16]);
//! let data = writer.finalize().unwrap();
//!
//! let document = PatchDocument::load_raw(&data).unwrap();
//! assert_eq!(document.serialize().unwrap(), data);
//!
//! let view = HumanReadableView::from_document(&document).unwrap();
//! assert_eq!(view.parameters.get("cutoff").unwrap().value.as_deref(), Some("0.5"));
//! ```

pub mod batch;
pub mod config;
pub mod document;
pub mod error;
pub mod format;
pub mod reader;
pub mod splitter;
pub mod verify;
pub mod view;
pub mod writer;
pub mod xml;

// Re-export main types
pub use config::{ConfigError, ToolConfig};
pub use document::{Fidelity, PatchDocument};
pub use error::{FxpError, Result};
pub use format::{FxpHeader, MagicTag, ProgramName, CHUNK_MAGIC, FXP_HEADER_SIZE, PROGRAM_CHUNK_MAGIC};
pub use reader::{PatchReader, PresetStats};
pub use splitter::{SizeField, SizeMismatch, SplitMode, SplitWarning};
pub use verify::{Region, RoundTripVerifier, VerificationResult};
pub use view::{HumanReadableView, Parameter, ParameterMap, PatchMeta, WriteStrategy};
pub use writer::{PatchWriter, SizePolicy};
