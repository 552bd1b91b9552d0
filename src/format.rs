// SPDX-License-Identifier: MIT
//! FXP program-chunk header format
//!
//! Defines the fixed 60-byte big-endian header and its codec.

use std::fmt;
use std::io::{Read, Write};

use crate::error::{FxpError, Result};

/// Container chunk magic ("CcnK")
pub const CHUNK_MAGIC: &[u8; 4] = b"CcnK";

/// Sub-format magic for opaque program chunks ("FPCh")
pub const PROGRAM_CHUNK_MAGIC: &[u8; 4] = b"FPCh";

/// Header size in bytes
pub const FXP_HEADER_SIZE: usize = 60;

/// Width of the NUL-padded program name field
pub const PRG_NAME_SIZE: usize = 28;

/// A 4-byte format identifier stored verbatim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MagicTag([u8; 4]);

impl MagicTag {
    /// Wrap raw tag bytes, rejecting tags that are not readable as text
    pub fn new(bytes: [u8; 4]) -> Result<Self> {
        std::str::from_utf8(&bytes).map_err(|e| {
            FxpError::Format(format!("magic tag {:02x?} is not text: {}", bytes, e))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Validated in `new`
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for MagicTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Program name that always fits the 28-byte header field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ProgramName(String);

impl ProgramName {
    pub const MAX_LENGTH: usize = PRG_NAME_SIZE;

    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.len() > Self::MAX_LENGTH {
            return Err(FxpError::Format(format!(
                "program name too long: {} > {} bytes",
                value.len(),
                Self::MAX_LENGTH
            )));
        }
        // Trailing NULs are indistinguishable from field padding
        if value.ends_with('\0') {
            return Err(FxpError::Format(
                "program name cannot end with a NUL byte".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Decode the raw header field, stripping trailing NUL padding
    pub fn from_field(field: &[u8]) -> Result<Self> {
        let end = field
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);
        let stripped = &field[..end];

        if stripped.len() > Self::MAX_LENGTH {
            return Err(FxpError::Format(format!(
                "program name too long: {} > {} bytes",
                stripped.len(),
                Self::MAX_LENGTH
            )));
        }

        let name = std::str::from_utf8(stripped)
            .map_err(|e| FxpError::Format(format!("program name is not UTF-8: {}", e)))?;
        Ok(Self(name.to_string()))
    }

    /// Encode into the fixed-width header field
    pub fn to_field(&self) -> [u8; PRG_NAME_SIZE] {
        let mut field = [0u8; PRG_NAME_SIZE];
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
        field
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ProgramName {
    type Err = FxpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// FXP file header (60 bytes, big-endian)
///
/// Numeric fields are carried as opaque values; only their binary shape is
/// checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FxpHeader {
    /// Container magic, normally "CcnK"
    pub chunk_magic: MagicTag,

    /// Declared payload size; producers disagree on its meaning
    pub byte_size: i32,

    /// Sub-format magic, normally "FPCh"
    pub fx_magic: MagicTag,

    pub version: i32,
    pub fx_id: i32,
    pub fx_version: i32,
    pub num_programs: i32,

    pub prg_name: ProgramName,

    /// Declared length of the XML payload following the header
    pub chunk_size: i32,
}

impl FxpHeader {
    /// Create a program-chunk header with zeroed sizes
    pub fn new(prg_name: ProgramName) -> Self {
        Self {
            chunk_magic: MagicTag(*CHUNK_MAGIC),
            byte_size: 0,
            fx_magic: MagicTag(*PROGRAM_CHUNK_MAGIC),
            version: 1,
            fx_id: 0,
            fx_version: 1,
            num_programs: 1,
            prg_name,
            chunk_size: 0,
        }
    }

    /// Unpack a header from exactly 60 raw bytes
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != FXP_HEADER_SIZE {
            return Err(FxpError::Format(format!(
                "header must be {} bytes, got {}",
                FXP_HEADER_SIZE,
                bytes.len()
            )));
        }

        Ok(Self {
            chunk_magic: MagicTag::new(tag_at(bytes, 0))?,
            byte_size: i32_at(bytes, 4),
            fx_magic: MagicTag::new(tag_at(bytes, 8))?,
            version: i32_at(bytes, 12),
            fx_id: i32_at(bytes, 16),
            fx_version: i32_at(bytes, 20),
            num_programs: i32_at(bytes, 24),
            prg_name: ProgramName::from_field(&bytes[28..28 + PRG_NAME_SIZE])?,
            chunk_size: i32_at(bytes, 56),
        })
    }

    /// Pack the header into its 60-byte wire form
    pub fn pack(&self) -> Result<[u8; FXP_HEADER_SIZE]> {
        let mut buffer = Vec::with_capacity(FXP_HEADER_SIZE);
        self.write_to_buffer(&mut buffer)?;

        assert_eq!(
            buffer.len(),
            FXP_HEADER_SIZE,
            "packed header must be exactly {} bytes",
            FXP_HEADER_SIZE
        );

        let mut bytes = [0u8; FXP_HEADER_SIZE];
        bytes.copy_from_slice(&buffer);
        Ok(bytes)
    }

    /// Append the packed header to a buffer
    pub fn write_to_buffer(&self, buffer: &mut Vec<u8>) -> Result<()> {
        if self.prg_name.as_str().len() > PRG_NAME_SIZE {
            return Err(FxpError::Format(format!(
                "program name too long: {} > {} bytes",
                self.prg_name.as_str().len(),
                PRG_NAME_SIZE
            )));
        }

        buffer.reserve(FXP_HEADER_SIZE);
        buffer.extend_from_slice(self.chunk_magic.as_bytes());
        buffer.extend_from_slice(&self.byte_size.to_be_bytes());
        buffer.extend_from_slice(self.fx_magic.as_bytes());
        buffer.extend_from_slice(&self.version.to_be_bytes());
        buffer.extend_from_slice(&self.fx_id.to_be_bytes());
        buffer.extend_from_slice(&self.fx_version.to_be_bytes());
        buffer.extend_from_slice(&self.num_programs.to_be_bytes());
        buffer.extend_from_slice(&self.prg_name.to_field());
        buffer.extend_from_slice(&self.chunk_size.to_be_bytes());
        Ok(())
    }

    /// Read header from a reader
    ///
    /// A source shorter than the header is a format error, not an I/O error.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; FXP_HEADER_SIZE];
        reader.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                FxpError::Format(format!(
                    "fewer than {} bytes available for the header",
                    FXP_HEADER_SIZE
                ))
            } else {
                FxpError::Io(e)
            }
        })?;
        Self::unpack(&header)
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.pack()?)?;
        Ok(())
    }

    /// Whether both magic tags carry the standard program-chunk values
    #[inline]
    pub fn is_program_chunk(&self) -> bool {
        self.chunk_magic.as_bytes() == CHUNK_MAGIC && self.fx_magic.as_bytes() == PROGRAM_CHUNK_MAGIC
    }
}

#[inline]
fn tag_at(bytes: &[u8], offset: usize) -> [u8; 4] {
    [
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]
}

#[inline]
fn i32_at(bytes: &[u8], offset: usize) -> i32 {
    i32::from_be_bytes(tag_at(bytes, offset))
}
