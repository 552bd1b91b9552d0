// SPDX-License-Identifier: MIT
//! Error taxonomy shared by every stage of the preset pipeline

use crate::splitter::SizeMismatch;
use crate::verify::Region;

/// Errors that can occur while loading, converting or saving a preset
#[derive(Debug, thiserror::Error)]
pub enum FxpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Size mismatch: {0}")]
    SizeMismatch(SizeMismatch),

    #[error("Malformed XML payload: {0}")]
    MalformedXml(String),

    #[error("Malformed interchange form: {0}")]
    MalformedInterchange(String),

    #[error("Round trip mismatch at byte {offset} ({region})")]
    RoundTripMismatch { offset: usize, region: Region },
}

impl FxpError {
    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            FxpError::Io(_) => "io",
            FxpError::Format(_) => "format",
            FxpError::SizeMismatch(_) => "size-mismatch",
            FxpError::MalformedXml(_) => "malformed-xml",
            FxpError::MalformedInterchange(_) => "malformed-interchange",
            FxpError::RoundTripMismatch { .. } => "round-trip-mismatch",
        }
    }
}

impl From<quick_xml::Error> for FxpError {
    fn from(e: quick_xml::Error) -> Self {
        FxpError::MalformedXml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for FxpError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        FxpError::MalformedXml(e.to_string())
    }
}

impl From<serde_json::Error> for FxpError {
    fn from(e: serde_json::Error) -> Self {
        FxpError::MalformedInterchange(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FxpError>;
