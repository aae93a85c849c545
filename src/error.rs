//! Error types for the ropscope gadget finder.
//!
//! This module provides structured error handling using thiserror. Format
//! parsers keep their own small error enums and convert into [`RopError`]
//! at the format boundary.

use thiserror::Error;

use crate::core::disassembler::DisassemblerError;
use crate::formats::elf::ElfError;
use crate::formats::pe::PeError;
use crate::io::error::IoError;

/// Main error type for ropscope operations.
#[derive(Debug, Error)]
pub enum RopError {
    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by the bounded file reader
    #[error("File error: {0}")]
    File(#[from] IoError),

    /// The leading magic word matches no supported executable container
    #[error("Format not recognized (magic {magic:#010x})")]
    UnrecognizedFormat { magic: u32 },

    /// Binary format parsing errors
    #[error("Invalid binary format: {0}")]
    InvalidFormat(String),

    /// Inconsistent structural metadata, naming the offending field
    #[error("Malformed {format} metadata in {field}: {message}")]
    Structural {
        format: &'static str,
        field: String,
        message: String,
    },

    /// Architecture unknown by name or not supported for this container
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    /// Disassembler backend could not be created
    #[error("Disassembler error: {0}")]
    Disassembler(#[from] DisassemblerError),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RopError {
    /// Build a structural error for the named format and field.
    pub fn structural(
        format: &'static str,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        RopError::Structural {
            format,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<ElfError> for RopError {
    fn from(err: ElfError) -> Self {
        match err {
            ElfError::InvalidMagic => RopError::InvalidFormat(err.to_string()),
            ElfError::UnsupportedArchitecture(machine) => {
                RopError::UnsupportedArchitecture(format!("ELF e_machine {:#x}", machine))
            }
            other => RopError::structural("ELF", other.field(), other.to_string()),
        }
    }
}

impl From<PeError> for RopError {
    fn from(err: PeError) -> Self {
        match err {
            PeError::InvalidDosSignature | PeError::InvalidNtSignature => {
                RopError::InvalidFormat(err.to_string())
            }
            PeError::UnsupportedMachine(machine) => {
                RopError::UnsupportedArchitecture(format!("PE machine {:#06x}", machine))
            }
            other => RopError::structural("PE", other.field(), other.to_string()),
        }
    }
}

/// Result type alias for ropscope operations
pub type Result<T> = std::result::Result<T, RopError>;
