//! Disassembler trait and error types for instruction decoding.
//!
//! This module defines the single-instruction decoding contract the gadget
//! search relies on. Backends (iced-x86, capstone) live in `crate::disasm`;
//! the search only ever sees this trait.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RopError;

/// Errors that can occur during disassembly operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DisassemblerError {
    /// Invalid instruction bytes
    InvalidInstruction(),
    /// Insufficient bytes for complete instruction
    InsufficientBytes(),
    /// Unsupported architecture for the selected backend
    UnsupportedArchitecture(),
    /// Internal disassembler error with message
    InternalError(String),
}

impl fmt::Display for DisassemblerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisassemblerError::InvalidInstruction() => write!(f, "InvalidInstruction"),
            DisassemblerError::InsufficientBytes() => write!(f, "InsufficientBytes"),
            DisassemblerError::UnsupportedArchitecture() => write!(f, "UnsupportedArchitecture"),
            DisassemblerError::InternalError(msg) => write!(f, "InternalError: {}", msg),
        }
    }
}

impl std::error::Error for DisassemblerError {}

/// Result type for disassembly operations
pub type DisassemblerResult<T> = Result<T, DisassemblerError>;

/// Architectures the gadget search supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    /// x86 (32-bit)
    X86,
    /// x86-64 (64-bit)
    X86_64,
    /// ARM (32-bit, A32 encoding)
    ARM,
    /// ARM64/AArch64 (64-bit)
    ARM64,
}

impl Architecture {
    /// Get the address size in bits for this architecture
    pub fn address_bits(&self) -> u8 {
        match self {
            Architecture::X86 | Architecture::ARM => 32,
            Architecture::X86_64 | Architecture::ARM64 => 64,
        }
    }

    /// Check if this is a 64-bit architecture
    pub fn is_64_bit(&self) -> bool {
        self.address_bits() == 64
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X86 => write!(f, "x86"),
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::ARM => write!(f, "arm"),
            Architecture::ARM64 => write!(f, "arm64"),
        }
    }
}

impl FromStr for Architecture {
    type Err = RopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x86" | "x32" | "i386" | "ia32" => Ok(Architecture::X86),
            "x64" | "x86_64" | "x86-64" | "amd64" => Ok(Architecture::X86_64),
            "arm" | "arm32" | "a32" => Ok(Architecture::ARM),
            "arm64" | "aarch64" => Ok(Architecture::ARM64),
            _ => Err(RopError::UnsupportedArchitecture(s.to_string())),
        }
    }
}

/// Byte order of the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    /// Little-endian byte order
    #[default]
    Little,
    /// Big-endian byte order
    Big,
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "Little"),
            Endianness::Big => write!(f, "Big"),
        }
    }
}

/// Assembly syntax used when rendering instructions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Syntax {
    #[default]
    Intel,
    /// AT&T syntax; only meaningful for x86 backends
    Att,
}

/// Control-flow class of a decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowKind {
    /// Falls through to the next instruction
    Next,
    ConditionalBranch,
    UnconditionalBranch,
    /// Direct call
    Call,
    Return,
    /// Jump through a register or memory operand
    IndirectBranch,
    /// Call through a register or memory operand
    IndirectCall,
    /// Interrupts, system calls, breakpoints and undefined-instruction traps
    Trap,
}

impl FlowKind {
    /// Whether an instruction of this class may end a gadget.
    pub fn terminates_gadget(&self) -> bool {
        matches!(
            self,
            FlowKind::Return | FlowKind::IndirectBranch | FlowKind::IndirectCall
        )
    }

    /// Whether execution unconditionally leaves the straight-line sequence.
    pub fn ends_flow(&self) -> bool {
        !matches!(self, FlowKind::Next | FlowKind::ConditionalBranch)
    }
}

/// One decoded instruction as seen by the gadget search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Encoded length in bytes
    pub length: usize,
    /// Canonical rendering, e.g. `pop eax`
    pub text: String,
    pub flow: FlowKind,
}

/// Core disassembler trait that provides a common interface for instruction decoding
pub trait Disassembler {
    /// Decode exactly one instruction from the start of `bytes`.
    ///
    /// `address` is the virtual address of `bytes[0]`; it only affects the
    /// rendering of PC-relative operands.
    fn decode(&self, bytes: &[u8], address: u64) -> DisassemblerResult<DecodedInstruction>;

    /// Classify the instruction at the start of `bytes` without rendering it.
    ///
    /// Returns the encoded length and flow class, or `None` when the bytes do
    /// not decode.
    fn flow_at(&self, bytes: &[u8], address: u64) -> Option<(usize, FlowKind)> {
        self.decode(bytes, address)
            .ok()
            .map(|insn| (insn.length, insn.flow))
    }

    /// Get the maximum instruction length for this architecture in bytes
    fn max_instruction_length(&self) -> usize;

    /// Required alignment of instruction start positions in bytes
    fn instruction_alignment(&self) -> usize {
        1
    }

    /// Get the architecture this disassembler supports
    fn architecture(&self) -> Architecture;

    /// Get the endianness this disassembler uses
    fn endianness(&self) -> Endianness {
        Endianness::Little
    }

    /// Get a human-readable name for this disassembler
    fn name(&self) -> &str {
        "Generic Disassembler"
    }
}
