//! Executable container formats.
//!
//! The format is picked from the leading magic word. Every format reduces its
//! metadata to a list of [`ExecRegion`]s, which is all the search needs:
//! where executable bytes live in the file and where they are mapped.

pub mod elf;
pub mod macho;
pub mod pe;
pub mod raw;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::disassembler::{Architecture, Endianness};
use crate::core::section::Section;
use crate::error::{Result, RopError};

use elf::ElfFormat;
use macho::MachOFormat;
use pe::PeFormat;
use raw::RawFormat;

pub const ELF_MAGIC_WORD: u32 = 0x464C_457F;
pub const MZ_MAGIC: u16 = 0x5A4D;
pub const MACHO_MAGIC_32: u32 = 0xFEED_FACE;
pub const MACHO_MAGIC_64: u32 = 0xFEED_FACF;
pub const MACHO_CIGAM_32: u32 = 0xCEFA_EDFE;
pub const MACHO_CIGAM_64: u32 = 0xCFFA_EDFE;

/// Supported container kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatKind {
    Elf,
    Pe,
    MachO,
    Raw,
}

impl FormatKind {
    /// Display name, also used as the format of structural errors
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::Elf => "ELF",
            FormatKind::Pe => "PE",
            FormatKind::MachO => "Mach-O",
            FormatKind::Raw => "Raw",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identify a container from its first four bytes read as a little-endian word.
pub fn identify(magic: u32) -> Option<FormatKind> {
    match magic {
        ELF_MAGIC_WORD => Some(FormatKind::Elf),
        MACHO_MAGIC_32 | MACHO_MAGIC_64 | MACHO_CIGAM_32 | MACHO_CIGAM_64 => {
            Some(FormatKind::MachO)
        }
        m if (m & 0xFFFF) as u16 == MZ_MAGIC => Some(FormatKind::Pe),
        _ => None,
    }
}

/// How much header detail `display_information` prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl From<u8> for VerbosityLevel {
    fn from(level: u8) -> Self {
        match level {
            0 | 1 => VerbosityLevel::Low,
            2 => VerbosityLevel::Medium,
            _ => VerbosityLevel::High,
        }
    }
}

/// A file-backed executable region and where it is mapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRegion {
    pub name: String,
    /// Raw file offset of the first byte
    pub offset: u64,
    pub size: u64,
    /// Virtual address of the first byte
    pub va: u64,
}

impl fmt::Display for ExecRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} offset {:#010x} size {:#x} va {:#x}",
            self.name, self.offset, self.size, self.va
        )
    }
}

/// The container a program was loaded from
#[derive(Debug, Clone)]
pub enum ExecutableFormat {
    Elf(ElfFormat),
    Pe(PeFormat),
    MachO(MachOFormat),
    Raw(RawFormat),
}

impl ExecutableFormat {
    /// Detect and parse the container held in `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let magic = data
            .get(..4)
            .and_then(|prefix| prefix.try_into().ok())
            .map_or(0, u32::from_le_bytes);
        Self::from_magic(magic, data)
    }

    /// Parse `data` as the container `magic` identifies.
    pub fn from_magic(magic: u32, data: &[u8]) -> Result<Self> {
        let format = match identify(magic) {
            Some(FormatKind::Elf) => ExecutableFormat::Elf(ElfFormat::parse(data)?),
            Some(FormatKind::Pe) => ExecutableFormat::Pe(PeFormat::parse(data)?),
            Some(FormatKind::MachO) => ExecutableFormat::MachO(MachOFormat::parse(data)?),
            Some(FormatKind::Raw) | None => return Err(RopError::UnrecognizedFormat { magic }),
        };

        info!(
            format = %format.kind(),
            regions = format.regions().len(),
            "Parsed executable format"
        );
        Ok(format)
    }

    /// Treat `size` bytes as one raw region loaded at `base`.
    pub fn raw(size: usize, base: u64) -> Self {
        ExecutableFormat::Raw(RawFormat::new(size, base))
    }

    pub fn kind(&self) -> FormatKind {
        match self {
            ExecutableFormat::Elf(_) => FormatKind::Elf,
            ExecutableFormat::Pe(_) => FormatKind::Pe,
            ExecutableFormat::MachO(_) => FormatKind::MachO,
            ExecutableFormat::Raw(_) => FormatKind::Raw,
        }
    }

    pub fn name(&self) -> String {
        self.kind().to_string()
    }

    pub fn regions(&self) -> &[ExecRegion] {
        match self {
            ExecutableFormat::Elf(f) => f.regions(),
            ExecutableFormat::Pe(f) => f.regions(),
            ExecutableFormat::MachO(f) => f.regions(),
            ExecutableFormat::Raw(f) => f.regions(),
        }
    }

    /// Borrow every executable region of `data` as a [`Section`].
    ///
    /// A region that does not fit inside the file is an error; it is never
    /// clipped.
    pub fn executable_sections<'a>(&'a self, data: &'a [u8]) -> Result<Vec<Section<'a>>> {
        let format = self.kind().as_str();

        self.regions()
            .iter()
            .map(|region| {
                let bytes = usize::try_from(region.offset)
                    .ok()
                    .zip(usize::try_from(region.size).ok())
                    .and_then(|(start, len)| data.get(start..start.checked_add(len)?))
                    .ok_or_else(|| {
                        RopError::structural(
                            format,
                            format!("{} offset/size", region.name),
                            format!(
                                "region {:#x}+{:#x} lies outside the file ({:#x} bytes)",
                                region.offset,
                                region.size,
                                data.len()
                            ),
                        )
                    })?;
                debug!(section = %region.name, offset = region.offset, size = region.size, "Executable section");
                Ok(Section::new(&region.name, region.offset, region.va, bytes))
            })
            .collect()
    }

    /// Map a raw file offset inside the section starting at
    /// `section_raw_offset` to its virtual address.
    ///
    /// Regions are looked up by raw offset, so the first region wins when
    /// several share one. Gadget search uses [`Section::va`] instead.
    pub fn raw_offset_to_va(&self, raw_offset: u64, section_raw_offset: u64) -> u64 {
        match self
            .regions()
            .iter()
            .find(|r| r.offset == section_raw_offset)
        {
            Some(region) => region
                .va
                .wrapping_add(raw_offset.wrapping_sub(section_raw_offset)),
            None => match self {
                ExecutableFormat::Raw(raw) => raw.base().wrapping_add(raw_offset),
                _ => raw_offset,
            },
        }
    }

    /// Architecture named by the container headers.
    ///
    /// A raw blob carries none, so the caller must supply one.
    pub fn resolve_architecture(&self) -> Result<Architecture> {
        match self {
            ExecutableFormat::Elf(f) => Ok(f.architecture()?),
            ExecutableFormat::Pe(f) => Ok(f.architecture()?),
            ExecutableFormat::MachO(f) => f.architecture(),
            ExecutableFormat::Raw(_) => Err(RopError::InvalidInput(
                "a raw blob needs an explicit architecture".to_string(),
            )),
        }
    }

    pub fn endianness(&self) -> Endianness {
        match self {
            ExecutableFormat::Elf(f) => f.endianness(),
            ExecutableFormat::MachO(f) => f.endianness(),
            ExecutableFormat::Pe(_) | ExecutableFormat::Raw(_) => Endianness::Little,
        }
    }

    pub fn display_information(&self, level: VerbosityLevel) -> String {
        match self {
            ExecutableFormat::Elf(f) => f.display_information(level),
            ExecutableFormat::Pe(f) => f.display_information(level),
            ExecutableFormat::MachO(f) => f.display_information(level),
            ExecutableFormat::Raw(f) => f.display_information(level),
        }
    }
}
