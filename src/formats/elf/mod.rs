//! ELF (Executable and Linkable Format) parser
//!
//! Only the parts a gadget search needs are parsed: the file header, the
//! section header table (with names) and the program header table.

pub mod headers;
pub mod sections;
pub mod segments;
pub mod types;
pub mod utils;

use std::fmt::Write as _;

use headers::parse_header;
use sections::{parse_sections, NamedSection};
use segments::parse_segments;
pub use types::*;

use crate::core::disassembler::{Architecture, Endianness};
use crate::formats::{ExecRegion, VerbosityLevel};

/// Parsed ELF metadata
#[derive(Debug, Clone)]
pub struct ElfFormat {
    header: ElfHeader,
    sections: Vec<NamedSection>,
    segments: Vec<ProgramHeader>,
    regions: Vec<ExecRegion>,
}

impl ElfFormat {
    /// Parse ELF metadata from raw file bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = parse_header(data)?;
        let sections = parse_sections(data, &header)?;
        let segments = parse_segments(data, &header)?;
        let regions = executable_regions(&sections, &segments);

        Ok(Self {
            header,
            sections,
            segments,
            regions,
        })
    }

    pub fn header(&self) -> &ElfHeader {
        &self.header
    }

    pub fn sections(&self) -> &[NamedSection] {
        &self.sections
    }

    pub fn segments(&self) -> &[ProgramHeader] {
        &self.segments
    }

    pub fn regions(&self) -> &[ExecRegion] {
        &self.regions
    }

    pub fn architecture(&self) -> Result<Architecture> {
        match self.header.e_machine {
            EM_386 => Ok(Architecture::X86),
            EM_X86_64 => Ok(Architecture::X86_64),
            EM_ARM => Ok(Architecture::ARM),
            EM_AARCH64 => Ok(Architecture::ARM64),
            other => Err(ElfError::UnsupportedArchitecture(other)),
        }
    }

    pub fn endianness(&self) -> Endianness {
        if self.header.ident.data.is_little_endian() {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    pub fn display_information(&self, level: VerbosityLevel) -> String {
        let h = &self.header;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "ELF{} {} ({}), {} endian",
            h.ident.class.bits(),
            h.type_name(),
            h.machine_name(),
            self.endianness()
        );
        let _ = writeln!(out, "Entry point: {:#x}", h.e_entry);

        if level >= VerbosityLevel::Medium {
            let _ = writeln!(out, "Executable regions:");
            for region in &self.regions {
                let _ = writeln!(out, "  {}", region);
            }
        }

        if level >= VerbosityLevel::High {
            let _ = writeln!(
                out,
                "OS/ABI: {}  Flags: {:#x}  Header version: {}",
                h.ident.osabi, h.e_flags, h.e_version
            );
            let _ = writeln!(
                out,
                "Section headers: {} at {:#x} (entsize {}, shstrndx {})",
                h.e_shnum, h.e_shoff, h.e_shentsize, h.e_shstrndx
            );
            for section in &self.sections {
                let sh = &section.header;
                let _ = writeln!(
                    out,
                    "  {:<20} type {:<3} flags {:#06x} addr {:#010x} off {:#08x} size {:#x}",
                    section.name, sh.sh_type, sh.sh_flags, sh.sh_addr, sh.sh_offset, sh.sh_size
                );
            }
            let _ = writeln!(
                out,
                "Program headers: {} at {:#x} (entsize {})",
                h.e_phnum, h.e_phoff, h.e_phentsize
            );
            for ph in &self.segments {
                let _ = writeln!(
                    out,
                    "  type {:#x} flags {:#x} vaddr {:#010x} off {:#08x} filesz {:#x} memsz {:#x}",
                    ph.p_type, ph.p_flags, ph.p_vaddr, ph.p_offset, ph.p_filesz, ph.p_memsz
                );
            }
        }
        out
    }
}

/// Executable sections, or executable `PT_LOAD` segments when the file has
/// no section header table.
fn executable_regions(sections: &[NamedSection], segments: &[ProgramHeader]) -> Vec<ExecRegion> {
    if !sections.is_empty() {
        return sections
            .iter()
            .filter(|s| s.header.is_executable() && s.header.sh_size > 0)
            .map(|s| ExecRegion {
                name: s.name.clone(),
                offset: s.header.sh_offset,
                size: s.header.sh_size,
                va: s.header.sh_addr,
            })
            .collect();
    }

    segments
        .iter()
        .enumerate()
        .filter(|(_, ph)| ph.is_executable_load() && ph.p_filesz > 0)
        .map(|(i, ph)| ExecRegion {
            name: format!("LOAD[{}]", i),
            offset: ph.p_offset,
            size: ph.p_filesz,
            va: ph.p_vaddr,
        })
        .collect()
}
