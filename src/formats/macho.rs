//! Mach-O support through the `object` crate.
//!
//! Only thin images are handled; the parsed metadata is copied out so the
//! format does not borrow the file.

use std::fmt::Write as _;

use object::read::{Object, ObjectSection, ObjectSegment};
use object::{SectionFlags, SectionKind};
use tracing::trace;

use crate::core::disassembler::{Architecture, Endianness};
use crate::error::{Result, RopError};
use crate::formats::{ExecRegion, VerbosityLevel};

const S_ATTR_PURE_INSTRUCTIONS: u32 = 0x8000_0000;
const S_ATTR_SOME_INSTRUCTIONS: u32 = 0x0000_0400;

/// One section as listed in the load commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachOSection {
    pub segment: String,
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub file_range: Option<(u64, u64)>,
    pub executable: bool,
}

/// Parsed Mach-O metadata
#[derive(Debug, Clone)]
pub struct MachOFormat {
    architecture: object::Architecture,
    little_endian: bool,
    is_64: bool,
    entry: u64,
    segments: Vec<(String, u64, u64)>,
    sections: Vec<MachOSection>,
    regions: Vec<ExecRegion>,
}

fn holds_code(kind: SectionKind, flags: SectionFlags) -> bool {
    if kind == SectionKind::Text {
        return true;
    }
    match flags {
        SectionFlags::MachO { flags } => {
            flags & (S_ATTR_PURE_INSTRUCTIONS | S_ATTR_SOME_INSTRUCTIONS) != 0
        }
        _ => false,
    }
}

impl MachOFormat {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let obj = object::read::File::parse(data)
            .map_err(|e| RopError::InvalidFormat(format!("Mach-O: {}", e)))?;
        if obj.format() != object::BinaryFormat::MachO {
            return Err(RopError::InvalidFormat(format!(
                "expected Mach-O, found {:?}",
                obj.format()
            )));
        }

        let segments = obj
            .segments()
            .map(|seg| {
                let name = seg.name().ok().flatten().unwrap_or("").to_string();
                (name, seg.address(), seg.size())
            })
            .collect();

        let mut sections = Vec::new();
        for sec in obj.sections() {
            let name = sec
                .name()
                .map_err(|e| RopError::structural("Mach-O", "sectname", e.to_string()))?;
            let segment = sec.segment_name().ok().flatten().unwrap_or("");
            let entry = MachOSection {
                segment: segment.to_string(),
                name: name.to_string(),
                address: sec.address(),
                size: sec.size(),
                file_range: sec.file_range(),
                executable: holds_code(sec.kind(), sec.flags()),
            };
            trace!(section = %entry.name, executable = entry.executable, "Mach-O section");
            sections.push(entry);
        }

        let regions = sections
            .iter()
            .filter(|s| s.executable)
            .filter_map(|s| {
                let (offset, size) = s.file_range?;
                (size > 0).then(|| ExecRegion {
                    name: s.name.clone(),
                    offset,
                    size,
                    va: s.address,
                })
            })
            .collect();

        Ok(Self {
            architecture: obj.architecture(),
            little_endian: obj.is_little_endian(),
            is_64: obj.is_64(),
            entry: obj.entry(),
            segments,
            sections,
            regions,
        })
    }

    pub fn sections(&self) -> &[MachOSection] {
        &self.sections
    }

    pub fn regions(&self) -> &[ExecRegion] {
        &self.regions
    }

    pub fn architecture(&self) -> Result<Architecture> {
        match self.architecture {
            object::Architecture::I386 => Ok(Architecture::X86),
            object::Architecture::X86_64 => Ok(Architecture::X86_64),
            object::Architecture::Arm => Ok(Architecture::ARM),
            object::Architecture::Aarch64 => Ok(Architecture::ARM64),
            other => Err(RopError::UnsupportedArchitecture(format!(
                "Mach-O cputype {:?}",
                other
            ))),
        }
    }

    pub fn endianness(&self) -> Endianness {
        if self.little_endian {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    pub fn display_information(&self, level: VerbosityLevel) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Mach-O {}-bit ({:?}), {} endian",
            if self.is_64 { 64 } else { 32 },
            self.architecture,
            self.endianness()
        );
        let _ = writeln!(out, "Entry point: {:#x}", self.entry);

        if level >= VerbosityLevel::Medium {
            let _ = writeln!(out, "Executable regions:");
            for region in &self.regions {
                let _ = writeln!(out, "  {}", region);
            }
        }

        if level >= VerbosityLevel::High {
            let _ = writeln!(out, "Segments: {}", self.segments.len());
            for (name, address, size) in &self.segments {
                let _ = writeln!(out, "  {:<16} vmaddr {:#x} vmsize {:#x}", name, address, size);
            }
            let _ = writeln!(out, "Sections: {}", self.sections.len());
            for s in &self.sections {
                let _ = writeln!(
                    out,
                    "  {},{} addr {:#x} size {:#x}{}",
                    s.segment,
                    s.name,
                    s.address,
                    s.size,
                    if s.executable { " [code]" } else { "" }
                );
            }
        }
        out
    }
}
