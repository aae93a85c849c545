//! PE/COFF parser for PE32 and PE32+ images.

pub mod headers;
pub mod sections;
pub mod types;
pub mod utils;

use std::fmt::Write as _;

use headers::{parse_coff_header, parse_dos_header, parse_nt_signature, parse_optional_header};
use sections::{parse_section_table, validate_section_bounds};
pub use types::*;

use crate::core::disassembler::Architecture;
use crate::formats::{ExecRegion, VerbosityLevel};

/// Parsed PE metadata
#[derive(Debug, Clone)]
pub struct PeFormat {
    dos: DosHeader,
    coff: CoffHeader,
    optional: OptionalHeader,
    sections: Vec<SectionHeader>,
    regions: Vec<ExecRegion>,
}

impl PeFormat {
    /// Parse PE metadata from raw file bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let dos = parse_dos_header(data)?;
        let coff_offset = parse_nt_signature(data, dos.e_lfanew)?;
        let coff = parse_coff_header(data, coff_offset)?;
        let optional_offset = coff_offset + 20;
        let optional = parse_optional_header(data, optional_offset, coff.size_of_optional_header)?;
        let sections = parse_section_table(
            data,
            optional_offset + usize::from(coff.size_of_optional_header),
            coff.number_of_sections,
        )?;

        let mut regions = Vec::new();
        for section in sections.iter().filter(|s| s.is_executable()) {
            validate_section_bounds(section, data.len())?;
            if section.file_size() == 0 {
                continue;
            }
            regions.push(ExecRegion {
                name: section.name.clone(),
                offset: u64::from(section.pointer_to_raw_data),
                size: u64::from(section.file_size()),
                va: optional
                    .image_base
                    .wrapping_add(u64::from(section.virtual_address)),
            });
        }

        Ok(Self {
            dos,
            coff,
            optional,
            sections,
            regions,
        })
    }

    pub fn coff_header(&self) -> &CoffHeader {
        &self.coff
    }

    pub fn optional_header(&self) -> &OptionalHeader {
        &self.optional
    }

    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }

    pub fn regions(&self) -> &[ExecRegion] {
        &self.regions
    }

    pub fn architecture(&self) -> Result<Architecture> {
        match self.coff.machine {
            IMAGE_FILE_MACHINE_I386 => Ok(Architecture::X86),
            IMAGE_FILE_MACHINE_AMD64 => Ok(Architecture::X86_64),
            IMAGE_FILE_MACHINE_ARM => Ok(Architecture::ARM),
            IMAGE_FILE_MACHINE_ARM64 => Ok(Architecture::ARM64),
            other => Err(PeError::UnsupportedMachine(other)),
        }
    }

    pub fn display_information(&self, level: VerbosityLevel) -> String {
        let mut out = String::new();
        let kind = if self.optional.is_pe32_plus() {
            "PE32+"
        } else {
            "PE32"
        };
        let _ = writeln!(out, "{} ({})", kind, self.coff.machine_name());
        let _ = writeln!(
            out,
            "Entry point: {:#x}",
            self.optional
                .image_base
                .wrapping_add(u64::from(self.optional.address_of_entry_point))
        );

        if level >= VerbosityLevel::Medium {
            let _ = writeln!(out, "Executable regions:");
            for region in &self.regions {
                let _ = writeln!(out, "  {}", region);
            }
        }

        if level >= VerbosityLevel::High {
            let o = &self.optional;
            let _ = writeln!(
                out,
                "e_lfanew: {:#x}  TimeDateStamp: {:#x}  Characteristics: {:#06x}",
                self.dos.e_lfanew, self.coff.time_date_stamp, self.coff.characteristics
            );
            let _ = writeln!(
                out,
                "ImageBase: {:#x}  SizeOfImage: {:#x}  SizeOfHeaders: {:#x}",
                o.image_base, o.size_of_image, o.size_of_headers
            );
            let _ = writeln!(
                out,
                "SectionAlignment: {:#x}  FileAlignment: {:#x}  BaseOfCode: {:#x}",
                o.section_alignment, o.file_alignment, o.base_of_code
            );
            let _ = writeln!(
                out,
                "Subsystem: {}  DllCharacteristics: {:#06x}",
                o.subsystem, o.dll_characteristics
            );
            let _ = writeln!(out, "Sections: {}", self.coff.number_of_sections);
            for s in &self.sections {
                let _ = writeln!(
                    out,
                    "  {:<8} {} rva {:#010x} vsize {:#x} raw {:#08x} rawsize {:#x}",
                    s.name,
                    s.permissions(),
                    s.virtual_address,
                    s.virtual_size,
                    s.pointer_to_raw_data,
                    s.size_of_raw_data
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// PE32 image with one executable .text section holding `code`
    fn pe32_image(machine: u16, code: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 0x200];
        data[0..2].copy_from_slice(b"MZ");
        data[60..64].copy_from_slice(&0x80u32.to_le_bytes());
        data[0x80..0x84].copy_from_slice(b"PE\0\0");
        data[0x84..0x86].copy_from_slice(&machine.to_le_bytes());
        data[0x86..0x88].copy_from_slice(&1u16.to_le_bytes());
        data[0x94..0x96].copy_from_slice(&224u16.to_le_bytes());
        let opt = 0x98;
        data[opt..opt + 2].copy_from_slice(&PE32_MAGIC.to_le_bytes());
        data[opt + 16..opt + 20].copy_from_slice(&0x1000u32.to_le_bytes());
        data[opt + 28..opt + 32].copy_from_slice(&0x40_0000u32.to_le_bytes());

        let sh = opt + 224;
        data[sh..sh + 5].copy_from_slice(b".text");
        data[sh + 8..sh + 12].copy_from_slice(&(code.len() as u32).to_le_bytes());
        data[sh + 12..sh + 16].copy_from_slice(&0x1000u32.to_le_bytes());
        data[sh + 16..sh + 20].copy_from_slice(&0x200u32.to_le_bytes());
        data[sh + 20..sh + 24].copy_from_slice(&0x200u32.to_le_bytes());
        data[sh + 36..sh + 40].copy_from_slice(&0x6000_0020u32.to_le_bytes());

        let mut raw = vec![0u8; 0x200];
        raw[..code.len()].copy_from_slice(code);
        data.extend(raw);
        data
    }

    #[test]
    fn test_parse_pe32() {
        let pe = PeFormat::parse(&pe32_image(IMAGE_FILE_MACHINE_I386, &[0x58, 0xc3])).unwrap();
        assert_eq!(pe.architecture().unwrap(), Architecture::X86);
        assert_eq!(pe.sections().len(), 1);
        let regions = pe.regions();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].name, ".text");
        assert_eq!(regions[0].offset, 0x200);
        assert_eq!(regions[0].size, 2);
        assert_eq!(regions[0].va, 0x40_1000);
    }

    #[test]
    fn test_unsupported_machine() {
        let pe = PeFormat::parse(&pe32_image(0x0200, &[0xc3])).unwrap();
        assert_eq!(pe.architecture(), Err(PeError::UnsupportedMachine(0x0200)));
    }

    #[test]
    fn test_section_outside_file() {
        let data = pe32_image(IMAGE_FILE_MACHINE_I386, &[0xc3]);
        let err = PeFormat::parse(&data[..0x200]).unwrap_err();
        assert!(matches!(err, PeError::SectionOutOfBounds { .. }));
    }

    #[test]
    fn test_display_information() {
        let pe = PeFormat::parse(&pe32_image(IMAGE_FILE_MACHINE_I386, &[0xc3])).unwrap();
        let low = pe.display_information(VerbosityLevel::Low);
        assert!(low.starts_with("PE32 (i386)"));
        assert!(low.contains("Entry point: 0x401000"));
        let high = pe.display_information(VerbosityLevel::High);
        assert!(high.contains(".text"));
        assert!(high.contains("r-x"));
    }
}
