//! ELF header parsing

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_word, EndianRead};

/// Parse ELF identification bytes
pub fn parse_ident(data: &[u8]) -> Result<ElfIdent> {
    if data.len() < 16 {
        return Err(ElfError::Truncated {
            field: "e_ident",
            offset: 0,
            needed: 16,
        });
    }

    if &data[0..4] != ELF_MAGIC {
        return Err(ElfError::InvalidMagic);
    }

    let class = ElfClass::from_u8(data[4])?;
    let data_encoding = ElfData::from_u8(data[5])?;

    Ok(ElfIdent {
        class,
        data: data_encoding,
        version: data[6],
        osabi: data[7],
    })
}

/// Parse ELF header
pub fn parse_header(data: &[u8]) -> Result<ElfHeader> {
    let ident = parse_ident(data)?;
    let class = ident.class;
    let endian = ident.data;

    let header_size = match class {
        ElfClass::Elf32 => 52,
        ElfClass::Elf64 => 64,
    };
    if data.len() < header_size {
        return Err(ElfError::Truncated {
            field: "ELF header",
            offset: 0,
            needed: header_size,
        });
    }

    // Past e_entry every field shifts by the word-size difference
    let word = match class {
        ElfClass::Elf32 => 4,
        ElfClass::Elf64 => 8,
    };
    let tail = 24 + 3 * word;

    let header = ElfHeader {
        ident,
        e_type: data.read_u16(16, endian, "e_type")?,
        e_machine: data.read_u16(18, endian, "e_machine")?,
        e_version: data.read_u32(20, endian, "e_version")?,
        e_entry: read_word(data, 24, class, endian, "e_entry")?,
        e_phoff: read_word(data, 24 + word, class, endian, "e_phoff")?,
        e_shoff: read_word(data, 24 + 2 * word, class, endian, "e_shoff")?,
        e_flags: data.read_u32(tail, endian, "e_flags")?,
        e_ehsize: data.read_u16(tail + 4, endian, "e_ehsize")?,
        e_phentsize: data.read_u16(tail + 6, endian, "e_phentsize")?,
        e_phnum: data.read_u16(tail + 8, endian, "e_phnum")?,
        e_shentsize: data.read_u16(tail + 10, endian, "e_shentsize")?,
        e_shnum: data.read_u16(tail + 12, endian, "e_shnum")?,
        e_shstrndx: data.read_u16(tail + 14, endian, "e_shstrndx")?,
    };

    let (expected_phentsize, expected_shentsize) = match class {
        ElfClass::Elf32 => (32, 40),
        ElfClass::Elf64 => (56, 64),
    };
    if header.e_phnum > 0 && usize::from(header.e_phentsize) < expected_phentsize {
        return Err(ElfError::MalformedHeader {
            field: "e_phentsize",
            message: format!(
                "expected at least {}, got {}",
                expected_phentsize, header.e_phentsize
            ),
        });
    }
    if header.e_shnum > 0 && usize::from(header.e_shentsize) < expected_shentsize {
        return Err(ElfError::MalformedHeader {
            field: "e_shentsize",
            message: format!(
                "expected at least {}, got {}",
                expected_shentsize, header.e_shentsize
            ),
        });
    }

    Ok(header)
}
