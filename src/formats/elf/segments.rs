//! Program header table parsing

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_word, EndianRead};

fn parse_program_header(
    data: &[u8],
    offset: usize,
    class: ElfClass,
    endian: ElfData,
) -> Result<ProgramHeader> {
    // p_flags moves after p_type in the 64-bit layout
    match class {
        ElfClass::Elf32 => Ok(ProgramHeader {
            p_type: data.read_u32(offset, endian, "p_type")?,
            p_offset: read_word(data, offset + 4, class, endian, "p_offset")?,
            p_vaddr: read_word(data, offset + 8, class, endian, "p_vaddr")?,
            p_filesz: read_word(data, offset + 16, class, endian, "p_filesz")?,
            p_memsz: read_word(data, offset + 20, class, endian, "p_memsz")?,
            p_flags: data.read_u32(offset + 24, endian, "p_flags")?,
        }),
        ElfClass::Elf64 => Ok(ProgramHeader {
            p_type: data.read_u32(offset, endian, "p_type")?,
            p_flags: data.read_u32(offset + 4, endian, "p_flags")?,
            p_offset: read_word(data, offset + 8, class, endian, "p_offset")?,
            p_vaddr: read_word(data, offset + 16, class, endian, "p_vaddr")?,
            p_filesz: read_word(data, offset + 32, class, endian, "p_filesz")?,
            p_memsz: read_word(data, offset + 40, class, endian, "p_memsz")?,
        }),
    }
}

/// Parse the program header table.
pub fn parse_segments(data: &[u8], header: &ElfHeader) -> Result<Vec<ProgramHeader>> {
    let ph_num = usize::from(header.e_phnum);
    if ph_num == 0 || header.e_phoff == 0 {
        return Ok(Vec::new());
    }

    let ph_offset = usize::try_from(header.e_phoff).map_err(|_| ElfError::MalformedHeader {
        field: "e_phoff",
        message: format!("{:#x} does not fit in memory", header.e_phoff),
    })?;
    let ph_entsize = usize::from(header.e_phentsize);
    let total_size = ph_num * ph_entsize;
    if ph_offset
        .checked_add(total_size)
        .is_none_or(|end| end > data.len())
    {
        return Err(ElfError::Truncated {
            field: "e_phoff",
            offset: ph_offset,
            needed: total_size,
        });
    }

    (0..ph_num)
        .map(|i| {
            parse_program_header(
                data,
                ph_offset + i * ph_entsize,
                header.ident.class,
                header.ident.data,
            )
        })
        .collect()
}
