//! Section header table parsing

use crate::formats::elf::types::*;
use crate::formats::elf::utils::{read_cstring, read_word, EndianRead};

/// A section header together with its resolved name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSection {
    pub name: String,
    pub header: SectionHeader,
}

fn parse_section_header(
    data: &[u8],
    offset: usize,
    class: ElfClass,
    endian: ElfData,
) -> Result<SectionHeader> {
    let word = match class {
        ElfClass::Elf32 => 4,
        ElfClass::Elf64 => 8,
    };
    Ok(SectionHeader {
        sh_name: data.read_u32(offset, endian, "sh_name")?,
        sh_type: data.read_u32(offset + 4, endian, "sh_type")?,
        sh_flags: read_word(data, offset + 8, class, endian, "sh_flags")?,
        sh_addr: read_word(data, offset + 8 + word, class, endian, "sh_addr")?,
        sh_offset: read_word(data, offset + 8 + 2 * word, class, endian, "sh_offset")?,
        sh_size: read_word(data, offset + 8 + 3 * word, class, endian, "sh_size")?,
    })
}

/// Parse every section header and resolve names through `.shstrtab`.
///
/// Names that cannot be resolved come back empty rather than failing the
/// whole table.
pub fn parse_sections(data: &[u8], header: &ElfHeader) -> Result<Vec<NamedSection>> {
    let sh_num = usize::from(header.e_shnum);
    if sh_num == 0 || header.e_shoff == 0 {
        return Ok(Vec::new());
    }

    let sh_offset = usize::try_from(header.e_shoff).map_err(|_| ElfError::MalformedHeader {
        field: "e_shoff",
        message: format!("{:#x} does not fit in memory", header.e_shoff),
    })?;
    let sh_entsize = usize::from(header.e_shentsize);
    let total_size = sh_num * sh_entsize;
    if sh_offset
        .checked_add(total_size)
        .is_none_or(|end| end > data.len())
    {
        return Err(ElfError::Truncated {
            field: "e_shoff",
            offset: sh_offset,
            needed: total_size,
        });
    }

    let headers = (0..sh_num)
        .map(|i| {
            parse_section_header(
                data,
                sh_offset + i * sh_entsize,
                header.ident.class,
                header.ident.data,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let strings = headers
        .get(usize::from(header.e_shstrndx))
        .and_then(|sh| {
            let start = usize::try_from(sh.sh_offset).ok()?;
            let end = start.checked_add(usize::try_from(sh.sh_size).ok()?)?;
            data.get(start..end)
        })
        .unwrap_or(&[]);

    Ok(headers
        .into_iter()
        .map(|header| NamedSection {
            name: read_cstring(strings, header.sh_name as usize)
                .unwrap_or("")
                .to_string(),
            header,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::elf::headers::parse_header;

    /// ELF64 header + .shstrtab + 3 section headers (null, .text, .shstrtab)
    fn elf64_with_sections() -> Vec<u8> {
        let strtab = b"\0.text\0.shstrtab\0";
        let strtab_off = 0x40usize;
        let shoff = 0x80usize;
        let mut data = vec![0u8; shoff + 3 * 64];
        data[0..4].copy_from_slice(b"\x7fELF");
        data[4] = 2;
        data[5] = 1;
        data[6] = 1;
        data[18] = 62;
        data[40..48].copy_from_slice(&(shoff as u64).to_le_bytes());
        data[52] = 64;
        data[58] = 64;
        data[60] = 3; // e_shnum
        data[62] = 2; // e_shstrndx
        data[strtab_off..strtab_off + strtab.len()].copy_from_slice(strtab);

        let text = shoff + 64;
        data[text..text + 4].copy_from_slice(&1u32.to_le_bytes());
        data[text + 4..text + 8].copy_from_slice(&1u32.to_le_bytes()); // PROGBITS
        data[text + 8..text + 16].copy_from_slice(&6u64.to_le_bytes()); // ALLOC|EXEC
        data[text + 16..text + 24].copy_from_slice(&0x401000u64.to_le_bytes());
        data[text + 24..text + 32].copy_from_slice(&0x40u64.to_le_bytes());
        data[text + 32..text + 40].copy_from_slice(&0x10u64.to_le_bytes());

        let shstr = shoff + 128;
        data[shstr..shstr + 4].copy_from_slice(&7u32.to_le_bytes());
        data[shstr + 4..shstr + 8].copy_from_slice(&3u32.to_le_bytes()); // STRTAB
        data[shstr + 24..shstr + 32].copy_from_slice(&(strtab_off as u64).to_le_bytes());
        data[shstr + 32..shstr + 40].copy_from_slice(&(strtab.len() as u64).to_le_bytes());
        data
    }

    #[test]
    fn test_parse_sections() {
        let data = elf64_with_sections();
        let header = parse_header(&data).unwrap();
        let sections = parse_sections(&data, &header).unwrap();
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[1].name, ".text");
        assert_eq!(sections[2].name, ".shstrtab");
        assert!(sections[1].header.is_executable());
        assert!(!sections[2].header.is_executable());
        assert_eq!(sections[1].header.sh_addr, 0x401000);
    }

    #[test]
    fn test_truncated_section_table() {
        let data = elf64_with_sections();
        let header = parse_header(&data).unwrap();
        let err = parse_sections(&data[..0x100], &header).unwrap_err();
        assert_eq!(err.field(), "e_shoff");
    }

    #[test]
    fn test_no_sections() {
        let mut data = elf64_with_sections();
        data[60] = 0;
        let header = parse_header(&data).unwrap();
        assert!(parse_sections(&data, &header).unwrap().is_empty());
    }
}
