//! Common test utilities: hand-built ELF and PE images and temp-file helpers.
#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

pub const EM_386: u16 = 3;
pub const EM_X86_64: u16 = 62;
pub const EM_AARCH64: u16 = 183;

pub const SHF_ALLOC: u64 = 0x2;
pub const SHF_EXECINSTR: u64 = 0x4;
pub const SHF_WRITE: u64 = 0x1;

pub const IMAGE_FILE_MACHINE_I386: u16 = 0x014c;
pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
pub const PE_CODE: u32 = 0x6000_0020;
pub const PE_DATA: u32 = 0xc000_0040;

/// Write `bytes` to a temp file that lives as long as the handle.
pub fn temp_binary(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(bytes).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}

/// One section of a synthetic ELF image
pub struct ElfSection {
    pub name: &'static str,
    pub flags: u64,
    pub addr: u64,
    pub data: Vec<u8>,
}

impl ElfSection {
    pub fn code(name: &'static str, addr: u64, data: Vec<u8>) -> Self {
        Self {
            name,
            flags: SHF_ALLOC | SHF_EXECINSTR,
            addr,
            data,
        }
    }

    pub fn data(name: &'static str, addr: u64, data: Vec<u8>) -> Self {
        Self {
            name,
            flags: SHF_ALLOC | SHF_WRITE,
            addr,
            data,
        }
    }
}

fn push_word(buf: &mut Vec<u8>, is_64: bool, value: u64) {
    if is_64 {
        buf.extend(value.to_le_bytes());
    } else {
        buf.extend((value as u32).to_le_bytes());
    }
}

fn align_to(buf: &mut Vec<u8>, align: usize) {
    while buf.len() % align != 0 {
        buf.push(0);
    }
}

/// A little-endian ELF image with a section table and no program headers.
///
/// Section data starts at file offset 0x100; the layout is header, section
/// bytes, `.shstrtab`, then the section header table.
pub fn build_elf(is_64: bool, machine: u16, sections: &[ElfSection]) -> Vec<u8> {
    let ehsize = if is_64 { 64 } else { 52 };
    let shentsize = if is_64 { 64 } else { 40 };

    let mut image = vec![0u8; 0x100];
    let mut placed = Vec::new();
    for section in sections {
        align_to(&mut image, 16);
        placed.push(image.len() as u64);
        image.extend(&section.data);
    }

    let mut shstrtab = vec![0u8];
    let mut name_offsets = Vec::new();
    for section in sections {
        name_offsets.push(shstrtab.len() as u32);
        shstrtab.extend(section.name.as_bytes());
        shstrtab.push(0);
    }
    let shstrtab_name = shstrtab.len() as u32;
    shstrtab.extend(b".shstrtab\0");
    let shstrtab_offset = image.len() as u64;
    image.extend(&shstrtab);

    align_to(&mut image, 8);
    let shoff = image.len() as u64;

    let section_header =
        |image: &mut Vec<u8>, name: u32, sh_type: u32, flags: u64, addr: u64, offset: u64, size: u64| {
            image.extend(name.to_le_bytes());
            image.extend(sh_type.to_le_bytes());
            push_word(image, is_64, flags);
            push_word(image, is_64, addr);
            push_word(image, is_64, offset);
            push_word(image, is_64, size);
            image.extend(0u32.to_le_bytes());
            image.extend(0u32.to_le_bytes());
            push_word(image, is_64, 1);
            push_word(image, is_64, 0);
        };

    section_header(&mut image, 0, 0, 0, 0, 0, 0);
    for (i, section) in sections.iter().enumerate() {
        section_header(
            &mut image,
            name_offsets[i],
            1,
            section.flags,
            section.addr,
            placed[i],
            section.data.len() as u64,
        );
    }
    section_header(
        &mut image,
        shstrtab_name,
        3,
        0,
        0,
        shstrtab_offset,
        shstrtab.len() as u64,
    );

    let shnum = sections.len() as u16 + 2;
    let mut header = Vec::with_capacity(ehsize);
    header.extend(b"\x7fELF");
    header.push(if is_64 { 2 } else { 1 });
    header.push(1);
    header.push(1);
    header.resize(16, 0);
    header.extend(2u16.to_le_bytes()); // ET_EXEC
    header.extend(machine.to_le_bytes());
    header.extend(1u32.to_le_bytes());
    push_word(&mut header, is_64, sections.first().map_or(0, |s| s.addr));
    push_word(&mut header, is_64, 0); // e_phoff
    push_word(&mut header, is_64, shoff);
    header.extend(0u32.to_le_bytes());
    header.extend((ehsize as u16).to_le_bytes());
    header.extend(0u16.to_le_bytes()); // e_phentsize
    header.extend(0u16.to_le_bytes()); // e_phnum
    header.extend((shentsize as u16).to_le_bytes());
    header.extend(shnum.to_le_bytes());
    header.extend((shnum - 1).to_le_bytes());
    assert_eq!(header.len(), ehsize);

    image[..ehsize].copy_from_slice(&header);
    image
}

/// File offset of the section header for section `index` (1-based, after
/// the null entry) in an image from [`build_elf`].
pub fn elf_section_header_offset(image: &[u8], is_64: bool, index: usize) -> usize {
    let shoff = if is_64 {
        u64::from_le_bytes(image[40..48].try_into().unwrap()) as usize
    } else {
        u32::from_le_bytes(image[32..36].try_into().unwrap()) as usize
    };
    shoff + index * if is_64 { 64 } else { 40 }
}

/// One section of a synthetic PE image
pub struct PeSection {
    pub name: &'static str,
    pub rva: u32,
    pub characteristics: u32,
    pub data: Vec<u8>,
}

/// A PE32 (or PE32+) image whose raw section data starts at 0x400.
pub fn build_pe(machine: u16, image_base: u64, pe32_plus: bool, sections: &[PeSection]) -> Vec<u8> {
    let opt_size: u16 = if pe32_plus { 240 } else { 224 };
    let mut image = vec![0u8; 0x40];
    image[0..2].copy_from_slice(b"MZ");
    image[60..64].copy_from_slice(&0x40u32.to_le_bytes());

    image.extend(b"PE\0\0");
    image.extend(machine.to_le_bytes());
    image.extend((sections.len() as u16).to_le_bytes());
    image.extend([0u8; 12]);
    image.extend(opt_size.to_le_bytes());
    image.extend(0x0102u16.to_le_bytes());

    let opt_start = image.len();
    image.resize(opt_start + usize::from(opt_size), 0);
    let opt = &mut image[opt_start..];
    if pe32_plus {
        opt[0..2].copy_from_slice(&0x20bu16.to_le_bytes());
        opt[24..32].copy_from_slice(&image_base.to_le_bytes());
    } else {
        opt[0..2].copy_from_slice(&0x10bu16.to_le_bytes());
        opt[28..32].copy_from_slice(&(image_base as u32).to_le_bytes());
    }
    opt[16..20].copy_from_slice(&sections.first().map_or(0, |s| s.rva).to_le_bytes());
    opt[32..36].copy_from_slice(&0x1000u32.to_le_bytes());
    opt[36..40].copy_from_slice(&0x200u32.to_le_bytes());

    let mut raw_offset = 0x400u32;
    let mut raw_blobs = Vec::new();
    for section in sections {
        let raw_size = (section.data.len() as u32).div_ceil(0x200) * 0x200;
        let mut name = [0u8; 8];
        name[..section.name.len()].copy_from_slice(section.name.as_bytes());
        image.extend(name);
        image.extend((section.data.len() as u32).to_le_bytes());
        image.extend(section.rva.to_le_bytes());
        image.extend(raw_size.to_le_bytes());
        image.extend(raw_offset.to_le_bytes());
        image.extend([0u8; 12]);
        image.extend(section.characteristics.to_le_bytes());
        raw_blobs.push((raw_offset as usize, &section.data));
        raw_offset += raw_size;
    }

    image.resize(raw_offset as usize, 0);
    for (offset, data) in raw_blobs {
        image[offset..offset + data.len()].copy_from_slice(data);
    }
    image
}

/// `filler` bytes with `snippet` copied in at each offset
pub fn code_with(size: usize, filler: u8, snippets: &[(usize, &[u8])]) -> Vec<u8> {
    let mut code = vec![filler; size];
    for (offset, snippet) in snippets {
        code[*offset..*offset + snippet.len()].copy_from_slice(snippet);
    }
    code
}
