//! PE header parsing

use crate::formats::pe::types::*;
use crate::formats::pe::utils::{ensure_len, ReadExt};

// Every read below follows an ensure_len covering it.
fn u16_at(data: &[u8], offset: usize) -> u16 {
    data.read_u16_le_at(offset).unwrap_or_default()
}

fn u32_at(data: &[u8], offset: usize) -> u32 {
    data.read_u32_le_at(offset).unwrap_or_default()
}

/// Parse DOS header from data
pub fn parse_dos_header(data: &[u8]) -> Result<DosHeader> {
    ensure_len(data, 0, 64, "DOS header")?;

    let e_magic = u16_at(data, 0);
    if e_magic != DOS_SIGNATURE {
        return Err(PeError::InvalidDosSignature);
    }

    Ok(DosHeader {
        e_magic,
        e_lfanew: u32_at(data, 60),
    })
}

/// Check the `PE\0\0` signature and return the COFF header offset
pub fn parse_nt_signature(data: &[u8], e_lfanew: u32) -> Result<usize> {
    let offset = e_lfanew as usize;
    ensure_len(data, offset, 4, "NT signature")?;
    if data.read_slice_at(offset, 4) != Some(&PE_SIGNATURE[..]) {
        return Err(PeError::InvalidNtSignature);
    }
    Ok(offset + 4)
}

/// Parse COFF header from data at offset
pub fn parse_coff_header(data: &[u8], offset: usize) -> Result<CoffHeader> {
    ensure_len(data, offset, 20, "COFF header")?;

    Ok(CoffHeader {
        machine: u16_at(data, offset),
        number_of_sections: u16_at(data, offset + 2),
        time_date_stamp: u32_at(data, offset + 4),
        size_of_optional_header: u16_at(data, offset + 16),
        characteristics: u16_at(data, offset + 18),
    })
}

/// Parse the optional header fields kept by the parser
pub fn parse_optional_header(data: &[u8], offset: usize, size: u16) -> Result<OptionalHeader> {
    ensure_len(data, offset, usize::from(size), "optional header")?;
    if size < 2 {
        return Err(PeError::TruncatedHeader {
            field: "optional header",
            expected: 2,
            actual: usize::from(size),
        });
    }

    let magic = u16_at(data, offset);
    let minimum = match magic {
        PE32_MAGIC => 96,
        PE32PLUS_MAGIC => 112,
        _ => return Err(PeError::InvalidOptionalMagic(magic)),
    };
    if usize::from(size) < minimum {
        return Err(PeError::TruncatedHeader {
            field: "optional header",
            expected: minimum,
            actual: usize::from(size),
        });
    }

    // PE32+ drops BaseOfData and widens ImageBase to 64 bits
    let image_base = if magic == PE32PLUS_MAGIC {
        data.read_u64_le_at(offset + 24).unwrap_or_default()
    } else {
        u64::from(u32_at(data, offset + 28))
    };

    Ok(OptionalHeader {
        magic,
        address_of_entry_point: u32_at(data, offset + 16),
        base_of_code: u32_at(data, offset + 20),
        image_base,
        section_alignment: u32_at(data, offset + 32),
        file_alignment: u32_at(data, offset + 36),
        size_of_image: u32_at(data, offset + 56),
        size_of_headers: u32_at(data, offset + 60),
        subsystem: u16_at(data, offset + 68),
        dll_characteristics: u16_at(data, offset + 70),
    })
}
