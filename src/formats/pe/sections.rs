//! PE section table parsing

use crate::formats::pe::types::*;
use crate::formats::pe::utils::{ensure_len, section_name, ReadExt};

/// Size of one IMAGE_SECTION_HEADER
pub const SECTION_HEADER_SIZE: usize = 40;

/// Parse `count` section headers starting at `offset`
pub fn parse_section_table(data: &[u8], offset: usize, count: u16) -> Result<Vec<SectionHeader>> {
    let count = usize::from(count);
    ensure_len(data, offset, count * SECTION_HEADER_SIZE, "section table")?;

    Ok((0..count)
        .map(|i| {
            let base = offset + i * SECTION_HEADER_SIZE;
            let u32_at = |rel: usize| data.read_u32_le_at(base + rel).unwrap_or_default();
            SectionHeader {
                name: section_name(data.read_slice_at(base, 8).unwrap_or_default()),
                virtual_size: u32_at(8),
                virtual_address: u32_at(12),
                size_of_raw_data: u32_at(16),
                pointer_to_raw_data: u32_at(20),
                characteristics: u32_at(36),
            }
        })
        .collect())
}

/// Reject an executable section whose file data does not fit in the file.
pub fn validate_section_bounds(section: &SectionHeader, file_len: usize) -> Result<()> {
    let end = u64::from(section.pointer_to_raw_data) + u64::from(section.file_size());
    if end > file_len as u64 {
        return Err(PeError::SectionOutOfBounds {
            section: section.name.clone(),
            offset: section.pointer_to_raw_data,
            size: section.file_size(),
            file_len,
        });
    }
    Ok(())
}
