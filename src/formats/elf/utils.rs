//! Utility functions for ELF parsing

use crate::formats::elf::types::{ElfClass, ElfData, ElfError, Result};

/// Trait for reading values with endianness support
pub trait EndianRead {
    fn read_u16(&self, offset: usize, data: ElfData, field: &'static str) -> Result<u16>;
    fn read_u32(&self, offset: usize, data: ElfData, field: &'static str) -> Result<u32>;
    fn read_u64(&self, offset: usize, data: ElfData, field: &'static str) -> Result<u64>;
}

fn window<'a, const N: usize>(
    bytes: &'a [u8],
    offset: usize,
    field: &'static str,
) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| bytes.get(offset..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or(ElfError::Truncated {
            field,
            offset,
            needed: N,
        })
}

impl EndianRead for [u8] {
    fn read_u16(&self, offset: usize, data: ElfData, field: &'static str) -> Result<u16> {
        let bytes = window::<2>(self, offset, field)?;
        Ok(match data {
            ElfData::Little => u16::from_le_bytes(bytes),
            ElfData::Big => u16::from_be_bytes(bytes),
        })
    }

    fn read_u32(&self, offset: usize, data: ElfData, field: &'static str) -> Result<u32> {
        let bytes = window::<4>(self, offset, field)?;
        Ok(match data {
            ElfData::Little => u32::from_le_bytes(bytes),
            ElfData::Big => u32::from_be_bytes(bytes),
        })
    }

    fn read_u64(&self, offset: usize, data: ElfData, field: &'static str) -> Result<u64> {
        let bytes = window::<8>(self, offset, field)?;
        Ok(match data {
            ElfData::Little => u64::from_le_bytes(bytes),
            ElfData::Big => u64::from_be_bytes(bytes),
        })
    }
}

/// Read a class-sized word (address, offset or size)
pub fn read_word(
    data: &[u8],
    offset: usize,
    class: ElfClass,
    endian: ElfData,
    field: &'static str,
) -> Result<u64> {
    match class {
        ElfClass::Elf32 => data.read_u32(offset, endian, field).map(u64::from),
        ElfClass::Elf64 => data.read_u64(offset, endian, field),
    }
}

/// Read a null-terminated string from data
pub fn read_cstring(data: &[u8], offset: usize) -> Result<&str> {
    let slice = data.get(offset..).ok_or(ElfError::Truncated {
        field: "sh_name",
        offset,
        needed: 1,
    })?;
    let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());

    std::str::from_utf8(&slice[..end]).map_err(|_| ElfError::InvalidString)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endian_read() {
        let data = vec![0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0];

        assert_eq!(data.read_u16(0, ElfData::Little, "t").unwrap(), 0x3412);
        assert_eq!(data.read_u32(0, ElfData::Little, "t").unwrap(), 0x78563412);
        assert_eq!(data.read_u16(0, ElfData::Big, "t").unwrap(), 0x1234);
        assert_eq!(
            data.read_u64(0, ElfData::Big, "t").unwrap(),
            0x123456789abcdef0
        );
        assert_eq!(
            read_word(&data, 4, ElfClass::Elf32, ElfData::Little, "t").unwrap(),
            0xf0debc9a
        );
    }

    #[test]
    fn test_truncated_read_names_field() {
        let data = [0u8; 3];
        let err = data.read_u32(0, ElfData::Little, "e_phoff").unwrap_err();
        assert_eq!(
            err,
            ElfError::Truncated {
                field: "e_phoff",
                offset: 0,
                needed: 4
            }
        );
        assert!(data.read_u16(usize::MAX, ElfData::Little, "x").is_err());
    }

    #[test]
    fn test_read_cstring() {
        let data = b"\0.text\0.init\0";
        assert_eq!(read_cstring(data, 1).unwrap(), ".text");
        assert_eq!(read_cstring(data, 7).unwrap(), ".init");
        assert_eq!(read_cstring(data, 0).unwrap(), "");
        assert!(read_cstring(data, 100).is_err());
    }
}
