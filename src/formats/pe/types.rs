//! Core PE data types and structures

use std::fmt;

// PE constants
pub const DOS_SIGNATURE: u16 = 0x5A4D; // MZ
pub const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";
pub const PE32_MAGIC: u16 = 0x10B;
pub const PE32PLUS_MAGIC: u16 = 0x20B;

pub const IMAGE_FILE_MACHINE_I386: u16 = 0x014c;
pub const IMAGE_FILE_MACHINE_ARMNT: u16 = 0x01c4;
pub const IMAGE_FILE_MACHINE_ARM: u16 = 0x01c0;
pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
pub const IMAGE_FILE_MACHINE_ARM64: u16 = 0xaa64;

// Section characteristics
pub const IMAGE_SCN_CNT_CODE: u32 = 0x00000020;
pub const IMAGE_SCN_MEM_EXECUTE: u32 = 0x20000000;
pub const IMAGE_SCN_MEM_READ: u32 = 0x40000000;
pub const IMAGE_SCN_MEM_WRITE: u32 = 0x80000000;

/// PE parsing error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeError {
    InvalidDosSignature,
    InvalidNtSignature,
    UnsupportedMachine(u16),
    InvalidOptionalMagic(u16),
    TruncatedHeader {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    SectionOutOfBounds {
        section: String,
        offset: u32,
        size: u32,
        file_len: usize,
    },
}

impl PeError {
    /// Name of the header field the error is about
    pub fn field(&self) -> String {
        match self {
            Self::InvalidDosSignature => "e_magic".to_string(),
            Self::InvalidNtSignature => "Signature".to_string(),
            Self::UnsupportedMachine(_) => "Machine".to_string(),
            Self::InvalidOptionalMagic(_) => "OptionalHeader.Magic".to_string(),
            Self::TruncatedHeader { field, .. } => field.to_string(),
            Self::SectionOutOfBounds { section, .. } => {
                format!("{} PointerToRawData", section)
            }
        }
    }
}

impl fmt::Display for PeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDosSignature => write!(f, "Invalid DOS signature"),
            Self::InvalidNtSignature => write!(f, "Invalid PE signature"),
            Self::UnsupportedMachine(m) => write!(f, "Unsupported machine type: 0x{:04x}", m),
            Self::InvalidOptionalMagic(m) => {
                write!(f, "Invalid optional header magic: 0x{:04x}", m)
            }
            Self::TruncatedHeader {
                field,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Truncated {}: expected {} bytes, got {}",
                    field, expected, actual
                )
            }
            Self::SectionOutOfBounds {
                section,
                offset,
                size,
                file_len,
            } => write!(
                f,
                "section {} data 0x{:x}+0x{:x} lies outside the file (0x{:x} bytes)",
                section, offset, size, file_len
            ),
        }
    }
}

impl std::error::Error for PeError {}

pub type Result<T> = std::result::Result<T, PeError>;

/// DOS header fields the parser keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosHeader {
    pub e_magic: u16,
    pub e_lfanew: u32,
}

/// COFF file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoffHeader {
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

impl CoffHeader {
    pub fn machine_name(&self) -> &'static str {
        match self.machine {
            IMAGE_FILE_MACHINE_I386 => "i386",
            IMAGE_FILE_MACHINE_AMD64 => "AMD64",
            IMAGE_FILE_MACHINE_ARM => "ARM",
            IMAGE_FILE_MACHINE_ARMNT => "ARM Thumb-2",
            IMAGE_FILE_MACHINE_ARM64 => "ARM64",
            _ => "unknown",
        }
    }
}

/// Optional header fields shared by PE32 and PE32+
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionalHeader {
    pub magic: u16,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
}

impl OptionalHeader {
    pub fn is_pe32_plus(&self) -> bool {
        self.magic == PE32PLUS_MAGIC
    }
}

/// Section table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: String,
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: u32,
}

impl SectionHeader {
    pub fn is_executable(&self) -> bool {
        self.characteristics & IMAGE_SCN_MEM_EXECUTE != 0
    }

    /// Bytes of the section actually present in the file
    pub fn file_size(&self) -> u32 {
        if self.virtual_size > 0 {
            self.virtual_size.min(self.size_of_raw_data)
        } else {
            self.size_of_raw_data
        }
    }

    /// Short permission string like `r-x`
    pub fn permissions(&self) -> String {
        let flag = |bit: u32, c: char| {
            if self.characteristics & bit != 0 {
                c
            } else {
                '-'
            }
        };
        [
            flag(IMAGE_SCN_MEM_READ, 'r'),
            flag(IMAGE_SCN_MEM_WRITE, 'w'),
            flag(IMAGE_SCN_MEM_EXECUTE, 'x'),
        ]
        .iter()
        .collect()
    }
}
