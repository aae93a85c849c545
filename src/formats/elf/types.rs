//! Core ELF types and constants

use std::fmt;

/// ELF parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElfError {
    InvalidMagic,
    UnsupportedClass(u8),
    UnsupportedData(u8),
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
    },
    MalformedHeader {
        field: &'static str,
        message: String,
    },
    InvalidString,
    UnsupportedArchitecture(u16),
}

impl ElfError {
    /// Name of the header field or table the error is about
    pub fn field(&self) -> String {
        match self {
            Self::InvalidMagic => "e_ident[EI_MAG]".to_string(),
            Self::UnsupportedClass(_) => "e_ident[EI_CLASS]".to_string(),
            Self::UnsupportedData(_) => "e_ident[EI_DATA]".to_string(),
            Self::Truncated { field, .. } | Self::MalformedHeader { field, .. } => {
                field.to_string()
            }
            Self::InvalidString => "sh_name".to_string(),
            Self::UnsupportedArchitecture(_) => "e_machine".to_string(),
        }
    }
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMagic => write!(f, "Invalid ELF magic"),
            Self::UnsupportedClass(c) => write!(f, "Unsupported ELF class: {}", c),
            Self::UnsupportedData(d) => write!(f, "Unsupported ELF data encoding: {}", d),
            Self::Truncated {
                field,
                offset,
                needed,
            } => {
                write!(
                    f,
                    "{} truncated at {:#x}, needed {} bytes",
                    field, offset, needed
                )
            }
            Self::MalformedHeader { field, message } => {
                write!(f, "Malformed {}: {}", field, message)
            }
            Self::InvalidString => write!(f, "String not UTF-8"),
            Self::UnsupportedArchitecture(arch) => {
                write!(f, "Unsupported architecture: {:#x}", arch)
            }
        }
    }
}

impl std::error::Error for ElfError {}

pub type Result<T> = std::result::Result<T, ElfError>;

/// ELF magic number
pub const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

pub const EM_386: u16 = 3;
pub const EM_ARM: u16 = 40;
pub const EM_X86_64: u16 = 62;
pub const EM_AARCH64: u16 = 183;

pub const SHT_NOBITS: u32 = 8;
pub const SHF_EXECINSTR: u64 = 0x4;

pub const PT_LOAD: u32 = 1;
pub const PF_X: u32 = 0x1;

/// ELF class (32-bit or 64-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    Elf32 = 1,
    Elf64 = 2,
}

impl ElfClass {
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            1 => Ok(ElfClass::Elf32),
            2 => Ok(ElfClass::Elf64),
            _ => Err(ElfError::UnsupportedClass(val)),
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            ElfClass::Elf32 => 32,
            ElfClass::Elf64 => 64,
        }
    }
}

/// ELF data encoding (endianness)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfData {
    Little = 1,
    Big = 2,
}

impl ElfData {
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            1 => Ok(ElfData::Little),
            2 => Ok(ElfData::Big),
            _ => Err(ElfError::UnsupportedData(val)),
        }
    }

    pub fn is_little_endian(&self) -> bool {
        matches!(self, ElfData::Little)
    }
}

/// ELF identification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfIdent {
    pub class: ElfClass,
    pub data: ElfData,
    pub version: u8,
    pub osabi: u8,
}

/// ELF file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    pub ident: ElfIdent,
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl ElfHeader {
    pub fn type_name(&self) -> &'static str {
        match self.e_type {
            1 => "REL",
            2 => "EXEC",
            3 => "DYN",
            4 => "CORE",
            _ => "NONE",
        }
    }

    pub fn machine_name(&self) -> &'static str {
        match self.e_machine {
            EM_386 => "Intel 80386",
            EM_ARM => "ARM",
            EM_X86_64 => "AMD x86-64",
            EM_AARCH64 => "AArch64",
            _ => "unknown",
        }
    }
}

/// Section header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
}

impl SectionHeader {
    pub fn is_executable(&self) -> bool {
        self.sh_flags & SHF_EXECINSTR != 0 && self.sh_type != SHT_NOBITS
    }
}

/// Program header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
}

impl ProgramHeader {
    pub fn is_executable_load(&self) -> bool {
        self.p_type == PT_LOAD && self.p_flags & PF_X != 0
    }
}
