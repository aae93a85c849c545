use crate::core::disassembler::{
    Architecture, DecodedInstruction, Disassembler, DisassemblerError, DisassemblerResult,
    Endianness, FlowKind, Syntax,
};

pub enum Backend {
    Iced(super::iced::IcedDisassembler),
    Cap(super::capstone::CapstoneDisassembler),
}

impl Disassembler for Backend {
    fn decode(&self, bytes: &[u8], address: u64) -> DisassemblerResult<DecodedInstruction> {
        match self {
            Backend::Iced(d) => d.decode(bytes, address),
            Backend::Cap(d) => d.decode(bytes, address),
        }
    }

    fn flow_at(&self, bytes: &[u8], address: u64) -> Option<(usize, FlowKind)> {
        match self {
            Backend::Iced(d) => d.flow_at(bytes, address),
            Backend::Cap(d) => d.flow_at(bytes, address),
        }
    }

    fn max_instruction_length(&self) -> usize {
        match self {
            Backend::Iced(d) => d.max_instruction_length(),
            Backend::Cap(d) => d.max_instruction_length(),
        }
    }

    fn instruction_alignment(&self) -> usize {
        match self {
            Backend::Iced(d) => d.instruction_alignment(),
            Backend::Cap(d) => d.instruction_alignment(),
        }
    }

    fn architecture(&self) -> Architecture {
        match self {
            Backend::Iced(d) => d.architecture(),
            Backend::Cap(d) => d.architecture(),
        }
    }

    fn endianness(&self) -> Endianness {
        match self {
            Backend::Iced(d) => d.endianness(),
            Backend::Cap(d) => d.endianness(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Backend::Iced(d) => d.name(),
            Backend::Cap(d) => d.name(),
        }
    }
}

/// Select a disassembler backend for the given architecture.
pub fn for_arch(
    arch: Architecture,
    endianness: Endianness,
    syntax: Syntax,
) -> DisassemblerResult<Backend> {
    match arch {
        Architecture::X86 | Architecture::X86_64 => Ok(Backend::Iced(
            super::iced::IcedDisassembler::new(arch, syntax),
        )),
        Architecture::ARM | Architecture::ARM64 => {
            super::capstone::CapstoneDisassembler::new(arch, endianness)
                .map(Backend::Cap)
                .ok_or(DisassemblerError::UnsupportedArchitecture())
        }
    }
}
