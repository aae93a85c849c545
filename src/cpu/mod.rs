//! CPU abstraction: one target architecture plus the gadget search over it.
//!
//! A [`Cpu`] is a plain value; decoder backends are created per search call
//! so independent sections can be searched on different threads.

pub mod search;

use tracing::debug;

use crate::core::disassembler::{Architecture, Endianness, Syntax};
use crate::core::gadget::Gadget;
use crate::disasm::registry::{for_arch, Backend};
use crate::error::Result;

pub use search::{find_gadgets_in_buffer, INSTRUCTION_SEPARATOR};

/// The architecture a [`crate::program::Program`] searches for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cpu {
    arch: Architecture,
    endianness: Endianness,
    syntax: Syntax,
}

impl Cpu {
    /// Bind an architecture, checking that a decoder backend exists for it.
    pub fn new(arch: Architecture, endianness: Endianness, syntax: Syntax) -> Result<Self> {
        let cpu = Self {
            arch,
            endianness,
            syntax,
        };
        cpu.disassembler()?;
        Ok(cpu)
    }

    pub fn architecture(&self) -> Architecture {
        self.arch
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn syntax(&self) -> Syntax {
        self.syntax
    }

    /// Address width in bytes
    pub fn address_bytes(&self) -> usize {
        usize::from(self.arch.address_bits() / 8)
    }

    /// Human-readable name, e.g. `x86_64`
    pub fn name(&self) -> String {
        self.arch.to_string()
    }

    /// A fresh decoder backend for this CPU.
    pub fn disassembler(&self) -> Result<Backend> {
        Ok(for_arch(self.arch, self.endianness, self.syntax)?)
    }

    /// Run the backward gadget search over one section's bytes.
    ///
    /// The result is collapsed by raw offset only; text-level merging is the
    /// caller's job.
    pub fn find_gadgets_in_buffer(
        &self,
        bytes: &[u8],
        base_va: u64,
        max_depth: usize,
    ) -> Result<Vec<Gadget>> {
        let disasm = self.disassembler()?;
        let gadgets = search::find_gadgets_in_buffer(&disasm, bytes, base_va, max_depth);
        debug!(
            arch = %self.arch,
            base_va = format_args!("{:#x}", base_va),
            size = bytes.len(),
            gadgets = gadgets.len(),
            "Searched buffer"
        );
        Ok(gadgets)
    }

    /// Encode a 32-bit value in this CPU's byte order.
    pub fn encode_u32(&self, value: u32) -> [u8; 4] {
        match self.endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        }
    }
}
