//! Disassembly backends and registry.
//!
//! - iced-x86 for x86/x64
//! - capstone for ARM/AArch64

pub mod capstone;
pub mod iced;
pub mod registry;
