//! ropscope: a Return-Oriented-Programming gadget finder.
//!
//! Open a binary as a [`Program`], then enumerate every gadget of its
//! executable sections with [`Program::find_gadgets`]. Gadgets found at
//! several addresses, in one section or across sections, are merged into a
//! single [`GadgetCatalog`] entry keyed by their disassembly text.
//!
//! ```no_run
//! use ropscope::Program;
//!
//! let program = Program::open("/bin/true", None)?;
//! for gadget in &program.find_gadgets(6)? {
//!     println!("{}", gadget);
//! }
//! # Ok::<(), ropscope::RopError>(())
//! ```

pub mod cli;
/// Search and program configuration
pub mod config;
/// Core data types: sections, gadgets, the disassembler seam
pub mod core;
/// Target CPUs and the backward gadget search
pub mod cpu;
/// Decoder backends
pub mod disasm;
pub mod error;
/// Executable container formats
pub mod formats;
/// Bounded file access
pub mod io;
pub mod logging;
pub mod program;

pub use crate::config::{ProgramOptions, SearchConfig};
pub use crate::core::disassembler::{Architecture, Endianness, Syntax};
pub use crate::core::gadget::{Gadget, GadgetCatalog, Location};
pub use crate::core::section::Section;
pub use crate::cpu::Cpu;
pub use crate::error::{Result, RopError};
pub use crate::formats::{identify, ExecutableFormat, FormatKind, VerbosityLevel};
pub use crate::program::{PatternMatch, Program};
