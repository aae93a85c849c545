//! The program under analysis: one file, one format, one CPU.
//!
//! [`Program`] drives the pipeline. It asks the format for executable
//! sections, runs the CPU search over each one, and merges the per-section
//! results into a single [`GadgetCatalog`] keyed by disassembly text.

use std::io::Write;
use std::path::Path;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ProgramOptions, SearchConfig};
use crate::core::disassembler::Architecture;
use crate::core::gadget::{Gadget, GadgetCatalog};
use crate::core::section::Section;
use crate::cpu::Cpu;
use crate::error::{Result, RopError};
use crate::formats::{ExecutableFormat, VerbosityLevel};
use crate::io::BinaryFile;

/// One occurrence of a searched byte pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternMatch {
    /// Section the pattern was found in
    pub section: String,
    /// Offset inside that section
    pub offset: u64,
    /// Virtual address of the first matched byte
    pub va: u64,
}

pub struct Program {
    file: BinaryFile,
    format: ExecutableFormat,
    cpu: Cpu,
}

impl Program {
    /// Open `path`; with an explicit architecture the file is a raw blob.
    pub fn open<P: AsRef<Path>>(path: P, arch: Option<Architecture>) -> Result<Self> {
        Self::open_with(
            path,
            ProgramOptions {
                arch,
                ..ProgramOptions::default()
            },
        )
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: ProgramOptions) -> Result<Self> {
        let file = BinaryFile::open(path, &options.limits)?;
        Self::load(file, &options)
    }

    /// Build a program over an in-memory buffer.
    pub fn from_bytes(data: Vec<u8>, options: ProgramOptions) -> Result<Self> {
        Self::load(BinaryFile::from_bytes(data), &options)
    }

    fn load(file: BinaryFile, options: &ProgramOptions) -> Result<Self> {
        let (format, arch) = match options.arch {
            Some(arch) => (
                ExecutableFormat::raw(file.data().len(), options.raw_base),
                arch,
            ),
            None => {
                let magic = file.read_magic().unwrap_or_default();
                let format = ExecutableFormat::from_magic(magic, file.data())?;
                let arch = format.resolve_architecture()?;
                (format, arch)
            }
        };
        let cpu = Cpu::new(arch, format.endianness(), options.syntax)?;

        info!(
            path = ?file.path(),
            format = %format.kind(),
            arch = %cpu.architecture(),
            size = file.size(),
            "Program loaded"
        );
        Ok(Self { file, format, cpu })
    }

    pub fn format(&self) -> &ExecutableFormat {
        &self.format
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn data(&self) -> &[u8] {
        self.file.data()
    }

    pub fn display_information(&self, level: VerbosityLevel) -> String {
        self.format.display_information(level)
    }

    pub fn executable_sections(&self) -> Result<Vec<Section<'_>>> {
        self.format.executable_sections(self.file.data())
    }

    /// Every gadget of at most `max_depth` instructions in every executable
    /// section.
    pub fn find_gadgets(&self, max_depth: usize) -> Result<GadgetCatalog> {
        self.find_gadgets_with(&SearchConfig::with_max_depth(max_depth))
    }

    pub fn find_gadgets_with(&self, config: &SearchConfig) -> Result<GadgetCatalog> {
        let span = crate::span_trace!("find_gadgets", max_depth = config.max_depth);
        let _guard = span.enter();

        let sections = self.executable_sections()?;
        if sections.is_empty() {
            warn!(format = %self.format.kind(), "No executable sections found");
            return Ok(GadgetCatalog::new());
        }

        let search = |section: &Section<'_>| -> Result<Vec<Gadget>> {
            let base = section.va();
            let gadgets =
                self.cpu
                    .find_gadgets_in_buffer(section.data(), base, config.max_depth)?;
            debug!(
                section = section.name(),
                base = format_args!("{:#x}", base),
                gadgets = gadgets.len(),
                "Section searched"
            );
            Ok(gadgets)
        };

        let per_section: Vec<Vec<Gadget>> = if config.parallel {
            sections.par_iter().map(search).collect::<Result<_>>()?
        } else {
            sections.iter().map(search).collect::<Result<_>>()?
        };

        // Merged on this thread in section order
        let mut catalog = GadgetCatalog::new();
        for gadgets in per_section {
            catalog.merge_all(gadgets);
        }

        info!(
            sections = sections.len(),
            unique = catalog.len(),
            occurrences = catalog.occurrence_count(),
            "Gadget search complete"
        );
        Ok(catalog)
    }

    /// Every occurrence of `pattern` in the executable sections.
    pub fn search_bytes(&self, pattern: &[u8]) -> Result<Vec<PatternMatch>> {
        let mut matches = Vec::new();
        for section in self.executable_sections()? {
            let base = section.va();
            matches.extend(section.search(pattern).into_iter().map(|offset| PatternMatch {
                section: section.name().to_string(),
                offset,
                va: base.wrapping_add(offset),
            }));
        }
        Ok(matches)
    }

    /// Search a 32-bit value encoded in the CPU's byte order.
    pub fn search_int(&self, value: u32) -> Result<Vec<PatternMatch>> {
        self.search_bytes(&self.cpu.encode_u32(value))
    }

    /// Search `pattern` and write one `0x%08x: hex` line per hit.
    ///
    /// Returns the number of hits.
    pub fn search_and_display<W: Write>(&self, pattern: &[u8], out: &mut W) -> Result<usize> {
        let matches = self.search_bytes(pattern)?;
        let rendered = hex::encode(pattern);
        for m in &matches {
            writeln!(out, "{:#010x}: {}", m.va, rendered).map_err(RopError::Io)?;
        }
        Ok(matches.len())
    }
}
