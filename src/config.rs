//! Search and program configuration.

use serde::{Deserialize, Serialize};

use crate::core::disassembler::{Architecture, Syntax};
use crate::io::IOLimits;

/// Default maximum gadget length in instructions, tail included
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Knobs for one gadget search run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum instructions per gadget, tail included
    pub max_depth: usize,
    /// Search sections on the rayon pool
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            parallel: true,
        }
    }
}

impl SearchConfig {
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }
}

/// How a [`crate::program::Program`] is constructed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramOptions {
    /// Treat the input as a raw blob of this architecture
    pub arch: Option<Architecture>,
    /// Load address of a raw blob
    pub raw_base: u64,
    pub limits: IOLimits,
    pub syntax: Syntax,
}

impl ProgramOptions {
    pub fn raw(arch: Architecture) -> Self {
        Self {
            arch: Some(arch),
            ..Self::default()
        }
    }
}
