//! Headerless byte blobs searched as a single executable region.

use crate::formats::{ExecRegion, VerbosityLevel};

/// Name of the one section a raw blob exposes
pub const RAW_SECTION_NAME: &str = "raw";

/// A raw blob loaded at `base`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFormat {
    base: u64,
    regions: Vec<ExecRegion>,
}

impl RawFormat {
    pub fn new(size: usize, base: u64) -> Self {
        let regions = if size == 0 {
            Vec::new()
        } else {
            vec![ExecRegion {
                name: RAW_SECTION_NAME.to_string(),
                offset: 0,
                size: size as u64,
                va: base,
            }]
        };
        Self { base, regions }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn regions(&self) -> &[ExecRegion] {
        &self.regions
    }

    pub fn display_information(&self, _level: VerbosityLevel) -> String {
        let size = self.regions.first().map_or(0, |r| r.size);
        format!("Raw blob: {} bytes loaded at {:#x}\n", size, self.base)
    }
}
