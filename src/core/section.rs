//! Executable section views.
//!
//! A [`Section`] borrows one contiguous executable region of the file the
//! [`crate::program::Program`] owns. Sections are produced by the format
//! layer and stay read-only for the rest of the pipeline.

use memchr::memmem;
use std::fmt;

/// One executable region of the binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'data> {
    name: &'data str,
    offset: u64,
    va: u64,
    data: &'data [u8],
}

impl<'data> Section<'data> {
    /// Create a section over `data`, which starts at raw file `offset` and
    /// is mapped at `va`.
    pub fn new(name: &'data str, offset: u64, va: u64, data: &'data [u8]) -> Self {
        Self {
            name,
            offset,
            va,
            data,
        }
    }

    /// Section name (e.g. ".text", "LOAD", "raw")
    pub fn name(&self) -> &'data str {
        self.name
    }

    /// Raw file offset of the first byte
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Virtual address of the first byte
    pub fn va(&self) -> u64 {
        self.va
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// The section bytes
    pub fn data(&self) -> &'data [u8] {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Find every in-section offset where `pattern` occurs.
    ///
    /// Overlapping matches are all reported. An empty pattern matches nothing.
    pub fn search(&self, pattern: &[u8]) -> Vec<u64> {
        if pattern.is_empty() || pattern.len() > self.data.len() {
            return Vec::new();
        }

        let finder = memmem::Finder::new(pattern);
        let mut hits = Vec::new();
        let mut pos = 0usize;
        while let Some(found) = finder.find(&self.data[pos..]) {
            let at = pos + found;
            hits.push(at as u64);
            pos = at + 1;
            if pos + pattern.len() > self.data.len() {
                break;
            }
        }
        hits
    }
}

impl fmt::Display for Section<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (offset {:#x}, {} bytes)",
            self.name,
            self.offset,
            self.data.len()
        )
    }
}
