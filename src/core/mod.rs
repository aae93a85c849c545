//! Core data types for gadget discovery.
//!
//! Sections are the input of the search, gadgets and the catalog are its
//! output, and the disassembler trait is the seam to the decoding backends.

pub mod disassembler;
pub mod gadget;
pub mod section;
