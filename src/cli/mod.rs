//! Command-line driver: argument parsing, post-filters and output rendering.

pub mod args;

pub use args::Args;

use regex::Regex;
use serde::Serialize;

use crate::core::gadget::{Gadget, GadgetCatalog};
use crate::error::{Result, RopError};

/// Parse a byte pattern written as `\x90\xc3`, `90 c3`, `0x90c3` or `90c3`.
pub fn parse_hex_pattern(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input
        .replace("\\x", "")
        .replace("0x", "")
        .replace("0X", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return Err(RopError::InvalidInput("empty byte pattern".to_string()));
    }
    hex::decode(&cleaned)
        .map_err(|e| RopError::InvalidInput(format!("bad byte pattern '{}': {}", input, e)))
}

/// Post-filters applied to a finished catalog
#[derive(Debug, Default)]
pub struct GadgetFilter {
    pub unique: bool,
    pub bad_bytes: Vec<u8>,
    pub pattern: Option<Regex>,
    /// Address width in bytes, for the bad-byte check
    pub address_bytes: usize,
}

impl GadgetFilter {
    /// Gadgets that survive the filters, in catalog order.
    pub fn apply(&self, catalog: &GadgetCatalog) -> Vec<Gadget> {
        catalog
            .iter()
            .filter(|g| {
                self.pattern
                    .as_ref()
                    .is_none_or(|re| re.is_match(g.disassembly()))
            })
            .filter_map(|g| {
                let mut locations = g.locations_without_bytes(&self.bad_bytes, self.address_bytes);
                if self.unique {
                    locations.truncate(1);
                }
                let mut rest = locations.into_iter();
                let mut kept = Gadget::new(
                    g.disassembly().to_string(),
                    g.instruction_count(),
                    rest.next()?,
                );
                for location in rest {
                    kept.add_location(location);
                }
                Some(kept)
            })
            .collect()
    }
}

/// JSON shape of one gadget
#[derive(Debug, Serialize)]
pub struct GadgetRecord<'a> {
    pub address: u64,
    pub disassembly: &'a str,
    pub instructions: usize,
    pub addresses: Vec<u64>,
}

impl<'a> From<&'a Gadget> for GadgetRecord<'a> {
    fn from(gadget: &'a Gadget) -> Self {
        Self {
            address: gadget.first_location().va(),
            disassembly: gadget.disassembly(),
            instructions: gadget.instruction_count(),
            addresses: gadget.virtual_addresses().collect(),
        }
    }
}

/// One line per gadget followed by a count
pub fn render_text(gadgets: &[Gadget]) -> String {
    let mut out = String::from("Gadgets information\n============================================================\n");
    for gadget in gadgets {
        out.push_str(&gadget.to_string());
        out.push('\n');
    }
    out.push_str(&format!("\nUnique gadgets found: {}\n", gadgets.len()));
    out
}

pub fn render_json(gadgets: &[Gadget]) -> Result<String> {
    let records: Vec<GadgetRecord<'_>> = gadgets.iter().map(GadgetRecord::from).collect();
    serde_json::to_string_pretty(&records)
        .map_err(|e| RopError::InvalidInput(format!("JSON encoding failed: {}", e)))
}
