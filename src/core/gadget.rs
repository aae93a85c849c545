//! Gadgets and the deduplicated gadget catalog.
//!
//! A [`Gadget`] is identified by its rendered disassembly text. Every place it
//! was found is kept as a [`Location`]: the raw offset inside its section plus
//! that section's virtual base. The base must travel with the offset because
//! the same text found in two sections can share a raw offset.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap, Entry};
use std::fmt;

/// Where one occurrence of a gadget lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    /// Raw offset of the first instruction inside its section
    pub offset: u64,
    /// Virtual address of the section start
    pub section_va: u64,
}

impl Location {
    pub fn new(offset: u64, section_va: u64) -> Self {
        Self { offset, section_va }
    }

    /// Virtual address of the first instruction
    pub fn va(&self) -> u64 {
        self.section_va.wrapping_add(self.offset)
    }
}

/// One unique instruction sequence and all places it occurs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GadgetRecord")]
pub struct Gadget {
    disassembly: String,
    instruction_count: usize,
    locations: Vec<Location>,
}

/// Unchecked serialized form of [`Gadget`]
#[derive(Deserialize)]
struct GadgetRecord {
    disassembly: String,
    instruction_count: usize,
    locations: Vec<Location>,
}

impl TryFrom<GadgetRecord> for Gadget {
    type Error = String;

    fn try_from(record: GadgetRecord) -> Result<Self, Self::Error> {
        if record.locations.is_empty() {
            return Err(format!("gadget '{}' has no locations", record.disassembly));
        }
        Ok(Self {
            disassembly: record.disassembly,
            instruction_count: record.instruction_count,
            locations: record.locations,
        })
    }
}

impl Gadget {
    /// Create a gadget with its first occurrence.
    pub fn new(disassembly: String, instruction_count: usize, location: Location) -> Self {
        Self {
            disassembly,
            instruction_count,
            locations: vec![location],
        }
    }

    /// Rendered instructions joined with `"; "`, e.g. `pop eax; ret`
    pub fn disassembly(&self) -> &str {
        &self.disassembly
    }

    /// Number of instructions including the terminating one
    pub fn instruction_count(&self) -> usize {
        self.instruction_count
    }

    /// All occurrences, in discovery order
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// First occurrence; construction and deserialization both guarantee one
    pub fn first_location(&self) -> Location {
        self.locations[0]
    }

    /// Record one more occurrence.
    pub fn add_location(&mut self, location: Location) {
        self.locations.push(location);
    }

    /// Virtual addresses of every occurrence
    pub fn virtual_addresses(&self) -> impl Iterator<Item = u64> + '_ {
        self.locations.iter().map(Location::va)
    }

    /// Occurrences whose virtual address, in `address_bytes` little-endian
    /// bytes, contains none of `bad_bytes`.
    pub fn locations_without_bytes(&self, bad_bytes: &[u8], address_bytes: usize) -> Vec<Location> {
        self.locations
            .iter()
            .copied()
            .filter(|loc| {
                let va = loc.va().to_le_bytes();
                !va[..address_bytes.min(8)].iter().any(|b| bad_bytes.contains(b))
            })
            .collect()
    }
}

impl fmt::Display for Gadget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#010x}: {} ({} found)",
            self.first_location().va(),
            self.disassembly,
            self.locations.len()
        )
    }
}

/// Mapping from disassembly text to the unique gadget carrying it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GadgetCatalog {
    gadgets: BTreeMap<String, Gadget>,
}

impl GadgetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one incoming gadget into the catalog.
    ///
    /// If a gadget with the same disassembly text is already present, the
    /// incoming locations are appended to it and the incoming gadget is
    /// dropped. Otherwise the incoming gadget becomes a new entry.
    pub fn merge(&mut self, incoming: Gadget) {
        match self.gadgets.entry(incoming.disassembly.clone()) {
            Entry::Occupied(mut existing) => {
                let existing = existing.get_mut();
                for location in incoming.locations {
                    existing.add_location(location);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(incoming);
            }
        }
    }

    /// Merge every gadget of one section's search result, in order.
    pub fn merge_all<I: IntoIterator<Item = Gadget>>(&mut self, incoming: I) {
        for gadget in incoming {
            self.merge(gadget);
        }
    }

    pub fn get(&self, disassembly: &str) -> Option<&Gadget> {
        self.gadgets.get(disassembly)
    }

    pub fn contains(&self, disassembly: &str) -> bool {
        self.gadgets.contains_key(disassembly)
    }

    /// Number of unique gadgets
    pub fn len(&self) -> usize {
        self.gadgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gadgets.is_empty()
    }

    /// Total number of occurrences across all gadgets
    pub fn occurrence_count(&self) -> usize {
        self.gadgets.values().map(|g| g.locations.len()).sum()
    }

    /// Gadgets ordered by disassembly text
    pub fn iter(&self) -> btree_map::Values<'_, String, Gadget> {
        self.gadgets.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.gadgets.keys().map(String::as_str)
    }
}

/// Functional form of [`GadgetCatalog::merge`].
pub fn merge(mut catalog: GadgetCatalog, incoming: Gadget) -> GadgetCatalog {
    catalog.merge(incoming);
    catalog
}

impl IntoIterator for GadgetCatalog {
    type Item = Gadget;
    type IntoIter = btree_map::IntoValues<String, Gadget>;

    fn into_iter(self) -> Self::IntoIter {
        self.gadgets.into_values()
    }
}

impl<'a> IntoIterator for &'a GadgetCatalog {
    type Item = &'a Gadget;
    type IntoIter = btree_map::Values<'a, String, Gadget>;

    fn into_iter(self) -> Self::IntoIter {
        self.gadgets.values()
    }
}

impl FromIterator<Gadget> for GadgetCatalog {
    fn from_iter<I: IntoIterator<Item = Gadget>>(iter: I) -> Self {
        let mut catalog = GadgetCatalog::new();
        catalog.merge_all(iter);
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gadget(text: &str, offset: u64, base: u64) -> Gadget {
        let count = text.split("; ").count();
        Gadget::new(text.to_string(), count, Location::new(offset, base))
    }

    #[test]
    fn test_location_va() {
        let loc = Location::new(0x10, 0x401000);
        assert_eq!(loc.va(), 0x401010);
    }

    #[test]
    fn test_merge_same_section() {
        let mut catalog = GadgetCatalog::new();
        catalog.merge(gadget("pop eax; ret", 0x100, 0x1000));
        catalog.merge(gadget("pop eax; ret", 0x340, 0x1000));

        assert_eq!(catalog.len(), 1);
        let g = catalog.get("pop eax; ret").unwrap();
        assert_eq!(g.instruction_count(), 2);
        assert_eq!(
            g.locations(),
            &[Location::new(0x100, 0x1000), Location::new(0x340, 0x1000)]
        );
        assert_eq!(g.virtual_addresses().collect::<Vec<_>>(), vec![0x1100, 0x1340]);
    }

    #[test]
    fn test_merge_across_sections_keeps_base() {
        let catalog = merge(GadgetCatalog::new(), gadget("pop rdi; ret", 0x20, 0x1000));
        let catalog = merge(catalog, gadget("pop rdi; ret", 0x20, 0x8000));

        let g = catalog.get("pop rdi; ret").unwrap();
        assert_eq!(g.locations().len(), 2);
        assert!(g.locations().contains(&Location::new(0x20, 0x1000)));
        assert!(g.locations().contains(&Location::new(0x20, 0x8000)));
    }

    #[test]
    fn test_merge_distinct_text() {
        let catalog: GadgetCatalog = vec![
            gadget("ret", 1, 0),
            gadget("pop rsi; ret", 0, 0),
            gadget("ret", 5, 0),
        ]
        .into_iter()
        .collect();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.occurrence_count(), 3);
        assert_eq!(catalog.keys().collect::<Vec<_>>(), vec!["pop rsi; ret", "ret"]);
    }

    #[test]
    fn test_merge_order_does_not_change_content() {
        let a = vec![gadget("ret", 1, 0x1000), gadget("leave; ret", 4, 0x1000)];
        let b = vec![gadget("ret", 9, 0x2000)];

        let mut forward = GadgetCatalog::new();
        forward.merge_all(a.clone());
        forward.merge_all(b.clone());

        let mut backward = GadgetCatalog::new();
        backward.merge_all(b);
        backward.merge_all(a);

        assert_eq!(
            forward.keys().collect::<Vec<_>>(),
            backward.keys().collect::<Vec<_>>()
        );
        for g in &forward {
            let mut l1 = g.locations().to_vec();
            let mut l2 = backward.get(g.disassembly()).unwrap().locations().to_vec();
            l1.sort();
            l2.sort();
            assert_eq!(l1, l2);
        }
    }

    #[test]
    fn test_locations_without_bad_bytes() {
        let mut g = gadget("ret", 0x0a, 0x400000);
        g.add_location(Location::new(0x11, 0x400000));
        let kept = g.locations_without_bytes(&[0x0a], 4);
        assert_eq!(kept, vec![Location::new(0x11, 0x400000)]);
    }

    #[test]
    fn test_display() {
        let mut g = gadget("pop eax; ret", 0x100, 0x1000);
        g.add_location(Location::new(0x340, 0x1000));
        assert_eq!(g.to_string(), "0x00001100: pop eax; ret (2 found)");
    }

    #[test]
    fn test_deserialize_requires_a_location() {
        let empty = r#"{"disassembly":"ret","instruction_count":1,"locations":[]}"#;
        assert!(serde_json::from_str::<Gadget>(empty).is_err());

        let catalog = r#"{"gadgets":{"ret":{"disassembly":"ret","instruction_count":1,"locations":[]}}}"#;
        assert!(serde_json::from_str::<GadgetCatalog>(catalog).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let mut g = gadget("pop eax; ret", 0x100, 0x1000);
        g.add_location(Location::new(0x340, 0x1000));
        let json = serde_json::to_string(&g).unwrap();
        let back: Gadget = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
        assert_eq!(back.first_location().va(), 0x1100);
    }
}
