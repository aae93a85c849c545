//! Backward-disassembly gadget search.
//!
//! Instruction boundaries are unknown when walking backward, so for every
//! terminating instruction (the tail) each earlier start position inside a
//! bounded window is tried and decoded forward. A start is accepted when the
//! forward decode lands exactly on the tail within the depth bound and never
//! leaves the straight line before it.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::core::disassembler::{Disassembler, FlowKind};
use crate::core::gadget::{Gadget, Location};

/// Separator between rendered instructions of one gadget
pub const INSTRUCTION_SEPARATOR: &str = "; ";

/// Per-tail decode cache; start positions of one tail overlap heavily.
struct TailWalker<'a, D: Disassembler + ?Sized> {
    disasm: &'a D,
    bytes: &'a [u8],
    base_va: u64,
    tail: usize,
    max_depth: usize,
    decoded: HashMap<usize, Option<(usize, FlowKind, String)>>,
}

impl<'a, D: Disassembler + ?Sized> TailWalker<'a, D> {
    fn new(disasm: &'a D, bytes: &'a [u8], base_va: u64, tail: usize, max_depth: usize) -> Self {
        Self {
            disasm,
            bytes,
            base_va,
            tail,
            max_depth,
            decoded: HashMap::new(),
        }
    }

    fn decode_at(&mut self, pos: usize) -> Option<(usize, FlowKind)> {
        let (disasm, bytes, base_va) = (self.disasm, self.bytes, self.base_va);
        self.decoded
            .entry(pos)
            .or_insert_with(|| {
                disasm
                    .decode(&bytes[pos..], base_va.wrapping_add(pos as u64))
                    .ok()
                    .map(|insn| (insn.length, insn.flow, insn.text))
            })
            .as_ref()
            .map(|(len, flow, _)| (*len, *flow))
    }

    /// Positions of the instructions of the gadget starting at `start`, if valid.
    fn walk(&mut self, start: usize) -> Option<Vec<usize>> {
        // The depth may be unbounded; grow with the walk
        let mut positions = Vec::new();
        let mut pos = start;
        loop {
            if positions.len() == self.max_depth {
                return None;
            }
            let (length, flow) = self.decode_at(pos)?;
            positions.push(pos);
            if pos == self.tail {
                return Some(positions);
            }
            if flow.ends_flow() || length == 0 {
                return None;
            }
            pos += length;
            if pos > self.tail {
                return None;
            }
        }
    }

    fn gadget_at(&mut self, start: usize) -> Option<Gadget> {
        let positions = self.walk(start)?;
        let text = positions
            .iter()
            .filter_map(|pos| self.decoded.get(pos))
            .filter_map(|entry| entry.as_ref().map(|(_, _, text)| text.as_str()))
            .collect::<Vec<_>>()
            .join(INSTRUCTION_SEPARATOR);
        Some(Gadget::new(
            text,
            positions.len(),
            Location::new(start as u64, self.base_va),
        ))
    }
}

/// Find every gadget in `bytes`, a section whose first byte lives at `base_va`.
///
/// Gadgets are collapsed by start offset only; identical text at different
/// offsets is returned as separate entries, ordered by offset.
pub fn find_gadgets_in_buffer<D: Disassembler + ?Sized>(
    disasm: &D,
    bytes: &[u8],
    base_va: u64,
    max_depth: usize,
) -> Vec<Gadget> {
    if bytes.is_empty() || max_depth == 0 {
        return Vec::new();
    }

    let align = disasm.instruction_alignment().max(1);
    let window = (max_depth - 1).saturating_mul(disasm.max_instruction_length().max(1));
    let mut found: BTreeMap<usize, Gadget> = BTreeMap::new();
    let mut tails = 0usize;

    for tail in (0..bytes.len()).step_by(align) {
        let is_tail = disasm
            .flow_at(&bytes[tail..], base_va.wrapping_add(tail as u64))
            .is_some_and(|(_, flow)| flow.terminates_gadget());
        if !is_tail {
            continue;
        }
        tails += 1;

        let mut walker = TailWalker::new(disasm, bytes, base_va, tail, max_depth);
        let lowest = tail.saturating_sub(window);
        let mut start = tail;
        loop {
            // A start decodes to exactly one sequence, so it can only ever
            // have matched one tail.
            if !found.contains_key(&start) {
                if let Some(gadget) = walker.gadget_at(start) {
                    found.insert(start, gadget);
                }
            }
            if start < lowest + align {
                break;
            }
            start -= align;
        }
    }

    trace!(
        base_va = format_args!("{:#x}", base_va),
        size = bytes.len(),
        tails,
        gadgets = found.len(),
        "Backward search complete"
    );

    found.into_values().collect()
}
