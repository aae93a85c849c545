use crate::core::disassembler::{
    Architecture, DecodedInstruction, Disassembler, DisassemblerError, DisassemblerResult,
    Endianness, FlowKind,
};
use capstone::arch::arm::ArmOperandType;
use capstone::prelude::*;
use capstone::{Arch, Capstone, Endian, Insn, InsnGroupId, InsnGroupType, Mode, NO_EXTRA_MODE};

pub struct CapstoneDisassembler {
    cs: Capstone,
    arch: Architecture,
    endianness: Endianness,
}

fn cs_arch_mode(arch: Architecture, end: Endianness) -> Option<(Arch, Mode, Option<Endian>)> {
    let endian = Some(if matches!(end, Endianness::Big) {
        Endian::Big
    } else {
        Endian::Little
    });
    match arch {
        Architecture::ARM => Some((Arch::ARM, Mode::Arm, endian)),
        Architecture::ARM64 => Some((Arch::ARM64, Mode::Arm, endian)),
        Architecture::X86 | Architecture::X86_64 => None,
    }
}

// Capstone's architecture-independent instruction groups
const JUMP_GROUP: InsnGroupId = InsnGroupId(InsnGroupType::CS_GRP_JUMP as u8);
const CALL_GROUP: InsnGroupId = InsnGroupId(InsnGroupType::CS_GRP_CALL as u8);
const RET_GROUP: InsnGroupId = InsnGroupId(InsnGroupType::CS_GRP_RET as u8);
const INT_GROUP: InsnGroupId = InsnGroupId(InsnGroupType::CS_GRP_INT as u8);
const IRET_GROUP: InsnGroupId = InsnGroupId(InsnGroupType::CS_GRP_IRET as u8);

const ARM_CONDITIONS: [&str; 16] = [
    "eq", "ne", "cs", "hs", "cc", "lo", "mi", "pl", "vs", "vc", "hi", "ls", "ge", "lt", "gt", "le",
];

/// A32 mnemonics that can move the program counter, without condition or `s` suffix
const PC_WRITERS: [&str; 19] = [
    "b", "bl", "bx", "blx", "pop", "ldr", "mov", "mvn", "add", "adc", "sub", "sbc", "rsb", "rsc",
    "and", "orr", "eor", "bic", "svc",
];

fn is_pc_writer(base: &str) -> bool {
    let base = base
        .strip_suffix('s')
        .filter(|b| PC_WRITERS.contains(b))
        .unwrap_or(base);
    PC_WRITERS.contains(&base) || base.starts_with("ldm")
}

/// Split an A32 mnemonic into its base and whether it carries a condition code.
///
/// `movs` stays `movs`: a suffix only counts as a condition when what is left
/// is a known mnemonic.
fn split_arm_condition(mnemonic: &str) -> (&str, bool) {
    for cond in ARM_CONDITIONS {
        if let Some(base) = mnemonic.strip_suffix(cond) {
            if is_pc_writer(base) {
                return (base, true);
            }
        }
    }
    (mnemonic, false)
}

/// Stores, pushes and compares name `pc` first without writing it.
fn reads_first_operand(base: &str) -> bool {
    ["str", "stm", "vst", "push", "cmp", "cmn", "tst", "teq", "pld", "pli", "mcr"]
        .iter()
        .any(|prefix| base.starts_with(prefix))
}

/// Group membership of one instruction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Groups {
    jump: bool,
    call: bool,
    ret: bool,
    interrupt: bool,
}

impl Groups {
    fn from_detail(detail: &InsnDetail<'_>) -> Self {
        let groups = detail.groups();
        Self {
            jump: groups.contains(&JUMP_GROUP),
            call: groups.contains(&CALL_GROUP),
            ret: groups.contains(&RET_GROUP),
            interrupt: groups.contains(&INT_GROUP) || groups.contains(&IRET_GROUP),
        }
    }
}

/// What A32 flow classification looks at
#[derive(Debug, Clone, Default)]
struct ArmFacts<'a> {
    mnemonic: &'a str,
    groups: Groups,
    /// Register operands in operand order, register lists included
    registers: Vec<String>,
    /// Registers written implicitly
    implicit_writes: Vec<String>,
}

fn arm_flow(facts: &ArmFacts<'_>) -> FlowKind {
    let (base, conditional) = split_arm_condition(facts.mnemonic);
    let first = facts.registers.first().map(String::as_str);
    let loads_pc = (base == "pop" || base.starts_with("ldm"))
        && facts.registers.iter().any(|r| r == "pc");
    let writes_pc = loads_pc
        || facts.implicit_writes.iter().any(|r| r == "pc")
        || (first == Some("pc") && !reads_first_operand(base));

    if facts.groups.interrupt || matches!(base, "svc" | "udf" | "bkpt") {
        return FlowKind::Trap;
    }
    let indirect = !facts.registers.is_empty();
    let kind = if facts.groups.call {
        if indirect {
            FlowKind::IndirectCall
        } else {
            FlowKind::Call
        }
    } else if facts.groups.ret || loads_pc || (base == "bx" && first == Some("lr")) {
        FlowKind::Return
    } else if facts.groups.jump || writes_pc {
        if indirect {
            FlowKind::IndirectBranch
        } else {
            FlowKind::UnconditionalBranch
        }
    } else {
        FlowKind::Next
    };

    if conditional && kind != FlowKind::Next {
        FlowKind::ConditionalBranch
    } else {
        kind
    }
}

fn arm64_flow(mnemonic: &str) -> FlowKind {
    match mnemonic {
        "ret" | "retaa" | "retab" => FlowKind::Return,
        "br" | "braa" | "brab" | "braaz" | "brabz" => FlowKind::IndirectBranch,
        "blr" | "blraa" | "blrab" | "blraaz" | "blrabz" => FlowKind::IndirectCall,
        "b" => FlowKind::UnconditionalBranch,
        "bl" => FlowKind::Call,
        "cbz" | "cbnz" | "tbz" | "tbnz" => FlowKind::ConditionalBranch,
        m if m.starts_with("b.") => FlowKind::ConditionalBranch,
        "svc" | "hvc" | "smc" | "brk" | "hlt" | "udf" | "eret" => FlowKind::Trap,
        _ => FlowKind::Next,
    }
}

impl CapstoneDisassembler {
    pub fn new(arch: Architecture, endianness: Endianness) -> Option<Self> {
        let (a, m, endian) = cs_arch_mode(arch, endianness)?;
        let mut cs = Capstone::new_raw(a, m, NO_EXTRA_MODE, endian).ok()?;
        // A32 flow classification reads groups and register operands
        cs.set_detail(true).ok()?;
        Some(Self {
            cs,
            arch,
            endianness,
        })
    }

    fn arm_facts<'a>(&self, mnemonic: &'a str, detail: &InsnDetail<'_>) -> ArmFacts<'a> {
        let registers = detail
            .arch_detail()
            .arm()
            .map(|arm| {
                arm.operands()
                    .filter_map(|op| match op.op_type {
                        ArmOperandType::Reg(reg) => self.cs.reg_name(reg),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let implicit_writes = detail
            .regs_write()
            .iter()
            .filter_map(|reg| self.cs.reg_name(*reg))
            .collect();
        ArmFacts {
            mnemonic,
            groups: Groups::from_detail(detail),
            registers,
            implicit_writes,
        }
    }

    fn classify(&self, insn: &Insn<'_>, mnemonic: &str) -> DisassemblerResult<FlowKind> {
        match self.arch {
            Architecture::ARM64 => Ok(arm64_flow(mnemonic)),
            _ => {
                let detail = self
                    .cs
                    .insn_detail(insn)
                    .map_err(|e| DisassemblerError::InternalError(e.to_string()))?;
                Ok(arm_flow(&self.arm_facts(mnemonic, &detail)))
            }
        }
    }
}

impl Disassembler for CapstoneDisassembler {
    fn decode(&self, bytes: &[u8], address: u64) -> DisassemblerResult<DecodedInstruction> {
        if bytes.len() < self.max_instruction_length() {
            return Err(DisassemblerError::InsufficientBytes());
        }
        let insns = self
            .cs
            .disasm_count(bytes, address, 1)
            .map_err(|e| DisassemblerError::InternalError(e.to_string()))?;
        let insn = insns
            .iter()
            .next()
            .ok_or(DisassemblerError::InvalidInstruction())?;

        let mnemonic = insn.mnemonic().unwrap_or("");
        let op_str = insn.op_str().unwrap_or("");
        let text = if op_str.is_empty() {
            mnemonic.to_string()
        } else {
            format!("{} {}", mnemonic, op_str)
        };
        Ok(DecodedInstruction {
            length: insn.bytes().len(),
            flow: self.classify(insn, mnemonic)?,
            text,
        })
    }

    fn max_instruction_length(&self) -> usize {
        4
    }

    fn instruction_alignment(&self) -> usize {
        4
    }

    fn architecture(&self) -> Architecture {
        self.arch
    }

    fn endianness(&self) -> Endianness {
        self.endianness
    }

    fn name(&self) -> &str {
        "capstone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm64_flow_classes() {
        assert_eq!(arm64_flow("ret"), FlowKind::Return);
        assert_eq!(arm64_flow("br"), FlowKind::IndirectBranch);
        assert_eq!(arm64_flow("blr"), FlowKind::IndirectCall);
        assert_eq!(arm64_flow("b"), FlowKind::UnconditionalBranch);
        assert_eq!(arm64_flow("b.ne"), FlowKind::ConditionalBranch);
        assert_eq!(arm64_flow("svc"), FlowKind::Trap);
        assert_eq!(arm64_flow("ldp"), FlowKind::Next);
    }

    const JUMP: Groups = Groups {
        jump: true,
        call: false,
        ret: false,
        interrupt: false,
    };
    const CALL: Groups = Groups {
        jump: false,
        call: true,
        ret: false,
        interrupt: false,
    };
    const NONE: Groups = Groups {
        jump: false,
        call: false,
        ret: false,
        interrupt: false,
    };

    fn facts<'a>(mnemonic: &'a str, groups: Groups, registers: &[&str]) -> ArmFacts<'a> {
        ArmFacts {
            mnemonic,
            groups,
            registers: registers.iter().map(|r| r.to_string()).collect(),
            implicit_writes: Vec::new(),
        }
    }

    #[test]
    fn arm_condition_suffixes() {
        assert_eq!(split_arm_condition("movs"), ("movs", false));
        assert_eq!(split_arm_condition("movvs"), ("mov", true));
        assert_eq!(split_arm_condition("subseq"), ("subs", true));
        assert_eq!(split_arm_condition("bls"), ("b", true));
        assert_eq!(split_arm_condition("bics"), ("bics", false));
        assert_eq!(split_arm_condition("teq"), ("teq", false));
    }

    #[test]
    fn arm_branches_and_calls() {
        assert_eq!(arm_flow(&facts("bx", JUMP, &["lr"])), FlowKind::Return);
        assert_eq!(arm_flow(&facts("bx", JUMP, &["r3"])), FlowKind::IndirectBranch);
        assert_eq!(arm_flow(&facts("b", JUMP, &[])), FlowKind::UnconditionalBranch);
        assert_eq!(arm_flow(&facts("blx", CALL, &["r2"])), FlowKind::IndirectCall);
        assert_eq!(arm_flow(&facts("blx", CALL, &[])), FlowKind::Call);
        assert_eq!(arm_flow(&facts("bl", CALL, &[])), FlowKind::Call);
    }

    #[test]
    fn arm_pc_loads_return() {
        assert_eq!(arm_flow(&facts("pop", NONE, &["r4", "r5", "pc"])), FlowKind::Return);
        assert_eq!(arm_flow(&facts("pop", NONE, &["r4", "r5"])), FlowKind::Next);
        assert_eq!(arm_flow(&facts("ldmia", NONE, &["sp", "r4", "pc"])), FlowKind::Return);
    }

    #[test]
    fn arm_data_processing_into_pc() {
        assert_eq!(arm_flow(&facts("mov", NONE, &["pc", "r0"])), FlowKind::IndirectBranch);
        assert_eq!(arm_flow(&facts("mov", NONE, &["r0", "pc"])), FlowKind::Next);
        assert_eq!(
            arm_flow(&facts("add", NONE, &["pc", "pc", "r0"])),
            FlowKind::IndirectBranch
        );
        assert_eq!(arm_flow(&facts("movs", NONE, &["pc", "lr"])), FlowKind::IndirectBranch);
        assert_eq!(arm_flow(&facts("subs", NONE, &["pc", "lr"])), FlowKind::IndirectBranch);
        assert_eq!(arm_flow(&facts("ldr", NONE, &["pc", "sp"])), FlowKind::IndirectBranch);

        let mut implicit = facts("ldrex", NONE, &["r0", "r1"]);
        implicit.implicit_writes.push("pc".to_string());
        assert_eq!(arm_flow(&implicit), FlowKind::IndirectBranch);
    }

    #[test]
    fn arm_pc_as_source_is_not_a_branch() {
        assert_eq!(arm_flow(&facts("str", NONE, &["pc", "sp"])), FlowKind::Next);
        assert_eq!(arm_flow(&facts("push", NONE, &["pc"])), FlowKind::Next);
        assert_eq!(arm_flow(&facts("cmp", NONE, &["pc", "r0"])), FlowKind::Next);
    }

    #[test]
    fn arm_conditional_forms() {
        assert_eq!(arm_flow(&facts("bxeq", JUMP, &["lr"])), FlowKind::ConditionalBranch);
        assert_eq!(arm_flow(&facts("bne", JUMP, &[])), FlowKind::ConditionalBranch);
        assert_eq!(arm_flow(&facts("movne", NONE, &["r0", "r1"])), FlowKind::Next);
        assert_eq!(
            arm_flow(&facts("addeq", NONE, &["pc", "pc", "r0"])),
            FlowKind::ConditionalBranch
        );
        assert_eq!(
            arm_flow(&facts("popgt", NONE, &["r4", "pc"])),
            FlowKind::ConditionalBranch
        );
    }

    #[test]
    fn arm_traps() {
        let svc = Groups {
            interrupt: true,
            ..NONE
        };
        assert_eq!(arm_flow(&facts("svc", svc, &[])), FlowKind::Trap);
        assert_eq!(arm_flow(&facts("svceq", NONE, &[])), FlowKind::Trap);
        assert_eq!(arm_flow(&facts("udf", NONE, &[])), FlowKind::Trap);
    }

    #[test]
    fn decodes_arm_pc_writers() {
        let d = CapstoneDisassembler::new(Architecture::ARM, Endianness::Little).unwrap();
        let flow = |bytes: [u8; 4]| d.decode(&bytes, 0x8000).unwrap().flow;

        // add pc, pc, r0
        assert_eq!(flow([0x00, 0xf0, 0x8f, 0xe0]), FlowKind::IndirectBranch);
        // movs pc, lr
        assert_eq!(flow([0x0e, 0xf0, 0xb0, 0xe1]), FlowKind::IndirectBranch);
        // sub pc, lr, #4
        assert_eq!(flow([0x04, 0xf0, 0x4e, 0xe2]), FlowKind::IndirectBranch);
        // pop {r4, pc}
        assert_eq!(flow([0x10, 0x80, 0xbd, 0xe8]), FlowKind::Return);
        // mov r0, r1
        assert_eq!(flow([0x01, 0x00, 0xa0, 0xe1]), FlowKind::Next);

        let bx = d.decode(&[0x1e, 0xff, 0x2f, 0xe1], 0x8000).unwrap();
        assert_eq!(bx.text, "bx lr");
        assert_eq!(bx.flow, FlowKind::Return);
    }

    #[test]
    fn decodes_big_endian_arm() {
        let d = CapstoneDisassembler::new(Architecture::ARM, Endianness::Big).unwrap();
        let bx = d.decode(&[0xe1, 0x2f, 0xff, 0x1e], 0).unwrap();
        assert_eq!(bx.text, "bx lr");
        assert_eq!(bx.flow, FlowKind::Return);
    }

    #[test]
    fn decodes_arm64_ret() {
        let d = CapstoneDisassembler::new(Architecture::ARM64, Endianness::Little).unwrap();
        // ret
        let ret = d.decode(&[0xc0, 0x03, 0x5f, 0xd6], 0x1000).unwrap();
        assert_eq!(ret.text, "ret");
        assert_eq!(ret.length, 4);
        assert_eq!(ret.flow, FlowKind::Return);
        assert!(d.decode(&[0xc0, 0x03], 0x1000).is_err());
    }

    #[test]
    fn no_capstone_for_x86() {
        assert!(CapstoneDisassembler::new(Architecture::X86, Endianness::Little).is_none());
    }
}
