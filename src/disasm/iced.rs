use crate::core::disassembler::{
    Architecture, DecodedInstruction, Disassembler, DisassemblerError, DisassemblerResult,
    FlowKind, Syntax,
};
use iced_x86::{
    Decoder, DecoderOptions, FlowControl, Formatter, GasFormatter, Instruction, IntelFormatter,
};

pub struct IcedDisassembler {
    bits: u32,
    arch: Architecture,
    syntax: Syntax,
}

impl IcedDisassembler {
    pub fn new(arch: Architecture, syntax: Syntax) -> Self {
        let bits = match arch {
            Architecture::X86 => 32,
            _ => 64,
        };
        Self { bits, arch, syntax }
    }

    fn decode_raw(&self, bytes: &[u8], address: u64) -> DisassemblerResult<Instruction> {
        if !matches!(self.arch, Architecture::X86 | Architecture::X86_64) {
            return Err(DisassemblerError::UnsupportedArchitecture());
        }
        if bytes.is_empty() {
            return Err(DisassemblerError::InsufficientBytes());
        }
        let mut decoder = Decoder::new(self.bits, bytes, DecoderOptions::NONE);
        decoder.set_ip(address);

        let instr = decoder.decode();
        if instr.is_invalid() {
            return Err(DisassemblerError::InvalidInstruction());
        }
        Ok(instr)
    }

    fn format(&self, instr: &Instruction) -> String {
        let mut out = String::new();
        match self.syntax {
            Syntax::Intel => {
                let mut fmt = IntelFormatter::new();
                let options = fmt.options_mut();
                options.set_space_after_operand_separator(true);
                options.set_hex_prefix("0x");
                options.set_hex_suffix("");
                fmt.format(instr, &mut out);
            }
            Syntax::Att => {
                let mut fmt = GasFormatter::new();
                let options = fmt.options_mut();
                options.set_space_after_operand_separator(true);
                fmt.format(instr, &mut out);
            }
        }
        out
    }
}

fn flow_kind(flow: FlowControl) -> FlowKind {
    match flow {
        FlowControl::Next => FlowKind::Next,
        FlowControl::ConditionalBranch | FlowControl::XbeginXabortXend => {
            FlowKind::ConditionalBranch
        }
        FlowControl::UnconditionalBranch => FlowKind::UnconditionalBranch,
        FlowControl::IndirectBranch => FlowKind::IndirectBranch,
        FlowControl::Call => FlowKind::Call,
        FlowControl::IndirectCall => FlowKind::IndirectCall,
        FlowControl::Return => FlowKind::Return,
        FlowControl::Interrupt | FlowControl::Exception => FlowKind::Trap,
        _ => FlowKind::Trap,
    }
}

impl Disassembler for IcedDisassembler {
    fn decode(&self, bytes: &[u8], address: u64) -> DisassemblerResult<DecodedInstruction> {
        let instr = self.decode_raw(bytes, address)?;
        Ok(DecodedInstruction {
            length: instr.len(),
            text: self.format(&instr),
            flow: flow_kind(instr.flow_control()),
        })
    }

    fn flow_at(&self, bytes: &[u8], address: u64) -> Option<(usize, FlowKind)> {
        self.decode_raw(bytes, address)
            .ok()
            .map(|instr| (instr.len(), flow_kind(instr.flow_control())))
    }

    fn max_instruction_length(&self) -> usize {
        15
    }

    fn architecture(&self) -> Architecture {
        self.arch
    }

    fn name(&self) -> &str {
        "iced-x86"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pop_ret_x86() {
        let d = IcedDisassembler::new(Architecture::X86, Syntax::Intel);
        let pop = d.decode(&[0x58, 0xc3], 0x1000).unwrap();
        assert_eq!(pop.text, "pop eax");
        assert_eq!(pop.length, 1);
        assert_eq!(pop.flow, FlowKind::Next);

        let ret = d.decode(&[0xc3], 0x1001).unwrap();
        assert_eq!(ret.text, "ret");
        assert_eq!(ret.flow, FlowKind::Return);
    }

    #[test]
    fn decodes_indirect_transfers_x64() {
        let d = IcedDisassembler::new(Architecture::X86_64, Syntax::Intel);
        // jmp rax
        let jmp = d.decode(&[0xff, 0xe0], 0).unwrap();
        assert_eq!(jmp.text, "jmp rax");
        assert_eq!(jmp.flow, FlowKind::IndirectBranch);
        // call rbx
        let call = d.decode(&[0xff, 0xd3], 0).unwrap();
        assert_eq!(call.text, "call rbx");
        assert_eq!(call.flow, FlowKind::IndirectCall);
        // int3
        assert_eq!(d.flow_at(&[0xcc], 0), Some((1, FlowKind::Trap)));
    }

    #[test]
    fn renders_att_syntax() {
        let d = IcedDisassembler::new(Architecture::X86_64, Syntax::Att);
        let pop = d.decode(&[0x5f], 0).unwrap();
        assert_eq!(pop.text, "pop %rdi");
    }

    #[test]
    fn rejects_invalid_and_truncated() {
        let d = IcedDisassembler::new(Architecture::X86_64, Syntax::Intel);
        // 0x06 (push es) is invalid in 64-bit mode
        assert_eq!(
            d.decode(&[0x06], 0),
            Err(DisassemblerError::InvalidInstruction())
        );
        // mov eax, imm32 with the immediate cut short
        assert!(d.decode(&[0xb8, 0x01], 0).is_err());
        assert_eq!(d.decode(&[], 0), Err(DisassemblerError::InsufficientBytes()));
        assert_eq!(d.flow_at(&[0x06], 0), None);
    }

    #[test]
    fn rejects_non_x86_architecture() {
        let d = IcedDisassembler::new(Architecture::ARM64, Syntax::Intel);
        assert_eq!(
            d.decode(&[0xc3], 0),
            Err(DisassemblerError::UnsupportedArchitecture())
        );
    }
}
