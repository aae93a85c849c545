//! CLI argument definitions

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use crate::core::disassembler::Architecture;

#[derive(Parser, Debug)]
#[command(
    name = "ropscope",
    version,
    about = "Find ROP gadgets in ELF, PE, Mach-O and raw binaries",
    group(
        ArgGroup::new("action")
            .required(true)
            .multiple(true)
            .args(["info", "rop", "search_hexa", "search_int"])
    ),
    after_help = "\
EXAMPLES:
    ropscope -f ./a.out -r 5                     Gadgets of up to 5 instructions
    ropscope -f ./a.out -r 4 --filter '^pop'     Only gadgets starting with pop
    ropscope -f blob.bin --raw x86 --va 0x1000 -r 3
    ropscope -f ./a.out --search-hexa '\\xff\\xe4'"
)]
pub struct Args {
    /// Binary to analyze
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,

    /// Print format information (1 = summary, 2 = sections, 3 = all headers)
    #[arg(short, long, value_name = "LEVEL")]
    pub info: Option<u8>,

    /// Search gadgets of at most DEPTH instructions
    #[arg(short, long, value_name = "DEPTH")]
    pub rop: Option<usize>,

    /// Treat the file as a raw blob of this architecture
    #[arg(long, value_name = "ARCH", value_parser = parse_arch)]
    pub raw: Option<Architecture>,

    /// Load address of a raw blob
    #[arg(long, value_name = "BASE", default_value = "0", value_parser = parse_u64)]
    pub va: u64,

    /// Search a byte pattern, e.g. '\xff\xe4' or 'ff e4'
    #[arg(long, value_name = "HEX")]
    pub search_hexa: Option<String>,

    /// Search a 32-bit integer in the target byte order
    #[arg(long, value_name = "N", value_parser = parse_u32)]
    pub search_int: Option<u32>,

    /// Print one address per gadget
    #[arg(long)]
    pub unique: bool,

    /// Drop gadget addresses containing any of these bytes
    #[arg(long, value_name = "HEX")]
    pub bad_bytes: Option<String>,

    /// Keep gadgets whose disassembly matches this regex
    #[arg(long, value_name = "REGEX")]
    pub filter: Option<String>,

    /// Use AT&T syntax for x86
    #[arg(long)]
    pub att: bool,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Search sections one after another instead of in parallel
    #[arg(long)]
    pub sequential: bool,

    /// Log as JSON lines on stderr
    #[arg(long)]
    pub log_json: bool,
}

fn parse_arch(s: &str) -> Result<Architecture, String> {
    s.parse::<Architecture>().map_err(|e| e.to_string())
}

fn strip_radix(s: &str) -> (&str, u32) {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    }
}

/// Parse a decimal or `0x`-prefixed address
pub fn parse_u64(s: &str) -> Result<u64, String> {
    let (digits, radix) = strip_radix(s.trim());
    u64::from_str_radix(digits, radix).map_err(|e| format!("invalid number '{}': {}", s, e))
}

/// Parse a decimal or `0x`-prefixed 32-bit value
pub fn parse_u32(s: &str) -> Result<u32, String> {
    let (digits, radix) = strip_radix(s.trim());
    u32::from_str_radix(digits, radix).map_err(|e| format!("invalid number '{}': {}", s, e))
}
