//! Reader and writer for compiled `.int` program images.
//!
//! ```text
//! $$LDcode
//! 32000000000002000000
//! ...
//! $$bits
//! Xosc,0
//! $$int16s
//! a,0
//! $$cycle 10000 us
//! ```
//!
//! Every instruction line holds one [`Record`]: five little-endian 16-bit fields, each byte
//! written as two hex digits, high nibble first.

use std::fmt::Write as _;

use miette::Result;

use crate::bank::Capacity;
use crate::error;
use crate::instr::{Instr, Record};
use crate::program::Program;
use crate::span::{lines, Span};
use crate::symbol::{parse_entry, BankKind, SymbolTable};

/// Period a program runs at when the image does not say otherwise.
pub const DEFAULT_CYCLE_US: u32 = 10_000;

const HEADER: &str = "$$LDcode";
const BITS: &str = "$$bits";
const INTS: &str = "$$int16s";
const CYCLE: &str = "$$cycle";

/// A loaded program with everything the driver needs to run it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Image {
    pub program: Program,
    pub symbols: SymbolTable,
    /// Cycle period in microseconds.
    pub cycle_us: u32,
}

impl Image {
    /// Serialize into the `.int` format accepted by [`load`].
    pub fn emit(&self) -> String {
        let mut out = String::new();
        out.push_str(HEADER);
        out.push('\n');
        for instr in &self.program {
            for byte in instr.encode().to_bytes() {
                let _ = write!(out, "{:02x}", byte);
            }
            out.push('\n');
        }
        for (marker, bank) in [(BITS, BankKind::Bit), (INTS, BankKind::Int)] {
            out.push_str(marker);
            out.push('\n');
            for (name, symbol) in self.symbols.in_bank(bank) {
                let _ = writeln!(out, "{},{}", name, symbol.addr);
            }
        }
        let _ = writeln!(out, "{} {} us", CYCLE, self.cycle_us);
        out
    }
}

/// Load a program image.
///
/// Any defect aborts the whole load. Records after the first `END_OF_PROGRAM` are ignored.
pub fn load(src: &str, capacity: &Capacity) -> Result<Image> {
    let mut lines = lines(src);

    match lines.next() {
        Some(line) if line.text.contains(HEADER) => (),
        Some(line) => return Err(error::load_header(line.span, src)),
        None => return Err(error::load_header(Span::default(), src)),
    }

    // Instruction records, up to the symbol section
    let mut instrs = Vec::new();
    let mut spans = Vec::new();
    let mut ended = false;
    loop {
        let Some(line) = lines.next() else {
            return Err(error::load_missing_symbols(src));
        };
        let (text, span) = line.trimmed();
        if text.starts_with(BITS) {
            break;
        }
        if text.starts_with("$$") {
            return Err(error::load_section(span, src));
        }
        if ended {
            continue;
        }
        let record = parse_record(text, span, src)?;
        let instr = Instr::decode(record).map_err(|e| error::load_decode(span, src, e))?;
        ended = instr == Instr::End;
        instrs.push(instr);
        spans.push(span);
    }

    let program = Program::new(instrs, capacity)
        .map_err(|e| error::program(e.index().and_then(|i| spans.get(i).copied()), src, e))?;

    // Symbol sections
    let mut symbols = SymbolTable::new();
    let mut bank = BankKind::Bit;
    let mut cycle_us = DEFAULT_CYCLE_US;
    for line in lines {
        let (text, span) = line.trimmed();
        if text.is_empty() {
            continue;
        }
        if text.starts_with(BITS) {
            bank = BankKind::Bit;
        } else if text.starts_with(INTS) {
            bank = BankKind::Int;
        } else if text.starts_with(CYCLE) {
            cycle_us = parse_cycle(text, span, src)?;
        } else if text.starts_with("$$") {
            return Err(error::load_section(span, src));
        } else {
            parse_entry(&mut symbols, line, bank, capacity, src)?;
        }
    }

    Ok(Image {
        program,
        symbols,
        cycle_us,
    })
}

fn parse_record(text: &str, span: Span, src: &str) -> Result<Record> {
    if text.len() != Record::SIZE * 2 {
        return Err(error::load_length(span, src, text.chars().count()));
    }
    let digits = text.as_bytes();
    let mut bytes = [0u8; Record::SIZE];
    for (i, byte) in bytes.iter_mut().enumerate() {
        let hi = hex_digit(digits[2 * i]).ok_or_else(|| error::load_hex(span.slice(2 * i, 1), src))?;
        let lo = hex_digit(digits[2 * i + 1])
            .ok_or_else(|| error::load_hex(span.slice(2 * i + 1, 1), src))?;
        *byte = (hi << 4) | lo;
    }
    Ok(Record::from_bytes(bytes))
}

fn hex_digit(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}

/// `$$cycle 10000 us`
fn parse_cycle(text: &str, span: Span, src: &str) -> Result<u32> {
    let rest = text[CYCLE.len()..].trim();
    let digits = rest.strip_suffix("us").unwrap_or(rest).trim();
    match digits.parse::<u32>() {
        Ok(us) if us > 0 => Ok(us),
        _ => Err(error::load_cycle(span, src)),
    }
}
