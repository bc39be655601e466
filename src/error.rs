use miette::{miette, LabeledSpan, Report, Severity};

use crate::instr::DecodeError;
use crate::program::ProgramError;
use crate::span::Span;
use crate::symbol::Symbol;

// Loader errors

pub fn load_header(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::header",
        help = "compiled programs start with a `$$LDcode` line",
        labels = vec![LabeledSpan::at(span, "expected `$$LDcode`")],
        "Not an interpretable ladder program.",
    )
    .with_source_code(src.to_string())
}

pub fn load_section(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::section",
        help = "known sections are `$$bits`, `$$int16s` and `$$cycle`",
        labels = vec![LabeledSpan::at(span, "unknown section")],
        "Encountered an unknown section marker.",
    )
    .with_source_code(src.to_string())
}

pub fn load_missing_symbols(src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::section",
        help = "the instruction list must be followed by a `$$bits` line",
        labels = vec![LabeledSpan::at_offset(
            src.len().saturating_sub(1),
            "file ends here"
        )],
        "Unexpected end of file inside the instruction list.",
    )
    .with_source_code(src.to_string())
}

pub fn load_length(span: Span, src: &str, len: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::length",
        help = "each instruction is 20 hex digits: op, name1, name2, name3, literal",
        labels = vec![LabeledSpan::at(span, format!("{} digits", len))],
        "Instruction record has the wrong length.",
    )
    .with_source_code(src.to_string())
}

pub fn load_hex(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::hex",
        help = "instruction records may only contain 0-9, a-f and A-F",
        labels = vec![LabeledSpan::at(span, "not a hex digit")],
        "Encountered an invalid hex digit.",
    )
    .with_source_code(src.to_string())
}

pub fn load_decode(span: Span, src: &str, err: DecodeError) -> Report {
    let (code, help) = match err {
        DecodeError::UnknownOpcode(_) => (
            "load::opcode",
            "the program may have been compiled for a different target",
        ),
        DecodeError::UnusedField { .. } => (
            "load::operands",
            "fields an opcode does not use must be zero",
        ),
    };
    miette!(
        severity = Severity::Error,
        code = code,
        help = help,
        labels = vec![LabeledSpan::at(span, err.to_string())],
        "Malformed instruction record.",
    )
    .with_source_code(src.to_string())
}

pub fn load_cycle(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "load::cycle",
        help = "expected `$$cycle <microseconds> us` with a positive period",
        labels = vec![LabeledSpan::at(span, "bad cycle time")],
        "Invalid cycle time.",
    )
    .with_source_code(src.to_string())
}

/// `span` should cover the offending instruction when there is one.
pub fn program(span: Option<Span>, src: &str, err: ProgramError) -> Report {
    let (code, help) = match err {
        ProgramError::MissingEnd => (
            "load::end",
            "the last instruction must be END_OF_PROGRAM (opcode 255)",
        ),
        ProgramError::TooLong { .. } => (
            "load::size",
            "increase the instruction limit with `--ops`",
        ),
        ProgramError::Address { .. } => (
            "load::address",
            "increase the bank size with `--bits` or `--ints`",
        ),
        ProgramError::Jump { .. } => (
            "load::jump",
            "jump targets are stored as the destination index minus one",
        ),
    };
    let label = match span {
        Some(span) => LabeledSpan::at(span, err.to_string()),
        None => LabeledSpan::at_offset(src.len().saturating_sub(1), err.to_string()),
    };
    miette!(
        severity = Severity::Error,
        code = code,
        help = help,
        labels = vec![label],
        "Invalid program: {err}",
    )
    .with_source_code(src.to_string())
}

// Symbol table errors

pub fn symbol_entry(span: Span, src: &str, line: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "symbol::entry",
        help = "symbol lines look like `name,address` with a decimal address",
        labels = vec![LabeledSpan::at(span, format!("malformed entry on line {line}"))],
        "Encountered a malformed symbol entry.",
    )
    .with_source_code(src.to_string())
}

pub fn symbol_address(span: Span, src: &str, symbol: Symbol, capacity: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "symbol::address",
        help = format!("the {} bank holds {} values", symbol.bank, capacity),
        labels = vec![LabeledSpan::at(span, "address out of range")],
        "Symbol is bound outside its bank: {symbol}",
    )
    .with_source_code(src.to_string())
}

pub fn symbol_duplicate(span: Span, src: &str, name: &str, existing: Symbol) -> Report {
    miette!(
        severity = Severity::Error,
        code = "symbol::duplicate",
        help = format!("`{name}` is already bound to {existing}"),
        labels = vec![LabeledSpan::at(span, "duplicate symbol")],
        "Duplicate symbol name",
    )
    .with_source_code(src.to_string())
}

// Assembler errors

pub fn asm_mnemonic(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::mnemonic",
        help = "check the list of available instructions in the documentation",
        labels = vec![LabeledSpan::at(span, "unknown instruction")],
        "Encountered an unknown instruction.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_operand_count(span: Span, src: &str, expected: usize, found: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::operands",
        help = format!("this instruction takes {expected} operand(s)"),
        labels = vec![LabeledSpan::at(span, format!("found {found}"))],
        "Wrong number of operands.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_operand(span: Span, src: &str, expected: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::operand",
        help = format!("expected {expected}"),
        labels = vec![LabeledSpan::at(span, "invalid operand")],
        "Encountered an invalid operand.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_literal(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::literal",
        help = "ranges from -32,768 to 32,767 (#) or x0 to xFFFF are allowed",
        labels = vec![LabeledSpan::at(span, "incorrect literal")],
        "Encountered an invalid literal.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_duplicate_label(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::duplicate_label",
        help = "labels are only allowed once per file",
        labels = vec![LabeledSpan::at(span, "duplicate label")],
        "Duplicate label",
    )
    .with_source_code(src.to_string())
}

pub fn asm_unknown_label(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::label",
        help = "jump operands must name a label defined in this file",
        labels = vec![LabeledSpan::at(span, "unknown label")],
        "Reference to an undefined label.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_jump_to_start(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::jump",
        help = "the first instruction cannot be a jump destination; insert an instruction before it",
        labels = vec![LabeledSpan::at(span, "label on instruction 0")],
        "Jump target cannot be encoded.",
    )
    .with_source_code(src.to_string())
}

pub fn asm_directive(span: Span, src: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::directive",
        help = "available directives are `.bit <name> <addr>`, `.int <name> <addr>` and `.cycle <us>`",
        labels = vec![LabeledSpan::at(span, "incorrect directive")],
        "Encountered an invalid directive.",
    )
    .with_source_code(src.to_string())
}

// Driver errors

pub fn driver_unknown_symbol(name: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "driver::symbol",
        help = "use `rung symbols <file>` to list the names a program declares",
        "No symbol named `{name}`",
    )
}

pub fn driver_not_input(name: &str, symbol: Symbol) -> Report {
    miette!(
        severity = Severity::Error,
        code = "driver::input",
        help = "only bit symbols starting with `X` are inputs",
        "`{name}` ({symbol}) is not an input",
    )
}

pub fn driver_unwired(name: &str, symbol: Symbol) -> Report {
    miette!(
        severity = Severity::Error,
        code = "driver::unwired",
        help = "increase the bank size with `--bits` or `--ints`",
        "`{name}` ({symbol}) lies outside the memory banks",
    )
}
