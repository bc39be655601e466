#[macro_use]
pub mod output;

// Program representation
mod span;
pub mod instr;
pub use instr::{BitAddr, Instr, IntAddr, JumpTarget, Opcode, Record};
pub mod bank;
pub use bank::{Banks, Capacity};
pub mod program;
pub use program::Program;
pub mod symbol;
pub use symbol::{parse_symbols, BankKind, Symbol, SymbolTable};

// Reading and writing programs
mod error;
pub mod loader;
pub use loader::{load, Image};
pub mod asm;
pub use asm::assemble;
pub mod disasm;
pub use disasm::disassemble;

// Running
pub mod runtime;
pub use runtime::{run_cycle, CycleOptions, Fault, Machine};
pub mod driver;
pub use driver::{Driver, Io, Script, ScriptedIo, Wiring};

pub mod env;
pub mod features;
pub use features::Features;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;
