use std::iter::Enumerate;
use std::slice::Iter;

use crate::instr::Instr;
use crate::program::Program;

/// Lazy listing of a program, one line per instruction.
///
/// Rendering comes from the `Display` impl of [`Instr`], which mirrors what the interpreter
/// does with each opcode. Call [`disassemble`] again to start over.
#[derive(Clone, Debug)]
pub struct Disassembly<'a> {
    instrs: Enumerate<Iter<'a, Instr>>,
}

/// List `program`, starting at instruction 0 and ending with the end marker.
pub fn disassemble(program: &Program) -> Disassembly<'_> {
    Disassembly {
        instrs: program.iter().enumerate(),
    }
}

/// Render a single instruction as it appears in a listing.
pub fn line(pc: usize, instr: &Instr) -> String {
    format!("{:03x}: {}", pc, instr)
}

impl Iterator for Disassembly<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let (pc, instr) = self.instrs.next()?;
        Some(line(pc, instr))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.instrs.size_hint()
    }
}

impl ExactSizeIterator for Disassembly<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{Banks, Capacity};
    use crate::instr::{BitAddr, IntAddr, JumpTarget};
    use crate::runtime::run_cycle;

    fn program(instrs: Vec<Instr>) -> Program {
        Program::new(instrs, &Capacity::default()).unwrap()
    }

    #[test]
    fn lists_every_opcode() {
        let t = JumpTarget::from_stored;
        #[rustfmt::skip]
        let program = program(vec![
            Instr::SetBit(BitAddr(1)),
            Instr::ClearBit(BitAddr(2)),
            Instr::CopyBit { dest: BitAddr(3), src: BitAddr(4) },
            Instr::SetLiteral { dest: IntAddr(3), value: 300 },
            Instr::SetVariable { dest: IntAddr(5), src: IntAddr(6) },
            Instr::Increment(IntAddr(7)),
            Instr::Add { dest: IntAddr(1), lhs: IntAddr(2), rhs: IntAddr(3) },
            Instr::Subtract { dest: IntAddr(1), lhs: IntAddr(2), rhs: IntAddr(3) },
            Instr::Multiply { dest: IntAddr(1), lhs: IntAddr(2), rhs: IntAddr(3) },
            Instr::Divide { dest: IntAddr(1), lhs: IntAddr(2), rhs: IntAddr(3) },
            Instr::IfBitSet { bit: BitAddr(0x10), target: t(16) },
            Instr::IfBitClear { bit: BitAddr(0x11), target: t(16) },
            Instr::IfLessLiteral { var: IntAddr(0x12), value: -3, target: t(16) },
            Instr::IfEqual { lhs: IntAddr(1), rhs: IntAddr(2), target: t(16) },
            Instr::IfGreater { lhs: IntAddr(1), rhs: IntAddr(2), target: t(16) },
            Instr::Else(t(16)),
            Instr::SetBit(BitAddr(0x7f)),
            Instr::End,
        ]);
        let expected = [
            "000: bits[001] := 1",
            "001: bits[002] := 0",
            "002: bits[003] := bits[004]",
            "003: int16s[003] := 300 (0x012c)",
            "004: int16s[005] := int16s[006]",
            "005: (int16s[007])++",
            "006: int16s[001] := int16s[002] + int16s[003]",
            "007: int16s[001] := int16s[002] - int16s[003]",
            "008: int16s[001] := int16s[002] * int16s[003]",
            "009: int16s[001] := int16s[002] / int16s[003]",
            "00a: unless (bits[010] set) jump 010+1",
            "00b: unless (bits[011] clear) jump 010+1",
            "00c: unless (int16s[012] < -3) jump 010+1",
            "00d: unless (int16s[001] == int16s[002]) jump 010+1",
            "00e: unless (int16s[001] > int16s[002]) jump 010+1",
            "00f: jump 010+1",
            "010: bits[07f] := 1",
            "011: <end of program>",
        ];
        let listing: Vec<String> = disassemble(&program).collect();
        assert_eq!(listing, expected);
        assert_eq!(disassemble(&program).len(), expected.len());
    }

    #[test]
    fn restartable() {
        let program = program(vec![Instr::Increment(IntAddr(0)), Instr::End]);
        let first: Vec<_> = disassemble(&program).collect();
        let second: Vec<_> = disassemble(&program).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn listing_matches_execution() {
        let program = program(vec![
            Instr::SetLiteral {
                dest: IntAddr(3),
                value: 300,
            },
            Instr::End,
        ]);
        let line = disassemble(&program).next().unwrap();
        assert!(line.contains("int16s[003]"));
        assert!(line.contains("300"));

        let mut banks = Banks::new(&Capacity::default());
        run_cycle(&program, &mut banks.bits, &mut banks.ints).unwrap();
        assert_eq!(banks.ints.int(IntAddr(3)), Some(300));
    }
}
