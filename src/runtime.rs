use std::fmt;

use crate::bank::{Banks, BitBank, Capacity, IntBank};
use crate::instr::{BitAddr, Instr, IntAddr};
use crate::loader::Image;
use crate::program::Program;
use crate::symbol::SymbolTable;

/// Ceiling on executed instructions per cycle, relative to program length, when the step
/// guard is enabled. A program without backward jumps never exceeds one step per instruction.
pub const GUARD_STEPS_PER_INSTR: u32 = 256;

/// A cycle aborted on a malformed program. Bank contents are undefined afterwards.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Fault {
    BitAddress { pc: usize, addr: BitAddr },
    IntAddress { pc: usize, addr: IntAddr },
    /// Execution left the program without reaching `END_OF_PROGRAM`.
    ProgramCounter { pc: usize },
    /// Step guard tripped; the program most likely loops within a cycle.
    StepLimit { limit: u32 },
}

impl std::error::Error for Fault {}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BitAddress { pc, addr } => {
                write!(f, "instruction {:03x} accessed {} outside the bit bank", pc, addr)
            }
            Self::IntAddress { pc, addr } => {
                write!(f, "instruction {:03x} accessed {} outside the integer bank", pc, addr)
            }
            Self::ProgramCounter { pc } => {
                write!(f, "program counter {:03x} is outside the program", pc)
            }
            Self::StepLimit { limit } => {
                write!(f, "cycle did not finish within {} instructions", limit)
            }
        }
    }
}

/// Per-cycle execution settings.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct CycleOptions {
    /// Abort with [`Fault::StepLimit`] after this many instructions.
    ///
    /// Not part of the ladder semantics: a looping program otherwise never returns.
    pub step_limit: Option<u32>,
}

impl CycleOptions {
    /// Options with a step ceiling scaled to `program`.
    pub fn guarded(program: &Program) -> Self {
        let len = u32::try_from(program.len()).unwrap_or(u32::MAX);
        CycleOptions {
            step_limit: Some(len.saturating_mul(GUARD_STEPS_PER_INSTR)),
        }
    }
}

/// Run one scan of `program`, from instruction 0 to `END_OF_PROGRAM`.
pub fn run_cycle(program: &Program, bits: &mut BitBank, ints: &mut IntBank) -> Result<(), Fault> {
    run_cycle_with(program, bits, ints, &CycleOptions::default(), |_, _| ())
}

/// Like [`run_cycle`], calling `on_step` with the index of each instruction before executing it.
pub fn run_cycle_with<F>(
    program: &Program,
    bits: &mut BitBank,
    ints: &mut IntBank,
    options: &CycleOptions,
    on_step: F,
) -> Result<(), Fault>
where
    F: FnMut(usize, &Instr),
{
    Scan {
        program,
        bits,
        ints,
        pc: 0,
    }
    .run(options, on_step)
}

/// State of a single cycle in progress.
struct Scan<'a> {
    program: &'a Program,
    bits: &'a mut BitBank,
    ints: &'a mut IntBank,
    pc: usize,
}

impl Scan<'_> {
    fn run<F>(mut self, options: &CycleOptions, mut on_step: F) -> Result<(), Fault>
    where
        F: FnMut(usize, &Instr),
    {
        let mut steps: u32 = 0;
        loop {
            if let Some(limit) = options.step_limit {
                if steps >= limit {
                    return Err(Fault::StepLimit { limit });
                }
                steps += 1;
            }
            let instr = *self
                .program
                .get(self.pc)
                .ok_or(Fault::ProgramCounter { pc: self.pc })?;
            on_step(self.pc, &instr);

            match instr {
                Instr::SetBit(a) => *self.bit_mut(a)? = true,
                Instr::ClearBit(a) => *self.bit_mut(a)? = false,
                Instr::CopyBit { dest, src } => {
                    let val = self.bit(src)?;
                    *self.bit_mut(dest)? = val;
                }
                Instr::SetLiteral { dest, value } => *self.int_mut(dest)? = value,
                Instr::SetVariable { dest, src } => {
                    let val = self.int(src)?;
                    *self.int_mut(dest)? = val;
                }
                Instr::Increment(a) => {
                    let var = self.int_mut(a)?;
                    *var = var.wrapping_add(1);
                }
                Instr::Add { dest, lhs, rhs } => {
                    let val = self.int(lhs)?.wrapping_add(self.int(rhs)?);
                    *self.int_mut(dest)? = val;
                }
                Instr::Subtract { dest, lhs, rhs } => {
                    let val = self.int(lhs)?.wrapping_sub(self.int(rhs)?);
                    *self.int_mut(dest)? = val;
                }
                Instr::Multiply { dest, lhs, rhs } => {
                    let val = self.int(lhs)?.wrapping_mul(self.int(rhs)?);
                    *self.int_mut(dest)? = val;
                }
                Instr::Divide { dest, lhs, rhs } => {
                    let divisor = self.int(rhs)?;
                    let dividend = self.int(lhs)?;
                    let dest = self.int_mut(dest)?;
                    // Division by zero leaves the destination alone
                    if divisor != 0 {
                        *dest = dividend.wrapping_div(divisor);
                    }
                }
                // Conditionals jump when the condition does NOT hold. The jump stores the
                // target minus one; the increment below completes it.
                Instr::IfBitSet { bit, target } => {
                    if !self.bit(bit)? {
                        self.pc = target.stored() as usize;
                    }
                }
                Instr::IfBitClear { bit, target } => {
                    if self.bit(bit)? {
                        self.pc = target.stored() as usize;
                    }
                }
                Instr::IfLessLiteral { var, value, target } => {
                    if !(self.int(var)? < value) {
                        self.pc = target.stored() as usize;
                    }
                }
                Instr::IfEqual { lhs, rhs, target } => {
                    if self.int(lhs)? != self.int(rhs)? {
                        self.pc = target.stored() as usize;
                    }
                }
                Instr::IfGreater { lhs, rhs, target } => {
                    if !(self.int(lhs)? > self.int(rhs)?) {
                        self.pc = target.stored() as usize;
                    }
                }
                Instr::Else(target) => self.pc = target.stored() as usize,
                Instr::End => return Ok(()),
            }
            self.pc += 1;
        }
    }

    #[inline]
    fn bit(&self, addr: BitAddr) -> Result<bool, Fault> {
        self.bits
            .bit(addr)
            .ok_or(Fault::BitAddress { pc: self.pc, addr })
    }

    #[inline]
    fn bit_mut(&mut self, addr: BitAddr) -> Result<&mut bool, Fault> {
        let pc = self.pc;
        self.bits
            .bit_mut(addr)
            .ok_or(Fault::BitAddress { pc, addr })
    }

    #[inline]
    fn int(&self, addr: IntAddr) -> Result<i16, Fault> {
        self.ints
            .int(addr)
            .ok_or(Fault::IntAddress { pc: self.pc, addr })
    }

    #[inline]
    fn int_mut(&mut self, addr: IntAddr) -> Result<&mut i16, Fault> {
        let pc = self.pc;
        self.ints
            .int_mut(addr)
            .ok_or(Fault::IntAddress { pc, addr })
    }
}

/// A program together with the banks it runs against.
pub struct Machine {
    program: Program,
    symbols: SymbolTable,
    banks: Banks,
    options: CycleOptions,
}

impl Machine {
    pub fn new(image: Image, capacity: &Capacity) -> Self {
        Machine {
            program: image.program,
            symbols: image.symbols,
            banks: Banks::new(capacity),
            options: CycleOptions::default(),
        }
    }

    pub fn set_options(&mut self, options: CycleOptions) {
        self.options = options;
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn banks(&self) -> &Banks {
        &self.banks
    }

    pub fn banks_mut(&mut self) -> &mut Banks {
        &mut self.banks
    }

    /// Run exactly one cycle.
    pub fn cycle(&mut self) -> Result<(), Fault> {
        self.cycle_with(|_, _| ())
    }

    pub fn cycle_with<F>(&mut self, on_step: F) -> Result<(), Fault>
    where
        F: FnMut(usize, &Instr),
    {
        let Banks { bits, ints } = &mut self.banks;
        run_cycle_with(&self.program, bits, ints, &self.options, on_step)
    }
}
