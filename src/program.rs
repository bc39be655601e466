use std::fmt;

use crate::bank::Capacity;
use crate::instr::{Instr, Operand};

/// Immutable, validated instruction sequence.
///
/// Always ends with [`Instr::End`]. Every address fits the bank capacity the program was
/// checked against, and every jump lands on an instruction no later than the end marker.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Program {
    instrs: Vec<Instr>,
}

/// Structural defect found while building a [`Program`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProgramError {
    MissingEnd,
    TooLong {
        len: usize,
        max: usize,
    },
    /// Instruction `index` addresses past the end of a bank.
    Address {
        index: usize,
        operand: Operand,
        capacity: usize,
    },
    /// Instruction `index` jumps to `landing`, which is past the end marker at `end`.
    Jump {
        index: usize,
        landing: usize,
        end: usize,
    },
}

impl ProgramError {
    /// Index of the offending instruction, if there is one.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::MissingEnd => None,
            Self::TooLong { max, .. } => Some(*max),
            Self::Address { index, .. } | Self::Jump { index, .. } => Some(*index),
        }
    }
}

impl std::error::Error for ProgramError {}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEnd => write!(f, "program has no END_OF_PROGRAM"),
            Self::TooLong { len, max } => {
                write!(f, "program has {} instructions, at most {} fit", len, max)
            }
            Self::Address {
                index,
                operand,
                capacity,
            } => {
                let addr = match operand {
                    Operand::Bit(a) => a.to_string(),
                    Operand::Int(a) => a.to_string(),
                };
                write!(
                    f,
                    "instruction {:03x} uses {}, but the bank holds {} values",
                    index, addr, capacity
                )
            }
            Self::Jump {
                index,
                landing,
                end,
            } => write!(
                f,
                "instruction {:03x} jumps to {:03x}, past the end of program at {:03x}",
                index, landing, end
            ),
        }
    }
}

impl Program {
    /// Validate a decoded instruction sequence.
    ///
    /// Instructions following the first [`Instr::End`] are dropped.
    pub fn new(mut instrs: Vec<Instr>, capacity: &Capacity) -> Result<Program, ProgramError> {
        let end = instrs
            .iter()
            .position(|instr| *instr == Instr::End)
            .ok_or(ProgramError::MissingEnd)?;
        instrs.truncate(end + 1);

        if instrs.len() > capacity.ops {
            return Err(ProgramError::TooLong {
                len: instrs.len(),
                max: capacity.ops,
            });
        }

        for (index, instr) in instrs.iter().enumerate() {
            for operand in instr.operands() {
                let (addr, cap) = match operand {
                    Operand::Bit(a) => (a.0, capacity.bits),
                    Operand::Int(a) => (a.0, capacity.ints),
                };
                if addr as usize >= cap {
                    return Err(ProgramError::Address {
                        index,
                        operand,
                        capacity: cap,
                    });
                }
            }
            if let Some(target) = instr.jump_target() {
                if target.landing() > end {
                    return Err(ProgramError::Jump {
                        index,
                        landing: target.landing(),
                        end,
                    });
                }
            }
        }

        Ok(Program { instrs })
    }

    pub fn get(&self, pc: usize) -> Option<&Instr> {
        self.instrs.get(pc)
    }

    /// Number of instructions, counting the end marker.
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// Never true: the end marker is always present.
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Index of the end marker.
    pub fn end(&self) -> usize {
        self.instrs.len() - 1
    }

    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instr> {
        self.instrs.iter()
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Instr;
    type IntoIter = std::slice::Iter<'a, Instr>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
