use std::fmt;

/// Opcodes, numbered as they appear in compiled `.int` files.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u16)]
pub enum Opcode {
    SetBit = 1,
    ClearBit = 2,
    CopyBitToBit = 3,
    SetVarLiteral = 4,
    SetVarVariable = 5,
    IncrementVar = 6,
    Add = 7,
    Subtract = 8,
    Multiply = 9,
    Divide = 10,
    IfBitSet = 50,
    IfBitClear = 51,
    IfVarLtLiteral = 52,
    IfVarEqVar = 53,
    IfVarGtVar = 54,
    Else = 60,
    EndOfProgram = 255,
}

/// Kind of value an instruction operand refers to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Slot {
    /// Address into the bit bank.
    Bit,
    /// Address into the integer bank.
    Int,
    /// Signed 16-bit literal.
    Literal,
    /// Biased jump target.
    Target,
}

impl Opcode {
    pub const ALL: [Opcode; 17] = [
        Opcode::SetBit,
        Opcode::ClearBit,
        Opcode::CopyBitToBit,
        Opcode::SetVarLiteral,
        Opcode::SetVarVariable,
        Opcode::IncrementVar,
        Opcode::Add,
        Opcode::Subtract,
        Opcode::Multiply,
        Opcode::Divide,
        Opcode::IfBitSet,
        Opcode::IfBitClear,
        Opcode::IfVarLtLiteral,
        Opcode::IfVarEqVar,
        Opcode::IfVarGtVar,
        Opcode::Else,
        Opcode::EndOfProgram,
    ];

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::SetBit => "SET_BIT",
            Opcode::ClearBit => "CLEAR_BIT",
            Opcode::CopyBitToBit => "COPY_BIT_TO_BIT",
            Opcode::SetVarLiteral => "SET_VAR_LITERAL",
            Opcode::SetVarVariable => "SET_VAR_VARIABLE",
            Opcode::IncrementVar => "INCREMENT_VAR",
            Opcode::Add => "ADD",
            Opcode::Subtract => "SUBTRACT",
            Opcode::Multiply => "MULTIPLY",
            Opcode::Divide => "DIVIDE",
            Opcode::IfBitSet => "IF_BIT_SET",
            Opcode::IfBitClear => "IF_BIT_CLEAR",
            Opcode::IfVarLtLiteral => "IF_VAR_LT_LITERAL",
            Opcode::IfVarEqVar => "IF_VAR_EQ_VAR",
            Opcode::IfVarGtVar => "IF_VAR_GT_VAR",
            Opcode::Else => "ELSE",
            Opcode::EndOfProgram => "END_OF_PROGRAM",
        }
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::SetBit => "set_bit",
            Opcode::ClearBit => "clear_bit",
            Opcode::CopyBitToBit => "copy_bit",
            Opcode::SetVarLiteral => "set_lit",
            Opcode::SetVarVariable => "set_var",
            Opcode::IncrementVar => "increment",
            Opcode::Add => "add",
            Opcode::Subtract => "sub",
            Opcode::Multiply => "mul",
            Opcode::Divide => "div",
            Opcode::IfBitSet => "if_bit_set",
            Opcode::IfBitClear => "if_bit_clear",
            Opcode::IfVarLtLiteral => "if_lt_lit",
            Opcode::IfVarEqVar => "if_eq",
            Opcode::IfVarGtVar => "if_gt",
            Opcode::Else => "else",
            Opcode::EndOfProgram => "end",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<Opcode> {
        Opcode::ALL
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(s))
    }

    /// Operands taken by the opcode, in assembly order.
    pub fn signature(self) -> &'static [Slot] {
        use Slot::*;
        match self {
            Opcode::SetBit | Opcode::ClearBit => &[Bit],
            Opcode::CopyBitToBit => &[Bit, Bit],
            Opcode::SetVarLiteral => &[Int, Literal],
            Opcode::SetVarVariable => &[Int, Int],
            Opcode::IncrementVar => &[Int],
            Opcode::Add | Opcode::Subtract | Opcode::Multiply | Opcode::Divide => &[Int, Int, Int],
            Opcode::IfBitSet | Opcode::IfBitClear => &[Bit, Target],
            Opcode::IfVarLtLiteral => &[Int, Literal, Target],
            Opcode::IfVarEqVar | Opcode::IfVarGtVar => &[Int, Int, Target],
            Opcode::Else => &[Target],
            Opcode::EndOfProgram => &[],
        }
    }

    /// Record fields read by the opcode.
    ///
    /// Addresses fill `name1`, `name2`, `name3` in order. A jump target always lives in `name3`.
    pub fn fields(self) -> Fields {
        let mut fields = Fields::default();
        let mut addresses = 0;
        for slot in self.signature() {
            match slot {
                Slot::Bit | Slot::Int => {
                    addresses += 1;
                    match addresses {
                        1 => fields.name1 = true,
                        2 => fields.name2 = true,
                        _ => fields.name3 = true,
                    }
                }
                Slot::Literal => fields.literal = true,
                Slot::Target => fields.name3 = true,
            }
        }
        fields
    }
}

impl TryFrom<u16> for Opcode {
    type Error = u16;
    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Opcode::ALL
            .into_iter()
            .find(|op| op.code() == code)
            .ok_or(code)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which fields of a [`Record`] an opcode uses.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Fields {
    pub name1: bool,
    pub name2: bool,
    pub name3: bool,
    pub literal: bool,
}

/// Address into the bit bank.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BitAddr(pub u16);

/// Address into the integer bank.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct IntAddr(pub u16);

impl fmt::Display for BitAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bits[{:03x}]", self.0)
    }
}

impl fmt::Display for IntAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "int16s[{:03x}]", self.0)
    }
}

/// Jump destination, stored biased by one.
///
/// The stored value is the index of the instruction *before* the one execution lands on.
/// The interpreter assigns the stored value to the program counter and then performs its usual
/// post-instruction increment, so a stored `n` resumes execution at `n + 1`. Encoders must
/// preserve this bias bit-for-bit: it is part of the `.int` format. As a consequence,
/// instruction 0 can never be a jump destination.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct JumpTarget(u16);

impl JumpTarget {
    /// Wrap a value exactly as it is stored in the `name3` field.
    pub fn from_stored(stored: u16) -> Self {
        JumpTarget(stored)
    }

    /// Target which resumes execution at instruction `index`. `None` for index 0.
    pub fn landing_on(index: u16) -> Option<Self> {
        index.checked_sub(1).map(JumpTarget)
    }

    pub fn stored(self) -> u16 {
        self.0
    }

    /// Index of the instruction executed after the jump.
    pub fn landing(self) -> usize {
        self.0 as usize + 1
    }
}

impl fmt::Display for JumpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "jump {:03x}+1", self.0)
    }
}

/// Fixed-shape instruction record as stored in a program image.
///
/// Serialized as five little-endian 16-bit fields, in declaration order.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Record {
    pub op: u16,
    pub name1: u16,
    pub name2: u16,
    pub name3: u16,
    pub literal: i16,
}

impl Record {
    /// Size of a serialized record in bytes.
    pub const SIZE: usize = 10;

    pub fn from_bytes(b: [u8; Self::SIZE]) -> Self {
        let word = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
        Record {
            op: word(0),
            name1: word(2),
            name2: word(4),
            name3: word(6),
            literal: word(8) as i16,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut b = [0; Self::SIZE];
        let words = [
            self.op,
            self.name1,
            self.name2,
            self.name3,
            self.literal as u16,
        ];
        for (chunk, word) in b.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        b
    }
}

/// Reason a [`Record`] does not describe an instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DecodeError {
    UnknownOpcode(u16),
    /// A field the opcode does not use holds a value.
    UnusedField {
        opcode: Opcode,
        field: &'static str,
        value: u16,
    },
}

impl std::error::Error for DecodeError {}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode(code) => write!(f, "unknown opcode {}", code),
            Self::UnusedField {
                opcode,
                field,
                value,
            } => write!(
                f,
                "{} does not take a `{}` operand, found {}",
                opcode, field, value
            ),
        }
    }
}

/// Single decoded instruction. The bank each address refers to is part of its type.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instr {
    SetBit(BitAddr),
    ClearBit(BitAddr),
    CopyBit {
        dest: BitAddr,
        src: BitAddr,
    },
    SetLiteral {
        dest: IntAddr,
        value: i16,
    },
    SetVariable {
        dest: IntAddr,
        src: IntAddr,
    },
    Increment(IntAddr),
    Add {
        dest: IntAddr,
        lhs: IntAddr,
        rhs: IntAddr,
    },
    Subtract {
        dest: IntAddr,
        lhs: IntAddr,
        rhs: IntAddr,
    },
    Multiply {
        dest: IntAddr,
        lhs: IntAddr,
        rhs: IntAddr,
    },
    /// Leaves `dest` untouched when `rhs` is zero.
    Divide {
        dest: IntAddr,
        lhs: IntAddr,
        rhs: IntAddr,
    },
    /// Jump unless the bit is set.
    IfBitSet {
        bit: BitAddr,
        target: JumpTarget,
    },
    /// Jump unless the bit is clear.
    IfBitClear {
        bit: BitAddr,
        target: JumpTarget,
    },
    /// Jump unless `var < value`.
    IfLessLiteral {
        var: IntAddr,
        value: i16,
        target: JumpTarget,
    },
    /// Jump unless `lhs == rhs`.
    IfEqual {
        lhs: IntAddr,
        rhs: IntAddr,
        target: JumpTarget,
    },
    /// Jump unless `lhs > rhs`.
    IfGreater {
        lhs: IntAddr,
        rhs: IntAddr,
        target: JumpTarget,
    },
    /// Unconditional jump.
    Else(JumpTarget),
    End,
}

/// Bank-typed address used by an instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    Bit(BitAddr),
    Int(IntAddr),
}

impl Instr {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instr::SetBit(_) => Opcode::SetBit,
            Instr::ClearBit(_) => Opcode::ClearBit,
            Instr::CopyBit { .. } => Opcode::CopyBitToBit,
            Instr::SetLiteral { .. } => Opcode::SetVarLiteral,
            Instr::SetVariable { .. } => Opcode::SetVarVariable,
            Instr::Increment(_) => Opcode::IncrementVar,
            Instr::Add { .. } => Opcode::Add,
            Instr::Subtract { .. } => Opcode::Subtract,
            Instr::Multiply { .. } => Opcode::Multiply,
            Instr::Divide { .. } => Opcode::Divide,
            Instr::IfBitSet { .. } => Opcode::IfBitSet,
            Instr::IfBitClear { .. } => Opcode::IfBitClear,
            Instr::IfLessLiteral { .. } => Opcode::IfVarLtLiteral,
            Instr::IfEqual { .. } => Opcode::IfVarEqVar,
            Instr::IfGreater { .. } => Opcode::IfVarGtVar,
            Instr::Else(_) => Opcode::Else,
            Instr::End => Opcode::EndOfProgram,
        }
    }

    pub fn jump_target(&self) -> Option<JumpTarget> {
        match *self {
            Instr::IfBitSet { target, .. }
            | Instr::IfBitClear { target, .. }
            | Instr::IfLessLiteral { target, .. }
            | Instr::IfEqual { target, .. }
            | Instr::IfGreater { target, .. }
            | Instr::Else(target) => Some(target),
            _ => None,
        }
    }

    /// Every bank address the instruction reads or writes.
    pub fn operands(&self) -> impl Iterator<Item = Operand> {
        use Operand::{Bit, Int};
        let ops: [Option<Operand>; 3] = match *self {
            Instr::SetBit(a) | Instr::ClearBit(a) => [Some(Bit(a)), None, None],
            Instr::CopyBit { dest, src } => [Some(Bit(dest)), Some(Bit(src)), None],
            Instr::SetLiteral { dest, .. } | Instr::Increment(dest) => [Some(Int(dest)), None, None],
            Instr::SetVariable { dest, src } => [Some(Int(dest)), Some(Int(src)), None],
            Instr::Add { dest, lhs, rhs }
            | Instr::Subtract { dest, lhs, rhs }
            | Instr::Multiply { dest, lhs, rhs }
            | Instr::Divide { dest, lhs, rhs } => {
                [Some(Int(dest)), Some(Int(lhs)), Some(Int(rhs))]
            }
            Instr::IfBitSet { bit, .. } | Instr::IfBitClear { bit, .. } => {
                [Some(Bit(bit)), None, None]
            }
            Instr::IfLessLiteral { var, .. } => [Some(Int(var)), None, None],
            Instr::IfEqual { lhs, rhs, .. } | Instr::IfGreater { lhs, rhs, .. } => {
                [Some(Int(lhs)), Some(Int(rhs)), None]
            }
            Instr::Else(_) | Instr::End => [None, None, None],
        };
        ops.into_iter().flatten()
    }

    /// Interpret a record, rejecting unknown opcodes and values in fields the opcode ignores.
    pub fn decode(rec: Record) -> Result<Instr, DecodeError> {
        let opcode = Opcode::try_from(rec.op).map_err(DecodeError::UnknownOpcode)?;
        let fields = opcode.fields();
        let unused = [
            (fields.name1, "name1", rec.name1),
            (fields.name2, "name2", rec.name2),
            (fields.name3, "name3", rec.name3),
            (fields.literal, "literal", rec.literal as u16),
        ];
        if let Some(&(_, field, value)) = unused
            .iter()
            .find(|(used, _, value)| !used && *value != 0)
        {
            return Err(DecodeError::UnusedField {
                opcode,
                field,
                value,
            });
        }

        let (b1, b2) = (BitAddr(rec.name1), BitAddr(rec.name2));
        let (i1, i2, i3) = (IntAddr(rec.name1), IntAddr(rec.name2), IntAddr(rec.name3));
        let target = JumpTarget::from_stored(rec.name3);
        let instr = match opcode {
            Opcode::SetBit => Instr::SetBit(b1),
            Opcode::ClearBit => Instr::ClearBit(b1),
            Opcode::CopyBitToBit => Instr::CopyBit { dest: b1, src: b2 },
            Opcode::SetVarLiteral => Instr::SetLiteral {
                dest: i1,
                value: rec.literal,
            },
            Opcode::SetVarVariable => Instr::SetVariable { dest: i1, src: i2 },
            Opcode::IncrementVar => Instr::Increment(i1),
            Opcode::Add => Instr::Add {
                dest: i1,
                lhs: i2,
                rhs: i3,
            },
            Opcode::Subtract => Instr::Subtract {
                dest: i1,
                lhs: i2,
                rhs: i3,
            },
            Opcode::Multiply => Instr::Multiply {
                dest: i1,
                lhs: i2,
                rhs: i3,
            },
            Opcode::Divide => Instr::Divide {
                dest: i1,
                lhs: i2,
                rhs: i3,
            },
            Opcode::IfBitSet => Instr::IfBitSet { bit: b1, target },
            Opcode::IfBitClear => Instr::IfBitClear { bit: b1, target },
            Opcode::IfVarLtLiteral => Instr::IfLessLiteral {
                var: i1,
                value: rec.literal,
                target,
            },
            Opcode::IfVarEqVar => Instr::IfEqual {
                lhs: i1,
                rhs: i2,
                target,
            },
            Opcode::IfVarGtVar => Instr::IfGreater {
                lhs: i1,
                rhs: i2,
                target,
            },
            Opcode::Else => Instr::Else(target),
            Opcode::EndOfProgram => Instr::End,
        };
        Ok(instr)
    }

    pub fn encode(&self) -> Record {
        let mut rec = Record {
            op: self.opcode().code(),
            ..Record::default()
        };
        let mut names = [0u16; 3];
        for (name, operand) in names.iter_mut().zip(self.operands()) {
            *name = match operand {
                Operand::Bit(BitAddr(a)) | Operand::Int(IntAddr(a)) => a,
            };
        }
        [rec.name1, rec.name2, rec.name3] = names;
        if let Some(target) = self.jump_target() {
            rec.name3 = target.stored();
        }
        match *self {
            Instr::SetLiteral { value, .. } | Instr::IfLessLiteral { value, .. } => {
                rec.literal = value
            }
            _ => (),
        }
        rec
    }
}

/// Disassembly text. Conditionals state the test that must hold to fall through.
impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::SetBit(a) => write!(f, "{} := 1", a),
            Instr::ClearBit(a) => write!(f, "{} := 0", a),
            Instr::CopyBit { dest, src } => write!(f, "{} := {}", dest, src),
            Instr::SetLiteral { dest, value } => {
                write!(f, "{} := {} (0x{:04x})", dest, value, *value as u16)
            }
            Instr::SetVariable { dest, src } => write!(f, "{} := {}", dest, src),
            Instr::Increment(a) => write!(f, "({})++", a),
            Instr::Add { dest, lhs, rhs } => write!(f, "{} := {} + {}", dest, lhs, rhs),
            Instr::Subtract { dest, lhs, rhs } => write!(f, "{} := {} - {}", dest, lhs, rhs),
            Instr::Multiply { dest, lhs, rhs } => write!(f, "{} := {} * {}", dest, lhs, rhs),
            Instr::Divide { dest, lhs, rhs } => write!(f, "{} := {} / {}", dest, lhs, rhs),
            Instr::IfBitSet { bit, target } => write!(f, "unless ({} set) {}", bit, target),
            Instr::IfBitClear { bit, target } => write!(f, "unless ({} clear) {}", bit, target),
            Instr::IfLessLiteral { var, value, target } => {
                write!(f, "unless ({} < {}) {}", var, value, target)
            }
            Instr::IfEqual { lhs, rhs, target } => {
                write!(f, "unless ({} == {}) {}", lhs, rhs, target)
            }
            Instr::IfGreater { lhs, rhs, target } => {
                write!(f, "unless ({} > {}) {}", lhs, rhs, target)
            }
            Instr::Else(target) => write!(f, "{}", target),
            Instr::End => write!(f, "<end of program>"),
        }
    }
}
