//! Assembler for the `.lds` mnemonic form.
//!
//! ```text
//! .bit  Xbutton 0         ; bind names to bank addresses
//! .int  count   3
//! .cycle 10000            ; period in microseconds
//!     if_bit_set Xbutton, skip
//!     increment count
//! skip:
//!     end
//! ```
//!
//! Jump operands name labels. The assembler stores them with the jump bias applied, so a
//! label on instruction `n` is encoded as `n - 1`.

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::Result;

use crate::bank::Capacity;
use crate::error;
use crate::instr::{Instr, JumpTarget, Opcode, Record, Slot};
use crate::loader::{Image, DEFAULT_CYCLE_US};
use crate::program::Program;
use crate::span::{lines, Line, Span};
use crate::symbol::{BankKind, FxMap, Symbol, SymbolTable};

/// Whitespace- or comma-separated word of a source line.
#[derive(Clone, Copy, Debug)]
struct Word<'a> {
    text: &'a str,
    span: Span,
}

/// Instruction waiting for labels to be resolved.
struct Pending<'a> {
    opcode: Opcode,
    mnemonic: Word<'a>,
    operands: Vec<Word<'a>>,
}

/// Assemble `src` into a program image.
pub fn assemble(src: &str, capacity: &Capacity) -> Result<Image> {
    let mut labels: FxMap<&str, usize> = IndexMap::with_hasher(FxBuildHasher::default());
    let mut symbols = SymbolTable::new();
    let mut cycle_us = DEFAULT_CYCLE_US;
    let mut pending: Vec<Pending> = Vec::new();

    for line in lines(src) {
        let mut words = words(&line).into_iter().peekable();

        while let Some(label) = words.next_if(|w| w.text.ends_with(':')) {
            let name = &label.text[..label.text.len() - 1];
            if !is_ident(name) {
                return Err(error::asm_operand(label.span, src, "a label name"));
            }
            if labels.insert(name, pending.len()).is_some() {
                return Err(error::asm_duplicate_label(label.span, src));
            }
        }

        let Some(first) = words.next() else {
            continue;
        };
        let rest: Vec<Word> = words.collect();

        if first.text.starts_with('.') {
            directive(first, &rest, &mut symbols, &mut cycle_us, capacity, src)?;
            continue;
        }

        let opcode =
            Opcode::from_mnemonic(first.text).ok_or_else(|| error::asm_mnemonic(first.span, src))?;
        pending.push(Pending {
            opcode,
            mnemonic: first,
            operands: rest,
        });
    }

    let mut instrs = Vec::with_capacity(pending.len() + 1);
    let mut spans = Vec::with_capacity(pending.len() + 1);
    for stmt in &pending {
        instrs.push(encode(stmt, &labels, &symbols, src)?);
        spans.push(stmt.span());
    }
    if instrs.last() != Some(&Instr::End) {
        instrs.push(Instr::End);
    }

    let program = Program::new(instrs, capacity)
        .map_err(|e| error::program(e.index().and_then(|i| spans.get(i).copied()), src, e))?;

    Ok(Image {
        program,
        symbols,
        cycle_us,
    })
}

impl Pending<'_> {
    fn span(&self) -> Span {
        let end = self
            .operands
            .last()
            .map(|w| w.span.end())
            .unwrap_or(self.mnemonic.span.end());
        Span::from_range(self.mnemonic.span.offs(), end)
    }
}

fn encode(
    stmt: &Pending,
    labels: &FxMap<&str, usize>,
    symbols: &SymbolTable,
    src: &str,
) -> Result<Instr> {
    let signature = stmt.opcode.signature();
    if stmt.operands.len() != signature.len() {
        return Err(error::asm_operand_count(
            stmt.span(),
            src,
            signature.len(),
            stmt.operands.len(),
        ));
    }

    let mut record = Record {
        op: stmt.opcode.code(),
        ..Record::default()
    };
    let mut addresses = 0;
    for (slot, word) in signature.iter().zip(&stmt.operands) {
        match slot {
            Slot::Bit | Slot::Int => {
                let bank = if *slot == Slot::Bit {
                    BankKind::Bit
                } else {
                    BankKind::Int
                };
                let addr = address(word, bank, symbols, src)?;
                addresses += 1;
                match addresses {
                    1 => record.name1 = addr,
                    2 => record.name2 = addr,
                    _ => record.name3 = addr,
                }
            }
            Slot::Literal => record.literal = literal(word, src)?,
            Slot::Target => {
                let index = *labels
                    .get(word.text)
                    .ok_or_else(|| error::asm_unknown_label(word.span, src))?;
                let target = u16::try_from(index)
                    .ok()
                    .and_then(JumpTarget::landing_on)
                    .ok_or_else(|| error::asm_jump_to_start(word.span, src))?;
                record.name3 = target.stored();
            }
        }
    }
    Instr::decode(record).map_err(|e| error::load_decode(stmt.span(), src, e))
}

fn directive(
    name: Word,
    args: &[Word],
    symbols: &mut SymbolTable,
    cycle_us: &mut u32,
    capacity: &Capacity,
    src: &str,
) -> Result<()> {
    let span = args
        .last()
        .map(|w| Span::from_range(name.span.offs(), w.span.end()))
        .unwrap_or(name.span);
    let bank = match name.text.to_ascii_lowercase().as_str() {
        ".bit" => BankKind::Bit,
        ".int" => BankKind::Int,
        ".cycle" => {
            let [period] = args else {
                return Err(error::asm_directive(span, src));
            };
            *cycle_us = match period.text.parse::<u32>() {
                Ok(us) if us > 0 => us,
                _ => {
                    let expected = "a positive period in microseconds";
                    return Err(error::asm_operand(period.span, src, expected));
                }
            };
            return Ok(());
        }
        _ => return Err(error::asm_directive(name.span, src)),
    };

    let [ident, addr] = args else {
        return Err(error::asm_directive(span, src));
    };
    if !is_ident(ident.text) {
        return Err(error::asm_operand(ident.span, src, "a symbol name"));
    }
    let addr: u16 = addr
        .text
        .parse()
        .map_err(|_| error::asm_operand(addr.span, src, "a decimal address"))?;
    let symbol = Symbol::new(bank, addr);
    if addr as usize >= capacity.of(bank) {
        return Err(error::symbol_address(span, src, symbol, capacity.of(bank)));
    }
    symbols
        .insert(ident.text, symbol)
        .map_err(|existing| error::symbol_duplicate(span, src, ident.text, existing))
}

/// Decimal address, or the name of a symbol in `bank`.
fn address(word: &Word, bank: BankKind, symbols: &SymbolTable, src: &str) -> Result<u16> {
    if word.text.starts_with(|c: char| c.is_ascii_digit()) {
        return word
            .text
            .parse()
            .map_err(|_| error::asm_operand(word.span, src, "a decimal address"));
    }
    match symbols.resolve(word.text) {
        Some(symbol) if symbol.bank == bank => Ok(symbol.addr),
        Some(_) | None => {
            let expected = match bank {
                BankKind::Bit => "a bit address or `.bit` symbol",
                BankKind::Int => "an integer address or `.int` symbol",
            };
            Err(error::asm_operand(word.span, src, expected))
        }
    }
}

/// `#-12` decimal or `x1F` / `0x1F` hex.
fn literal(word: &Word, src: &str) -> Result<i16> {
    let text = word.text;
    let value = if let Some(dec) = text.strip_prefix('#') {
        dec.parse::<i16>().ok()
    } else if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix('x'))
        .or_else(|| text.strip_prefix('X'))
    {
        u16::from_str_radix(hex, 16).ok().map(|v| v as i16)
    } else {
        None
    };
    value.ok_or_else(|| error::asm_literal(word.span, src))
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a line into words, dropping `;` comments. Commas count as whitespace.
fn words<'a>(line: &Line<'a>) -> Vec<Word<'a>> {
    let code = match line.text.find(';') {
        Some(idx) => &line.text[..idx],
        None => line.text,
    };
    let mut res = Vec::new();
    let mut start = None;
    for (i, c) in code.char_indices() {
        if c.is_whitespace() || c == ',' {
            if let Some(s) = start.take() {
                res.push(Word {
                    text: &code[s..i],
                    span: line.span.slice(s, i - s),
                });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        res.push(Word {
            text: &code[s..],
            span: line.span.slice(s, code.len() - s),
        });
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::{BitAddr, IntAddr};
    use crate::loader::load;

    fn code(err: &miette::Report) -> Option<String> {
        err.code().map(|c| c.to_string())
    }

    fn asm(src: &str) -> Result<Image> {
        assemble(src, &Capacity::default())
    }

    #[test]
    fn assembles_blink() {
        let image = asm(r#"
            .bit Xosc 0
            .bit Yled 1
            .int a 0
            .cycle 10000
                if_bit_set Xosc, off
                set_bit Yled
                else count
            off:
                clear_bit Yled
            count:
                increment a     ; counts cycles
                end
        "#)
        .unwrap();
        assert_eq!(
            image.program.instrs(),
            &[
                Instr::IfBitSet {
                    bit: BitAddr(0),
                    target: JumpTarget::from_stored(2)
                },
                Instr::SetBit(BitAddr(1)),
                Instr::Else(JumpTarget::from_stored(3)),
                Instr::ClearBit(BitAddr(1)),
                Instr::Increment(IntAddr(0)),
                Instr::End,
            ]
        );
        assert_eq!(image.symbols.len(), 3);
        assert_eq!(image.cycle_us, 10_000);

        // Survives the trip through the `.int` format
        let reloaded = load(&image.emit(), &Capacity::default()).unwrap();
        assert_eq!(reloaded, image);
    }

    #[test]
    fn appends_end() {
        let image = asm("set_lit 3, #300").unwrap();
        assert_eq!(
            image.program.instrs(),
            &[
                Instr::SetLiteral {
                    dest: IntAddr(3),
                    value: 300
                },
                Instr::End
            ]
        );
        let image = asm("").unwrap();
        assert_eq!(image.program.instrs(), &[Instr::End]);
    }

    #[test]
    fn label_at_end_lands_on_end_marker() {
        let image = asm("increment 0\nif_eq 0 1 done\nincrement 1\ndone:").unwrap();
        assert_eq!(
            image.program.get(1),
            Some(&Instr::IfEqual {
                lhs: IntAddr(0),
                rhs: IntAddr(1),
                target: JumpTarget::from_stored(2)
            })
        );
        assert_eq!(image.program.end(), 3);
    }

    #[test]
    fn literals() {
        let image = asm("set_lit 0 #-5\nset_lit 1 xFFFF\nif_lt_lit 2 0x10 next\nnext: end").unwrap();
        assert_eq!(
            image.program.get(0),
            Some(&Instr::SetLiteral {
                dest: IntAddr(0),
                value: -5
            })
        );
        assert_eq!(
            image.program.get(1),
            Some(&Instr::SetLiteral {
                dest: IntAddr(1),
                value: -1
            })
        );
        assert_eq!(
            image.program.get(2),
            Some(&Instr::IfLessLiteral {
                var: IntAddr(2),
                value: 16,
                target: JumpTarget::from_stored(2)
            })
        );
    }

    #[test]
    fn errors() {
        let cases = [
            ("frobnicate 1", "asm::mnemonic"),
            ("set_bit", "asm::operands"),
            ("set_bit 1 2", "asm::operands"),
            ("set_lit 1 300", "asm::literal"),
            ("set_lit 1 #40000", "asm::literal"),
            ("else nowhere", "asm::label"),
            ("start: increment 0\nelse start", "asm::jump"),
            ("a: increment 0\na: end", "asm::duplicate_label"),
            (".int a 1\nset_bit a", "asm::operand"),
            ("set_bit Xunknown", "asm::operand"),
            (".word a 1", "asm::directive"),
            (".bit a", "asm::directive"),
            (".bit a 200", "symbol::address"),
            (".bit a 1\n.int a 2", "symbol::duplicate"),
            ("set_bit 128", "load::address"),
        ];
        for (src, expected) in cases {
            let err = asm(src).unwrap_err();
            assert_eq!(code(&err).as_deref(), Some(expected), "{src:?}");
        }
    }

    #[test]
    fn jump_past_explicit_end() {
        let err = asm("else after\nend\nset_bit 1\nafter: end").unwrap_err();
        assert_eq!(code(&err).as_deref(), Some("load::jump"));
    }

    #[test]
    fn words_track_spans() {
        let src = "  add 1,2 , 3 ; comment";
        let line = lines(src).next().unwrap();
        let words = words(&line);
        let texts: Vec<_> = words.iter().map(|w| w.text).collect();
        assert_eq!(texts, ["add", "1", "2", "3"]);
        assert_eq!(&src[words[3].span.as_range()], "3");
    }
}
