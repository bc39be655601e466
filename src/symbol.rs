use std::fmt;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::Result;

use crate::bank::Capacity;
use crate::error;
use crate::span::{lines, Line};

// Symbol table of name -> bank address, in declaration order
pub(crate) type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Which memory bank an address points into.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BankKind {
    Bit,
    Int,
}

impl fmt::Display for BankKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankKind::Bit => write!(f, "bits"),
            BankKind::Int => write!(f, "int16s"),
        }
    }
}

/// Bank and address a name is bound to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Symbol {
    pub bank: BankKind,
    pub addr: u16,
}

impl Symbol {
    pub fn new(bank: BankKind, addr: u16) -> Self {
        Symbol { bank, addr }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{:03x}]", self.bank, self.addr)
    }
}

/// Names the driver can use to reach ladder variables.
///
/// Never consulted while running a cycle.
#[derive(Clone, Default, Debug)]
pub struct SymbolTable {
    map: FxMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            map: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Bind `name`. Returns the existing binding instead if the name is taken.
    pub fn insert(&mut self, name: &str, symbol: Symbol) -> Result<(), Symbol> {
        if let Some(existing) = self.map.get(name) {
            return Err(*existing);
        }
        self.map.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Look a name up. `None` means the name is not wired, which is not an error.
    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        self.map.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Symbol)> + '_ {
        self.map.iter().map(|(name, symbol)| (name.as_str(), *symbol))
    }

    /// Symbols of one bank, in declaration order.
    pub fn in_bank(&self, bank: BankKind) -> impl Iterator<Item = (&str, Symbol)> + '_ {
        self.iter().filter(move |(_, symbol)| symbol.bank == bank)
    }
}

impl PartialEq for SymbolTable {
    fn eq(&self, other: &Self) -> bool {
        self.map.len() == other.map.len() && self.iter().eq(other.iter())
    }
}

impl Eq for SymbolTable {}

/// Parse every non-blank line of `src` as a `name,address` entry bound in `bank`.
pub fn parse_symbols(src: &str, bank: BankKind, capacity: &Capacity) -> Result<SymbolTable> {
    let mut table = SymbolTable::new();
    for line in lines(src) {
        if line.text.trim().is_empty() {
            continue;
        }
        parse_entry(&mut table, line, bank, capacity, src)?;
    }
    Ok(table)
}

/// Parse one `name,address` line into `table`.
///
/// `src` is the full source `line` was taken from, for diagnostics.
pub(crate) fn parse_entry(
    table: &mut SymbolTable,
    line: Line<'_>,
    bank: BankKind,
    capacity: &Capacity,
    src: &str,
) -> Result<()> {
    let (text, span) = line.trimmed();
    let Some((name, addr)) = text.split_once(',') else {
        return Err(error::symbol_entry(span, src, line.number));
    };
    let name = name.trim();
    let addr = addr.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(error::symbol_entry(span, src, line.number));
    }
    let addr_span = span.slice(text.len() - addr.len(), addr.len());
    let addr: u16 = addr
        .parse()
        .map_err(|_| error::symbol_entry(addr_span, src, line.number))?;

    let symbol = Symbol::new(bank, addr);
    if addr as usize >= capacity.of(bank) {
        return Err(error::symbol_address(
            addr_span,
            src,
            symbol,
            capacity.of(bank),
        ));
    }
    table
        .insert(name, symbol)
        .map_err(|existing| error::symbol_duplicate(span, src, name, existing))
}
