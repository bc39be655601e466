use crate::instr::{BitAddr, IntAddr};
use crate::symbol::{BankKind, Symbol};

/// Sizes of the memory banks and the instruction store.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Capacity {
    pub bits: usize,
    pub ints: usize,
    /// Maximum program length, including the terminating `END_OF_PROGRAM`.
    pub ops: usize,
}

impl Default for Capacity {
    fn default() -> Self {
        Capacity {
            bits: 128,
            ints: 128,
            ops: 1024,
        }
    }
}

impl Capacity {
    pub fn of(&self, bank: BankKind) -> usize {
        match bank {
            BankKind::Bit => self.bits,
            BankKind::Int => self.ints,
        }
    }
}

/// Fixed-size, zero-initialised storage.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Bank<T> {
    cells: Box<[T]>,
}

/// Internal relays.
pub type BitBank = Bank<bool>;
/// 16-bit signed variables.
pub type IntBank = Bank<i16>;

impl<T: Copy + Default> Bank<T> {
    pub fn new(len: usize) -> Self {
        Bank {
            cells: vec![T::default(); len].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.cells.get(index).copied()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.cells.get_mut(index)
    }

    /// Zero every cell.
    pub fn clear(&mut self) {
        self.cells.fill(T::default());
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.cells.iter().copied()
    }
}

impl Bank<bool> {
    pub fn bit(&self, addr: BitAddr) -> Option<bool> {
        self.get(addr.0 as usize)
    }

    pub fn bit_mut(&mut self, addr: BitAddr) -> Option<&mut bool> {
        self.get_mut(addr.0 as usize)
    }
}

impl Bank<i16> {
    pub fn int(&self, addr: IntAddr) -> Option<i16> {
        self.get(addr.0 as usize)
    }

    pub fn int_mut(&mut self, addr: IntAddr) -> Option<&mut i16> {
        self.get_mut(addr.0 as usize)
    }
}

/// Both banks of one machine.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Banks {
    pub bits: BitBank,
    pub ints: IntBank,
}

impl Banks {
    pub fn new(capacity: &Capacity) -> Self {
        Banks {
            bits: Bank::new(capacity.bits),
            ints: Bank::new(capacity.ints),
        }
    }

    /// Value behind a symbol. Bits read as 0 or 1.
    pub fn read(&self, symbol: Symbol) -> Option<i16> {
        match symbol.bank {
            BankKind::Bit => self.bits.bit(BitAddr(symbol.addr)).map(i16::from),
            BankKind::Int => self.ints.int(IntAddr(symbol.addr)),
        }
    }

    /// Store a value behind a symbol. Any non-zero value sets a bit.
    ///
    /// Returns `None` if the address lies outside the bank.
    pub fn write(&mut self, symbol: Symbol, value: i16) -> Option<()> {
        match symbol.bank {
            BankKind::Bit => *self.bits.bit_mut(BitAddr(symbol.addr))? = value != 0,
            BankKind::Int => *self.ints.int_mut(IntAddr(symbol.addr))? = value,
        }
        Some(())
    }

    pub fn clear(&mut self) {
        self.bits.clear();
        self.ints.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banks_start_zeroed() {
        let banks = Banks::new(&Capacity::default());
        assert_eq!(banks.bits.len(), 128);
        assert_eq!(banks.ints.len(), 128);
        assert!(banks.bits.iter().all(|b| !b));
        assert!(banks.ints.iter().all(|i| i == 0));
    }

    #[test]
    fn access_is_bounded() {
        let mut bits = BitBank::new(4);
        assert_eq!(bits.bit(BitAddr(3)), Some(false));
        assert_eq!(bits.bit(BitAddr(4)), None);
        *bits.bit_mut(BitAddr(0)).unwrap() = true;
        assert_eq!(bits.bit(BitAddr(0)), Some(true));
        bits.clear();
        assert_eq!(bits.bit(BitAddr(0)), Some(false));
    }

    #[test]
    fn symbol_access() {
        let mut banks = Banks::new(&Capacity {
            bits: 2,
            ints: 2,
            ops: 8,
        });
        let x = Symbol::new(BankKind::Bit, 1);
        let a = Symbol::new(BankKind::Int, 1);
        assert_eq!(banks.write(x, 7), Some(()));
        assert_eq!(banks.read(x), Some(1));
        assert_eq!(banks.write(a, -9), Some(()));
        assert_eq!(banks.read(a), Some(-9));
        assert_eq!(banks.write(Symbol::new(BankKind::Int, 2), 1), None);
        assert_eq!(banks.read(Symbol::new(BankKind::Bit, 2)), None);
    }
}
