use std::cell::RefCell;
use std::str::Chars;

use colored::{ColoredString, Colorize};

use crate::symbol::{BankKind, SymbolTable};

#[macro_export]
macro_rules! dprintln {
    ( $cond:expr ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        $crate::output::Output::Diagnostic($cond).print_str("\n");
    }};
    ( $cond:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::Condition::*;
        let s = format!(
            concat!($fmt, "\n")
            $($tt)*
        );
        $crate::output::Output::Diagnostic($cond).print_str(&s);
    }};
    // Trigger type error if missing condition
    ( $fmt:literal $($tt:tt)* ) => {{
        $crate::output::Output::Diagnostic($fmt);
    }};
}

/// Where a piece of text goes.
///
/// `Normal` is program output on stdout: listings, symbol tables, watched values.
/// `Diagnostic` is interpreter chatter on stderr, such as the instruction trace.
#[derive(Clone, Copy, Debug)]
pub enum Output {
    Normal,
    Diagnostic(Condition),
}

/// Whether diagnostic text survives `--minimal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    Always,
    Sometimes,
}

struct Decolored<'a> {
    chars: Chars<'a>,
}

impl Output {
    thread_local! {
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    pub fn print_str(&self, string: &str) {
        match self {
            Self::Normal => {
                if Self::is_minimal() {
                    print_colorless(string);
                } else {
                    print!("{}", string);
                }
            }

            Self::Diagnostic(condition) => match (Self::is_minimal(), *condition) {
                (false, _) => {
                    eprint!("{}", ColoredString::from(string).blue());
                }
                // Always remove color if `--minimal`
                (true, Condition::Always) => eprint_colorless(string),
                (true, Condition::Sometimes) => (),
            },
        }
    }

    /// One line per symbol, grouped by bank.
    pub fn print_symbols(&self, symbols: &SymbolTable) {
        for bank in [BankKind::Bit, BankKind::Int] {
            if Self::is_minimal() {
                for (name, symbol) in symbols.in_bank(bank) {
                    self.print_str(&format!("{} {}\n", name, symbol));
                }
                continue;
            }
            let entries: Vec<_> = symbols.in_bank(bank).collect();
            if entries.is_empty() {
                continue;
            }
            let width = entries.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            self.print_str(&format!("\x1b[2m{}:\x1b[0m\n", bank));
            for (name, symbol) in entries {
                self.print_str(&format!(
                    "  \x1b[1m{:<width$}\x1b[0m  {}\n",
                    name,
                    symbol,
                    width = width
                ));
            }
        }
    }

    /// `cycle 3: Xin=1 count=42`
    pub fn print_watch(&self, cycle: u64, values: &[(&str, i16)]) {
        let mut line = if Self::is_minimal() {
            format!("cycle {}:", cycle)
        } else {
            format!("\x1b[2mcycle {}:\x1b[0m", cycle)
        };
        for (name, value) in values {
            line.push_str(&format!(" {}={}", name, value));
        }
        line.push('\n');
        self.print_str(&line);
    }
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl<'a> Iterator for Decolored<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

fn print_colorless(string: &str) {
    print!("{}", Decolored::new(string).collect::<String>());
}

fn eprint_colorless(string: &str) {
    eprint!("{}", Decolored::new(string).collect::<String>());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decolored() {
        assert_eq!(Decolored::new("abcdef").collect::<String>(), "abcdef");
        assert_eq!(
            Decolored::new("abc\x1b[0;2mdef\x1b[0m").collect::<String>(),
            "abcdef"
        );
        assert_eq!(Decolored::new("abc\x1b[0xyz").collect::<String>(), "abc");
        assert_eq!(
            Decolored::new("abc\x1bw[0bxyzmdef").collect::<String>(),
            "abcdef"
        );
    }

    #[test]
    fn minimal_is_per_thread() {
        std::thread::spawn(|| {
            assert!(!Output::is_minimal());
            assert!(!Output::set_minimal(true));
            assert!(Output::is_minimal());
        })
        .join()
        .unwrap();
        assert!(!Output::is_minimal());
    }
}
