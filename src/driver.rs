//! Repeatedly running a program against its inputs and outputs.

use std::thread::sleep;
use std::time::{Duration, Instant};

use miette::{IntoDiagnostic, Result};

use crate::bank::Banks;
use crate::disasm;
use crate::error;
use crate::output::Output;
use crate::runtime::Machine;
use crate::symbol::{BankKind, Symbol, SymbolTable};

/// A named symbol connected to the outside world.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Wire {
    pub name: String,
    pub symbol: Symbol,
}

/// Split of a program's symbols into inputs and outputs.
///
/// Inputs are bit symbols whose name starts with `X`. Everything else is an output.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Wiring {
    inputs: Vec<Wire>,
    outputs: Vec<Wire>,
}

impl Wiring {
    pub fn from_symbols(symbols: &SymbolTable) -> Self {
        let mut wiring = Wiring::default();
        for (name, symbol) in symbols.iter() {
            let wire = Wire {
                name: name.to_string(),
                symbol,
            };
            if is_input(name, symbol) {
                wiring.inputs.push(wire);
            } else {
                wiring.outputs.push(wire);
            }
        }
        wiring
    }

    pub fn inputs(&self) -> &[Wire] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Wire] {
        &self.outputs
    }

    pub fn find(&self, name: &str) -> Option<&Wire> {
        self.inputs
            .iter()
            .chain(&self.outputs)
            .find(|wire| wire.name == name)
    }

    pub fn input(&self, name: &str) -> Result<&Wire> {
        match self.find(name) {
            Some(wire) if is_input(&wire.name, wire.symbol) => Ok(wire),
            Some(wire) => Err(error::driver_not_input(name, wire.symbol)),
            None => Err(error::driver_unknown_symbol(name)),
        }
    }
}

fn is_input(name: &str, symbol: Symbol) -> bool {
    symbol.bank == BankKind::Bit && name.starts_with('X')
}

/// The seam between the interpreter and whatever it controls.
pub trait Io {
    /// Copy input values into the banks before a cycle.
    fn read_inputs(&mut self, wiring: &Wiring, banks: &mut Banks) -> Result<()>;
    /// Publish output values after a cycle.
    fn write_outputs(&mut self, wiring: &Wiring, banks: &Banks) -> Result<()>;
}

/// Inputs and watches requested on the command line.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Script {
    /// Inputs held at a fixed value.
    pub set: Vec<(String, i16)>,
    /// Inputs alternating high and low, starting high.
    pub toggle: Vec<String>,
    /// Symbols printed after every cycle.
    pub watch: Vec<String>,
}

/// Parse a `NAME=VALUE` pair.
pub fn parse_assignment(s: &str) -> Result<(String, i16), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, found `{}`", s))?;
    let value = value
        .trim()
        .parse::<i16>()
        .map_err(|e| format!("invalid value `{}`: {}", value, e))?;
    Ok((name.trim().to_string(), value))
}

/// [`Io`] driven by a [`Script`] instead of hardware.
#[derive(Debug)]
pub struct ScriptedIo {
    held: Vec<(Symbol, i16)>,
    toggled: Vec<Symbol>,
    watched: Vec<Wire>,
    cycle: u64,
}

impl ScriptedIo {
    pub fn new(wiring: &Wiring, script: &Script) -> Result<Self> {
        let held = script
            .set
            .iter()
            .map(|(name, value)| -> Result<(Symbol, i16)> {
                Ok((wiring.input(name)?.symbol, *value))
            })
            .collect::<Result<Vec<_>>>()?;
        let toggled = script
            .toggle
            .iter()
            .map(|name| -> Result<Symbol> { Ok(wiring.input(name)?.symbol) })
            .collect::<Result<Vec<_>>>()?;
        let watched = script
            .watch
            .iter()
            .map(|name| {
                wiring
                    .find(name)
                    .cloned()
                    .ok_or_else(|| error::driver_unknown_symbol(name))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ScriptedIo {
            held,
            toggled,
            watched,
            cycle: 0,
        })
    }

    /// Watched values after the last cycle, in request order.
    pub fn watched<'a>(&'a self, banks: &Banks) -> Vec<(&'a str, i16)> {
        self.watched
            .iter()
            .filter_map(|wire| Some((wire.name.as_str(), banks.read(wire.symbol)?)))
            .collect()
    }
}

impl Io for ScriptedIo {
    fn read_inputs(&mut self, _wiring: &Wiring, banks: &mut Banks) -> Result<()> {
        let level = i16::from(self.cycle % 2 == 0);
        let held = self.held.iter().copied();
        let toggled = self.toggled.iter().map(|&symbol| (symbol, level));
        for (symbol, value) in held.chain(toggled) {
            banks
                .write(symbol, value)
                .ok_or_else(|| error::driver_unwired(&symbol.to_string(), symbol))?;
        }
        Ok(())
    }

    fn write_outputs(&mut self, _wiring: &Wiring, banks: &Banks) -> Result<()> {
        if !self.watched.is_empty() {
            Output::Normal.print_watch(self.cycle, &self.watched(banks));
        }
        self.cycle += 1;
        Ok(())
    }
}

/// Runs a [`Machine`] once per period, exchanging values through an [`Io`].
pub struct Driver<I> {
    machine: Machine,
    wiring: Wiring,
    io: I,
    period: Duration,
    paced: bool,
    trace: bool,
    cycles: u64,
    overruns: u64,
}

impl<I: Io> Driver<I> {
    pub fn new(machine: Machine, wiring: Wiring, io: I, period: Duration) -> Self {
        Driver {
            machine,
            wiring,
            io,
            period,
            paced: true,
            trace: false,
            cycles: 0,
            overruns: 0,
        }
    }

    /// Sleep out the remainder of each period. On by default.
    pub fn set_paced(&mut self, paced: bool) {
        self.paced = paced;
    }

    /// Print every executed instruction.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn io(&self) -> &I {
        &self.io
    }

    /// Completed cycles so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Paced cycles which finished after their deadline.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Read inputs, run one cycle, write outputs.
    pub fn tick(&mut self) -> Result<()> {
        self.io.read_inputs(&self.wiring, self.machine.banks_mut())?;
        if self.trace {
            let cycle = self.cycles;
            dprintln!(Always, "-- cycle {}", cycle);
            self.machine
                .cycle_with(|pc, instr| dprintln!(Always, "{}", disasm::line(pc, instr)))
                .into_diagnostic()?;
        } else {
            self.machine.cycle().into_diagnostic()?;
        }
        self.io.write_outputs(&self.wiring, self.machine.banks())?;
        self.cycles += 1;
        Ok(())
    }

    /// Tick `limit` times, or forever with `None`.
    pub fn run(&mut self, limit: Option<u64>) -> Result<()> {
        let mut deadline = Instant::now();
        while limit.map_or(true, |limit| self.cycles < limit) {
            self.tick()?;
            if self.paced {
                deadline += self.period;
                let now = Instant::now();
                if deadline > now {
                    sleep(deadline - now);
                } else {
                    dprintln!(
                        Sometimes,
                        "cycle {} overran its period by {:?}",
                        self.cycles - 1,
                        now - deadline
                    );
                    self.overruns += 1;
                    // Do not try to catch up
                    deadline = now;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::Capacity;
    use crate::loader::load;

    const BLINK: &str = include_str!("../tests/files/blink.int");

    fn code(err: &miette::Report) -> Option<String> {
        err.code().map(|c| c.to_string())
    }

    /// Records output values instead of printing them.
    #[derive(Default)]
    struct Recorder {
        osc: bool,
        seen: Vec<(i16, i16)>,
    }

    impl Io for Recorder {
        fn read_inputs(&mut self, wiring: &Wiring, banks: &mut Banks) -> Result<()> {
            self.osc = !self.osc;
            let osc = wiring.input("Xosc")?.symbol;
            banks.write(osc, i16::from(self.osc)).unwrap();
            Ok(())
        }

        fn write_outputs(&mut self, wiring: &Wiring, banks: &Banks) -> Result<()> {
            let read = |name: &str| banks.read(wiring.find(name).unwrap().symbol).unwrap();
            self.seen.push((read("a"), read("Yled")));
            Ok(())
        }
    }

    struct Idle;

    impl Io for Idle {
        fn read_inputs(&mut self, _: &Wiring, _: &mut Banks) -> Result<()> {
            Ok(())
        }

        fn write_outputs(&mut self, _: &Wiring, _: &Banks) -> Result<()> {
            Ok(())
        }
    }

    fn machine() -> (Machine, Wiring) {
        let cap = Capacity::default();
        let image = load(BLINK, &cap).unwrap();
        let wiring = Wiring::from_symbols(&image.symbols);
        (Machine::new(image, &cap), wiring)
    }

    #[test]
    fn wiring_splits_inputs() {
        let (_, wiring) = machine();
        let inputs: Vec<_> = wiring.inputs().iter().map(|w| w.name.as_str()).collect();
        let outputs: Vec<_> = wiring.outputs().iter().map(|w| w.name.as_str()).collect();
        assert_eq!(inputs, ["Xosc"]);
        assert_eq!(outputs, ["Yled", "a"]);
    }

    #[test]
    fn drives_blink() {
        let (machine, wiring) = machine();
        let mut driver = Driver::new(machine, wiring, Recorder::default(), Duration::ZERO);
        driver.set_paced(false);
        driver.run(Some(4)).unwrap();
        assert_eq!(driver.cycles(), 4);
        assert_eq!(driver.io().seen, [(1, 1), (2, 0), (3, 1), (4, 0)]);
    }

    #[test]
    fn counts_overruns_only_when_paced() {
        let (machine, wiring) = machine();
        let mut driver = Driver::new(machine, wiring, Idle, Duration::from_nanos(1));
        driver.run(Some(2)).unwrap();
        assert_eq!(driver.overruns(), 2);

        let (machine, wiring) = self::machine();
        let mut driver = Driver::new(machine, wiring, Idle, Duration::from_nanos(1));
        driver.set_paced(false);
        driver.run(Some(2)).unwrap();
        assert_eq!(driver.overruns(), 0);
    }

    #[test]
    fn scripted_toggle_and_hold() {
        let (machine, wiring) = machine();
        let script = Script {
            set: vec![],
            toggle: vec!["Xosc".into()],
            watch: vec!["a".into(), "Yled".into()],
        };
        let io = ScriptedIo::new(&wiring, &script).unwrap();
        let mut driver = Driver::new(machine, wiring.clone(), io, Duration::ZERO);
        driver.set_paced(false);

        driver.tick().unwrap();
        let banks = driver.machine().banks();
        assert_eq!(driver.io().watched(banks), [("a", 1), ("Yled", 1)]);
        driver.tick().unwrap();
        let banks = driver.machine().banks();
        assert_eq!(driver.io().watched(banks), [("a", 2), ("Yled", 0)]);

        let held = Script {
            set: vec![("Xosc".into(), 0)],
            ..Script::default()
        };
        let (machine, _) = self::machine();
        let io = ScriptedIo::new(&wiring, &held).unwrap();
        let mut driver = Driver::new(machine, wiring, io, Duration::ZERO);
        driver.set_paced(false);
        driver.run(Some(3)).unwrap();
        let led = driver.machine().symbols().resolve("Yled").unwrap();
        assert_eq!(driver.machine().banks().read(led), Some(0));
    }

    #[test]
    fn script_names_must_resolve() {
        let (_, wiring) = machine();
        let unknown = Script {
            watch: vec!["nope".into()],
            ..Script::default()
        };
        let err = ScriptedIo::new(&wiring, &unknown).unwrap_err();
        assert_eq!(code(&err).as_deref(), Some("driver::symbol"));

        let output = Script {
            toggle: vec!["Yled".into()],
            ..Script::default()
        };
        let err = ScriptedIo::new(&wiring, &output).unwrap_err();
        assert_eq!(code(&err).as_deref(), Some("driver::input"));
    }

    #[test]
    fn assignments() {
        assert_eq!(parse_assignment("Xin=1"), Ok(("Xin".to_string(), 1)));
        assert_eq!(parse_assignment("Xin = -3"), Ok(("Xin".to_string(), -3)));
        assert!(parse_assignment("Xin").is_err());
        assert!(parse_assignment("Xin=70000").is_err());
    }

    #[test]
    fn faults_stop_the_driver() {
        let cap = Capacity::default();
        // Backward jump onto itself: loops forever without the guard
        let src = "$$LDcode\n06000000000000000000\n3c000000000000000000\nff000000000000000000\n$$bits\n";
        let image = load(src, &cap).unwrap();
        let mut machine = Machine::new(image, &cap);
        machine.set_options(crate::runtime::CycleOptions::guarded(machine.program()));
        let mut driver = Driver::new(machine, Wiring::default(), Idle, Duration::ZERO);
        driver.set_paced(false);
        assert!(driver.tick().is_err());
        assert_eq!(driver.cycles(), 0);
    }
}
