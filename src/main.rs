use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, IntoDiagnostic, Result};

use rung::driver::parse_assignment;
use rung::output::Output;
use rung::{Capacity, CycleOptions, Driver, Features, Image, Machine, Script, ScriptedIo, Wiring};

/// Rung loads, runs and disassembles compiled ladder logic programs.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Produce minimal output, suited for blackbox tests
    #[arg(short, long, global = true)]
    minimal: bool,
    /// Comma separated extensions to enable (available: guard)
    #[arg(long, global = true)]
    features: Option<Features>,
    /// Size of the bit bank
    #[arg(long, global = true, default_value_t = Capacity::default().bits)]
    bits: usize,
    /// Size of the integer bank
    #[arg(long, global = true, default_value_t = Capacity::default().ints)]
    ints: usize,
    /// Maximum program length in instructions
    #[arg(long, global = true, default_value_t = Capacity::default().ops)]
    ops: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Run a `.int` or `.lds` program, one cycle per period
    Run {
        /// Program to run
        name: PathBuf,
        /// Stop after this many cycles instead of running forever
        #[arg(short, long)]
        cycles: Option<u64>,
        /// Do not wait for the cycle period between cycles
        #[arg(short, long)]
        fast: bool,
        /// Print a symbol's value after every cycle
        #[arg(short, long, value_name = "NAME")]
        watch: Vec<String>,
        /// Hold an input at a value
        #[arg(short, long, value_name = "NAME=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, i16)>,
        /// Alternate an input between 1 and 0 every cycle, starting at 1
        #[arg(short, long, value_name = "NAME")]
        toggle: Vec<String>,
    },
    /// Print the instruction listing of a program
    Dis {
        /// Program to disassemble
        name: PathBuf,
    },
    /// Check a program without running it
    Check {
        /// Program to check
        name: PathBuf,
    },
    /// Print the symbols a program declares
    Symbols {
        /// Program to inspect
        name: PathBuf,
    },
    /// Assemble a `.lds` file into a `.int` image
    Compile {
        /// `.lds` file to assemble
        name: PathBuf,
        /// Destination of the `.int` file
        dest: Option<PathBuf>,
    },
    /// Place a watch on a program to re-check it whenever it changes
    Watch {
        /// Program to watch
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    rung::env::init();
    Output::set_minimal(args.minimal);

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(rung::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    let capacity = Capacity {
        bits: args.bits,
        ints: args.ints,
        ops: args.ops,
    };
    let features = args.features.unwrap_or_default();

    match args.command {
        Command::Run {
            name,
            cycles,
            fast,
            watch,
            set,
            toggle,
        } => {
            let image = read_image(&name, &capacity)?;
            let period = Duration::from_micros(image.cycle_us.into());
            let cycle_us = image.cycle_us;

            let mut machine = Machine::new(image, &capacity);
            if features.guard {
                machine.set_options(CycleOptions::guarded(machine.program()));
            }
            let wiring = Wiring::from_symbols(machine.symbols());
            let io = ScriptedIo::new(&wiring, &Script { set, toggle, watch })?;

            let mut driver = Driver::new(machine, wiring, io, period);
            driver.set_paced(!fast);
            driver.set_trace(rung::env::is_trace_enabled());

            let pace = if fast {
                "unpaced".to_string()
            } else {
                format!("{} us per cycle", cycle_us)
            };
            message(Green, "Running", &pace);
            driver.run(cycles)?;
            file_message(Green, "Completed", &name);
            Ok(())
        }
        Command::Dis { name } => {
            let image = read_image(&name, &capacity)?;
            for line in rung::disassemble(&image.program) {
                Output::Normal.print_str(&format!("{}\n", line));
            }
            Ok(())
        }
        Command::Check { name } => {
            file_message(Green, "Checking", &name);
            let image = read_image(&name, &capacity)?;
            let summary = format!(
                "{} instructions, {} symbols",
                image.program.len(),
                image.symbols.len()
            );
            message(Green, "Success", &summary);
            Ok(())
        }
        Command::Symbols { name } => {
            let image = read_image(&name, &capacity)?;
            Output::Normal.print_symbols(&image.symbols);
            Ok(())
        }
        Command::Compile { name, dest } => {
            file_message(Green, "Assembling", &name);
            let contents = fs::read_to_string(&name).into_diagnostic()?;
            let image = rung::assemble(&contents, &capacity)?;

            let out_file_name = dest.unwrap_or_else(|| name.with_extension("int"));
            fs::write(&out_file_name, image.emit()).into_diagnostic()?;

            message(Green, "Finished", "emit image");
            file_message(Green, "Saved", &out_file_name);
            Ok(())
        }
        Command::Watch { name } => {
            if !name.exists() {
                bail!("File does not exist. Exiting...")
            }
            // Vim breaks if watching a single file
            let folder_path = match name.parent() {
                Some(pth) if pth.is_dir() => pth.to_path_buf(),
                _ => Path::new(".").to_path_buf(),
            };

            // Clear screen and move cursor to top left
            print!("\x1B[2J\x1B[2;1H");
            file_message(Green, "Watching", &name);
            message(Cyan, "Help", "press CTRL+C to exit");

            let mut watcher = Hotwatch::new_with_custom_delay(Duration::from_millis(500))
                .into_diagnostic()?;

            watcher
                .watch(folder_path, move |event: Event| match event.kind {
                    // Watch remove for vim changes
                    EventKind::Modify(_) | EventKind::Remove(_) => {
                        print!("\x1B[2J\x1B[2;1H");
                        file_message(Green, "Watching", &name);
                        message(Green, "Re-checking", "file change detected");
                        message(Cyan, "Help", "press CTRL+C to exit");

                        // Give the editor time to finish writing
                        sleep(Duration::from_millis(50));

                        match read_image(&name, &capacity) {
                            Ok(_) => message(Green, "Success", "no errors found!"),
                            Err(e) => {
                                message(Red, "Failed", "errors found");
                                println!("\n{:?}", e);
                            }
                        }
                        Flow::Continue
                    }
                    _ => Flow::Continue,
                })
                .into_diagnostic()?;
            watcher.run();
            Ok(())
        }
    }
}

enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    if Output::is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

/// Load a compiled `.int` image, or assemble a `.lds` source.
fn read_image(name: &Path, capacity: &Capacity) -> Result<Image> {
    let Some(ext) = name.extension() else {
        bail!("File has no extension. Exiting...");
    };
    let assembled = match ext.to_str() {
        Some("int") => false,
        Some("lds") => true,
        _ => bail!("File has unknown extension. Exiting..."),
    };
    file_message(MsgColor::Green, "Loading", name);
    let contents = fs::read_to_string(name).into_diagnostic()?;
    if assembled {
        rung::assemble(&contents, capacity)
    } else {
        rung::load(&contents, capacity)
    }
}
