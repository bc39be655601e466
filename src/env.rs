use std::cell::Cell;
use std::ffi::OsString;

const TRACE: &str = "RUNG_TRACE";

/// Settings taken from the process environment, read once at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Env {
    /// Print every executed instruction while running.
    pub trace: bool,
}

impl Env {
    /// Build from `(name, value)` pairs, such as [`std::env::vars_os`].
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut env = Env::default();
        for (name, value) in vars {
            if name == TRACE {
                env.trace = is_truthy(&value);
            }
        }
        env
    }
}

fn is_truthy(value: &OsString) -> bool {
    matches!(value.to_str().map(str::trim), Some("1" | "true" | "yes"))
}

thread_local! {
    /// Written once by `init`
    static ENV: Cell<Option<Env>> = const { Cell::new(None) };
}

pub fn init() {
    let env = Env::from_vars(std::env::vars_os());
    let previous = ENV.with(|cell| cell.replace(Some(env)));
    assert!(
        previous.is_none(),
        "tried to initialize environment state multiple times"
    );
}

/// Environment read by [`init`].
///
/// Panics if [`init`] has not run on this thread.
pub fn get() -> Env {
    ENV.with(Cell::get)
        .unwrap_or_else(|| panic!("tried to access environment state before initialization"))
}

pub fn is_trace_enabled() -> bool {
    get().trace
}
