use std::fmt;
use std::str::FromStr;

/// Opt-in behaviour beyond plain ladder semantics, selected with `--features a,b`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    /// Abort a cycle which runs far longer than the program, instead of hanging.
    pub guard: bool,
}

impl FromStr for Features {
    type Err = String;
    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let mut features = Self::default();
        for word in string.split(',') {
            let value = match word.trim() {
                "" => continue,
                "guard" => &mut features.guard,
                _ => return Err(format!("Unknown feature '{}'", word)),
            };
            if *value {
                return Err(format!("Cannot specify feature '{}' twice", word));
            }
            *value = true;
        }
        Ok(features)
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let features = [("guard", self.guard)];
        let mut has_any_feature = false;
        for (name, value) in features {
            if !value {
                continue;
            }
            if has_any_feature {
                write!(f, ",")?;
            }
            write!(f, "{}", name)?;
            has_any_feature = true;
        }
        Ok(())
    }
}
