use fxhash::FxHashMap;
use lazy_static::lazy_static;

use crate::error::CommandError;

pub const DEFAULT_LENGTH: usize = 1024;
pub const DEFAULT_ERROR_LIMIT: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OptionKey {
    Verbose,
    Echo,
    Malloc,
    Length,
    Error,
    Seed,
}

pub struct OptionInfo {
    pub key: OptionKey,
    pub min: i64,
    pub max: i64,
    pub description: &'static str,
}

lazy_static! {
    static ref OPTIONS: FxHashMap<&'static str, OptionInfo> = {
        let mut table = FxHashMap::default();
        table.insert("verbose", OptionInfo {
            key: OptionKey::Verbose,
            min: 0,
            max: 4,
            description: "Verbosity level (0 errors only, 2 shows the queue after every change)",
        });
        table.insert("echo", OptionInfo {
            key: OptionKey::Echo,
            min: 0,
            max: 1,
            description: "Echo script commands before running them",
        });
        table.insert("malloc", OptionInfo {
            key: OptionKey::Malloc,
            min: 0,
            max: 100,
            description: "Percentage of allocations to refuse",
        });
        table.insert("length", OptionInfo {
            key: OptionKey::Length,
            min: 0,
            max: 1 << 20,
            description: "Buffer size used by rh",
        });
        table.insert("error", OptionInfo {
            key: OptionKey::Error,
            min: 1,
            max: i64::from(u32::MAX),
            description: "Number of errors before a script is aborted",
        });
        table.insert("seed", OptionInfo {
            key: OptionKey::Seed,
            min: 0,
            max: i64::MAX,
            description: "Seed for allocation failure injection",
        });
        table
    };
}

/// Runtime settings of the console.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    pub verbose: u8,
    pub echo: bool,
    pub fail_percent: u8,
    pub length: usize,
    pub error_limit: usize,
    pub seed: u64,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            verbose: 1,
            echo: false,
            fail_percent: 0,
            length: DEFAULT_LENGTH,
            error_limit: DEFAULT_ERROR_LIMIT,
            seed: 0,
        }
    }
}

impl Options {
    pub fn lookup(name: &str) -> Result<&'static OptionInfo, CommandError> {
        OPTIONS
            .get(name)
            .ok_or_else(|| CommandError::UnknownOption(name.to_string()))
    }

    /// Option names in alphabetical order.
    pub fn names() -> Vec<&'static str> {
        let mut names: Vec<_> = OPTIONS.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, name: &str) -> Result<i64, CommandError> {
        let value = match Options::lookup(name)?.key {
            OptionKey::Verbose => i64::from(self.verbose),
            OptionKey::Echo => i64::from(self.echo),
            OptionKey::Malloc => i64::from(self.fail_percent),
            OptionKey::Length => self.length as i64,
            OptionKey::Error => self.error_limit as i64,
            OptionKey::Seed => self.seed as i64,
        };
        Ok(value)
    }

    pub fn set(&mut self, name: &str, value: i64) -> Result<OptionKey, CommandError> {
        let info = Options::lookup(name)?;
        if value < info.min || value > info.max {
            return Err(CommandError::InvalidOption {
                name: name.to_string(),
                value,
            });
        }
        match info.key {
            OptionKey::Verbose => self.verbose = value as u8,
            OptionKey::Echo => self.echo = value != 0,
            OptionKey::Malloc => self.fail_percent = value as u8,
            OptionKey::Length => self.length = value as usize,
            OptionKey::Error => self.error_limit = value as usize,
            OptionKey::Seed => self.seed = value as u64,
        }
        Ok(info.key)
    }

    /// Log filter matching the verbosity level, used when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 | 1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_through_table() {
        let mut options = Options::default();
        assert_eq!(options.set("malloc", 25).unwrap(), OptionKey::Malloc);
        assert_eq!(options.fail_percent, 25);
        assert_eq!(options.get("malloc").unwrap(), 25);
        options.set("echo", 1).unwrap();
        assert!(options.echo);
    }

    #[test]
    fn rejects_out_of_range() {
        let mut options = Options::default();
        assert!(matches!(
            options.set("malloc", 101),
            Err(CommandError::InvalidOption { .. })
        ));
        assert!(matches!(
            options.set("error", 0),
            Err(CommandError::InvalidOption { .. })
        ));
        assert_eq!(options, Options::default());
    }

    #[test]
    fn rejects_unknown_names() {
        let options = Options::default();
        assert!(matches!(
            options.get("colour"),
            Err(CommandError::UnknownOption(name)) if name == "colour"
        ));
    }

    #[test]
    fn names_are_sorted() {
        assert_eq!(
            Options::names(),
            ["echo", "error", "length", "malloc", "seed", "verbose"]
        );
    }
}
