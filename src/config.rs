//! Configuration related structures
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use getset::{CopyGetters, Getters};
use log::LevelFilter;
use tzcompiler::{DEFAULT_MAX_TRANSITIONS, Scope};

macro_rules! prefix {
    () => {
        "TZCOMPILER_"
    };
}

#[derive(CopyGetters, Debug, Getters, Parser)]
#[command(
    after_help("Zone and link names in --include are matched exactly, one per line."),
    version
)]
/// Compile IANA tz database sources into zone tables.
pub struct Config {
    #[get = "pub"]
    #[arg(value_name("FILE"))]
    /// tzdb source files to compile, in addition to --tzdb-dir.
    files: Vec<PathBuf>,

    #[get = "pub"]
    #[arg(env(concat!(prefix!(), "TZDB_DIR")), long("tzdb-dir"), short('d'), value_name("DIR"))]
    /// Directory of an unpacked tzdata release.
    tzdb_dir: Option<PathBuf>,

    #[get = "pub"]
    #[arg(env(concat!(prefix!(), "TZ_VERSION")), long("tz-version"), value_name("TAG"))]
    /// Version tag echoed into the output, read from the `version` file of --tzdb-dir when absent.
    tz_version: Option<String>,

    #[get_copy = "pub"]
    #[arg(default_value_t = 2000, env(concat!(prefix!(), "START_YEAR")), long("start-year"), value_name("YEAR"))]
    /// First year the output must be accurate for.
    start_year: i32,

    #[get_copy = "pub"]
    #[arg(default_value_t = 2100, env(concat!(prefix!(), "UNTIL_YEAR")), long("until-year"), value_name("YEAR"))]
    /// Year the accurate range ends before.
    until_year: i32,

    #[get_copy = "pub"]
    #[arg(default_value("extended"), env(concat!(prefix!(), "SCOPE")), long("scope"), short('s'), value_name("SCOPE"))]
    /// Output scope: basic, extended or complete.
    scope: Scope,

    #[get_copy = "pub"]
    #[arg(env(concat!(prefix!(), "STRICT")), long("strict"))]
    /// Remove zones and policies whose times need truncation.
    strict: bool,

    #[get_copy = "pub"]
    #[arg(
        default_value_t = DEFAULT_MAX_TRANSITIONS,
        env(concat!(prefix!(), "MAX_TRANSITIONS")),
        long("max-transitions"),
        value_name("COUNT")
    )]
    /// Transition buffer capacity of the target runtime.
    max_transitions: usize,

    #[get_copy = "pub"]
    #[arg(env(concat!(prefix!(), "IGNORE_BUFFER_SIZE_TOO_LARGE")), long("ignore-buffer-size-too-large"))]
    /// Warn instead of failing when the buffer size exceeds --max-transitions.
    ignore_buffer_size_too_large: bool,

    #[get = "pub"]
    #[arg(env(concat!(prefix!(), "INCLUDE")), long("include"), short('i'), value_name("PATH"))]
    /// File listing the zone and link names to keep.
    include: Option<PathBuf>,

    #[get = "pub"]
    #[arg(env(concat!(prefix!(), "OUTPUT")), long("output"), short('o'), value_name("PATH"))]
    /// Write the JSON database here instead of stdout.
    output: Option<PathBuf>,

    #[get_copy = "pub"]
    #[arg(default_value("info"), env(concat!(prefix!(), "LOG_LEVEL")), long("log-level"), short('l'), value_name("LEVEL"))]
    /// The logging level: trace, debug, info, warn, error or off.
    log_level: LevelFilter,

    #[arg(long("color"), conflicts_with("no_color"))]
    /// Force colored summary output.
    color: bool,

    #[arg(long("no-color"))]
    /// Disable colored summary output.
    no_color: bool,

    #[get_copy = "pub"]
    #[arg(long("quiet"), short('q'))]
    /// Skip the summary on stderr.
    quiet: bool,
}

impl Config {
    /// Validate the configuration integrity.
    pub fn validate(&self) -> Result<()> {
        if self.files.is_empty() && self.tzdb_dir.is_none() {
            bail!("no input: pass source files or --tzdb-dir")
        }
        if let Some(dir) = &self.tzdb_dir {
            if !dir.is_dir() {
                bail!("tzdb directory '{}' does not exist", dir.display())
            }
        }
        if self.max_transitions == 0 {
            bail!("--max-transitions must be at least 1")
        }
        if self.start_year >= self.until_year {
            bail!("start year {} must be before until year {}", self.start_year, self.until_year)
        }
        Ok(())
    }

    pub fn use_color(&self) -> bool {
        match (self.color, self.no_color) {
            (true, _) => true,
            (_, true) => false,
            _ => io::stderr().is_terminal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("tzcompiler").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&["europe"]);
        assert_eq!(config.start_year(), 2000);
        assert_eq!(config.until_year(), 2100);
        assert_eq!(config.scope(), Scope::Extended);
        assert_eq!(config.log_level(), LevelFilter::Info);
        assert!(!config.strict());
        assert_eq!(config.max_transitions(), 8);
        assert!(!config.ignore_buffer_size_too_large());
        config.validate().unwrap();
    }

    #[test]
    fn flags_are_parsed() {
        let config = parse(&["--scope", "basic", "--start-year", "1980", "--until-year", "2050", "--strict", "-l", "debug", "x"]);
        assert_eq!(config.scope(), Scope::Basic);
        assert_eq!(config.start_year(), 1980);
        assert_eq!(config.until_year(), 2050);
        assert!(config.strict());
        assert_eq!(config.log_level(), LevelFilter::Debug);
    }

    #[test]
    fn buffer_capacity_flags_are_parsed() {
        let config = parse(&["--max-transitions", "6", "--ignore-buffer-size-too-large", "x"]);
        assert_eq!(config.max_transitions(), 6);
        assert!(config.ignore_buffer_size_too_large());
        assert!(parse(&["--max-transitions", "0", "x"]).validate().is_err());
    }

    #[test]
    fn validate_rejects_missing_input() {
        assert!(parse(&[]).validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_year_range() {
        assert!(parse(&["--start-year", "2030", "--until-year", "2030", "x"]).validate().is_err());
    }

    #[test]
    fn color_flags_override_detection() {
        assert!(parse(&["--color", "x"]).use_color());
        assert!(!parse(&["--no-color", "x"]).use_color());
    }
}
