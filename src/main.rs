mod config;
mod report;

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::fmt::Color;
use log::{LevelFilter, debug, info};
use tempfile::NamedTempFile;
use tzcompiler::{CompileOptions, SourceFile, compile};

use crate::config::Config;

/// Release files holding Zone, Rule and Link lines, in tzdata order.
const TZDB_FILES: [&str; 9] =
    ["africa", "antarctica", "asia", "australasia", "europe", "northamerica", "southamerica", "etcetera", "backward"];

fn main() -> Result<()> {
    let config = Config::parse();
    init_logging(config.log_level())?;
    config.validate()?;

    let sources = read_sources(&config)?;
    let options = CompileOptions {
        tz_version: tz_version(&config)?,
        start_year: config.start_year(),
        until_year: config.until_year(),
        scope: config.scope(),
        strict: config.strict(),
        include: config.include().as_deref().map(read_include).transpose()?,
        max_transitions: config.max_transitions(),
        ignore_buffer_size_too_large: config.ignore_buffer_size_too_large(),
    };

    let out = compile(&sources, &options).context("compile tz database")?;
    let json = out.database.to_json().context("serialize database")?;
    write_output(config.output().as_deref(), &json)?;

    if !config.quiet() {
        report::print_summary(&out, config.use_color());
    }
    Ok(())
}

fn init_logging(log_level: LevelFilter) -> Result<()> {
    // Initialize the logger with the format:
    // [YYYY-MM-DDTHH:MM:SS:MMMZ LEVEL crate::module file:LINE] MSG…
    // The file and line will be only printed when running with debug or trace level.
    env_logger::builder()
        .filter_level(log_level)
        .format(move |buf, r| {
            let mut style = buf.style();
            style.set_color(Color::Black).set_intense(true);
            writeln!(
                buf,
                "{}{} {:<5} {}{}{} {}",
                style.value("["),
                buf.timestamp_millis(),
                buf.default_styled_level(r.level()),
                r.target(),
                match (log_level >= LevelFilter::Debug, r.file(), r.line()) {
                    (true, Some(file), Some(line)) => format!(" {}:{}", file, line),
                    _ => "".into(),
                },
                style.value("]"),
                r.args()
            )
        })
        .try_init()
        .context("init env logger")
}

fn read_sources(config: &Config) -> Result<Vec<SourceFile>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    if let Some(dir) = config.tzdb_dir() {
        paths.extend(TZDB_FILES.iter().map(|name| dir.join(name)).filter(|path| path.is_file()));
    }
    paths.extend(config.files().iter().cloned());

    paths
        .iter()
        .map(|path| {
            let text = fs::read_to_string(path).with_context(|| format!("read source {}", path.display()))?;
            debug!("Read {} ({} bytes)", path.display(), text.len());
            Ok(SourceFile::new(source_name(path), text))
        })
        .collect()
}

fn source_name(path: &Path) -> String {
    path.file_name().map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

fn tz_version(config: &Config) -> Result<String> {
    if let Some(tag) = config.tz_version() {
        return Ok(tag.clone());
    }
    let Some(dir) = config.tzdb_dir() else {
        return Ok(String::new());
    };
    let path = dir.join("version");
    if !path.is_file() {
        return Ok(String::new());
    }
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    Ok(text.trim().to_string())
}

/// One name per line; blank lines and `#` comments are skipped.
fn read_include(path: &Path) -> Result<BTreeSet<String>> {
    let text = fs::read_to_string(path).with_context(|| format!("read include list {}", path.display()))?;
    Ok(parse_include(&text))
}

fn parse_include(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn write_output(output: Option<&Path>, json: &str) -> Result<()> {
    let Some(path) = output else {
        let mut stdout = io::stdout().lock();
        stdout.write_all(json.as_bytes()).context("write stdout")?;
        return stdout.write_all(b"\n").context("write stdout");
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(parent).with_context(|| format!("create temp file in {}", parent.display()))?;
    file.write_all(json.as_bytes()).context("write database")?;
    file.write_all(b"\n").context("write database")?;
    file.persist(path).with_context(|| format!("persist {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_lists_skip_comments_and_blanks() {
        let names = parse_include("# zones\nEurope/Oslo\n\n  America/New_York  # east\nUS/Eastern\n");
        assert_eq!(names.into_iter().collect::<Vec<_>>(), ["America/New_York", "Europe/Oslo", "US/Eastern"]);
    }

    #[test]
    fn output_is_replaced_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.json");
        fs::write(&path, "old").unwrap();
        write_output(Some(&path), "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");
    }

    #[test]
    fn source_names_are_file_names() {
        assert_eq!(source_name(Path::new("/usr/share/tzdata/europe")), "europe");
    }
}
