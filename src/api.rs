use std::collections::BTreeSet;

use crate::assembler::{ZoneInfoDatabase, assemble};
use crate::error::CompileError;
use crate::estimator::{DEFAULT_MAX_TRANSITIONS, estimate};
use crate::extractor::Extractor;
use crate::metrics::{CompileMetrics, StageMetrics, timed};
use crate::scope::Scope;
use crate::transformer::{TransformOptions, transform};

/// Options for one compilation run.
///
/// The run is a pure function of the sources and these options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Source version tag such as `2024b`, echoed into the output.
    pub tz_version: String,
    pub start_year: i32,
    /// Exclusive.
    pub until_year: i32,
    pub scope: Scope,
    pub strict: bool,
    /// Restrict the output to these zone and link names.
    pub include: Option<BTreeSet<String>>,
    /// Transition capacity of the target runtime.
    pub max_transitions: usize,
    /// Log a buffer size above `max_transitions` instead of failing.
    pub ignore_buffer_size_too_large: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        let transform = TransformOptions::default();
        Self {
            tz_version: String::new(),
            start_year: transform.start_year,
            until_year: transform.until_year,
            scope: transform.scope,
            strict: transform.strict,
            include: None,
            max_transitions: DEFAULT_MAX_TRANSITIONS,
            ignore_buffer_size_too_large: false,
        }
    }
}

impl CompileOptions {
    fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            start_year: self.start_year,
            until_year: self.until_year,
            scope: self.scope,
            strict: self.strict,
            include: self.include.clone(),
        }
    }
}

/// One tzdb source file already read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Used in parse error positions.
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

/// Result of [`compile`].
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub database: ZoneInfoDatabase,
    /// Timing measurements for the run.
    pub metrics: CompileMetrics,
}

/// Run extractor, transformer, estimator and assembler over `sources`.
///
/// # Example
/// ```
/// use tzcompiler::{CompileOptions, SourceFile, compile};
///
/// let source = SourceFile::new("europe", "Zone Europe/Oslo 1:00 - CET\n");
/// let out = compile(&[source], &CompileOptions::default()).unwrap();
/// assert_eq!(out.database.context.max_buffer_size, 1);
/// ```
pub fn compile(sources: &[SourceFile], options: &CompileOptions) -> Result<CompileOutput, CompileError> {
    let mut metrics = CompileMetrics::default();
    let (database, total) = timed(|| run(sources, options, &mut metrics));
    metrics.total = total;
    Ok(CompileOutput { database: database?, metrics })
}

fn run(sources: &[SourceFile], options: &CompileOptions, metrics: &mut CompileMetrics) -> Result<ZoneInfoDatabase, CompileError> {
    let (raw, duration) = timed(|| {
        let mut extractor = Extractor::new();
        for source in sources {
            extractor.parse_file(&source.name, &source.text)?;
        }
        Ok::<_, CompileError>(extractor.finish())
    });
    let raw = raw?;
    metrics.source = raw.stats;
    metrics.extract = StageMetrics { duration, produced: raw.zones.len() + raw.links.len() };

    let (validated, duration) = timed(|| transform(raw, &options.transform_options()));
    let validated = validated?;
    metrics.transform = StageMetrics { duration, produced: validated.zones.len() + validated.links.len() };

    let (stats, duration) = timed(|| estimate(&validated));
    let stats = stats?;
    stats.check_capacity(options.max_transitions, options.ignore_buffer_size_too_large)?;
    metrics.estimate = StageMetrics { duration, produced: stats.per_zone.len() };

    let (database, duration) = timed(|| assemble(&validated, &stats, &options.tz_version));
    let database = database?;
    metrics.assemble = StageMetrics { duration, produced: database.zones.len() + database.links.len() };

    Ok(database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EstimateError, ParseErrorKind, ValidationError};
    use crate::transformer::tests::ROUND_TRIP;

    fn options(start: i32, until: i32) -> CompileOptions {
        CompileOptions { tz_version: "2024b".into(), start_year: start, until_year: until, ..CompileOptions::default() }
    }

    #[test]
    fn sources_may_reference_each_other() {
        let sources = [
            SourceFile::new("zones", "Zone Z 1:00 P EU%sT\nLink Z Alias\n"),
            SourceFile::new("rules", "Rule P 2020 2022 - Mar lastSun 2:00 1:00 D\nRule P 2020 2022 - Nov Sun>=1 2:00 0 S\n"),
        ];
        let out = compile(&sources, &options(2020, 2023)).unwrap();
        assert_eq!(out.database.context.max_buffer_size, 2);
        assert_eq!(out.database.links["Alias"].target, "Z");
        assert_eq!(out.metrics.source.files, 2);
        assert_eq!(out.metrics.extract.produced, 2);
        assert!(out.metrics.total >= out.metrics.assemble.duration);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let sources = [SourceFile::new("good", ROUND_TRIP), SourceFile::new("bad", "Rule P 2020\n")];
        let CompileError::Parse(err) = compile(&sources, &options(2020, 2023)).unwrap_err() else {
            panic!("expected a parse error");
        };
        assert_eq!(err.file, "bad");
        assert_eq!(err.line, 1);
        assert!(matches!(err.kind, ParseErrorKind::FieldCount { .. }));
    }

    #[test]
    fn validation_errors_abort_the_run() {
        let sources = [SourceFile::new("x", "Zone Z 1:00 - CET\nLink Z B\nLink B A\n")];
        assert!(matches!(
            compile(&sources, &options(2020, 2023)),
            Err(CompileError::Validation(ValidationError::LinkToLink { .. }))
        ));
    }

    #[test]
    fn buffer_size_above_capacity_aborts_the_run() {
        let sources = [SourceFile::new("x", ROUND_TRIP)];
        let tight = CompileOptions { max_transitions: 1, ..options(2020, 2023) };
        assert!(matches!(
            compile(&sources, &tight),
            Err(CompileError::Estimate(EstimateError::BufferTooLarge { max: 2, capacity: 1, .. }))
        ));

        let ignored = CompileOptions { ignore_buffer_size_too_large: true, ..tight };
        assert_eq!(compile(&sources, &ignored).unwrap().database.context.max_buffer_size, 2);
    }

    #[test]
    fn identical_runs_produce_identical_json() {
        let sources = [SourceFile::new("x", ROUND_TRIP)];
        let a = compile(&sources, &options(2020, 2023)).unwrap().database.to_json().unwrap();
        let b = compile(&sources, &options(2020, 2023)).unwrap().database.to_json().unwrap();
        assert_eq!(a, b);
    }
}
