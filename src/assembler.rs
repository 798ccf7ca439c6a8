//! Database assembler: validated database + buffer stats -> `ZoneInfoDatabase`.
//!
//! ```text
//! ValidatedDatabase ──┐
//!                     ├─ string tables (letters, formats, fragments)
//! BufferStats ────────┤─ indices and djb2 ids
//!                     ├─ per-scope field encoding (EncodingRangeError)
//! tz version ─────────┘─ context metadata
//!                     v
//!               ZoneInfoDatabase ── to_json() ──> interchange document
//! ```
//!
//! Every map is a `BTreeMap` and every table is sorted, so the same input
//! always serializes to the same bytes.

#[path = "assembler/encode.rs"]
mod encode;
#[path = "assembler/tables.rs"]
mod tables;

use std::collections::BTreeMap;

use log::{info, warn};
use serde::Serialize;

use crate::error::EncodingRangeError;
use crate::estimator::{BufferSize, BufferStats};
use crate::scope::Scope;
use crate::transformer::{Truncation, ValidatedDatabase, YearSpan, hash_name, normalize_name};
use crate::types::{Comments, DaySpec, DstRef, TimeSuffix, ZoneEra, ZoneRule, hms_string};

use encode::FieldEncoder;
pub use tables::StringTable;

// --- Output model ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneInfoDatabase {
    pub context: DatabaseContext,
    pub letters: StringTable,
    pub formats: StringTable,
    /// Index 0 is reserved; the first fragment has index 1.
    pub fragments: StringTable,
    pub zones: BTreeMap<String, ZoneInfo>,
    pub policies: BTreeMap<String, PolicyInfo>,
    pub links: BTreeMap<String, LinkInfo>,
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseContext {
    pub tz_version: String,
    pub tz_version_number: u32,
    pub scope: Scope,
    pub start_year: i32,
    pub until_year: i32,
    pub start_year_accurate: i32,
    pub until_year_accurate: i32,
    pub original_years: YearSpan,
    pub generated_years: YearSpan,
    pub lower_truncated: bool,
    pub upper_truncated: bool,
    pub offset_granularity: i32,
    pub time_granularity: i32,
    pub save_granularity: i32,
    pub strict: bool,
    pub counts: Counts,
    pub max_buffer_size: usize,
    pub buffer_sizes: BTreeMap<String, BufferSize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub zones: usize,
    pub links: usize,
    pub policies: usize,
    pub eras: usize,
    pub rules: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneInfo {
    pub index: usize,
    pub id: u32,
    pub normalized_name: String,
    pub compressed_name: String,
    pub eras: Vec<EraRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EraRecord {
    pub std_offset_seconds: i32,
    pub std_offset_code: i64,
    /// `-`, a fixed amount such as `1:00`, or a policy name.
    pub rules: String,
    pub policy_index: Option<usize>,
    pub fixed_save_seconds: i32,
    pub fixed_save_code: i64,
    pub format: String,
    pub format_index: usize,
    pub until_year: i32,
    pub until_year_code: i64,
    pub until_month: u32,
    pub until_day: u32,
    pub until_seconds: i32,
    pub until_time_code: i64,
    pub until_suffix: TimeSuffix,
    pub raw_line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyInfo {
    pub index: usize,
    pub rules: Vec<RuleRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleRecord {
    pub from_year: i32,
    pub from_year_code: i64,
    pub to_year: i32,
    pub to_year_code: i64,
    pub in_month: u32,
    pub on: DaySpec,
    /// ISO weekday, or 0 for an exact day.
    pub on_day_of_week: u32,
    /// Positive for `>=`, negative for `<=`, 0 for `last`.
    pub on_day_of_month: i32,
    pub at_seconds: i32,
    pub at_code: i64,
    pub at_suffix: TimeSuffix,
    pub save_seconds: i32,
    pub save_code: i64,
    pub letter: String,
    pub letter_index: usize,
    pub anchor: bool,
    pub raw_line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkInfo {
    pub target: String,
    pub target_index: usize,
    pub id: u32,
    pub normalized_name: String,
    pub compressed_name: String,
}

impl ZoneInfoDatabase {
    /// Pretty JSON interchange document.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// --- Assembly ----------------------------------------------------------------

pub fn assemble(
    db: &ValidatedDatabase,
    stats: &BufferStats,
    tz_version: &str,
) -> Result<ZoneInfoDatabase, EncodingRangeError> {
    let letters = StringTable::new(db.policies.values().flatten().map(|r| r.letter.as_str()));
    let formats = StringTable::new(db.zones.values().flatten().map(|e| e.format.as_str()));
    let fragments = tables::fragment_table(db.zones.keys().chain(db.links.keys()).map(String::as_str));
    if fragments.len() > tables::MAX_FRAGMENTS {
        return Err(EncodingRangeError {
            entity: "name fragments".to_string(),
            field: "fragment count",
            value: fragments.len() as i64,
            scope: db.scope.scope,
        });
    }

    let policy_index: BTreeMap<&str, usize> = db.policies.keys().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
    let zone_index: BTreeMap<&str, usize> = db.zones.keys().enumerate().map(|(i, n)| (n.as_str(), i)).collect();

    let mut policies = BTreeMap::new();
    for (index, (name, rules)) in db.policies.iter().enumerate() {
        let enc = FieldEncoder::policy(&db.scope, name);
        let rules = rules.iter().map(|r| rule_record(&enc, r, &letters)).collect::<Result<Vec<_>, _>>()?;
        policies.insert(name.clone(), PolicyInfo { index, rules });
    }

    let mut zones = BTreeMap::new();
    for (index, (name, eras)) in db.zones.iter().enumerate() {
        let enc = FieldEncoder::zone(&db.scope, name);
        let eras =
            eras.iter().map(|e| era_record(&enc, e, &policy_index, &formats)).collect::<Result<Vec<_>, _>>()?;
        zones.insert(
            name.clone(),
            ZoneInfo {
                index,
                id: hash_name(name),
                normalized_name: normalize_name(name),
                compressed_name: tables::compress_name(name, &fragments),
                eras,
            },
        );
    }

    let links = db
        .links
        .iter()
        .filter_map(|(name, target)| {
            let target_index = *zone_index.get(target.as_str())?;
            let info = LinkInfo {
                target: target.clone(),
                target_index,
                id: hash_name(name),
                normalized_name: normalize_name(name),
                compressed_name: tables::compress_name(name, &fragments),
            };
            Some((name.clone(), info))
        })
        .collect::<BTreeMap<_, _>>();

    let counts = Counts {
        zones: zones.len(),
        links: links.len(),
        policies: policies.len(),
        eras: zones.values().map(|z| z.eras.len()).sum(),
        rules: policies.values().map(|p| p.rules.len()).sum(),
    };

    let context = DatabaseContext {
        tz_version: tz_version.to_string(),
        tz_version_number: version_number(tz_version),
        scope: db.scope.scope,
        start_year: db.start_year,
        until_year: db.until_year,
        start_year_accurate: db.start_year_accurate(),
        until_year_accurate: db.until_year_accurate(),
        original_years: db.original_years,
        generated_years: db.generated_years,
        lower_truncated: db.truncation.contains(Truncation::LOWER),
        upper_truncated: db.truncation.contains(Truncation::UPPER),
        offset_granularity: db.scope.std_offset.granularity,
        time_granularity: db.scope.time.granularity,
        save_granularity: db.scope.save.granularity,
        strict: db.strict,
        counts,
        max_buffer_size: stats.max_buffer_size,
        buffer_sizes: stats.per_zone.clone(),
    };

    info!(
        "assembled {} zones, {} links, {} policies; {} letters, {} formats, {} fragments",
        counts.zones,
        counts.links,
        counts.policies,
        letters.len(),
        formats.len(),
        fragments.len()
    );

    Ok(ZoneInfoDatabase {
        context,
        letters,
        formats,
        fragments,
        zones,
        policies,
        links,
        comments: db.comments.clone(),
    })
}

fn era_record(
    enc: &FieldEncoder<'_>,
    era: &ZoneEra,
    policy_index: &BTreeMap<&str, usize>,
    formats: &StringTable,
) -> Result<EraRecord, EncodingRangeError> {
    let (rules, policy, fixed_save) = match &era.dst {
        DstRef::None => ("-".to_string(), None, 0),
        DstRef::Fixed(amount) => (hms_string(*amount), None, *amount),
        DstRef::Policy(name) => (name.clone(), policy_index.get(name.as_str()).copied(), 0),
    };
    let until = era.until;

    Ok(EraRecord {
        std_offset_seconds: era.std_offset_seconds,
        std_offset_code: enc.std_offset("std_offset", era.std_offset_seconds)?,
        rules,
        policy_index: policy,
        fixed_save_seconds: fixed_save,
        fixed_save_code: enc.save("fixed_save", fixed_save)?,
        format: era.format.clone(),
        format_index: formats.get(&era.format).unwrap_or_default(),
        until_year: until.year,
        until_year_code: enc.year("until_year", until.year)?,
        until_month: until.month,
        until_day: until.day,
        until_seconds: until.seconds,
        until_time_code: enc.time("until_time", until.seconds)?,
        until_suffix: until.suffix,
        raw_line: era.raw_line.clone(),
    })
}

fn rule_record(enc: &FieldEncoder<'_>, rule: &ZoneRule, letters: &StringTable) -> Result<RuleRecord, EncodingRangeError> {
    let (on_day_of_week, on_day_of_month) = rule.on.codes();
    Ok(RuleRecord {
        from_year: rule.from_year,
        from_year_code: enc.year("from_year", rule.from_year)?,
        to_year: rule.to_year,
        to_year_code: enc.year("to_year", rule.to_year)?,
        in_month: rule.in_month,
        on: rule.on,
        on_day_of_week,
        on_day_of_month,
        at_seconds: rule.at_seconds,
        at_code: enc.time("at", rule.at_seconds)?,
        at_suffix: rule.at_suffix,
        save_seconds: rule.save_seconds,
        save_code: enc.save("save", rule.save_seconds)?,
        letter: rule.letter.clone(),
        letter_index: letters.get(&rule.letter).unwrap_or_default(),
        anchor: rule.anchor,
        raw_line: rule.raw_line.clone(),
    })
}

/// `2024b` -> 2402. Anything not shaped like `YYYYx` maps to 0.
pub fn version_number(tz_version: &str) -> u32 {
    let bytes = tz_version.as_bytes();
    let parsed = match bytes {
        [y0, y1, y2, y3, letter] if letter.is_ascii_lowercase() => std::str::from_utf8(&[*y0, *y1, *y2, *y3])
            .ok()
            .and_then(|year| year.parse::<u32>().ok())
            .filter(|year| *year >= 2000)
            .map(|year| (year - 2000) * 100 + (letter - b'a' + 1) as u32),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        warn!("tz version '{tz_version}' is not of the form YYYYx; version number is 0");
        0
    })
}
