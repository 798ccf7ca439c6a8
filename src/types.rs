//! Data model shared by every compiler stage.
//!
//! Two families of records live here:
//!
//! - **Raw** records (`RawRule`, `RawEra`) are what the extractor produces:
//!   every field is syntactically valid, but nothing is cross-checked and the
//!   DST reference of an era is still the literal RULES token.
//! - **Validated** records (`ZoneRule`, `ZoneEra`) are what the transformer
//!   produces: DST references are classified, UNTIL days are resolved to a
//!   concrete date, and time fields are truncated to the scope granularity.
//!
//! All name-keyed collections are `BTreeMap`s so that every later stage walks
//! them in the same order on every run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::Weekday;
use serde::{Serialize, Serializer};

// --- Year sentinels ----------------------------------------------------------

/// Smallest representable year; anchor rules live here.
pub const MIN_YEAR: i32 = -32767;
/// `max` in a Rule TO field.
pub const MAX_TO_YEAR: i32 = 32766;
/// UNTIL year of an era that never ends.
pub const MAX_UNTIL_YEAR: i32 = 32767;

// --- Field types -------------------------------------------------------------

/// Reference frame of a time-of-day field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSuffix {
    Wall,
    Standard,
    Utc,
}

impl TimeSuffix {
    /// Map a tzdb suffix letter (`None` for unsuffixed) to its frame.
    pub fn from_marker(marker: Option<char>) -> Option<Self> {
        match marker {
            None | Some('w') => Some(Self::Wall),
            Some('s') => Some(Self::Standard),
            Some('u') | Some('g') | Some('z') => Some(Self::Utc),
            _ => None,
        }
    }

    pub fn marker(self) -> char {
        match self {
            Self::Wall => 'w',
            Self::Standard => 's',
            Self::Utc => 'u',
        }
    }
}

/// Day-of-month specification (the ON field of a rule, the DAY of an UNTIL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaySpec {
    /// `8`
    Day(u32),
    /// `lastSun`
    Last(Weekday),
    /// `Sun>=8`
    OnOrAfter(Weekday, u32),
    /// `Sun<=25`
    OnOrBefore(Weekday, u32),
}

impl DaySpec {
    /// Numeric encoding used by runtime tables.
    ///
    /// Returns `(on_day_of_week, on_day_of_month)` where the weekday is
    /// ISO-numbered (1 = Monday) or 0 for an exact day, and the day is
    /// positive for `>=`, negative for `<=`, and 0 for `last`.
    pub fn codes(self) -> (u32, i32) {
        match self {
            Self::Day(d) => (0, d as i32),
            Self::Last(wd) => (wd.number_from_monday(), 0),
            Self::OnOrAfter(wd, d) => (wd.number_from_monday(), d as i32),
            Self::OnOrBefore(wd, d) => (wd.number_from_monday(), -(d as i32)),
        }
    }
}

impl fmt::Display for DaySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day(d) => write!(f, "{d}"),
            Self::Last(wd) => write!(f, "last{wd}"),
            Self::OnOrAfter(wd, d) => write!(f, "{wd}>={d}"),
            Self::OnOrBefore(wd, d) => write!(f, "{wd}<={d}"),
        }
    }
}

impl Serialize for DaySpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where a record came from in the input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub file: String,
    /// 1-based.
    pub line: usize,
    pub text: String,
}

// --- Raw records (extractor output) ------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRule {
    pub from_year: i32,
    pub to_year: i32,
    pub in_month: u32,
    pub on: DaySpec,
    pub at_seconds: i32,
    pub at_suffix: TimeSuffix,
    pub save_seconds: i32,
    pub letter: String,
    pub source: SourceLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawUntil {
    pub year: i32,
    pub month: u32,
    pub day: DaySpec,
    pub seconds: i32,
    pub suffix: TimeSuffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEra {
    pub std_offset_seconds: i32,
    /// Literal RULES token: `-`, a fixed amount such as `1:00`, or a policy name.
    pub rules: String,
    pub format: String,
    pub until: Option<RawUntil>,
    pub source: SourceLine,
}

impl RawEra {
    pub fn until_year(&self) -> i32 {
        self.until.map_or(MAX_UNTIL_YEAR, |u| u.year)
    }
}

pub type RawPolicies = BTreeMap<String, Vec<RawRule>>;
pub type RawZones = BTreeMap<String, Vec<RawEra>>;
/// Alias name -> target zone name.
pub type Links = BTreeMap<String, String>;

// --- Validated records (transformer output) ----------------------------------

/// One row of a policy after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRule {
    pub from_year: i32,
    pub to_year: i32,
    pub in_month: u32,
    pub on: DaySpec,
    pub at_seconds: i32,
    pub at_suffix: TimeSuffix,
    pub save_seconds: i32,
    pub letter: String,
    /// Synthetic minimum-year rule.
    pub anchor: bool,
    pub raw_line: String,
}

impl ZoneRule {
    pub fn covers(&self, year: i32) -> bool {
        self.from_year <= year && year <= self.to_year
    }
}

/// DST reference of an era.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DstRef {
    None,
    Fixed(i32),
    Policy(String),
}

impl DstRef {
    pub fn policy(&self) -> Option<&str> {
        match self {
            Self::Policy(name) => Some(name),
            _ => None,
        }
    }
}

/// Resolved UNTIL instant of an era, expressed in the era's own frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Until {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub seconds: i32,
    pub suffix: TimeSuffix,
}

impl Until {
    pub const OPEN: Until = Until { year: MAX_UNTIL_YEAR, month: 1, day: 1, seconds: 0, suffix: TimeSuffix::Wall };

    pub fn is_open(&self) -> bool {
        self.year == MAX_UNTIL_YEAR
    }

    /// Sort key for monotonicity checks; ignores the frame.
    pub fn key(&self) -> (i32, u32, u32, i32) {
        (self.year, self.month, self.day, self.seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEra {
    pub std_offset_seconds: i32,
    pub dst: DstRef,
    pub format: String,
    pub until: Until,
    pub raw_line: String,
}

pub type Policies = BTreeMap<String, Vec<ZoneRule>>;
pub type Zones = BTreeMap<String, Vec<ZoneEra>>;

// --- Comments ----------------------------------------------------------------

/// Name -> set of human-readable reasons.
pub type CommentsMap = BTreeMap<String, BTreeSet<String>>;

/// A zone's own reasons next to those of the policies it references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ZoneComments {
    pub reasons: BTreeSet<String>,
    /// Policy name -> reasons recorded for that policy.
    pub policies: CommentsMap,
}

pub type MergedCommentsMap = BTreeMap<String, ZoneComments>;

/// Advisory side-channel collected by the transformer.
///
/// `removed_*` explain why an entity did not make it into the output,
/// `notable_*` flag anomalies that are kept but worth a comment.
/// `merged_*_zones` attach policy comments to every zone using the policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Comments {
    pub removed_zones: CommentsMap,
    pub removed_policies: CommentsMap,
    pub removed_links: CommentsMap,
    pub notable_zones: CommentsMap,
    pub notable_policies: CommentsMap,
    pub notable_links: CommentsMap,
    pub merged_removed_zones: MergedCommentsMap,
    pub merged_notable_zones: MergedCommentsMap,
}

pub fn add_comment(map: &mut CommentsMap, name: &str, reason: impl Into<String>) {
    map.entry(name.to_string()).or_default().insert(reason.into());
}

/// Format signed seconds as `[-]h:mm[:ss]`.
pub fn hms_string(seconds: i32) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let abs = seconds.unsigned_abs();
    let (h, m, s) = (abs / 3600, (abs / 60) % 60, abs % 60);
    if s == 0 { format!("{sign}{h}:{m:02}") } else { format!("{sign}{h}:{m:02}:{s:02}") }
}
