//! Error taxonomy.
//!
//! Every variant here is fatal: the pipeline stops and nothing is assembled.
//! Non-fatal findings travel through [`crate::types::Comments`] instead.

use thiserror::Error;

use crate::scope::Scope;

/// Top-level failure of a compilation run.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Estimate(#[from] EstimateError),
    #[error(transparent)]
    Encoding(#[from] EncodingRangeError),
}

/// Malformed source line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{file}:{line}: {kind}")]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unknown record keyword '{0}'")]
    UnknownKeyword(String),
    #[error("{record} line has {found} fields")]
    FieldCount { record: &'static str, found: usize },
    #[error("invalid year '{0}'")]
    InvalidYear(String),
    #[error("FROM year {from} is after TO year {to}")]
    ReversedYears { from: i32, to: i32 },
    #[error("invalid month '{0}'")]
    InvalidMonth(String),
    #[error("invalid day specification '{0}'")]
    InvalidDay(String),
    #[error("invalid time '{0}'")]
    InvalidTime(String),
    #[error("invalid time suffix in '{0}'")]
    InvalidSuffix(String),
    #[error("continuation line without an open zone")]
    OrphanContinuation,
    #[error("zone '{0}' ends with an era that has an UNTIL")]
    UnterminatedZone(String),
    #[error("duplicate zone '{0}'")]
    DuplicateZone(String),
    #[error("duplicate link '{0}'")]
    DuplicateLink(String),
}

/// Cross-reference or naming failure detected by the transformer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("empty year window [{start}, {until})")]
    EmptyWindow { start: i32, until: i32 },
    #[error("year window [{start}, {until}) is outside ({min}, {max}]")]
    WindowOutOfRange { start: i32, until: i32, min: i32, max: i32 },
    #[error("zone '{zone}' references unknown policy '{policy}'")]
    UnknownPolicy { zone: String, policy: String },
    #[error("link '{link}' targets unknown zone '{target}'")]
    UnknownZone { link: String, target: String },
    #[error("link '{link}' targets '{target}', which is itself a link")]
    LinkToLink { link: String, target: String },
    #[error("'{name}' and '{existing}' both normalize to '{normalized}'")]
    DuplicateName { name: String, existing: String, normalized: String },
    #[error("'{name}' and '{existing}' share the name hash {hash:#010x}")]
    HashCollision { name: String, existing: String, hash: u32 },
}

/// A value does not fit the width the selected scope gives its field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{entity}: {field} value {value} does not fit the {scope} scope")]
pub struct EncodingRangeError {
    /// `zone 'Name'` or `policy 'Name'`.
    pub entity: String,
    pub field: &'static str,
    pub value: i64,
    pub scope: Scope,
}

/// Internal inconsistency found while simulating transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimateError {
    #[error("zone '{zone}' has no era active in {year}")]
    NoActiveEra { zone: String, year: i32 },
    #[error("zone '{zone}' references policy '{policy}', which is missing")]
    UnknownPolicy { zone: String, policy: String },
    #[error("zone '{zone}' references policy '{policy}', which has no rules")]
    EmptyPolicy { zone: String, policy: String },
    #[error("zone '{zone}': policy '{policy}' has no rule before {year}")]
    NoPriorRule { zone: String, policy: String, year: i32 },
    #[error("policy '{policy}' selects a non-existent date in {year}")]
    InvalidRuleDate { policy: String, year: i32 },
    #[error("year window [{start}, {until}) cannot be simulated")]
    WindowOutOfRange { start: i32, until: i32 },
    #[error("max buffer size {max} (zone '{zone}' in {year}) exceeds the runtime capacity of {capacity} transitions")]
    BufferTooLarge { max: usize, capacity: usize, zone: String, year: i32 },
}
